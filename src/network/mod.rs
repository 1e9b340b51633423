//! Cellular network attach and data session

mod manager;

pub use manager::{NetworkError, NetworkManager};
