//! Fail-safe terminal path

mod shutdown;

pub use shutdown::{ShutdownReason, ShutdownSupervisor};
