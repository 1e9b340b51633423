//! Camera module link

mod protocol;

pub use protocol::{CameraError, CameraTransferProtocol};
