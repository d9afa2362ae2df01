//! Socket side of the VAC248IP protocol
//!
//! Sends paced commands, drains stale datagrams and manages the socket's
//! blocking mode. Capture sessions and config requests run over any
//! [`CameraSocket`].

pub mod capture;
pub mod config;
pub mod drain;
pub mod error;
pub mod mode;
pub mod pace;
pub mod sender;
pub mod socket;
pub mod udp;

pub use capture::{CaptureParams, Timings, capture};
pub use config::request_config;
pub use drain::drain;
pub use error::{Error, Result};
pub use mode::{NonBlockingGuard, SavedMode};
pub use sender::CommandSender;
pub use socket::{CameraSocket, SocketTimeouts, StatusFlags};
