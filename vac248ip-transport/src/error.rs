//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket syscall failed; the socket may be unusable
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Core protocol error: {0}")]
    Core(#[from] vac248ip_core::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// OS error code behind a failed syscall
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Check if the socket should be recreated before retrying
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
