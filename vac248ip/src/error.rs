//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] vac248ip_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] vac248ip_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] vac248ip_types::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera not open")]
    NotOpen,

    #[error("No data received from camera")]
    Timeout,

    #[error("Invalid response from camera: {0}")]
    InvalidResponse(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Blocking worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl Error {
    /// A later attempt might succeed
    ///
    /// Calling a closed camera or asking for an unsupported mode never will.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotOpen | Self::NotSupported(_))
    }
}
