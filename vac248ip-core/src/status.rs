//! Capture outcomes

use std::fmt;

/// Result code reported for a fatal capture error
pub const FATAL_ERROR_CODE: i32 = -1;

/// How a capture session ended without a fatal error
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CaptureStatus {
    /// A data packet past the requested frame count arrived
    Complete,

    /// Every slot was filled
    BufferFull,

    /// Nothing arrived within the poll timeout; partial data is kept
    Timeout,

    /// Too many consecutive unrecognized-length datagrams; partial data is kept
    MalformedAbort,
}

impl CaptureStatus {
    /// Numeric result code: 0 success, 1 timeout, 2 malformed abort
    pub fn code(self) -> i32 {
        match self {
            Self::Complete | Self::BufferFull => 0,
            Self::Timeout => 1,
            Self::MalformedAbort => 2,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Complete | Self::BufferFull)
    }
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Complete => "complete",
            Self::BufferFull => "buffer full",
            Self::Timeout => "timeout",
            Self::MalformedAbort => "malformed abort",
        };
        f.write_str(name)
    }
}

/// Non-fatal capture result
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub status: CaptureStatus,

    /// Slots filled before the session ended
    pub filled: usize,
}

impl CaptureReport {
    pub fn code(&self) -> i32 {
        self.status.code()
    }
}

impl fmt::Display for CaptureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capture[{}](filled={})", self.status, self.filled)
    }
}

/// Flatten a capture result into `(code, filled)`
///
/// A fatal error always reports zero filled slots.
pub fn result_code<E>(result: &std::result::Result<CaptureReport, E>) -> (i32, usize) {
    match result {
        Ok(report) => (report.code(), report.filled),
        Err(_) => (FATAL_ERROR_CODE, 0),
    }
}
