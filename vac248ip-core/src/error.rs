//! Error types for vac248ip-core

/// Result type alias for vac248ip-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Datagram has the wrong size for its kind
    #[error("Invalid length: expected {expected} bytes, got {actual} bytes")]
    InvalidLength {
        expected: usize,
        actual: usize,
    },

    /// Command checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch {
        expected: u8,
        received: u8,
    },

    /// Unknown command opcode
    #[error("Unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// Slot index past the end of the slot buffer
    #[error("Slot {index} out of range (capacity: {capacity})")]
    SlotOutOfRange {
        index: usize,
        capacity: usize,
    },
}
