//! VAC248IP command checksum
//!
//! The last byte of every command datagram is the low byte of the sum of
//! the command and data bytes.

use tracing::trace;

/// Calculate the command checksum
///
/// # Examples
///
/// ```
/// use vac248ip_core::checksum;
///
/// assert_eq!(checksum::calculate(0x5A, 0x81), 0xDB);
/// assert_eq!(checksum::calculate(0xC0, 0x50), 0x10);
/// ```
pub fn calculate(command: u8, data: u8) -> u8 {
    let checksum = command.wrapping_add(data);

    trace!(
        command = format!("0x{:02X}", command),
        data = format!("0x{:02X}", data),
        checksum = format!("0x{:02X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Verify checksum
pub fn verify(command: u8, data: u8, expected: u8) -> bool {
    calculate(command, data) == expected
}
