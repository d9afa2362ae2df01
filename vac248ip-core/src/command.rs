//! VAC248IP command definitions and command datagram encoding

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::{
    checksum,
    constants::{COMMAND_PACKET_SIZE, START_STREAM_FLAG},
    error::{Error, Result},
};

/// Command opcodes understood by the camera
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // Streaming
    Stream = 0x5A,
    GetSingleFrame = 0xE8,
    GetConfig = 0xF2,

    // Exposure & gain
    Exposure = 0xC0,
    AutoGainExpo = 0x94,
    ContrastAuto = 0xD2,
    GainAnalog = 0xB2,
    GainDigital = 0xB8,
    MaxGainAuto = 0xD4,
    Sharpness = 0xC6,

    // Gamma correction
    GammaOne = 0x8E,
    Gamma07 = 0x8A,
    Gamma045 = 0x8C,

    // Shutter
    ShutterGlobal = 0x36,
    ShutterRolling = 0x38,
}

impl Opcode {
    /// Get opcode name
    pub fn name(self) -> &'static str {
        match self {
            Self::Stream => "STREAM",
            Self::GetSingleFrame => "GET_SINGLE_FRAME",
            Self::GetConfig => "GET_CONFIG",
            Self::Exposure => "EXPOSURE",
            Self::AutoGainExpo => "AUTO_GAIN_EXPO",
            Self::ContrastAuto => "CONTRAST_AUTO",
            Self::GainAnalog => "GAIN_ANALOG",
            Self::GainDigital => "GAIN_DIGITAL",
            Self::MaxGainAuto => "MAX_GAIN_AUTO",
            Self::Sharpness => "SHARPNESS",
            Self::GammaOne => "GAMMA_1",
            Self::Gamma07 => "GAMMA_07",
            Self::Gamma045 => "GAMMA_045",
            Self::ShutterGlobal => "SHUTTER_GLOBAL",
            Self::ShutterRolling => "SHUTTER_ROLLING",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> u8 {
        opcode as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x5A => Ok(Self::Stream),
            0xE8 => Ok(Self::GetSingleFrame),
            0xF2 => Ok(Self::GetConfig),
            0xC0 => Ok(Self::Exposure),
            0x94 => Ok(Self::AutoGainExpo),
            0xD2 => Ok(Self::ContrastAuto),
            0xB2 => Ok(Self::GainAnalog),
            0xB8 => Ok(Self::GainDigital),
            0xD4 => Ok(Self::MaxGainAuto),
            0xC6 => Ok(Self::Sharpness),
            0x8E => Ok(Self::GammaOne),
            0x8A => Ok(Self::Gamma07),
            0x8C => Ok(Self::Gamma045),
            0x36 => Ok(Self::ShutterGlobal),
            0x38 => Ok(Self::ShutterRolling),
            _ => Err(Error::UnknownOpcode(value)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// Command datagram
///
/// # Packet Structure
///
/// ```text
/// ┌─────────┬─────────┬───────────────────────────┬──────────┐
/// │ Command │  Data   │         Reserved          │ Checksum │
/// │ 1 byte  │ 1 byte  │      5 bytes (zero)       │  1 byte  │
/// └─────────┴─────────┴───────────────────────────┴──────────┘
/// ```
///
/// Checksum is `(command + data) mod 256`.
///
/// # Examples
///
/// ```
/// use vac248ip_core::CommandPacket;
///
/// let packet = CommandPacket::start(1);
/// assert_eq!(&packet.encode()[..], &[0x5A, 0x81, 0, 0, 0, 0, 0, 0xDB]);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub opcode: Opcode,
    pub data: u8,
}

impl CommandPacket {
    pub fn new(opcode: Opcode, data: u8) -> Self {
        Self { opcode, data }
    }

    /// Stop the video stream
    pub fn stop() -> Self {
        Self::new(Opcode::Stream, 0x00)
    }

    /// Start the video stream in the given video format
    pub fn start(video_format: u8) -> Self {
        Self::new(Opcode::Stream, video_format | START_STREAM_FLAG)
    }

    /// Set exposure (0..=255 on the wire)
    pub fn exposure(value: u8) -> Self {
        Self::new(Opcode::Exposure, value)
    }

    /// Request the 48-byte config datagram
    pub fn get_config() -> Self {
        Self::new(Opcode::GetConfig, 0x00)
    }

    /// Switch between automatic (`true`) and manual exposure
    pub fn auto_gain_expo(enabled: bool) -> Self {
        Self::new(Opcode::AutoGainExpo, if enabled { 0 } else { 1 })
    }

    /// Contrast for auto mode, -70..=70 sent as a two's complement byte
    pub fn contrast_auto(value: i8) -> Self {
        Self::new(Opcode::ContrastAuto, value as u8)
    }

    pub fn gain_analog(value: u8) -> Self {
        Self::new(Opcode::GainAnalog, value)
    }

    pub fn gain_digital(value: u8) -> Self {
        Self::new(Opcode::GainDigital, value)
    }

    pub fn max_gain_auto(value: u8) -> Self {
        Self::new(Opcode::MaxGainAuto, value)
    }

    pub fn sharpness(value: u8) -> Self {
        Self::new(Opcode::Sharpness, value)
    }

    /// Check if this is the stream STOP command
    pub fn is_stop(&self) -> bool {
        self.opcode == Opcode::Stream && self.data & START_STREAM_FLAG == 0
    }

    /// Video format requested by a START command
    pub fn start_format(&self) -> Option<u8> {
        if self.opcode == Opcode::Stream && self.data & START_STREAM_FLAG != 0 {
            Some(self.data & !START_STREAM_FLAG)
        } else {
            None
        }
    }

    pub fn checksum(&self) -> u8 {
        checksum::calculate(self.opcode.into(), self.data)
    }

    /// Encode to the 8-byte wire form
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(COMMAND_PACKET_SIZE);

        buf.put_u8(self.opcode.into());
        buf.put_u8(self.data);
        buf.put_bytes(0, 5);
        buf.put_u8(self.checksum());

        buf
    }

    /// Decode a command datagram
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Buffer is not exactly 8 bytes
    /// - Checksum verification fails
    /// - Opcode is unknown
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != COMMAND_PACKET_SIZE {
            return Err(Error::InvalidLength {
                expected: COMMAND_PACKET_SIZE,
                actual: buf.len(),
            });
        }

        let (command, data, received) = (buf[0], buf[1], buf[COMMAND_PACKET_SIZE - 1]);
        let expected = checksum::calculate(command, data);
        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        Ok(Self::new(Opcode::try_from(command)?, data))
    }
}

impl fmt::Display for CommandPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[data=0x{:02X}]", self.opcode, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stop_encoding() {
        let encoded = CommandPacket::stop().encode();
        assert_eq!(&encoded[..], &[0x5A, 0x00, 0, 0, 0, 0, 0, 0x5A]);
    }

    #[test]
    fn test_start_sets_stream_flag() {
        let packet = CommandPacket::start(3);
        assert_eq!(packet.data, 0x83);
        assert_eq!(packet.start_format(), Some(3));
        assert!(!packet.is_stop());
    }

    #[test]
    fn test_exposure_encoding() {
        let encoded = CommandPacket::exposure(0xBE).encode();
        assert_eq!(&encoded[..], &[0xC0, 0xBE, 0, 0, 0, 0, 0, 0x7E]);
    }

    #[test]
    fn test_contrast_negative() {
        let packet = CommandPacket::contrast_auto(-70);
        assert_eq!(packet.data, 0xBA);
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let mut encoded = CommandPacket::get_config().encode();
        encoded[7] ^= 0xFF;

        let result = CommandPacket::decode(&encoded);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let result = CommandPacket::decode(&[0x5A, 0x00, 0x5A]);
        assert!(matches!(
            result,
            Err(Error::InvalidLength { expected: 8, actual: 3 })
        ));
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let result = CommandPacket::decode(&[0x01, 0x01, 0, 0, 0, 0, 0, 0x02]);
        assert!(matches!(result, Err(Error::UnknownOpcode(0x01))));
    }

    #[test]
    fn test_decode_auto_gain_expo() {
        let decoded = CommandPacket::decode(&CommandPacket::auto_gain_expo(false).encode()).unwrap();
        assert_eq!(decoded.opcode, Opcode::AutoGainExpo);
        assert_eq!(decoded.data, 1);
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(Opcode::GetConfig.to_string(), "GET_CONFIG(0xF2)");
    }
}
