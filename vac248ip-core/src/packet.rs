//! Inbound datagram classification and image-data header parsing

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::{
    constants::{
        CONFIG_PACKET_SIZE, DATA_HEADER_SIZE, DATA_PACKET_SIZE, PIXELS_PER_PACKET,
        SENTINEL_FRAME_NUMBER,
    },
    error::{Error, Result},
};

/// Datagram class, decided by exact length only
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketClass {
    /// 1472 bytes
    Data,
    /// 48 bytes
    Config,
    /// Anything else
    Malformed,
}

impl PacketClass {
    pub fn of_len(len: usize) -> Self {
        match len {
            DATA_PACKET_SIZE => Self::Data,
            CONFIG_PACKET_SIZE => Self::Config,
            _ => Self::Malformed,
        }
    }
}

/// Why an image-data datagram was not placed in a slot
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Frame number 0: the first frame may be overexposed
    SentinelFrame,
    /// Offset past the last packet of a frame
    OffsetOutOfRange,
    /// Offset not a multiple of the per-packet pixel count
    OffsetMisaligned,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::SentinelFrame => "sentinel frame",
            Self::OffsetOutOfRange => "offset out of range",
            Self::OffsetMisaligned => "offset misaligned",
        };
        f.write_str(reason)
    }
}

/// Image-data packet header
///
/// # Packet Structure
///
/// ```text
/// ┌──────────────┬──────────────────┬──────────────────────────┐
/// │ Frame number │   Pixel offset   │          Pixels          │
/// │    1 byte    │ 3 bytes (BE u24) │       1468 bytes         │
/// └──────────────┴──────────────────┴──────────────────────────┘
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DataHeader {
    /// 1-based frame number, 0 is the discard sentinel
    pub frame_number: u8,

    /// Byte offset of the payload within the frame
    pub offset: u32,
}

impl DataHeader {
    /// Parse the header from the start of a datagram
    ///
    /// # Examples
    ///
    /// ```
    /// use vac248ip_core::DataHeader;
    ///
    /// let header = DataHeader::parse(&[2, 0x00, 0x05, 0xBC]).unwrap();
    /// assert_eq!(header.frame_number, 2);
    /// assert_eq!(header.offset, 1468);
    /// ```
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < DATA_HEADER_SIZE {
            return Err(Error::InvalidLength {
                expected: DATA_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        Ok(Self {
            frame_number: buf[0],
            offset: BigEndian::read_u24(&buf[1..DATA_HEADER_SIZE]),
        })
    }

    /// Largest valid offset for a frame of `frame_packets` datagrams
    ///
    /// `None` for an empty frame, which has no valid offset.
    pub fn max_offset(frame_packets: u32) -> Option<u64> {
        frame_packets
            .checked_sub(1)
            .map(|last| PIXELS_PER_PACKET as u64 * u64::from(last))
    }

    /// Check the offset against the frame geometry
    pub fn check_offset(&self, frame_packets: u32) -> std::result::Result<(), Rejection> {
        match Self::max_offset(frame_packets) {
            Some(max) if u64::from(self.offset) <= max => {}
            _ => return Err(Rejection::OffsetOutOfRange),
        }
        if self.offset as usize % PIXELS_PER_PACKET != 0 {
            return Err(Rejection::OffsetMisaligned);
        }
        Ok(())
    }

    /// Full content validation used by the capture loop
    pub fn validate(&self, frame_packets: u32) -> std::result::Result<(), Rejection> {
        if self.frame_number == SENTINEL_FRAME_NUMBER {
            return Err(Rejection::SentinelFrame);
        }
        self.check_offset(frame_packets)
    }

    /// Index of this packet within its frame
    pub fn packet_index(&self) -> usize {
        self.offset as usize / PIXELS_PER_PACKET
    }
}
