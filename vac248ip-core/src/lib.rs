//! # vac248ip-core
//!
//! Core protocol implementation for VAC248IP network cameras.
//!
//! This crate provides the I/O-free protocol primitives:
//! - Command datagram encoding/decoding and checksum
//! - Image-data header parsing and length classification
//! - The slot buffer that receives captured datagrams
//! - The capture state machine (classifier/assembler)
//! - Protocol constants

pub mod assembler;
pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod packet;
pub mod slot;
pub mod status;
pub mod version;

pub use assembler::{Assembler, AssemblerLimits, Discard, Verdict};
pub use command::{CommandPacket, Opcode};
pub use error::{Error, Result};
pub use packet::{DataHeader, PacketClass, Rejection};
pub use slot::{Slot, SlotBuffer, SlotKind};
pub use status::{CaptureReport, CaptureStatus, result_code};
pub use version::{Version, version};
