//! Packet classifier and slot assembler
//!
//! The assembler is the capture state machine without any I/O. The caller
//! receives each datagram straight into [`SlotBuffer::next_payload_mut`] and
//! then hands the received length and source address to
//! [`Assembler::on_datagram`], which decides whether the slot is kept,
//! reused, or the session is over.

use std::net::{IpAddr, SocketAddr};

use tracing::{trace, warn};

use crate::{
    error::Result,
    packet::{DataHeader, PacketClass, Rejection},
    slot::{SlotBuffer, SlotKind},
    status::CaptureStatus,
};

/// Session limits for one capture
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AssemblerLimits {
    /// Frames to collect; a higher frame number ends the capture
    pub frames: u32,

    /// Image-data datagrams per frame
    pub frame_packets: u32,

    /// Consecutive unrecognized-length datagrams tolerated
    pub malformed_tolerance: u32,
}

/// Why a datagram was dropped without consuming a slot
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Discard {
    /// Recognized length from some other host
    ForeignSource,
    /// Image-data datagram with invalid content
    Rejected(Rejection),
    /// Unrecognized length, still within tolerance
    Malformed,
}

/// Verdict for one received datagram
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Slot kept
    Accepted { index: usize, kind: SlotKind },
    /// Slot will be reused for the next datagram
    Discarded(Discard),
    /// Session is over
    Finished(CaptureStatus),
}

/// Capture state machine
#[derive(Debug, Clone)]
pub struct Assembler {
    camera_ip: IpAddr,
    limits: AssemblerLimits,
    malformed_run: u32,
}

impl Assembler {
    pub fn new(camera_ip: impl Into<IpAddr>, limits: AssemblerLimits) -> Self {
        Self {
            camera_ip: camera_ip.into(),
            limits,
            malformed_run: 0,
        }
    }

    /// Current run of consecutive unrecognized-length datagrams
    pub fn malformed_run(&self) -> u32 {
        self.malformed_run
    }

    pub fn limits(&self) -> &AssemblerLimits {
        &self.limits
    }

    /// Completion check before waiting for the next datagram
    pub fn check_full(&self, slots: &SlotBuffer) -> Option<CaptureStatus> {
        slots.is_full().then_some(CaptureStatus::BufferFull)
    }

    /// Classify the datagram sitting in the pending slot
    ///
    /// `len` is the received length and `source` the sender address. The
    /// pending slot is committed only for an `Accepted` verdict.
    pub fn on_datagram(
        &mut self,
        slots: &mut SlotBuffer,
        len: usize,
        source: SocketAddr,
    ) -> Result<Verdict> {
        let verdict = match PacketClass::of_len(len) {
            PacketClass::Data => {
                if !self.is_camera(source) {
                    Verdict::Discarded(Discard::ForeignSource)
                } else {
                    self.malformed_run = 0;
                    let header = DataHeader::parse(slots.next_payload()?)?;

                    match header.validate(self.limits.frame_packets) {
                        Err(rejection) => Verdict::Discarded(Discard::Rejected(rejection)),
                        Ok(()) if u32::from(header.frame_number) > self.limits.frames => {
                            Verdict::Finished(CaptureStatus::Complete)
                        }
                        Ok(()) => Verdict::Accepted {
                            index: slots.commit(SlotKind::Data)?,
                            kind: SlotKind::Data,
                        },
                    }
                }
            }
            PacketClass::Config => {
                if !self.is_camera(source) {
                    Verdict::Discarded(Discard::ForeignSource)
                } else {
                    self.malformed_run = 0;
                    Verdict::Accepted {
                        index: slots.commit(SlotKind::Config)?,
                        kind: SlotKind::Config,
                    }
                }
            }
            PacketClass::Malformed => {
                self.malformed_run += 1;
                if self.malformed_run > self.limits.malformed_tolerance {
                    warn!(
                        run = self.malformed_run,
                        tolerance = self.limits.malformed_tolerance,
                        "Too many unrecognized-length datagrams, aborting capture"
                    );
                    Verdict::Finished(CaptureStatus::MalformedAbort)
                } else {
                    Verdict::Discarded(Discard::Malformed)
                }
            }
        };

        trace!(len, %source, ?verdict, filled = slots.filled(), "Datagram classified");

        Ok(verdict)
    }

    fn is_camera(&self, source: SocketAddr) -> bool {
        source.ip() == self.camera_ip
    }
}
