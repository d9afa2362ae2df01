//! Capture output buffer
//!
//! The buffer is a sequence of fixed-size slot records. Each slot holds one
//! accepted datagram behind a one-byte kind marker:
//!
//! ```text
//! ┌────────┬──────────────────────────────────────────┐
//! │  Kind  │              Datagram payload            │
//! │ 1 byte │                1472 bytes                │
//! └────────┴──────────────────────────────────────────┘
//! ```

use crate::{
    constants::{CONFIG_PACKET_SIZE, DATA_PACKET_SIZE, SLOT_SIZE},
    error::{Error, Result},
    packet::DataHeader,
};

/// Kind marker stored in byte 0 of a slot
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotKind {
    Data = 0,
    Config = 1,
}

/// One slot record, byte-compatible with the flat `[kind | payload]` layout
#[derive(Clone, Copy)]
#[repr(C)]
pub struct Slot {
    marker: u8,
    payload: [u8; DATA_PACKET_SIZE],
}

const _: () = assert!(std::mem::size_of::<Slot>() == SLOT_SIZE);

impl Slot {
    const EMPTY: Slot = Slot {
        marker: SlotKind::Data as u8,
        payload: [0; DATA_PACKET_SIZE],
    };

    pub fn kind(&self) -> SlotKind {
        if self.marker == SlotKind::Config as u8 {
            SlotKind::Config
        } else {
            SlotKind::Data
        }
    }

    /// Full payload region (1472 bytes)
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload trimmed to the size implied by the kind marker
    pub fn datagram(&self) -> &[u8] {
        match self.kind() {
            SlotKind::Data => &self.payload,
            SlotKind::Config => &self.payload[..CONFIG_PACKET_SIZE],
        }
    }

    /// Image-data header, `None` for config slots
    pub fn data_header(&self) -> Option<DataHeader> {
        match self.kind() {
            SlotKind::Data => DataHeader::parse(&self.payload).ok(),
            SlotKind::Config => None,
        }
    }

    /// Pixel bytes of a data slot
    pub fn pixels(&self) -> &[u8] {
        &self.payload[crate::constants::DATA_HEADER_SIZE..]
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("kind", &self.kind())
            .field("header", &self.data_header())
            .field("head", &hex::encode(&self.payload[..8]))
            .finish()
    }
}

/// Caller-owned capture buffer
///
/// # Examples
///
/// ```
/// use vac248ip_core::SlotBuffer;
///
/// let slots = SlotBuffer::with_byte_len(1473 * 4 + 100);
/// assert_eq!(slots.capacity(), 4);
/// assert_eq!(slots.filled(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct SlotBuffer {
    slots: Vec<Slot>,
    filled: usize,
}

impl SlotBuffer {
    /// Buffer with room for `capacity` datagrams
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::EMPTY; capacity],
            filled: 0,
        }
    }

    /// Buffer sized from a flat byte length; a trailing partial slot is unused
    pub fn with_byte_len(len: usize) -> Self {
        Self::new(len / SLOT_SIZE)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots filled by the last capture
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Zero every kind marker and forget previous contents
    pub fn reset_markers(&mut self) {
        for slot in &mut self.slots {
            slot.marker = SlotKind::Data as u8;
        }
        self.filled = 0;
    }

    /// Bounds-checked slot access
    pub fn get(&self, index: usize) -> Result<&Slot> {
        self.slots.get(index).ok_or(Error::SlotOutOfRange {
            index,
            capacity: self.slots.len(),
        })
    }

    /// Filled slots in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots[..self.filled].iter()
    }

    /// Receive target for the next datagram
    pub fn next_payload_mut(&mut self) -> Result<&mut [u8]> {
        let (index, capacity) = (self.filled, self.slots.len());
        self.slots
            .get_mut(index)
            .map(|slot| &mut slot.payload[..])
            .ok_or(Error::SlotOutOfRange { index, capacity })
    }

    /// Payload of the slot that would be filled next
    pub fn next_payload(&self) -> Result<&[u8]> {
        self.get(self.filled).map(|slot| &slot.payload[..])
    }

    /// Mark the pending slot with `kind` and advance
    pub fn commit(&mut self, kind: SlotKind) -> Result<usize> {
        let (index, capacity) = (self.filled, self.slots.len());
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(Error::SlotOutOfRange { index, capacity })?;
        slot.marker = kind as u8;
        self.filled += 1;
        Ok(index)
    }

    /// Drop filled slots after a fatal capture error
    pub fn discard(&mut self) {
        self.filled = 0;
    }

    pub fn is_full(&self) -> bool {
        self.filled >= self.slots.len()
    }

    /// Raw `[kind | payload]` bytes of the filled slots
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.filled * SLOT_SIZE);
        for slot in self.iter() {
            out.push(slot.marker);
            out.extend_from_slice(&slot.payload);
        }
        out
    }
}
