//! Frame gluing
//!
//! Captured image-data datagrams are copied into a frame buffer at their
//! pixel offsets. The last config datagram of the capture, if any, rides
//! along so the camera handle can refresh its cached settings.
//!
//! Three ways to build a frame from one capture:
//! - [`glue`]: every packet lands in a single frame, later packets win
//! - [`mean`]: consecutive camera frames are glued into sub-frames which
//!   are then averaged pixel by pixel
//! - [`smart_mean`]: each camera frame is a sub-frame and every packet is
//!   averaged only over the sub-frames it arrived in

use tracing::debug;

use vac248ip_core::{DataHeader, SlotBuffer, SlotKind, constants::PIXELS_PER_PACKET};
use vac248ip_types::{CameraConfig, Frame, FrameGeometry, VideoFormat};

/// Glued frame plus the config packet seen during the capture
#[derive(Debug, Clone)]
pub struct Glued {
    pub frame: Frame,
    pub config: Option<CameraConfig>,
}

/// Glue the data slots of a capture into one frame
///
/// Offsets are validated again against the frame geometry. Later packets
/// overwrite earlier ones at the same offset.
pub fn glue(slots: &SlotBuffer, format: VideoFormat, number: u64) -> Glued {
    let sub_frames = SubFrames::collect(slots, format.geometry(), 1, |_| Some(0));

    let mut frame = Frame::blank(format, number);
    frame.packets_used = sub_frames.packets_used();
    if let Some(pixels) = sub_frames.pixels.into_iter().next() {
        frame.pixels = pixels;
    }

    Glued {
        frame,
        config: last_config(slots),
    }
}

/// Average of `frames` sub-frames, each glued from `num_frames` camera frames
///
/// Camera frame `n` (numbered from 1) belongs to sub-frame
/// `(n - 1) / num_frames`. Packets that never arrived count as black.
pub fn mean(slots: &SlotBuffer, format: VideoFormat, number: u64, frames: u32, num_frames: u32) -> Glued {
    let count = frames.max(1) as usize;
    let per_sub_frame = num_frames.max(1) as usize;
    let sub_frames = SubFrames::collect(slots, format.geometry(), count, |camera_frame| {
        usize::from(camera_frame)
            .checked_sub(1)
            .map(|n| n / per_sub_frame)
    });

    let mut frame = Frame::blank(format, number);
    frame.packets_used = sub_frames.packets_used();
    for (i, pixel) in frame.pixels.iter_mut().enumerate() {
        let sum: u32 = sub_frames.pixels.iter().map(|p| u32::from(p[i])).sum();
        *pixel = (sum / count as u32) as u8;
    }

    Glued {
        frame,
        config: last_config(slots),
    }
}

/// Per-packet average over the camera frames in which the packet arrived
///
/// Packets missing from every camera frame stay black.
pub fn smart_mean(slots: &SlotBuffer, format: VideoFormat, number: u64, frames: u32) -> Glued {
    let geometry = format.geometry();
    let frame_size = geometry.frame_size();
    let sub_frames = SubFrames::collect(slots, geometry, frames.max(1) as usize, |camera_frame| {
        usize::from(camera_frame).checked_sub(1)
    });

    let mut frame = Frame::blank(format, number);
    frame.packets_used = sub_frames.packets_used();

    for packet in 0..geometry.data_packets as usize {
        let offset = packet * PIXELS_PER_PACKET;
        let len = packet_len(frame_size, offset);
        let arrived: Vec<&[u8]> = sub_frames
            .seen
            .iter()
            .zip(&sub_frames.pixels)
            .filter(|(seen, _)| seen[packet])
            .map(|(_, pixels)| &pixels[offset..offset + len])
            .collect();
        if arrived.is_empty() {
            continue;
        }

        let count = arrived.len() as u32;
        for (i, pixel) in frame.pixels[offset..offset + len].iter_mut().enumerate() {
            let sum: u32 = arrived.iter().map(|p| u32::from(p[i])).sum();
            *pixel = (sum / count) as u8;
        }
    }

    Glued {
        frame,
        config: last_config(slots),
    }
}

/// Data packets of a capture sorted into sub-frames
struct SubFrames {
    pixels: Vec<Vec<u8>>,

    /// Packet indexes that arrived, per sub-frame
    seen: Vec<Vec<bool>>,
}

impl SubFrames {
    /// `sub_frame` maps a camera frame number to a sub-frame index; packets
    /// mapped to `None` or past `count` are dropped
    fn collect(
        slots: &SlotBuffer,
        geometry: FrameGeometry,
        count: usize,
        sub_frame: impl Fn(u8) -> Option<usize>,
    ) -> Self {
        let frame_size = geometry.frame_size();
        let mut pixels = vec![vec![0u8; frame_size]; count];
        let mut seen = vec![vec![false; geometry.data_packets as usize]; count];

        for (header, data) in data_packets(slots, geometry) {
            let Some(index) = sub_frame(header.frame_number) else {
                continue;
            };
            let (Some(target), Some(arrived)) = (pixels.get_mut(index), seen.get_mut(index)) else {
                continue;
            };

            let offset = header.offset as usize;
            let len = packet_len(frame_size, offset);
            target[offset..offset + len].copy_from_slice(&data[..len]);

            if let Some(flag) = arrived.get_mut(header.packet_index()) {
                *flag = true;
            }
        }

        Self { pixels, seen }
    }

    /// Distinct packets that arrived in at least one sub-frame
    fn packets_used(&self) -> usize {
        let packets = self.seen.first().map_or(0, Vec::len);
        (0..packets)
            .filter(|&packet| self.seen.iter().any(|seen| seen[packet]))
            .count()
    }
}

/// Data slots whose offsets fit the frame geometry
fn data_packets(
    slots: &SlotBuffer,
    geometry: FrameGeometry,
) -> impl Iterator<Item = (DataHeader, &[u8])> {
    slots
        .iter()
        .filter(|slot| slot.kind() == SlotKind::Data)
        .filter_map(move |slot| {
            let header = slot.data_header()?;
            header.check_offset(geometry.data_packets).ok()?;
            Some((header, slot.pixels()))
        })
}

/// Pixel bytes a packet at `offset` contributes; the last one is cut at the frame end
fn packet_len(frame_size: usize, offset: usize) -> usize {
    PIXELS_PER_PACKET.min(frame_size.saturating_sub(offset))
}

/// Last config slot of the capture, if it parses
fn last_config(slots: &SlotBuffer) -> Option<CameraConfig> {
    let slot = slots.iter().filter(|slot| slot.kind() == SlotKind::Config).last()?;
    match CameraConfig::parse(slot.datagram()) {
        Ok(config) => Some(config),
        Err(e) => {
            debug!("Ignoring config packet: {}", e);
            None
        }
    }
}
