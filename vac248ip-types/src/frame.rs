//! Glued camera frame

use std::fmt;

use chrono::{DateTime, Utc};

use crate::video_format::VideoFormat;

/// Raw frame glued from image-data datagrams
///
/// Pixels are stored row-major exactly as the camera sends them; parts of
/// the frame that never arrived stay zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub format: VideoFormat,

    /// Sequence number assigned by the camera handle
    pub number: u64,

    pub captured_at: DateTime<Utc>,

    pub pixels: Vec<u8>,

    /// Image-data datagrams that contributed to this frame
    pub packets_used: usize,
}

impl Frame {
    /// Black frame of the right size for `format`
    pub fn blank(format: VideoFormat, number: u64) -> Self {
        Self {
            format,
            number,
            captured_at: Utc::now(),
            pixels: vec![0; format.geometry().frame_size()],
            packets_used: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.format.geometry().width
    }

    pub fn height(&self) -> u32 {
        self.format.geometry().height
    }

    /// One row of pixels
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let geometry = self.format.geometry();
        let stride = geometry.width as usize * geometry.bytes_per_pixel as usize;
        let start = y as usize * stride;
        self.pixels.get(start..start + stride)
    }

    /// Fraction of the frame's datagrams that arrived
    pub fn coverage(&self) -> f64 {
        self.packets_used as f64 / f64::from(self.format.geometry().data_packets)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[#{} {} packets={} at {}]",
            self.number,
            self.format,
            self.packets_used,
            self.captured_at.format("%F %T%.3f")
        )
    }
}
