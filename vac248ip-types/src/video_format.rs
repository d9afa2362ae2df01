//! Camera video formats

use std::fmt;

use crate::error::{Error, Result};

/// Video format selected by the START command
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum VideoFormat {
    Format960x600 = 0,
    #[default]
    Format1920x1200 = 1,
    Format960x600Bit10 = 2,
    Format1920x1200Bit10 = 3,
}

/// Frame geometry of a video format
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,

    /// Image-data datagrams per frame
    pub data_packets: u32,

    pub bytes_per_pixel: u32,
}

impl FrameGeometry {
    /// Frame size in bytes
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel as usize
    }
}

impl VideoFormat {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn geometry(self) -> FrameGeometry {
        let (width, height, data_packets, bytes_per_pixel) = match self {
            Self::Format960x600 => (960, 600, 393, 1),
            Self::Format1920x1200 => (1920, 1200, 1570, 1),
            Self::Format960x600Bit10 => (960, 600, 785, 2),
            Self::Format1920x1200Bit10 => (1920, 1200, 3139, 2),
        };
        FrameGeometry {
            width,
            height,
            data_packets,
            bytes_per_pixel,
        }
    }

    pub fn is_10bit(self) -> bool {
        matches!(self, Self::Format960x600Bit10 | Self::Format1920x1200Bit10)
    }

    /// Full-resolution (1920x1200) sensor readout
    pub fn is_full_resolution(self) -> bool {
        matches!(self, Self::Format1920x1200 | Self::Format1920x1200Bit10)
    }
}

impl TryFrom<u8> for VideoFormat {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Format960x600),
            1 => Ok(Self::Format1920x1200),
            2 => Ok(Self::Format960x600Bit10),
            3 => Ok(Self::Format1920x1200Bit10),
            _ => Err(Error::Parse(format!("unknown video format {}", value))),
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let geometry = self.geometry();
        write!(f, "{}x{}", geometry.width, geometry.height)?;
        if self.is_10bit() {
            f.write_str(" 10-bit")?;
        }
        Ok(())
    }
}
