//! Camera configuration record (48-byte config datagram)

use std::fmt;
use std::net::Ipv4Addr;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::settings::{Gamma, Shutter};
use crate::video_format::VideoFormat;

bitflags! {
    /// Bits of the little-endian `management_data` word
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ManagementFlags: u32 {
        const GAMMA_07 = 0x0004_0000;
        const GAMMA_1 = 0x0008_0000;
        const MANUAL_EXPOSURE = 0x1000_0000;
        const GLOBAL_SHUTTER = 0x2000_0000;
    }
}

/// Camera models reporting a compatible config layout
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CameraModel {
    Vac248Ip,
    Vac251Ip,
}

impl CameraModel {
    pub fn id(self) -> u8 {
        match self {
            Self::Vac248Ip => 0x06,
            Self::Vac251Ip => 0x0A,
        }
    }
}

impl TryFrom<u8> for CameraModel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x06 => Ok(Self::Vac248Ip),
            0x0A => Ok(Self::Vac251Ip),
            _ => Err(Error::Validation(format!("camera id 0x{:02X} not supported", value))),
        }
    }
}

/// Parsed config datagram
///
/// # Layout
///
/// ```text
/// 0      video mode          18..20 video port (LE)     33  nrpix
/// 1..3   packet count (LE)   20..24 netmask             34  sharpness
/// 3      camera id           24..28 gateway             35  max gain
/// 4      temperature         28..30 manage port (LE)    36  max fps
/// 5      voltage             30     exposure            37  contrast (signed)
/// 6      focus               31     digital gain        40..44 management (LE)
/// 7      scale               32     analog gain         46..48 check 0xAA 0x55
/// 8..12  ip address
/// 12..18 mac address
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    pub video_mode: u8,
    pub packet_count: u16,
    pub model: CameraModel,
    pub temperature: u8,
    pub voltage: u8,
    pub focus: u8,
    pub scale: u8,
    pub ip: Ipv4Addr,
    pub mac_address: [u8; 6],
    pub video_port: u16,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub manage_port: u16,
    pub exposure: u8,
    pub gain_digital: u8,
    pub gain_analog: u8,
    pub nrpix: u8,
    pub sharpness: u8,
    pub max_gain: u8,
    pub max_fps: u8,
    pub contrast_auto: i8,
    pub management: ManagementFlags,
}

impl CameraConfig {
    /// Config datagram length
    pub const PACKET_LENGTH: usize = 48;

    pub const CHECK: [u8; 2] = [0xAA, 0x55];

    /// Parse a config datagram
    ///
    /// # Errors
    ///
    /// Fails on a wrong length, wrong check bytes, or an unsupported camera id.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() != Self::PACKET_LENGTH {
            return Err(Error::Parse(format!(
                "config packet must be {} bytes, got {}",
                Self::PACKET_LENGTH,
                buf.len()
            )));
        }
        if buf[46..48] != Self::CHECK {
            return Err(Error::Validation(format!(
                "bad check bytes {:02X} {:02X}",
                buf[46], buf[47]
            )));
        }

        let le16 = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let ipv4 = |at: usize| Ipv4Addr::new(buf[at], buf[at + 1], buf[at + 2], buf[at + 3]);

        let mut mac_address = [0u8; 6];
        mac_address.copy_from_slice(&buf[12..18]);

        Ok(Self {
            video_mode: buf[0],
            packet_count: le16(1),
            model: CameraModel::try_from(buf[3])?,
            temperature: buf[4],
            voltage: buf[5],
            focus: buf[6],
            scale: buf[7],
            ip: ipv4(8),
            mac_address,
            video_port: le16(18),
            netmask: ipv4(20),
            gateway: ipv4(24),
            manage_port: le16(28),
            exposure: buf[30],
            gain_digital: buf[31],
            gain_analog: buf[32],
            nrpix: buf[33],
            sharpness: buf[34],
            max_gain: buf[35],
            max_fps: buf[36],
            contrast_auto: buf[37] as i8,
            management: ManagementFlags::from_bits_retain(u32::from_le_bytes([
                buf[40], buf[41], buf[42], buf[43],
            ])),
        })
    }

    pub fn video_format(&self) -> Result<VideoFormat> {
        VideoFormat::try_from(self.video_mode)
    }

    pub fn gamma(&self) -> Gamma {
        if self.management.contains(ManagementFlags::GAMMA_1) {
            Gamma::One
        } else if self.management.contains(ManagementFlags::GAMMA_07) {
            Gamma::Point7
        } else {
            Gamma::Point45
        }
    }

    pub fn shutter(&self) -> Shutter {
        if self.management.contains(ManagementFlags::GLOBAL_SHUTTER) {
            Shutter::Global
        } else {
            Shutter::Rolling
        }
    }

    /// Automatic gain/exposure enabled
    pub fn auto_gain_expo(&self) -> bool {
        !self.management.contains(ManagementFlags::MANUAL_EXPOSURE)
    }

    pub fn mac_string(&self) -> String {
        self.mac_address
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for CameraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Camera[{:?} {} mac={} exposure={}]",
            self.model,
            self.ip,
            self.mac_string(),
            self.exposure
        )
    }
}
