//! Cached camera settings

use vac248ip_types::{CameraConfig, CameraModel, Gamma, Shutter};

/// Last known camera settings
///
/// Updated from config packets and from the values written by setters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    pub shutter: Shutter,
    pub gamma: Gamma,
    pub auto_gain_expo: bool,

    /// 1..=10
    pub max_gain_auto: u8,

    /// -70..=70
    pub contrast_auto: i8,

    /// 1..=190
    pub exposure: u8,

    /// 0..=8 (0 % to 100 % in 12.5 % steps)
    pub sharpness: u8,

    /// 1..=4 (gain 1, 2, 4, 8)
    pub gain_analog: u8,

    /// 1..=48 (gain 0.25 to 12.0)
    pub gain_digital: u8,

    pub mac_address: [u8; 6],
    pub model: Option<CameraModel>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            shutter: Shutter::Global,
            gamma: Gamma::One,
            auto_gain_expo: true,
            max_gain_auto: 1,
            contrast_auto: 0,
            exposure: 0x01,
            sharpness: 0,
            gain_analog: 1,
            gain_digital: 1,
            mac_address: [0; 6],
            model: None,
        }
    }
}

impl CameraSettings {
    pub fn apply(&mut self, config: &CameraConfig) {
        self.shutter = config.shutter();
        self.gamma = config.gamma();
        self.auto_gain_expo = config.auto_gain_expo();
        self.max_gain_auto = config.max_gain;
        self.contrast_auto = config.contrast_auto;
        self.exposure = config.exposure;
        self.sharpness = config.sharpness;
        self.gain_analog = config.gain_analog;
        self.gain_digital = config.gain_digital;
        self.mac_address = config.mac_address;
        self.model = Some(config.model);
    }
}
