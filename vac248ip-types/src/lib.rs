//! Type definitions for vac248ip

pub mod camera_config;
pub mod error;
pub mod exposure;
pub mod frame;
pub mod settings;
pub mod video_format;

pub use camera_config::{CameraConfig, CameraModel, ManagementFlags};
pub use error::{Error, Result};
pub use exposure::exposure_to_ms;
pub use frame::Frame;
pub use settings::{Gamma, Shutter};
pub use video_format::{FrameGeometry, VideoFormat};
