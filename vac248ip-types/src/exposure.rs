//! Exposure value to milliseconds
//!
//! The camera exposes exposure as a piecewise-linear step count whose step
//! width depends on the sensor readout resolution.

use crate::video_format::VideoFormat;

/// Lowest exposure accepted by the camera
pub const MIN_EXPOSURE: u8 = 0x01;

/// Highest exposure accepted by the camera
pub const MAX_EXPOSURE: u8 = 0xBE;

/// Exposure in milliseconds, 0.0 for values outside the camera range
///
/// # Examples
///
/// ```
/// use vac248ip_types::{exposure_to_ms, VideoFormat};
///
/// let ms = exposure_to_ms(VideoFormat::Format960x600, 10);
/// assert!((ms - 1.0).abs() < 1e-9);
/// ```
pub fn exposure_to_ms(format: VideoFormat, exposure: u8) -> f64 {
    if format.is_full_resolution() {
        full_resolution_ms(exposure)
    } else {
        half_resolution_ms(exposure)
    }
}

fn half_resolution_ms(exposure: u8) -> f64 {
    let e = f64::from(exposure);
    match exposure {
        1..=50 => e * 0.1,
        51..=100 => 50.0 * 0.1 + e * 2.0 * 0.1,
        101..=190 => 50.0 * 0.1 + 50.0 * 2.0 * 0.1 + (e - 100.0) * 5.0 * 0.1,
        _ => 0.0,
    }
}

fn full_resolution_ms(exposure: u8) -> f64 {
    const STEP: f64 = 0.1833;
    let e = f64::from(exposure);
    match exposure {
        0..=50 => e * 2.0 * STEP,
        51..=100 => 50.0 * 2.0 * STEP + (e - 50.0) * 4.0 * STEP,
        101..=190 => 50.0 * 2.0 * STEP + 50.0 * 4.0 * STEP + (e - 100.0) * 10.0 * STEP,
        _ => 0.0,
    }
}
