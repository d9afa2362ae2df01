//! # vac248ip
//!
//! Rust client for VAC248IP network cameras.
//!
//! ## Features
//!
//! - Byte-exact command and image-data wire formats
//! - Bounded, deterministic capture sessions over UDP
//! - Frame gluing, mean frames and camera settings
//! - Async/await API using Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use vac248ip::Camera;
//!
//! #[tokio::main]
//! async fn main() -> vac248ip::Result<()> {
//!     // Open camera
//!     let mut camera = Camera::from_address("192.168.1.50:1024")?;
//!     camera.open().await?;
//!
//!     // Capture a frame
//!     let frame = camera.frame(None).await?;
//!     println!("{}", frame);
//!
//!     camera.close().await?;
//!     Ok(())
//! }
//! ```

pub mod camera;
pub mod error;
pub mod frame;
pub mod settings;

// Re-exports
pub use camera::Camera;
pub use error::{Error, Result};
pub use settings::CameraSettings;

// Re-export types
pub use vac248ip_core::{CaptureReport, CaptureStatus, SlotBuffer, Version, version};
pub use vac248ip_transport::Timings;
pub use vac248ip_types::{CameraConfig, CameraModel, Frame, Gamma, Shutter, VideoFormat};
