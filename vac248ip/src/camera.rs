//! High-level camera interface

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use tokio::task;
use tracing::{debug, info, warn};

use vac248ip_core::{
    CaptureReport, CaptureStatus, CommandPacket, Opcode, SlotBuffer,
    constants::{DEFAULT_MALFORMED_TOLERANCE, DEFAULT_PORT, MIN_PORT, timing},
};
use vac248ip_transport::{
    CaptureParams, CommandSender, Timings, capture, request_config, udp,
};
use vac248ip_types::{
    CameraConfig, Frame, Gamma, Shutter, VideoFormat, exposure_to_ms,
    exposure::{MAX_EXPOSURE, MIN_EXPOSURE},
};

use crate::error::{Error, Result};
use crate::frame::{self, Glued, glue};
use crate::settings::CameraSettings;

/// VAC248IP camera
///
/// Every socket operation runs on a blocking worker thread; the socket is
/// moved to the worker and handed back when the operation finishes.
///
/// # Examples
///
/// ```no_run
/// use vac248ip::{Camera, VideoFormat};
///
/// #[tokio::main]
/// async fn main() -> vac248ip::Result<()> {
///     let mut camera = Camera::new("192.168.1.50", 1024)?
///         .with_video_format(VideoFormat::Format960x600);
///
///     camera.open().await?;
///     let frame = camera.frame(None).await?;
///     println!("{}", frame);
///
///     camera.close().await?;
///     Ok(())
/// }
/// ```
pub struct Camera {
    host: String,
    port: u16,
    camera: Option<SocketAddr>,
    socket: Option<UdpSocket>,

    video_format: VideoFormat,
    num_frames: u32,
    timings: Timings,
    network_timeout: Duration,
    open_delay: Duration,
    open_attempts: u32,
    attempts: Option<u32>,
    udp_redundancy: f64,
    malformed_tolerance: u32,

    settings: CameraSettings,
    config_stale: bool,
    frame_number: u64,
    frame_number_module: u64,
}

impl Camera {
    /// Create a camera handle; nothing is sent until [`open`](Self::open)
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        if port < MIN_PORT {
            return Err(vac248ip_transport::Error::InvalidAddress(format!(
                "port {} is below {}",
                port, MIN_PORT
            ))
            .into());
        }

        Ok(Self {
            host: host.into(),
            port,
            camera: None,
            socket: None,
            video_format: VideoFormat::default(),
            num_frames: 1,
            timings: Timings::default(),
            network_timeout: Duration::from_millis(timing::POLL_TIMEOUT_MS),
            open_delay: Duration::from_millis(timing::OPEN_DELAY_MS),
            open_attempts: 10,
            attempts: Some(1),
            udp_redundancy: 1.5,
            malformed_tolerance: DEFAULT_MALFORMED_TOLERANCE,
            settings: CameraSettings::default(),
            config_stale: true,
            frame_number: 0,
            frame_number_module: 1_000_000,
        })
    }

    /// Create a camera handle from `host` or `host:port`
    pub fn from_address(address: &str) -> Result<Self> {
        match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|e| {
                    vac248ip_transport::Error::InvalidAddress(format!("{}: {}", address, e))
                })?;
                Self::new(host, port)
            }
            None => Self::new(address, DEFAULT_PORT),
        }
    }

    pub fn with_video_format(mut self, video_format: VideoFormat) -> Self {
        self.video_format = video_format;
        self
    }

    /// Frames glued into one frame by default
    pub fn with_num_frames(mut self, num_frames: u32) -> Self {
        self.num_frames = num_frames;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Socket timeout and config wait
    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = timeout;
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn with_open_attempts(mut self, attempts: u32) -> Self {
        self.open_attempts = attempts;
        self
    }

    /// Attempts for frame and config updates; `None` retries until success
    ///
    /// Only failures a retry can fix are retried, see [`Error::is_retryable`].
    pub fn with_attempts(mut self, attempts: Option<u32>) -> Self {
        self.attempts = attempts;
        self
    }

    /// Frame numbers wrap to 0 at `module`; 0 never wraps
    pub fn with_frame_number_module(mut self, module: u64) -> Self {
        self.frame_number_module = module;
        self
    }

    /// Expected received datagrams per unique datagram
    pub fn with_udp_redundancy(mut self, coefficient: f64) -> Self {
        self.udp_redundancy = coefficient;
        self
    }

    pub fn with_malformed_tolerance(mut self, tolerance: u32) -> Self {
        self.malformed_tolerance = tolerance;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    pub fn video_format(&self) -> VideoFormat {
        self.video_format
    }

    /// Sequence number of the next glued frame
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Settings as last seen, without asking the camera
    pub fn cached_settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Open the camera
    ///
    /// Binds the camera port, stops any running stream and captures one
    /// frame to learn the camera config. Retried up to the configured
    /// number of attempts.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt if:
    /// - The address does not resolve
    /// - The port cannot be bound
    /// - The camera does not stream
    pub async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let attempts = self.open_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_open().await {
                Ok(()) => break,
                Err(e) if attempt < attempts => {
                    warn!("Open attempt {}/{} failed: {}", attempt, attempts, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        self.frame_number = 0;
        info!("Camera {} open", self.address());
        Ok(())
    }

    async fn try_open(&mut self) -> Result<()> {
        info!("Opening camera {}...", self.address());

        let (host, port, timeout) = (self.host.clone(), self.port, self.network_timeout);
        let (camera, socket) = task::spawn_blocking(move || -> Result<_> {
            let camera = udp::resolve(&host, port)?;
            let socket = udp::open(camera, timeout)?;
            Ok((camera, socket))
        })
        .await??;

        self.camera = Some(camera);
        self.socket = Some(socket);

        if let Err(e) = self.prime().await {
            self.socket = None;
            return Err(e);
        }
        Ok(())
    }

    async fn prime(&mut self) -> Result<()> {
        self.send_command(CommandPacket::stop()).await?;
        tokio::time::sleep(self.open_delay).await;

        let number = self.frame_number;
        self.build_frame(1, number, &glue).await?;
        Ok(())
    }

    /// Stop the stream and release the socket
    pub async fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }

        info!("Closing camera {}...", self.address());

        if let Err(e) = self.send_command(CommandPacket::stop()).await {
            warn!("When closing camera: {}", e);
        }

        self.socket = None;
        self.frame_number = 0;

        info!("Camera closed");
        Ok(())
    }

    /// Slots allocated for a capture of `frames` frames
    pub fn slot_count(&self, frames: u32) -> usize {
        let data_packets = self.video_format.geometry().data_packets;
        (f64::from(frames) * f64::from(1 + data_packets) * self.udp_redundancy) as usize
    }

    /// Capture the datagrams of `frames` frames
    ///
    /// # Errors
    ///
    /// A capture that receives nothing within the poll timeout fails with
    /// [`Error::Timeout`]. A malformed abort keeps the partial data.
    pub async fn capture_packets(&mut self, frames: u32) -> Result<(SlotBuffer, CaptureReport)> {
        let mut slots = SlotBuffer::new(self.slot_count(frames));
        let frame_packets = self.video_format.geometry().data_packets;
        let video_format = self.video_format.code();
        let exposure = self.settings.exposure;
        let tolerance = self.malformed_tolerance;
        let timings = self.timings;

        let (slots, report) = self
            .with_socket(move |socket, camera| {
                let params = CaptureParams::new(camera, frames, frame_packets)
                    .with_video_format(video_format)
                    .with_exposure(exposure)
                    .with_malformed_tolerance(tolerance)
                    .with_timings(timings);
                let report = capture(&mut slots, socket, &params)?;
                Ok((slots, report))
            })
            .await?;

        debug!(%report, "Packets captured");

        match report.status {
            CaptureStatus::Timeout => Err(Error::Timeout),
            CaptureStatus::MalformedAbort => {
                warn!("Capture aborted on malformed datagrams, keeping {} packets", report.filled);
                Ok((slots, report))
            }
            CaptureStatus::Complete | CaptureStatus::BufferFull => Ok((slots, report)),
        }
    }

    /// Capture and glue one frame
    ///
    /// `num_frames` camera frames are glued together; `None` uses the
    /// handle's default.
    pub async fn frame(&mut self, num_frames: Option<u32>) -> Result<Frame> {
        let num_frames = num_frames.unwrap_or(self.num_frames);
        self.update_frame(num_frames, glue).await
    }

    /// Capture `frames * num_frames` camera frames and average them
    ///
    /// Every `num_frames` consecutive camera frames are glued into one
    /// sub-frame; the result is the pixel mean of the `frames` sub-frames.
    pub async fn mean_frame(&mut self, frames: u32, num_frames: Option<u32>) -> Result<Frame> {
        let num_frames = num_frames.unwrap_or(self.num_frames).max(1);
        let frames = frames.max(1);
        self.update_frame(frames.saturating_mul(num_frames), move |slots: &SlotBuffer, format, number| {
            frame::mean(slots, format, number, frames, num_frames)
        })
        .await
    }

    /// Capture `frames` camera frames and average each packet over the
    /// frames in which it arrived
    pub async fn smart_mean_frame(&mut self, frames: u32) -> Result<Frame> {
        let frames = frames.max(1);
        self.update_frame(frames, move |slots: &SlotBuffer, format, number| {
            frame::smart_mean(slots, format, number, frames)
        })
        .await
    }

    async fn update_frame<F>(&mut self, camera_frames: u32, build: F) -> Result<Frame>
    where
        F: Fn(&SlotBuffer, VideoFormat, u64) -> Glued,
    {
        let number = self.frame_number;
        let mut attempt = 1;
        let frame = loop {
            match self.build_frame(camera_frames, number, &build).await {
                Ok(frame) => break frame,
                Err(e) if self.retry(&e, attempt) => attempt += 1,
                Err(e) => return Err(e),
            }
        };

        self.advance_frame_number();
        Ok(frame)
    }

    async fn build_frame<F>(&mut self, camera_frames: u32, number: u64, build: &F) -> Result<Frame>
    where
        F: Fn(&SlotBuffer, VideoFormat, u64) -> Glued,
    {
        let (slots, _) = self.capture_packets(camera_frames).await?;

        let Glued { frame, config } = build(&slots, self.video_format, number);
        if let Some(config) = config {
            self.apply_config(&config);
        }

        debug!(%frame, "Frame glued");
        Ok(frame)
    }

    /// Ask the camera for its config when the cache is stale or `force` is set
    pub async fn update_config(&mut self, force: bool) -> Result<()> {
        if !(self.config_stale || force) {
            return Ok(());
        }

        let mut attempt = 1;
        loop {
            match self.fetch_config().await {
                Ok(()) => return Ok(()),
                Err(e) if self.retry(&e, attempt) => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_config(&mut self) -> Result<()> {
        let delay = self.timings.command_delay;
        let drain_delay = self.timings.drain_delay;
        let timeout = self.network_timeout;

        let raw = self
            .with_socket(move |socket, camera| {
                let sender = CommandSender::new(camera, delay);
                Ok(request_config(socket, &sender, drain_delay, timeout)?)
            })
            .await?
            .ok_or(Error::Timeout)?;

        let config =
            CameraConfig::parse(&raw).map_err(|e| Error::InvalidResponse(e.to_string()))?;
        debug!(%config, "Config updated");
        self.apply_config(&config);
        Ok(())
    }

    /// Current settings, refreshed from the camera when stale
    pub async fn settings(&mut self) -> Result<CameraSettings> {
        self.update_config(false).await?;
        Ok(self.settings)
    }

    /// Current exposure in milliseconds
    pub async fn exposure_ms(&mut self) -> Result<f64> {
        let settings = self.settings().await?;
        Ok(exposure_to_ms(self.video_format, settings.exposure))
    }

    pub async fn set_auto_gain_expo(&mut self, enabled: bool) -> Result<()> {
        self.send_setting(CommandPacket::auto_gain_expo(enabled)).await?;
        self.settings.auto_gain_expo = enabled;
        Ok(())
    }

    /// Set contrast, clamped to -70..=70
    pub async fn set_contrast_auto(&mut self, contrast: i8) -> Result<()> {
        let contrast = contrast.clamp(-70, 70);
        self.send_setting(CommandPacket::contrast_auto(contrast)).await?;
        self.settings.contrast_auto = contrast;
        Ok(())
    }

    /// Switch to manual exposure and set it, clamped to 1..=190
    pub async fn set_exposure(&mut self, exposure: u8) -> Result<()> {
        let exposure = exposure.clamp(MIN_EXPOSURE, MAX_EXPOSURE);
        self.set_auto_gain_expo(false).await?;
        self.send_setting(CommandPacket::exposure(exposure)).await?;
        self.settings.exposure = exposure;
        Ok(())
    }

    /// Set analog gain, clamped to 1..=4
    pub async fn set_gain_analog(&mut self, gain: u8) -> Result<()> {
        let gain = gain.clamp(1, 4);
        self.send_setting(CommandPacket::gain_analog(gain)).await?;
        self.settings.gain_analog = gain;
        Ok(())
    }

    /// Set digital gain, clamped to 1..=48
    pub async fn set_gain_digital(&mut self, gain: u8) -> Result<()> {
        let gain = gain.clamp(1, 48);
        self.send_setting(CommandPacket::gain_digital(gain)).await?;
        self.settings.gain_digital = gain;
        Ok(())
    }

    /// Set sharpness, clamped to 0..=8
    pub async fn set_sharpness(&mut self, sharpness: u8) -> Result<()> {
        let sharpness = sharpness.min(8);
        self.send_setting(CommandPacket::sharpness(sharpness)).await?;
        self.settings.sharpness = sharpness;
        Ok(())
    }

    /// Set the automatic gain ceiling, clamped to 1..=10
    pub async fn set_max_gain_auto(&mut self, max_gain: u8) -> Result<()> {
        let max_gain = max_gain.clamp(1, 10);
        self.send_setting(CommandPacket::max_gain_auto(max_gain)).await?;
        self.settings.max_gain_auto = max_gain;
        Ok(())
    }

    pub async fn set_gamma(&mut self, gamma: Gamma) -> Result<()> {
        let opcode = Opcode::try_from(gamma.command_code())?;
        self.send_setting(CommandPacket::new(opcode, 0)).await?;
        self.settings.gamma = gamma;
        Ok(())
    }

    pub async fn set_shutter(&mut self, shutter: Shutter) -> Result<()> {
        let opcode = Opcode::try_from(shutter.command_code())?;
        self.send_setting(CommandPacket::new(opcode, 0)).await?;
        self.settings.shutter = shutter;
        Ok(())
    }

    /// Select the video format used by later captures
    ///
    /// # Errors
    ///
    /// 10-bit formats are not supported.
    pub fn set_video_format(&mut self, video_format: VideoFormat) -> Result<()> {
        if video_format.is_10bit() {
            return Err(Error::NotSupported(format!("10-bit video format {}", video_format)));
        }
        self.video_format = video_format;
        Ok(())
    }

    // Helper methods

    /// Whether failed attempt number `attempt` gets another try
    fn retry(&self, e: &Error, attempt: u32) -> bool {
        let retry = e.is_retryable() && self.attempts.is_none_or(|max| attempt < max);
        if retry {
            warn!("Attempt {} failed, retrying: {}", attempt, e);
        }
        retry
    }

    fn advance_frame_number(&mut self) {
        let next = self.frame_number.wrapping_add(1);
        self.frame_number = match self.frame_number_module {
            0 => next,
            module => next % module,
        };
    }

    fn apply_config(&mut self, config: &CameraConfig) {
        self.settings.apply(config);
        self.config_stale = false;
    }

    async fn send_setting(&mut self, command: CommandPacket) -> Result<()> {
        self.send_command(command).await?;
        self.config_stale = true;
        Ok(())
    }

    async fn send_command(&mut self, command: CommandPacket) -> Result<()> {
        let delay = self.timings.command_delay;
        self.with_socket(move |socket, camera| {
            CommandSender::new(camera, delay).send(socket, command)?;
            Ok(())
        })
        .await
    }

    /// Run `op` on a blocking worker with the socket moved in
    async fn with_socket<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&UdpSocket, SocketAddr) -> Result<T> + Send + 'static,
    {
        let camera = self.camera.ok_or(Error::NotOpen)?;
        let socket = self.socket.take().ok_or(Error::NotOpen)?;

        let (socket, result) = task::spawn_blocking(move || {
            let result = op(&socket, camera);
            (socket, result)
        })
        .await?;

        self.socket = Some(socket);
        result
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let (Some(socket), Some(camera)) = (self.socket.take(), self.camera) {
            let sender = CommandSender::new(camera, Duration::ZERO);
            if let Err(e) = sender.stop(&socket) {
                warn!("Failed to stop camera {} on drop: {}", camera, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_camera_create() {
        let camera = Camera::new("192.168.1.50", 1024).unwrap();
        assert!(!camera.is_open());
        assert_eq!(camera.address(), "192.168.1.50:1024");
        assert_eq!(camera.video_format(), VideoFormat::Format1920x1200);
        assert_eq!(camera.frame_number(), 0);
        assert_eq!(*camera.cached_settings(), CameraSettings::default());
    }

    #[test]
    fn test_from_address() {
        let camera = Camera::from_address("192.168.1.50").unwrap();
        assert_eq!((camera.host(), camera.port()), ("192.168.1.50", 1024));

        let camera = Camera::from_address("camera.local:2000").unwrap();
        assert_eq!((camera.host(), camera.port()), ("camera.local", 2000));
    }

    #[test]
    fn test_rejects_bad_ports() {
        assert!(matches!(
            Camera::from_address("192.168.1.50:80"),
            Err(Error::Transport(vac248ip_transport::Error::InvalidAddress(_)))
        ));
        assert!(Camera::from_address("192.168.1.50:http").is_err());
        assert!(Camera::new("192.168.1.50", 1023).is_ok());
    }

    #[test]
    fn test_slot_count() {
        let camera = Camera::new("192.168.1.50", 1024).unwrap();
        assert_eq!(camera.slot_count(1), 2356);
        assert_eq!(camera.slot_count(2), 4713);

        let camera = camera
            .with_video_format(VideoFormat::Format960x600)
            .with_udp_redundancy(1.0);
        assert_eq!(camera.slot_count(3), 3 * 394);
    }

    #[test]
    fn test_set_video_format_rejects_10bit() {
        let mut camera = Camera::new("192.168.1.50", 1024).unwrap();
        assert!(matches!(
            camera.set_video_format(VideoFormat::Format1920x1200Bit10),
            Err(Error::NotSupported(_))
        ));
        camera.set_video_format(VideoFormat::Format960x600).unwrap();
        assert_eq!(camera.video_format(), VideoFormat::Format960x600);
    }

    #[test]
    fn test_frame_number_wraps_at_module() {
        let mut camera = Camera::new("192.168.1.50", 1024)
            .unwrap()
            .with_frame_number_module(3);

        let numbers: Vec<u64> = (0..5)
            .map(|_| {
                camera.advance_frame_number();
                camera.frame_number()
            })
            .collect();
        assert_eq!(numbers, vec![1, 2, 0, 1, 2]);

        let mut camera = Camera::new("192.168.1.50", 1024)
            .unwrap()
            .with_frame_number_module(0);
        camera.frame_number = u64::MAX - 1;
        camera.advance_frame_number();
        assert_eq!(camera.frame_number(), u64::MAX);
    }

    #[test]
    fn test_default_frame_number_module() {
        let mut camera = Camera::new("192.168.1.50", 1024).unwrap();
        camera.frame_number = 999_999;
        camera.advance_frame_number();
        assert_eq!(camera.frame_number(), 0);
    }

    #[test]
    fn test_retry_budget() {
        let camera = Camera::new("192.168.1.50", 1024).unwrap();
        assert!(!camera.retry(&Error::Timeout, 1));

        let camera = camera.with_attempts(Some(3));
        assert!(camera.retry(&Error::Timeout, 1));
        assert!(camera.retry(&Error::Timeout, 2));
        assert!(!camera.retry(&Error::Timeout, 3));
        assert!(!camera.retry(&Error::NotOpen, 1));

        let camera = camera.with_attempts(None);
        assert!(camera.retry(&Error::Timeout, 1_000));
        assert!(!camera.retry(&Error::NotSupported("10-bit".into()), 1));
    }

    #[tokio::test]
    async fn test_closed_camera_operations() {
        let mut camera = Camera::new("192.168.1.50", 1024)
            .unwrap()
            .with_attempts(None);

        assert!(matches!(camera.set_exposure(10).await, Err(Error::NotOpen)));
        assert!(matches!(camera.capture_packets(1).await, Err(Error::NotOpen)));
        assert!(matches!(camera.update_config(true).await, Err(Error::NotOpen)));
        assert!(matches!(camera.settings().await, Err(Error::NotOpen)));
        assert!(matches!(camera.mean_frame(2, None).await, Err(Error::NotOpen)));
        assert!(matches!(camera.smart_mean_frame(3).await, Err(Error::NotOpen)));
        assert_eq!(camera.frame_number(), 0);
        camera.close().await.unwrap();
    }

    fn device_address() -> String {
        std::env::var("CAMERA_IP").unwrap_or_else(|_| "192.168.1.50".to_string())
    }

    #[tokio::test]
    #[ignore] // Only run with real camera
    async fn test_camera_frame() {
        let mut camera = Camera::from_address(&device_address())
            .unwrap()
            .with_video_format(VideoFormat::Format960x600);

        camera.open().await.unwrap();
        assert!(camera.is_open());

        let frame = camera.frame(None).await.unwrap();
        assert_eq!(frame.pixels.len(), 960 * 600);
        assert_eq!(camera.frame_number(), 1);

        let mean = camera.mean_frame(2, Some(1)).await.unwrap();
        assert_eq!(mean.number, 1);
        let smart = camera.smart_mean_frame(2).await.unwrap();
        assert_eq!(smart.pixels.len(), 960 * 600);
        assert_eq!(camera.frame_number(), 3);

        camera.close().await.unwrap();
        assert!(!camera.is_open());
    }

    #[tokio::test]
    #[ignore] // Only run with real camera
    async fn test_camera_settings_round_trip() {
        let mut camera = Camera::from_address(&device_address()).unwrap();
        camera.open().await.unwrap();

        camera.set_exposure(0x40).await.unwrap();
        let settings = camera.settings().await.unwrap();
        assert_eq!(settings.exposure, 0x40);
        assert!(!settings.auto_gain_expo);

        camera.close().await.unwrap();
    }
}
