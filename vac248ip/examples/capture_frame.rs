//! Capture one frame and print what arrived

use tracing_subscriber::EnvFilter;
use vac248ip::{Camera, VideoFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=vac248ip_core=trace shows every datagram verdict
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let address = std::env::var("CAMERA_IP").unwrap_or_else(|_| "192.168.1.50".to_string());

    println!("Opening {}...", address);

    let mut camera = Camera::from_address(&address)?.with_video_format(VideoFormat::Format960x600);
    camera.open().await?;
    println!("Library version {}", vac248ip::version());

    let (slots, report) = camera.capture_packets(1).await?;
    println!("Capture: {} ({} of {} slots)", report, slots.filled(), slots.capacity());

    let frame = camera.frame(Some(2)).await?;
    println!("Frame: {} ({:.1}% of packets)", frame, frame.coverage() * 100.0);

    let mean = camera.mean_frame(3, Some(1)).await?;
    println!("Mean of 3: {}", mean);

    let smart = camera.smart_mean_frame(3).await?;
    println!("Smart mean of 3: {} ({:.1}% of packets)", smart, smart.coverage() * 100.0);

    camera.close().await?;
    Ok(())
}
