//! Camera settings example

use vac248ip::{Camera, Gamma, Shutter};

#[tokio::main]
async fn main() -> vac248ip::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let address = std::env::var("CAMERA_IP").unwrap_or_else(|_| "192.168.1.50".to_string());

    let mut camera = Camera::from_address(&address)?;
    camera.open().await?;

    let settings = camera.settings().await?;
    println!("Current settings: {:?}", settings);
    println!("Exposure: {:.2} ms", camera.exposure_ms().await?);

    camera.set_gamma(Gamma::Point45).await?;
    camera.set_shutter(Shutter::Rolling).await?;
    camera.set_exposure(0x30).await?;
    camera.set_gain_analog(2).await?;

    let settings = camera.settings().await?;
    println!("Updated settings: {:?}", settings);
    println!("Exposure: {:.2} ms", camera.exposure_ms().await?);

    camera.close().await?;
    Ok(())
}
