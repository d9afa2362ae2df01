//! Config packet request

use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use vac248ip_core::{
    CommandPacket,
    constants::{CONFIG_PACKET_SIZE, DATA_PACKET_SIZE},
};

use crate::{drain::drain, error::Result, sender::CommandSender, socket::CameraSocket};

/// Stop the stream, ask for the camera config and wait for it
///
/// Datagrams of any other length or from other hosts are skipped. Returns
/// `None` when no config packet arrives within `timeout`.
pub fn request_config<S: CameraSocket + ?Sized>(
    socket: &S,
    sender: &CommandSender,
    drain_delay: Duration,
    timeout: Duration,
) -> Result<Option<[u8; CONFIG_PACKET_SIZE]>> {
    sender.stop(socket)?;
    drain(socket, drain_delay)?;
    sender.send(socket, CommandPacket::get_config())?;

    let camera_ip = sender.camera().ip();
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; DATA_PACKET_SIZE];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }

        match socket.poll_readable(remaining) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }

        match socket.recv_from(&mut buf) {
            Ok((len, source)) if len == CONFIG_PACKET_SIZE && source.ip() == camera_ip => {
                let mut config = [0u8; CONFIG_PACKET_SIZE];
                config.copy_from_slice(&buf[..CONFIG_PACKET_SIZE]);
                debug!(%source, "Config packet received");
                return Ok(Some(config));
            }
            Ok((len, source)) => trace!(len, %source, "Skipping datagram while awaiting config"),
            Err(e) => debug!("While awaiting config packet: {}", e),
        }
    }
}
