//! Discard queued datagrams

use std::io;
use std::time::Duration;

use tracing::debug;

use vac248ip_core::constants::DATA_PACKET_SIZE;

use crate::{mode::NonBlockingGuard, pace, socket::CameraSocket};

/// Wait `delay`, then throw away everything already queued on the socket
///
/// Returns the number of datagrams discarded. The socket is non-blocking
/// for the duration of the drain and restored afterwards.
pub fn drain<S: CameraSocket + ?Sized>(socket: &S, delay: Duration) -> io::Result<usize> {
    pace::sleep(delay)?;

    let guard = NonBlockingGuard::acquire(socket)?;
    let dropped = discard_queued(socket);
    guard.restore()?;

    let dropped = dropped?;
    if dropped > 0 {
        debug!(dropped, "Drained stale datagrams");
    }
    Ok(dropped)
}

fn discard_queued<S: CameraSocket + ?Sized>(socket: &S) -> io::Result<usize> {
    let mut buf = [0u8; DATA_PACKET_SIZE];
    let mut dropped = 0;

    loop {
        match socket.recv_from(&mut buf) {
            Ok(_) => dropped += 1,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(dropped),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
