//! `std::net::UdpSocket` as a camera socket
//!
//! The video port is a plain blocking UDP socket. Readiness waits use
//! `poll(2)` and the blocking mode is switched with `fcntl(2)`, so the
//! socket keeps exactly the flags it had before a capture.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::os::fd::AsRawFd;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::socket::{CameraSocket, SocketTimeouts, StatusFlags};

impl CameraSocket for UdpSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }

    fn poll_readable(&self, timeout: Duration) -> io::Result<bool> {
        let mut fds = libc::pollfd {
            fd: self.as_raw_fd(),
            events: libc::POLLIN | libc::POLLERR,
            revents: 0,
        };
        let timeout_ms = poll_timeout_ms(timeout);

        // SAFETY: `fds` is a valid pollfd for the duration of the call and the count is 1.
        let rc = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
        match rc {
            0 => Ok(false),
            n if n > 0 => Ok(true),
            _ => Err(io::Error::last_os_error()),
        }
    }

    fn status_flags(&self) -> io::Result<StatusFlags> {
        // SAFETY: F_GETFL takes no pointer argument; the fd is owned by `self`.
        let flags = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(StatusFlags(flags))
    }

    fn set_status_flags(&self, flags: StatusFlags) -> io::Result<()> {
        // SAFETY: F_SETFL takes an integer argument; the fd is owned by `self`.
        let rc = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_SETFL, flags.bits()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn timeouts(&self) -> io::Result<SocketTimeouts> {
        Ok(SocketTimeouts {
            read: self.read_timeout()?,
            write: self.write_timeout()?,
        })
    }

    fn set_timeouts(&self, timeouts: SocketTimeouts) -> io::Result<()> {
        self.set_read_timeout(timeouts.read)?;
        self.set_write_timeout(timeouts.write)
    }
}

/// Whole milliseconds for `poll(2)`, rounded up so a sub-millisecond wait still waits
fn poll_timeout_ms(timeout: Duration) -> libc::c_int {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
}

/// Resolve a camera host to its first IPv4 address
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let addr_str = format!("{}:{}", host, port);

    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| Error::InvalidAddress(format!("No IPv4 address found for {}", addr_str)))?;

    Ok(addr)
}

/// Bind the local video port and connect it to the camera
///
/// The socket stays blocking with `network_timeout` as read and write
/// timeout. Binding the wildcard address on the camera's port mirrors the
/// camera, which streams to the port it was addressed from.
pub fn open(camera: SocketAddr, network_timeout: Duration) -> Result<UdpSocket> {
    debug!(%camera, ?network_timeout, "Opening camera socket");

    let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], camera.port())))?;
    socket.set_read_timeout(Some(network_timeout))?;
    socket.set_write_timeout(Some(network_timeout))?;
    socket.connect(camera)?;

    debug!(local = ?socket.local_addr().ok(), %camera, "Camera socket ready");
    Ok(socket)
}
