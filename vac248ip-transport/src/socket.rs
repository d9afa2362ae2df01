//! Socket seam used by the capture engine
//!
//! Everything the capture engine does to a socket goes through
//! [`CameraSocket`], so the engine can run against a real
//! [`std::net::UdpSocket`] or a scripted stand-in.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Raw file status flags (`fcntl(F_GETFL)`)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StatusFlags(pub libc::c_int);

impl StatusFlags {
    pub fn is_non_blocking(self) -> bool {
        self.0 & libc::O_NONBLOCK != 0
    }

    /// Same flags with `O_NONBLOCK` set
    pub fn with_non_blocking(self) -> Self {
        Self(self.0 | libc::O_NONBLOCK)
    }

    pub fn bits(self) -> libc::c_int {
        self.0
    }
}

/// Receive and send timeouts; `None` blocks forever
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SocketTimeouts {
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

/// Datagram socket operations needed to run a capture
pub trait CameraSocket {
    /// Send one datagram to `addr`
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;

    /// Receive one datagram; longer datagrams are truncated to `buf`
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Wait for a readable datagram
    ///
    /// Returns `Ok(false)` when `timeout` elapses first.
    fn poll_readable(&self, timeout: Duration) -> io::Result<bool>;

    fn status_flags(&self) -> io::Result<StatusFlags>;

    fn set_status_flags(&self, flags: StatusFlags) -> io::Result<()>;

    fn timeouts(&self) -> io::Result<SocketTimeouts>;

    fn set_timeouts(&self, timeouts: SocketTimeouts) -> io::Result<()>;
}
