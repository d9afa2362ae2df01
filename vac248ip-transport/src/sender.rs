//! Paced command sender

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::trace;

use vac248ip_core::CommandPacket;

use crate::{pace, socket::CameraSocket};

/// Sends command datagrams to one camera, pausing after each
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommandSender {
    camera: SocketAddr,
    delay: Duration,
}

impl CommandSender {
    pub fn new(camera: SocketAddr, delay: Duration) -> Self {
        Self { camera, delay }
    }

    pub fn camera(&self) -> SocketAddr {
        self.camera
    }

    /// Encode and send one command, then sleep for the command delay
    pub fn send<S: CameraSocket + ?Sized>(&self, socket: &S, command: CommandPacket) -> io::Result<()> {
        let bytes = command.encode();
        trace!(%command, bytes = %hex::encode(&bytes), camera = %self.camera, "Sending command");

        socket.send_to(&bytes, self.camera)?;
        pace::sleep(self.delay)
    }

    pub fn stop<S: CameraSocket + ?Sized>(&self, socket: &S) -> io::Result<()> {
        self.send(socket, CommandPacket::stop())
    }

    pub fn start<S: CameraSocket + ?Sized>(&self, socket: &S, video_format: u8) -> io::Result<()> {
        self.send(socket, CommandPacket::start(video_format))
    }

    pub fn exposure<S: CameraSocket + ?Sized>(&self, socket: &S, exposure: u8) -> io::Result<()> {
        self.send(socket, CommandPacket::exposure(exposure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::{SocketTimeouts, StatusFlags};
    use mockall::mock;

    mock! {
        Socket {}

        impl CameraSocket for Socket {
            fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
            fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
            fn poll_readable(&self, timeout: Duration) -> io::Result<bool>;
            fn status_flags(&self) -> io::Result<StatusFlags>;
            fn set_status_flags(&self, flags: StatusFlags) -> io::Result<()>;
            fn timeouts(&self) -> io::Result<SocketTimeouts>;
            fn set_timeouts(&self, timeouts: SocketTimeouts) -> io::Result<()>;
        }
    }

    fn camera() -> SocketAddr {
        "192.168.1.50:1024".parse().unwrap()
    }

    #[test]
    fn test_stop_bytes() {
        let mut socket = MockSocket::new();
        socket
            .expect_send_to()
            .withf(|buf, addr| buf[..] == [0x5A, 0, 0, 0, 0, 0, 0, 0x5A] && *addr == camera())
            .times(1)
            .returning(|buf, _| Ok(buf.len()));

        CommandSender::new(camera(), Duration::ZERO).stop(&socket).unwrap();
    }

    #[test]
    fn test_start_sets_stream_flag() {
        let mut socket = MockSocket::new();
        socket
            .expect_send_to()
            .withf(|buf, _| buf[..] == [0x5A, 0x81, 0, 0, 0, 0, 0, 0xDB])
            .times(1)
            .returning(|buf, _| Ok(buf.len()));

        CommandSender::new(camera(), Duration::ZERO).start(&socket, 1).unwrap();
    }

    #[test]
    fn test_exposure_bytes() {
        let mut socket = MockSocket::new();
        socket
            .expect_send_to()
            .withf(|buf, _| buf[..] == [0xC0, 0x10, 0, 0, 0, 0, 0, 0xD0])
            .times(1)
            .returning(|buf, _| Ok(buf.len()));

        CommandSender::new(camera(), Duration::ZERO).exposure(&socket, 0x10).unwrap();
    }

    #[test]
    fn test_send_failure_propagates() {
        let mut socket = MockSocket::new();
        socket
            .expect_send_to()
            .withf(|buf, _| buf[..] == [0xC0, 0x01, 0, 0, 0, 0, 0, 0xC1])
            .returning(|_, _| Err(io::Error::from(io::ErrorKind::ConnectionRefused)));

        let err = CommandSender::new(camera(), Duration::ZERO)
            .exposure(&socket, 0x01)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }
}
