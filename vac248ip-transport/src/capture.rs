//! Capture session
//!
//! One capture is a single synchronous call that owns the socket for its
//! whole duration:
//!
//! 1. zero every slot marker
//! 2. switch the socket to non-blocking mode
//! 3. STOP, drain, START(format), EXPOSURE(value)
//! 4. poll and receive until the assembler finishes the session
//! 5. STOP, settle, drain, restore the socket mode
//!
//! Step 5 runs on every exit path. A fatal error reports no slots.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, warn};

use vac248ip_core::{
    Assembler, AssemblerLimits, CaptureReport, CaptureStatus, SlotBuffer, Verdict,
    constants::{DEFAULT_MALFORMED_TOLERANCE, timing},
};

use crate::{
    drain::drain,
    error::Result,
    mode::NonBlockingGuard,
    pace,
    sender::CommandSender,
    socket::CameraSocket,
};

/// Pauses and timeouts used by a capture
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Pause after every command datagram
    pub command_delay: Duration,

    /// Pause after the final STOP
    pub settle_delay: Duration,

    /// Pause before draining stale datagrams
    pub drain_delay: Duration,

    /// Readability wait inside the receive loop
    pub poll_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            command_delay: Duration::from_millis(timing::COMMAND_DELAY_MS),
            settle_delay: Duration::from_millis(timing::SETTLE_DELAY_MS),
            drain_delay: Duration::from_millis(timing::DRAIN_DELAY_MS),
            poll_timeout: Duration::from_millis(timing::POLL_TIMEOUT_MS),
        }
    }
}

impl Timings {
    pub fn with_command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_drain_delay(mut self, delay: Duration) -> Self {
        self.drain_delay = delay;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

/// Everything a capture needs besides the buffer and the socket
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CaptureParams {
    pub camera: SocketAddr,

    /// Frames to collect
    pub frames: u32,

    /// Image-data datagrams per frame
    pub frame_packets: u32,

    /// Raw video format code sent with START
    pub video_format: u8,

    pub exposure: u8,
    pub malformed_tolerance: u32,
    pub timings: Timings,
}

impl CaptureParams {
    pub fn new(camera: SocketAddr, frames: u32, frame_packets: u32) -> Self {
        Self {
            camera,
            frames,
            frame_packets,
            video_format: 1,
            exposure: 0x40,
            malformed_tolerance: DEFAULT_MALFORMED_TOLERANCE,
            timings: Timings::default(),
        }
    }

    pub fn with_video_format(mut self, video_format: u8) -> Self {
        self.video_format = video_format;
        self
    }

    pub fn with_exposure(mut self, exposure: u8) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_malformed_tolerance(mut self, tolerance: u32) -> Self {
        self.malformed_tolerance = tolerance;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn limits(&self) -> AssemblerLimits {
        AssemblerLimits {
            frames: self.frames,
            frame_packets: self.frame_packets,
            malformed_tolerance: self.malformed_tolerance,
        }
    }
}

/// Run one capture session into `slots`
///
/// # Errors
///
/// Any failed poll, receive, command send or mode change is fatal: the
/// slot buffer is emptied and the error carries the OS error code.
/// Timeouts and malformed aborts are not errors; they are reported in the
/// returned [`CaptureReport`] together with the partial data.
pub fn capture<S: CameraSocket + ?Sized>(
    slots: &mut SlotBuffer,
    socket: &S,
    params: &CaptureParams,
) -> Result<CaptureReport> {
    slots.reset_markers();
    let guard = NonBlockingGuard::acquire(socket)?;

    debug!(
        camera = %params.camera,
        capacity = slots.capacity(),
        frames = params.frames,
        frame_packets = params.frame_packets,
        "Starting capture"
    );

    let sender = CommandSender::new(params.camera, params.timings.command_delay);

    let outcome = start_stream(&sender, socket, params).and_then(|()| receive(slots, socket, params));
    stop_stream(&sender, socket, params);
    let restored = guard.restore();

    let status = match (outcome, restored) {
        (Ok(status), Ok(())) => status,
        (Ok(_), Err(e)) => {
            slots.discard();
            warn!("Capture failed restoring socket mode: {}", e);
            return Err(e.into());
        }
        (Err(e), restored) => {
            if let Err(restore_err) = restored {
                warn!("Failed to restore socket mode: {}", restore_err);
            }
            slots.discard();
            warn!("Capture failed: {}", e);
            return Err(e);
        }
    };

    let report = CaptureReport {
        status,
        filled: slots.filled(),
    };
    debug!(%report, "Capture finished");

    Ok(report)
}

fn start_stream<S: CameraSocket + ?Sized>(
    sender: &CommandSender,
    socket: &S,
    params: &CaptureParams,
) -> Result<()> {
    sender.stop(socket)?;
    drain(socket, params.timings.drain_delay)?;
    sender.start(socket, params.video_format)?;
    sender.exposure(socket, params.exposure)?;
    Ok(())
}

fn stop_stream<S: CameraSocket + ?Sized>(sender: &CommandSender, socket: &S, params: &CaptureParams) {
    if let Err(e) = sender.stop(socket) {
        warn!("Failed to stop stream: {}", e);
    }
    if let Err(e) = pace::sleep(params.timings.settle_delay) {
        warn!("Settle delay interrupted: {}", e);
    }
    if let Err(e) = drain(socket, params.timings.drain_delay) {
        warn!("Failed to drain after capture: {}", e);
    }
}

fn receive<S: CameraSocket + ?Sized>(
    slots: &mut SlotBuffer,
    socket: &S,
    params: &CaptureParams,
) -> Result<CaptureStatus> {
    let mut assembler = Assembler::new(params.camera.ip(), params.limits());

    loop {
        if let Some(status) = assembler.check_full(slots) {
            return Ok(status);
        }

        match socket.poll_readable(params.timings.poll_timeout) {
            Ok(true) => {}
            Ok(false) => return Ok(CaptureStatus::Timeout),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }

        let (len, source) = match socket.recv_from(slots.next_payload_mut()?) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if let Verdict::Finished(status) = assembler.on_datagram(slots, len, source)? {
            return Ok(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::socket::{SocketTimeouts, StatusFlags};
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use vac248ip_core::{CommandPacket, SlotKind, result_code};

    const CAMERA: &str = "192.168.1.50:1024";
    const STRANGER: &str = "192.168.1.99:1024";

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn data(frame: u8, offset: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 1472];
        buf[0] = frame;
        buf[1..4].copy_from_slice(&offset.to_be_bytes()[1..]);
        buf
    }

    fn quick_timings() -> Timings {
        Timings::default()
            .with_command_delay(Duration::ZERO)
            .with_settle_delay(Duration::from_millis(5))
            .with_drain_delay(Duration::from_millis(5))
            .with_poll_timeout(Duration::from_millis(100))
    }

    fn params(camera: SocketAddr, frames: u32, tolerance: u32) -> CaptureParams {
        CaptureParams::new(camera, frames, 10)
            .with_video_format(1)
            .with_exposure(0x20)
            .with_malformed_tolerance(tolerance)
            .with_timings(quick_timings())
    }

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Fault {
        /// `F_GETFL` fails
        ReadFlags,
        /// Clearing `O_NONBLOCK` fails
        ClearNonBlocking,
        /// Setting timeouts fails once the socket is blocking again
        RestoreTimeouts,
    }

    enum Event {
        Datagram(Vec<u8>, SocketAddr),
        Silence,
        PollError,
        RecvError,
    }

    /// Socket replaying a fixed script of poll/receive events
    struct ScriptedSocket {
        events: RefCell<VecDeque<Event>>,
        armed: RefCell<Option<Event>>,
        flags: Cell<StatusFlags>,
        timeouts: Cell<SocketTimeouts>,
        sent: RefCell<Vec<CommandPacket>>,
        received: Cell<usize>,
        fault: Cell<Option<Fault>>,
    }

    impl ScriptedSocket {
        fn new(events: Vec<Event>) -> Self {
            Self {
                events: RefCell::new(events.into()),
                armed: RefCell::new(None),
                flags: Cell::new(StatusFlags(libc::O_RDWR)),
                timeouts: Cell::new(SocketTimeouts {
                    read: Some(Duration::from_secs(1)),
                    write: Some(Duration::from_secs(1)),
                }),
                sent: RefCell::new(Vec::new()),
                received: Cell::new(0),
                fault: Cell::new(None),
            }
        }

        fn failing(&self, fault: Fault) -> io::Result<()> {
            if self.fault.get() == Some(fault) {
                return Err(io::Error::from_raw_os_error(libc::EBADF));
            }
            Ok(())
        }

        fn remaining(&self) -> usize {
            self.events.borrow().len()
        }
    }

    impl CameraSocket for ScriptedSocket {
        fn send_to(&self, buf: &[u8], _addr: SocketAddr) -> io::Result<usize> {
            let command = CommandPacket::decode(buf).map_err(io::Error::other)?;
            self.sent.borrow_mut().push(command);
            Ok(buf.len())
        }

        fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            match self.armed.borrow_mut().take() {
                Some(Event::Datagram(bytes, source)) => {
                    let len = bytes.len().min(buf.len());
                    buf[..len].copy_from_slice(&bytes[..len]);
                    self.received.set(self.received.get() + 1);
                    Ok((len, source))
                }
                Some(Event::RecvError) => Err(io::Error::from_raw_os_error(libc::ECONNREFUSED)),
                _ => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            }
        }

        fn poll_readable(&self, _timeout: Duration) -> io::Result<bool> {
            match self.events.borrow_mut().pop_front() {
                None | Some(Event::Silence) => Ok(false),
                Some(Event::PollError) => Err(io::Error::from_raw_os_error(libc::EBADF)),
                Some(event) => {
                    *self.armed.borrow_mut() = Some(event);
                    Ok(true)
                }
            }
        }

        fn status_flags(&self) -> io::Result<StatusFlags> {
            self.failing(Fault::ReadFlags)?;
            Ok(self.flags.get())
        }

        fn set_status_flags(&self, flags: StatusFlags) -> io::Result<()> {
            if !flags.is_non_blocking() {
                self.failing(Fault::ClearNonBlocking)?;
            }
            self.flags.set(flags);
            Ok(())
        }

        fn timeouts(&self) -> io::Result<SocketTimeouts> {
            Ok(self.timeouts.get())
        }

        fn set_timeouts(&self, timeouts: SocketTimeouts) -> io::Result<()> {
            if !self.flags.get().is_non_blocking() {
                self.failing(Fault::RestoreTimeouts)?;
            }
            self.timeouts.set(timeouts);
            Ok(())
        }
    }

    fn run(socket: &ScriptedSocket, capacity: usize, params: &CaptureParams) -> (Result<CaptureReport>, SlotBuffer) {
        let before = (socket.flags.get(), socket.timeouts.get());
        let mut slots = SlotBuffer::new(capacity);
        let result = capture(&mut slots, socket, params);
        assert_eq!((socket.flags.get(), socket.timeouts.get()), before);
        (result, slots)
    }

    #[test]
    fn test_command_sequence() {
        let socket = ScriptedSocket::new(vec![Event::Silence]);
        let params = params(addr(CAMERA), 1, 5).with_video_format(3);

        run(&socket, 4, &params).0.unwrap();

        assert_eq!(
            *socket.sent.borrow(),
            vec![
                CommandPacket::stop(),
                CommandPacket::start(3),
                CommandPacket::exposure(0x20),
                CommandPacket::stop(),
            ]
        );
    }

    #[test]
    fn test_complete_skips_foreign_and_keeps_frame_one() {
        let socket = ScriptedSocket::new(vec![
            Event::Datagram(data(1, 0), addr(STRANGER)),
            Event::Datagram(data(1, 0), addr(CAMERA)),
            Event::Datagram(data(2, 0), addr(CAMERA)),
        ]);

        let (result, slots) = run(&socket, 2, &params(addr(CAMERA), 1, 5));

        assert_eq!(result_code(&result), (0, 1));
        assert_eq!(result.unwrap().status, CaptureStatus::Complete);
        assert_eq!(slots.get(0).unwrap().data_header().unwrap().frame_number, 1);
    }

    #[test]
    fn test_config_and_data_marked() {
        let socket = ScriptedSocket::new(vec![
            Event::Datagram(vec![0u8; 48], addr(CAMERA)),
            Event::Datagram(data(1, 1468), addr(CAMERA)),
        ]);

        let (result, slots) = run(&socket, 2, &params(addr(CAMERA), 1, 5));

        assert_eq!(result.unwrap().status, CaptureStatus::BufferFull);
        let kinds: Vec<SlotKind> = slots.iter().map(|slot| slot.kind()).collect();
        assert_eq!(kinds, vec![SlotKind::Config, SlotKind::Data]);
    }

    #[test]
    fn test_buffer_full_stops_receiving() {
        let socket = ScriptedSocket::new(vec![
            Event::Datagram(data(1, 0), addr(CAMERA)),
            Event::Datagram(data(1, 1468), addr(CAMERA)),
            Event::Datagram(data(1, 2936), addr(CAMERA)),
        ]);

        let (result, _) = run(&socket, 2, &params(addr(CAMERA), 1, 5));

        assert_eq!(result_code(&result), (0, 2));
        assert_eq!(socket.remaining(), 1);
    }

    #[test]
    fn test_zero_capacity_is_immediately_full() {
        let socket = ScriptedSocket::new(vec![Event::Datagram(data(1, 0), addr(CAMERA))]);

        let (result, _) = run(&socket, 0, &params(addr(CAMERA), 1, 5));

        assert_eq!(result.unwrap().status, CaptureStatus::BufferFull);
        assert_eq!(socket.remaining(), 1);
    }

    #[test]
    fn test_silence_times_out_with_partial_data() {
        let socket = ScriptedSocket::new(vec![
            Event::Datagram(data(1, 0), addr(CAMERA)),
            Event::Silence,
        ]);

        let (result, _) = run(&socket, 4, &params(addr(CAMERA), 1, 5));

        assert_eq!(result_code(&result), (1, 1));
    }

    #[test]
    fn test_malformed_abort_ends_receiving() {
        let socket = ScriptedSocket::new(vec![
            Event::Datagram(vec![0u8; 10], addr(CAMERA)),
            Event::Datagram(vec![0u8; 10], addr(CAMERA)),
            Event::Datagram(vec![0u8; 10], addr(CAMERA)),
            Event::Datagram(data(1, 0), addr(CAMERA)),
        ]);

        let (result, _) = run(&socket, 4, &params(addr(CAMERA), 1, 2));

        assert_eq!(result_code(&result), (2, 0));
        assert_eq!(socket.received.get(), 3);
        assert_eq!(socket.remaining(), 1);
    }

    #[test]
    fn test_receive_error_mid_stream_reports_nothing() {
        let socket = ScriptedSocket::new(vec![
            Event::Datagram(data(1, 0), addr(CAMERA)),
            Event::Datagram(data(1, 1468), addr(CAMERA)),
            Event::RecvError,
        ]);

        let (result, slots) = run(&socket, 4, &params(addr(CAMERA), 1, 5));

        assert_eq!(result_code(&result), (-1, 0));
        assert_eq!(slots.filled(), 0);
        assert_eq!(result.unwrap_err().raw_os_error(), Some(libc::ECONNREFUSED));
        assert_eq!(socket.sent.borrow().last(), Some(&CommandPacket::stop()));
    }

    #[test]
    fn test_poll_error_is_fatal() {
        let socket = ScriptedSocket::new(vec![Event::PollError]);

        let (result, _) = run(&socket, 4, &params(addr(CAMERA), 1, 5));

        match result {
            Err(err @ Error::Io(_)) => assert_eq!(err.raw_os_error(), Some(libc::EBADF)),
            other => panic!("expected fatal I/O error, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_flags_empties_reused_buffer() {
        let socket = ScriptedSocket::new(vec![Event::Datagram(data(1, 0), addr(CAMERA))]);
        socket.fault.set(Some(Fault::ReadFlags));
        let mut slots = SlotBuffer::new(4);
        slots.commit(SlotKind::Data).unwrap();
        slots.commit(SlotKind::Config).unwrap();

        let result = capture(&mut slots, &socket, &params(addr(CAMERA), 1, 5));

        assert_eq!(result_code(&result), (-1, 0));
        assert_eq!(result.unwrap_err().raw_os_error(), Some(libc::EBADF));
        assert_eq!(slots.filled(), 0);
        assert_eq!(slots.iter().count(), 0);
        assert!(socket.sent.borrow().is_empty());
        assert_eq!(socket.remaining(), 1);
    }

    #[test]
    fn test_restore_failure_is_fatal() {
        for fault in [Fault::ClearNonBlocking, Fault::RestoreTimeouts] {
            let socket = ScriptedSocket::new(vec![
                Event::Datagram(data(1, 0), addr(CAMERA)),
                Event::Datagram(data(2, 0), addr(CAMERA)),
            ]);
            socket.fault.set(Some(fault));
            let mut slots = SlotBuffer::new(4);

            let result = capture(&mut slots, &socket, &params(addr(CAMERA), 1, 5));

            assert_eq!(result_code(&result), (-1, 0), "{:?}", fault);
            assert_eq!(result.unwrap_err().raw_os_error(), Some(libc::EBADF), "{:?}", fault);
            assert_eq!(slots.filled(), 0, "{:?}", fault);
            assert_eq!(socket.received.get(), 2, "{:?}", fault);
            assert_eq!(socket.sent.borrow().last(), Some(&CommandPacket::stop()), "{:?}", fault);
        }
    }

    #[test]
    fn test_already_non_blocking_socket_untouched() {
        let socket = ScriptedSocket::new(vec![Event::Silence]);
        socket.flags.set(StatusFlags(libc::O_RDWR).with_non_blocking());

        let (result, _) = run(&socket, 4, &params(addr(CAMERA), 1, 5));

        assert!(result.is_ok());
        assert!(socket.flags.get().is_non_blocking());
    }

    #[cfg(target_os = "linux")]
    mod loopback {
        use super::*;
        use pretty_assertions::assert_eq;
        use std::net::UdpSocket;
        use std::thread::{self, JoinHandle};

        /// Camera on 127.0.0.1 that replays `script` once START arrives
        ///
        /// Entries flagged `true` are sent from 127.0.0.2 instead.
        fn fake_camera(script: Vec<(bool, Vec<u8>)>) -> (SocketAddr, JoinHandle<()>) {
            let camera = UdpSocket::bind("127.0.0.1:0").unwrap();
            camera.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
            let camera_addr = camera.local_addr().unwrap();

            let handle = thread::spawn(move || {
                let foreign = UdpSocket::bind("127.0.0.2:0").unwrap();
                let mut buf = [0u8; 64];
                let client = loop {
                    let (len, source) = camera.recv_from(&mut buf).unwrap();
                    let command = CommandPacket::decode(&buf[..len]).unwrap();
                    if command.start_format().is_some() {
                        break source;
                    }
                };
                for (from_foreign, bytes) in script {
                    let sender = if from_foreign { &foreign } else { &camera };
                    sender.send_to(&bytes, client).unwrap();
                }
            });

            (camera_addr, handle)
        }

        fn client() -> UdpSocket {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket.set_read_timeout(Some(Duration::from_millis(750))).unwrap();
            socket
        }

        fn capture_with(socket: &UdpSocket, capacity: usize, params: &CaptureParams) -> Result<CaptureReport> {
            let before = (socket.status_flags().unwrap(), socket.timeouts().unwrap());
            let mut slots = SlotBuffer::new(capacity);
            let result = capture(&mut slots, socket, params);
            assert_eq!((socket.status_flags().unwrap(), socket.timeouts().unwrap()), before);
            result
        }

        #[test]
        fn test_end_to_end_complete() {
            let (camera, handle) = fake_camera(vec![
                (true, data(1, 0)),
                (false, data(1, 0)),
                (false, data(2, 0)),
            ]);
            let socket = client();

            let result = capture_with(&socket, 2, &params(camera, 1, 5));
            handle.join().unwrap();

            assert_eq!(result_code(&result), (0, 1));
        }

        #[test]
        fn test_silent_camera_times_out() {
            let (camera, handle) = fake_camera(Vec::new());
            let socket = client();

            let result = capture_with(&socket, 2, &params(camera, 1, 5));
            handle.join().unwrap();

            assert_eq!(result_code(&result), (1, 0));
        }

        #[test]
        fn test_garbage_aborts() {
            let (camera, handle) = fake_camera(vec![
                (false, vec![0u8; 10]),
                (false, vec![0u8; 10]),
                (false, vec![0u8; 10]),
            ]);
            let socket = client();

            let result = capture_with(&socket, 4, &params(camera, 1, 2));
            handle.join().unwrap();

            assert_eq!(result_code(&result), (2, 0));
        }
    }
}
