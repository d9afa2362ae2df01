//! Temporary non-blocking mode
//!
//! A capture switches the socket to non-blocking mode and must hand it back
//! exactly as it found it: same status flags, same read and write timeouts.

use std::io;

use tracing::{trace, warn};

use crate::socket::{CameraSocket, SocketTimeouts, StatusFlags};

/// Socket state captured before switching modes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SavedMode {
    pub flags: StatusFlags,
    pub timeouts: SocketTimeouts,
}

impl SavedMode {
    /// Flags were changed when entering non-blocking mode
    pub fn changed_flags(&self) -> bool {
        !self.flags.is_non_blocking()
    }
}

/// Snapshot the socket and add `O_NONBLOCK`
///
/// Flags are written only when the bit is not already set.
pub fn set_non_blocking<S: CameraSocket + ?Sized>(socket: &S) -> io::Result<SavedMode> {
    let saved = SavedMode {
        flags: socket.status_flags()?,
        timeouts: socket.timeouts()?,
    };

    if saved.changed_flags() {
        socket.set_status_flags(saved.flags.with_non_blocking())?;
    }

    trace!(?saved, "Socket switched to non-blocking mode");
    Ok(saved)
}

/// Put back the flags and timeouts recorded by [`set_non_blocking`]
pub fn restore<S: CameraSocket + ?Sized>(socket: &S, saved: &SavedMode) -> io::Result<()> {
    if saved.changed_flags() {
        socket.set_status_flags(saved.flags)?;
    }
    socket.set_timeouts(saved.timeouts)?;

    trace!(?saved, "Socket mode restored");
    Ok(())
}

/// Non-blocking mode held for a scope
///
/// Call [`restore`](Self::restore) to observe a restore failure. Dropping
/// the guard restores as well and only logs failures.
pub struct NonBlockingGuard<'a, S: CameraSocket + ?Sized> {
    socket: &'a S,
    saved: Option<SavedMode>,
}

impl<'a, S: CameraSocket + ?Sized> NonBlockingGuard<'a, S> {
    pub fn acquire(socket: &'a S) -> io::Result<Self> {
        let saved = set_non_blocking(socket)?;
        Ok(Self {
            socket,
            saved: Some(saved),
        })
    }

    pub fn restore(mut self) -> io::Result<()> {
        match self.saved.take() {
            Some(saved) => restore(self.socket, &saved),
            None => Ok(()),
        }
    }
}

impl<S: CameraSocket + ?Sized> Drop for NonBlockingGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(e) = restore(self.socket, &saved) {
                warn!("Failed to restore socket mode: {}", e);
            }
        }
    }
}
