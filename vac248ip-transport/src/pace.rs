//! Command pacing
//!
//! The camera needs a short pause after each command. The pause must last
//! the full interval even when the thread catches a signal, so sleeping is
//! a `nanosleep(2)` loop that resumes with the remaining time on `EINTR`.

use std::io;
use std::time::Duration;

/// Sleep for `delay`, resuming after signal interruptions
pub fn sleep(delay: Duration) -> io::Result<()> {
    if delay.is_zero() {
        return Ok(());
    }

    let mut request = libc::timespec {
        tv_sec: delay.as_secs() as libc::time_t,
        tv_nsec: delay.subsec_nanos() as _,
    };
    let mut remaining = libc::timespec { tv_sec: 0, tv_nsec: 0 };

    loop {
        // SAFETY: both pointers refer to live, properly aligned timespec values.
        let rc = unsafe { libc::nanosleep(&request, &mut remaining) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
        request = remaining;
    }
}

/// Millisecond form; zero or negative delays return immediately
pub fn sleep_ms(ms: i64) -> io::Result<()> {
    match u64::try_from(ms) {
        Ok(ms) if ms > 0 => sleep(Duration::from_millis(ms)),
        _ => Ok(()),
    }
}
