//! Cross-process single-writer / multi-reader coordination through an
//! advisory lock on the database file.
//!
//! ```text
//! holder \ request   Shared      Exclusive
//! ----------------   ---------   ------------
//! none               ok          ok
//! Shared             ok          WriteByOther
//! Exclusive          WriteByOther WriteByOther
//! ```
//!
//! With a bounded wait, contention is retried every
//! [`LOCK_RETRY_INTERVAL`]; any other failure is returned immediately.

use std::fs::File;
use std::thread;
use std::time::{Duration, Instant};

use config::LOCK_RETRY_INTERVAL;
use tracing::{trace, warn};

use crate::sys::{self, LockMode};
use crate::{Error, Result};

/// Takes `mode` on `file`.
///
/// `timeout` is `None` for a single attempt, `Some(Duration::ZERO)` to wait
/// indefinitely, or `Some(d)` to give up with [`Error::LockTimeout`] after `d`.
pub(crate) fn acquire(file: &File, mode: LockMode, timeout: Option<Duration>) -> Result<()> {
    let deadline = match timeout {
        None => return try_acquire(file, mode),
        Some(d) if d.is_zero() => None,
        Some(d) => Some(Instant::now() + d),
    };

    loop {
        match try_acquire(file, mode) {
            Err(Error::WriteByOther) => {}
            other => return other,
        }
        if deadline.is_some_and(|dl| Instant::now() >= dl) {
            return Err(Error::LockTimeout);
        }
        trace!(?mode, "database file lock contended, retrying");
        thread::sleep(LOCK_RETRY_INTERVAL);
    }
}

fn try_acquire(file: &File, mode: LockMode) -> Result<()> {
    match sys::acquire_lock(file, mode) {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::WriteByOther),
        Err(e) => Err(Error::Lock(e)),
    }
}

/// Releases whatever lock `file` holds. Failures are logged.
pub(crate) fn release(file: &File, mode: LockMode) {
    if let Err(e) = sys::release_lock(file) {
        warn!(?mode, error = %e, "failed to release database file lock");
    }
}
