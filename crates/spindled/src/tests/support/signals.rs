//! Serialises tests that install process-wide signal handlers.

use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

static SIGNAL_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Holds the lock for tests that register or raise shutdown signals.
pub fn signal_lock() -> MutexGuard<'static, ()> {
    SIGNAL_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}
