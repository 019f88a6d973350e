//! Process-wide cooperative stop flag.
//! The ctrl-c handler sets it; long runs check it between plan entries and walk events,
//! so an interrupted apply still closes its audit with a `_meta_end` line.
//!
//! Relaxed atomics are enough for a one-way flag, and `request()` is signal-safe.
use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Request a cooperative shutdown (idempotent).
#[inline]
pub fn request() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

#[inline]
pub fn is_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Clear the flag. Tests that request a shutdown must call this afterwards.
#[inline]
pub fn reset() {
    SHUTDOWN.store(false, Ordering::Relaxed);
}
