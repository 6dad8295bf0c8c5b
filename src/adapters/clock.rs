//! Clock adapters.
//!
//! - [`ManualClock`]: time only moves when told to.  Used by tests and by
//!   the simulator's deterministic mode.  Interior-mutable so a test can
//!   keep advancing it while the executor holds a shared reference.
//! - [`SystemClock`]: `std::time::Instant` since construction, truncated to
//!   32 bits so it wraps like a hardware millisecond counter.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::time::Clock;

/// Deterministic millisecond clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    pub const fn new(start_ms: u32) -> Self {
        Self {
            now: AtomicU32::new(start_ms),
        }
    }

    /// Move time forward, wrapping at `u32::MAX`.
    pub fn advance(&self, ms: u32) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn set(&self, ms: u32) {
        self.now.store(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Wall-clock milliseconds since construction.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct SystemClock {
    start: std::time::Instant,
    offset_ms: u32,
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl SystemClock {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Start counting from `offset_ms`, e.g. close to the wrap point.
    pub fn with_offset(offset_ms: u32) -> Self {
        Self {
            start: std::time::Instant::now(),
            offset_ms,
        }
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap.
        let elapsed = self.start.elapsed().as_millis() as u32;
        self.offset_ms.wrapping_add(elapsed)
    }
}
