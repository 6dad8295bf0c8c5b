//! Millisecond time source and wraparound-safe elapsed-time helpers.
//!
//! The host supplies a monotonically increasing 32-bit millisecond counter
//! that wraps at `u32::MAX` (roughly every 49.7 days).  Every elapsed-time
//! computation in the core goes through [`elapsed_ms`], which is plain
//! wrapping subtraction and therefore correct across one wrap.

/// Monotonic millisecond clock capability.
pub trait Clock {
    /// Current time in milliseconds, wrapping at 32 bits.
    fn now_ms(&self) -> u32;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Milliseconds from `start_ms` to `now_ms`, correct across wraparound.
#[inline]
pub const fn elapsed_ms(start_ms: u32, now_ms: u32) -> u32 {
    now_ms.wrapping_sub(start_ms)
}

/// `true` once at least `timeout_ms` has passed since `start_ms`.
#[inline]
pub const fn has_elapsed(start_ms: u32, now_ms: u32, timeout_ms: u32) -> bool {
    elapsed_ms(start_ms, now_ms) >= timeout_ms
}
