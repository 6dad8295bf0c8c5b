//! Communication channel verifier.
//!
//! Tracks "good signal" observations inside a fixed verification window.
//! The channel counts as healthy once `threshold` observations land in the
//! same window.  An observation after the window has elapsed opens a fresh
//! window with a count of one.
//!
//! The same verifier instance is shared by three callers:
//! - the external comm layer (`Executor::signal_good_message`)
//! - minor-error self-healing in the error handler
//! - the default `COMM_LOST` recovery strategy

use crate::config::CoreConfig;
use crate::time::elapsed_ms;

/// Windowed good-message counter.
#[derive(Debug, Clone)]
pub struct CommVerifier {
    window_ms: u32,
    threshold: u8,
    /// `None` until the first observation.
    window_start_ms: Option<u32>,
    good_count: u8,
    verified: bool,
}

impl CommVerifier {
    pub fn new(window_ms: u32, threshold: u8) -> Self {
        Self {
            window_ms,
            threshold,
            window_start_ms: None,
            good_count: 0,
            verified: false,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            config.comm_verification_window_ms,
            config.comm_verification_count,
        )
    }

    /// Record one good observation at `now_ms`.
    ///
    /// Returns `true` while the current window holds at least `threshold`
    /// observations.  The observation that opens a window never verifies,
    /// whatever the threshold.
    pub fn observe(&mut self, now_ms: u32) -> bool {
        match self.window_start_ms {
            Some(start) if elapsed_ms(start, now_ms) <= self.window_ms => {
                self.good_count = self.good_count.saturating_add(1);
            }
            _ => {
                self.window_start_ms = Some(now_ms);
                self.good_count = 1;
                self.verified = false;
                return false;
            }
        }

        if self.good_count >= self.threshold {
            self.verified = true;
        }
        self.verified
    }

    /// Latched result of the current window.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn good_count(&self) -> u8 {
        self.good_count
    }

    pub fn window_start_ms(&self) -> Option<u32> {
        self.window_start_ms
    }

    pub fn reset(&mut self) {
        self.window_start_ms = None;
        self.good_count = 0;
        self.verified = false;
    }
}
