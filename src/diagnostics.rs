//! Runtime statistics and periodic status reporting.
//!
//! Counters are collected by the executor as it runs.  Posted/dropped
//! counts live in the [`EventSlot`](crate::events::EventSlot) (atomics,
//! because posting is cross-context) and are merged in when the host asks
//! for [`Stats`].
//!
//! A [`StatusSnapshot`] is the on-demand view of the core, also emitted
//! every `status_interval_ms` through the telemetry sink.

use serde::{Deserialize, Serialize};

use crate::fsm::StateId;
use crate::recovery::ErrorInfo;
use crate::time::elapsed_ms;

/// Executor counters since init or the last `reset_stats()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub transitions: u32,
    /// Events accepted by the slot.
    pub events_posted: u32,
    /// Events rejected because the slot was occupied.
    pub events_dropped: u32,
    /// Events consumed with no matching transition.
    pub events_unmatched: u32,
    pub timeouts: u32,
    /// Entries per state, indexed by `StateId as usize`.
    pub state_entries: [u32; StateId::COUNT],
}

impl Stats {
    pub fn record_entry(&mut self, state: StateId) {
        let n = &mut self.state_entries[state as usize];
        *n = n.saturating_add(1);
    }

    pub fn entries(&self, state: StateId) -> u32 {
        self.state_entries[state as usize]
    }
}

/// Point-in-time view of the executor and error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub timestamp_ms: u32,
    pub state: StateId,
    pub previous_state: StateId,
    pub time_in_state_ms: u32,
    pub execution_count: u32,
    pub current_error: ErrorInfo,
    pub critical_lock: bool,
    pub transitions: u32,
    pub history_len: u8,
}

/// Fires once every `interval_ms`.  An interval of `0` never fires.
#[derive(Debug, Clone)]
pub struct PeriodicReporter {
    interval_ms: u32,
    last_ms: Option<u32>,
}

impl PeriodicReporter {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: None,
        }
    }

    /// Returns `true` when a report is due at `now_ms`.  The first call only
    /// arms the timer.
    pub fn due(&mut self, now_ms: u32) -> bool {
        if self.interval_ms == 0 {
            return false;
        }
        match self.last_ms {
            None => {
                self.last_ms = Some(now_ms);
                false
            }
            Some(last) if elapsed_ms(last, now_ms) >= self.interval_ms => {
                self.last_ms = Some(now_ms);
                true
            }
            Some(_) => false,
        }
    }

    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}
