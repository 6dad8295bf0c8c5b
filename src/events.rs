//! Event identifiers and the single-slot event queue.
//!
//! Events are produced by:
//! - Interrupt handlers and other threads (host code calling `post`)
//! - State callbacks (business logic deciding to move on)
//! - The executor itself (state timeouts)
//! - The error handler (severity escalation)
//!
//! and consumed by the next `Executor::execute` call, at most one per tick.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ ISR / thread│────▶│              │     │              │
//! │ Callbacks   │────▶│  EventSlot   │────▶│  execute()   │
//! │ Timeouts    │────▶│ (one event)  │     │  (consumer)  │
//! │ ErrorHandler│────▶│              │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! A post while the slot is occupied is rejected; the queued event stays.

use core::cell::Cell;
use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Events that drive state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Event {
    /// Reserved sentinel: nothing pending.  Never accepted by `post`.
    None = 0,
    InitComplete = 1,
    Start = 2,
    Stop = 3,
    DataReady = 4,
    ProcessingDone = 5,
    CommRequest = 6,
    CommComplete = 7,
    /// Posted by the executor when a state outlives its timeout.
    Timeout = 8,
    ErrorMinor = 9,
    ErrorNormal = 10,
    ErrorCritical = 11,
    RecoverySuccess = 12,
    RecoveryFailed = 13,
}

impl Event {
    /// Size of the event set, sentinel included.
    pub const COUNT: usize = 14;

    pub const ALL: [Event; Self::COUNT] = [
        Self::None,
        Self::InitComplete,
        Self::Start,
        Self::Stop,
        Self::DataReady,
        Self::ProcessingDone,
        Self::CommRequest,
        Self::CommComplete,
        Self::Timeout,
        Self::ErrorMinor,
        Self::ErrorNormal,
        Self::ErrorCritical,
        Self::RecoverySuccess,
        Self::RecoveryFailed,
    ];

    /// Decode a raw identifier.  Returns `None` for out-of-range values; the
    /// sentinel decodes to `Event::None`.
    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::InitComplete => "INIT_COMPLETE",
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::DataReady => "DATA_READY",
            Self::ProcessingDone => "PROCESSING_DONE",
            Self::CommRequest => "COMM_REQUEST",
            Self::CommComplete => "COMM_COMPLETE",
            Self::Timeout => "TIMEOUT",
            Self::ErrorMinor => "ERROR_MINOR",
            Self::ErrorNormal => "ERROR_NORMAL",
            Self::ErrorCritical => "ERROR_CRITICAL",
            Self::RecoverySuccess => "RECOVERY_SUCCESS",
            Self::RecoveryFailed => "RECOVERY_FAILED",
        }
    }

    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Event {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.name().eq_ignore_ascii_case(s))
            .ok_or(Error::UnknownName("event"))
    }
}

// ── Single-slot queue ─────────────────────────────────────────
//
// The only field of the executor touched from more than one context.
// The check-and-set runs inside a critical section supplied by the
// `critical-section` implementation the host links in.  Counters are
// plain atomics; they are statistics, not synchronisation.

/// One-event mailbox shared between producers and the executor.
pub struct EventSlot {
    pending: Mutex<Cell<Event>>,
    posted: AtomicU32,
    dropped: AtomicU32,
}

impl Default for EventSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSlot {
    /// `const` so the slot can live in a `static` reachable from ISRs.
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(Cell::new(Event::None)),
            posted: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Store `event` if the slot is empty.
    ///
    /// Safe from any context.  Rejects the sentinel with
    /// [`Error::InvalidEvent`] and an occupied slot with
    /// [`Error::QueueFull`]; in the latter case the queued event is kept.
    pub fn post(&self, event: Event) -> Result<()> {
        if event.is_none() {
            return Err(Error::InvalidEvent(event as u8));
        }

        let stored = critical_section::with(|cs| {
            let cell = self.pending.borrow(cs);
            if cell.get().is_none() {
                cell.set(event);
                true
            } else {
                false
            }
        });

        if stored {
            self.posted.fetch_add(1, Ordering::Relaxed);
            Ok(())
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            Err(Error::QueueFull(event))
        }
    }

    /// Post a raw identifier, e.g. one read from a register or a wire frame.
    pub fn post_raw(&self, raw: u8) -> Result<()> {
        match Event::from_u8(raw) {
            Some(event) if !event.is_none() => self.post(event),
            _ => Err(Error::InvalidEvent(raw)),
        }
    }

    /// The queued event, if any, without consuming it.
    pub fn peek(&self) -> Option<Event> {
        let event = critical_section::with(|cs| self.pending.borrow(cs).get());
        (!event.is_none()).then_some(event)
    }

    /// Consume the queued event.
    pub fn take(&self) -> Option<Event> {
        let event = critical_section::with(|cs| self.pending.borrow(cs).replace(Event::None));
        (!event.is_none()).then_some(event)
    }

    pub fn is_occupied(&self) -> bool {
        self.peek().is_some()
    }

    /// Discard any queued event.
    pub fn clear(&self) {
        critical_section::with(|cs| self.pending.borrow(cs).set(Event::None));
    }

    /// Events accepted since the last counter reset.
    pub fn posted_count(&self) -> u32 {
        self.posted.load(Ordering::Relaxed)
    }

    /// Events rejected because the slot was occupied.
    pub fn dropped_count(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.posted.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
    }
}
