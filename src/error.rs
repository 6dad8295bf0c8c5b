//! Unified error type for the control core.
//!
//! A single `Copy` enum that every fallible operation funnels into, so the
//! host loop and interrupt-side posting code handle failures uniformly
//! without allocation.

use core::fmt;

use crate::events::Event;
use crate::fsm::StateId;

// ---------------------------------------------------------------------------
// Top-level core error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The "no event" sentinel or a raw identifier outside the event set.
    InvalidEvent(u8),
    /// The single-slot queue already holds an event.  Carries the rejected
    /// event; the queued one is preserved.
    QueueFull(Event),
    /// The state's transition list is at `MAX_TRANSITIONS_PER_STATE`.
    TransitionTableFull(StateId),
    /// Refused because the critical lock is active.
    CriticalLock,
    /// A name did not match any member of the named set.
    UnknownName(&'static str),
    /// Configuration is invalid or could not be decoded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEvent(raw) => write!(f, "invalid event id {raw}"),
            Self::QueueFull(event) => write!(f, "event queue full, dropped {event}"),
            Self::TransitionTableFull(state) => {
                write!(f, "transition table full for state {state}")
            }
            Self::CriticalLock => write!(f, "critical error lock active"),
            Self::UnknownName(kind) => write!(f, "unknown {kind} name"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
