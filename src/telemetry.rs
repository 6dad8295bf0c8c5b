//! Structured notifications emitted by the core.
//!
//! ```text
//!   Executor / ErrorHandler ──▶ CoreEvent ──▶ TelemetrySink (adapter)
//! ```
//!
//! The core decides *what* happened; the sink decides where it goes
//! (log line, ring buffer, wire frame).  Formatting, filtering and
//! transport are the adapter's business.

use crate::diagnostics::StatusSnapshot;
use crate::events::Event;
use crate::fsm::StateId;
use crate::recovery::{ErrorCode, ErrorInfo, RecoveryOutcome};

/// Something observable happened inside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreEvent {
    /// Executor (re)initialised; the table is built and INIT is current.
    Initialized,
    StateEntered(StateId),
    StateExited(StateId),
    /// Table-driven transition.
    Transition {
        from: StateId,
        to: StateId,
        event: Event,
    },
    /// Transition forced by `reset()` or by the critical lock.
    ForcedTransition { from: StateId, to: StateId },
    /// Event consumed with no matching transition.
    EventDropped { state: StateId, event: Event },
    /// Core-originated post refused because the slot was occupied.
    EventRejected { event: Event },
    TimeoutFired { state: StateId, elapsed_ms: u32 },
    ErrorReported(ErrorInfo),
    MinorHealed(ErrorCode),
    ErrorEscalated(ErrorCode),
    CriticalLock(ErrorCode),
    RecoveryAttempt {
        code: ErrorCode,
        attempt: u8,
        outcome: RecoveryOutcome,
    },
    /// `reset()` called while the critical lock is set.
    ResetRefused,
    Status(StatusSnapshot),
}

/// Logging / telemetry collaborator.
pub trait TelemetrySink {
    fn emit(&mut self, event: &CoreEvent);
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn emit(&mut self, event: &CoreEvent) {
        (**self).emit(event);
    }
}

/// Records every notification, in order.
impl TelemetrySink for Vec<CoreEvent> {
    fn emit(&mut self, event: &CoreEvent) {
        self.push(*event);
    }
}
