//! Executor context and the `Core` handed to every state callback.
//!
//! `Core` is the blackboard: the executor's bookkeeping, the error handler,
//! per-state scratch data, statistics, configuration and the injected
//! capabilities (clock, telemetry sink, event slot).  The transition table
//! is deliberately *not* part of it, so callbacks cannot rewrite the table
//! mid-tick.

use log::{info, warn};

use super::StateId;
use crate::config::CoreConfig;
use crate::diagnostics::{PeriodicReporter, StatusSnapshot, Stats};
use crate::error::Error;
use crate::events::{Event, EventSlot};
use crate::recovery::{Disposition, ErrorCode, ErrorHandler, ErrorInfo, ErrorLevel, RecoveryOutcome};
use crate::telemetry::{CoreEvent, TelemetrySink};
use crate::time::{elapsed_ms, Clock};

// ---------------------------------------------------------------------------
// Executor bookkeeping
// ---------------------------------------------------------------------------

/// Where the executor is and how long it has been there.
///
/// The pending event is not here: it lives in the shared [`EventSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorContext {
    pub current_state: StateId,
    pub previous_state: StateId,
    pub state_entry_ms: u32,
    /// `on_state` calls since the current state was entered.
    pub execution_count: u32,
    /// Set by a transition; the next tick runs `on_entry` and clears it.
    pub state_changed: bool,
}

impl ExecutorContext {
    pub fn new(now_ms: u32) -> Self {
        Self {
            current_state: StateId::Init,
            previous_state: StateId::Init,
            state_entry_ms: now_ms,
            execution_count: 0,
            state_changed: true,
        }
    }
}

/// Per-state working data of the canonical callbacks.  Zeroed by `reset()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateScratch {
    pub init_steps: u32,
    pub comm_started: bool,
}

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

/// Everything a state callback may touch.
pub struct Core<'q, C, S> {
    pub(crate) ctx: ExecutorContext,
    pub(crate) errors: ErrorHandler,
    pub(crate) scratch: StateScratch,
    pub(crate) stats: Stats,
    pub(crate) config: CoreConfig,
    pub(crate) clock: C,
    pub(crate) sink: S,
    pub(crate) slot: &'q EventSlot,
    pub(crate) reporter: PeriodicReporter,
}

impl<'q, C: Clock, S: TelemetrySink> Core<'q, C, S> {
    pub(crate) fn new(slot: &'q EventSlot, clock: C, sink: S, config: CoreConfig) -> Self {
        let now = clock.now_ms();
        Self {
            ctx: ExecutorContext::new(now),
            errors: ErrorHandler::new(&config),
            scratch: StateScratch::default(),
            stats: Stats::default(),
            reporter: PeriodicReporter::new(config.status_interval_ms),
            config,
            clock,
            sink,
            slot,
        }
    }

    // -- Time & position --

    pub fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    pub fn current_state(&self) -> StateId {
        self.ctx.current_state
    }

    pub fn previous_state(&self) -> StateId {
        self.ctx.previous_state
    }

    /// `on_state` calls in the current state, before this one.
    pub fn execution_count(&self) -> u32 {
        self.ctx.execution_count
    }

    /// Milliseconds since the current state was entered.
    pub fn state_time_ms(&self) -> u32 {
        elapsed_ms(self.ctx.state_entry_ms, self.now_ms())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn scratch_mut(&mut self) -> &mut StateScratch {
        &mut self.scratch
    }

    // -- Events --

    /// Post into the shared slot.  Returns `false` if it was refused.
    pub fn post_event(&mut self, event: Event) -> bool {
        match self.slot.post(event) {
            Ok(()) => true,
            Err(Error::QueueFull(rejected)) => {
                self.sink.emit(&CoreEvent::EventRejected { event: rejected });
                false
            }
            Err(_) => false,
        }
    }

    pub fn emit(&mut self, event: &CoreEvent) {
        self.sink.emit(event);
    }

    // -- Errors --

    /// Report a fault from the current state and post whatever event the
    /// handler asks for.
    pub fn report_error(&mut self, level: ErrorLevel, code: ErrorCode) -> Disposition {
        let now = self.now_ms();
        let state = self.ctx.current_state;
        let disposition = self.errors.report(level, code, now, state);

        if let Some(info) = self.errors.history_error(0) {
            self.sink.emit(&CoreEvent::ErrorReported(info));
        }
        match disposition {
            Disposition::Healed => self.sink.emit(&CoreEvent::MinorHealed(code)),
            Disposition::Escalated => self.sink.emit(&CoreEvent::ErrorEscalated(code)),
            Disposition::Locked => self.sink.emit(&CoreEvent::CriticalLock(code)),
            _ => {}
        }

        if let Some(event) = disposition.event() {
            if !self.post_event(event) && disposition == Disposition::Locked {
                // The lock check at the top of the next tick still fires.
                warn!("ERROR_CRITICAL not queued, relying on lock");
            }
        }
        disposition
    }

    /// One recovery attempt for the current error.
    pub fn attempt_recovery(&mut self) -> RecoveryOutcome {
        let now = self.now_ms();
        let code = self.errors.current_error().code;
        let outcome = self.errors.attempt_recovery(now);
        let attempt = self.errors.current_error().retry_count;
        self.sink.emit(&CoreEvent::RecoveryAttempt {
            code,
            attempt,
            outcome,
        });
        outcome
    }

    pub fn clear_error(&mut self) {
        self.errors.clear_error();
    }

    pub fn current_error(&self) -> ErrorInfo {
        self.errors.current_error()
    }

    pub fn is_critical_lock(&self) -> bool {
        self.errors.is_critical_lock()
    }

    /// Feed the shared comm verifier.
    pub fn verify_comm_channel(&mut self) -> bool {
        let now = self.now_ms();
        self.errors.verify_comm_channel(now)
    }

    pub fn errors(&self) -> &ErrorHandler {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorHandler {
        &mut self.errors
    }

    // -- Diagnostics --

    pub fn snapshot(&self) -> StatusSnapshot {
        let now = self.now_ms();
        StatusSnapshot {
            timestamp_ms: now,
            state: self.ctx.current_state,
            previous_state: self.ctx.previous_state,
            time_in_state_ms: elapsed_ms(self.ctx.state_entry_ms, now),
            execution_count: self.ctx.execution_count,
            current_error: self.errors.current_error(),
            critical_lock: self.errors.is_critical_lock(),
            transitions: self.stats.transitions,
            history_len: self.errors.history_len() as u8,
        }
    }

    /// Emit a status snapshot if the reporting interval has elapsed.
    pub(crate) fn report_status_if_due(&mut self) {
        let now = self.now_ms();
        if self.reporter.due(now) {
            let snap = self.snapshot();
            info!(
                "status: {} for {}ms, {} transitions, lock={}",
                snap.state, snap.time_in_state_ms, snap.transitions, snap.critical_lock
            );
            self.sink.emit(&CoreEvent::Status(snap));
        }
    }
}
