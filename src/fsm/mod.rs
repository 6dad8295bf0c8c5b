//! Event-driven state executor.
//!
//! Table-driven finite state machine with a single-slot event queue:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ execute()  (one cooperative tick)                                │
//! │                                                                  │
//! │  1. critical lock set? ──yes──▶ force CRITICAL_ERROR, return     │
//! │  2. state_changed?     ──yes──▶ on_entry, reset entry time/count │
//! │  3. on_state, execution_count += 1                               │
//! │  4. timeout elapsed?   ──yes──▶ post TIMEOUT (dropped if full)   │
//! │  5. take pending event ──▶ first matching (event, next) wins     │
//! │       match    ──▶ on_exit(old), current = next, state_changed   │
//! │       no match ──▶ dropped, warning                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one transition happens per tick, strictly after `on_state` and
//! timeout evaluation.  The new state's `on_entry` runs at the start of the
//! following tick.

pub mod context;
pub mod states;
pub mod table;

use core::fmt;
use core::str::FromStr;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::diagnostics::{StatusSnapshot, Stats};
use crate::error::{Error, Result};
use crate::events::{Event, EventSlot};
use crate::recovery::{Disposition, ErrorCode, ErrorHandler, ErrorInfo, ErrorLevel, RecoveryFn};
use crate::telemetry::{CoreEvent, TelemetrySink};
use crate::time::{has_elapsed, Clock};

pub use context::{Core, ExecutorContext, StateScratch};
pub use table::{StateCallbacks, StateConfig, StateFn, StateTable, Transition};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Every state the executor can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StateId {
    Init = 0,
    Idle = 1,
    Active = 2,
    Processing = 3,
    Communicating = 4,
    Monitoring = 5,
    Calibrating = 6,
    Diagnostics = 7,
    Recovery = 8,
    /// Terminal: no outgoing transitions, left only via reset / init.
    CriticalError = 9,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 10;

    pub const ALL: [StateId; Self::COUNT] = [
        Self::Init,
        Self::Idle,
        Self::Active,
        Self::Processing,
        Self::Communicating,
        Self::Monitoring,
        Self::Calibrating,
        Self::Diagnostics,
        Self::Recovery,
        Self::CriticalError,
    ];

    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::Processing => "PROCESSING",
            Self::Communicating => "COMMUNICATING",
            Self::Monitoring => "MONITORING",
            Self::Calibrating => "CALIBRATING",
            Self::Diagnostics => "DIAGNOSTICS",
            Self::Recovery => "RECOVERY",
            Self::CriticalError => "CRITICAL_ERROR",
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.name().eq_ignore_ascii_case(s))
            .ok_or(Error::UnknownName("state"))
    }
}

/// Builds the transition table from the validated config.
pub type TableBuilder<C, S> = fn(&CoreConfig) -> Result<StateTable<C, S>>;

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// The state executor.
///
/// Owns the transition table and the [`Core`] threaded through every
/// callback.  The event slot is borrowed so producers on other threads or
/// in interrupt handlers can post while `execute()` holds `&mut self`.
pub struct Executor<'q, C, S> {
    table: StateTable<C, S>,
    core: Core<'q, C, S>,
    builder: TableBuilder<C, S>,
}

impl<'q, C: Clock, S: TelemetrySink> Executor<'q, C, S> {
    /// Executor with the canonical table.
    pub fn new(slot: &'q EventSlot, clock: C, sink: S, config: CoreConfig) -> Result<Self> {
        Self::with_builder(slot, clock, sink, config, states::canonical_table::<C, S>)
    }

    /// Executor with a custom table builder.
    ///
    /// The config is validated, the slot is emptied and its counters reset.
    /// INIT's `on_entry` runs on the first `execute()`.
    pub fn with_builder(
        slot: &'q EventSlot,
        clock: C,
        sink: S,
        config: CoreConfig,
        builder: TableBuilder<C, S>,
    ) -> Result<Self> {
        config.validate()?;
        let table = builder(&config)?;
        let core = Core::new(slot, clock, sink, config);

        let mut exec = Self {
            table,
            core,
            builder,
        };
        exec.core.slot.clear();
        exec.core.slot.reset_counters();
        exec.core.sink.emit(&CoreEvent::Initialized);
        info!("executor initialised, tick period {}ms", exec.core.config.task_period_ms);
        Ok(exec)
    }

    /// Host-level re-initialisation.
    ///
    /// Rebuilds the table and clears everything, the critical lock and the
    /// event slot included.  This is the only way out of a locked
    /// CRITICAL_ERROR.
    pub fn init(&mut self) -> Result<()> {
        self.table = (self.builder)(&self.core.config)?;

        let now = self.core.now_ms();
        self.core.ctx = ExecutorContext::new(now);
        self.core.errors.init(&self.core.config);
        self.core.scratch = StateScratch::default();
        self.core.stats = Stats::default();
        self.core.reporter.reset();
        self.core.slot.clear();
        self.core.slot.reset_counters();

        self.core.sink.emit(&CoreEvent::Initialized);
        info!("executor re-initialised");
        Ok(())
    }

    /// One non-blocking step.  Returns the (possibly new) current state.
    pub fn execute(&mut self) -> StateId {
        if self.core.errors.is_critical_lock() {
            self.run_locked();
            return self.core.ctx.current_state;
        }

        if self.core.ctx.state_changed {
            self.enter_current();
        }

        let state = self.core.ctx.current_state;
        if let Some(on_state) = self.table.callbacks(state).on_state {
            on_state(&mut self.core);
        }
        self.core.ctx.execution_count = self.core.ctx.execution_count.saturating_add(1);

        let timeout = self.table.timeout(state);
        if timeout > 0 {
            let now = self.core.now_ms();
            if has_elapsed(self.core.ctx.state_entry_ms, now, timeout) {
                let elapsed_ms = self.core.state_time_ms();
                warn!("{state} timed out after {elapsed_ms}ms (limit {timeout}ms)");
                self.core.stats.timeouts = self.core.stats.timeouts.saturating_add(1);
                self.core.sink.emit(&CoreEvent::TimeoutFired { state, elapsed_ms });
                // Shares the slot: a pending event wins and the timeout is lost.
                self.core.post_event(Event::Timeout);
            }
        }

        if let Some(event) = self.core.slot.take() {
            match self.table.lookup(state, event) {
                Some(next) => {
                    let from = self.exit_to(next);
                    info!("{from} --{event}--> {next}");
                    self.core.sink.emit(&CoreEvent::Transition {
                        from,
                        to: next,
                        event,
                    });
                }
                None => {
                    warn!("no transition for {event} in {state}, dropped");
                    self.core.stats.events_unmatched =
                        self.core.stats.events_unmatched.saturating_add(1);
                    self.core.sink.emit(&CoreEvent::EventDropped { state, event });
                }
            }
        }

        self.core.report_status_if_due();
        self.core.ctx.current_state
    }

    /// Post an event from the executor's own context.  Other contexts post
    /// through the shared [`EventSlot`] directly.
    pub fn post_event(&self, event: Event) -> Result<()> {
        self.core.slot.post(event)
    }

    /// Return to INIT, clearing the current error.
    ///
    /// Refused with [`Error::CriticalLock`] while the lock is set; state and
    /// lock are left as they are.
    pub fn reset(&mut self) -> Result<()> {
        if self.core.errors.is_critical_lock() {
            warn!("reset refused: critical lock active");
            self.core.sink.emit(&CoreEvent::ResetRefused);
            return Err(Error::CriticalLock);
        }

        self.core.errors.clear_error();
        self.core.scratch = StateScratch::default();
        let from = self.exit_to(StateId::Init);
        self.core.sink.emit(&CoreEvent::ForcedTransition {
            from,
            to: StateId::Init,
        });
        info!("reset from {from} to INIT");
        Ok(())
    }

    /// Report a fault against the current state.
    pub fn report_error(&mut self, level: ErrorLevel, code: ErrorCode) -> Disposition {
        self.core.report_error(level, code)
    }

    /// Hook for the external comm layer: one good message arrived.
    pub fn signal_good_message(&mut self) -> bool {
        self.core.verify_comm_channel()
    }

    pub fn register_recovery_handler(
        &mut self,
        code: ErrorCode,
        handler: Option<RecoveryFn>,
    ) -> Option<RecoveryFn> {
        self.core.errors.register_recovery_handler(code, handler)
    }

    /// Clears the current error only; the critical lock stays.
    pub fn clear_error(&mut self) {
        self.core.errors.clear_error();
    }

    // -----------------------------------------------------------------------
    // Administrative mutators.  Not for use while a tick is in flight.
    // -----------------------------------------------------------------------

    pub fn add_transition(&mut self, state: StateId, event: Event, next: StateId) -> Result<()> {
        self.table.add_transition(state, event, next)
    }

    pub fn set_state_timeout(&mut self, state: StateId, timeout_ms: u32) {
        self.table.set_timeout(state, timeout_ms);
    }

    pub fn set_state_callbacks(&mut self, state: StateId, callbacks: StateCallbacks<C, S>) {
        self.table.set_callbacks(state, callbacks);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn current_state(&self) -> StateId {
        self.core.ctx.current_state
    }

    pub fn previous_state(&self) -> StateId {
        self.core.ctx.previous_state
    }

    /// Milliseconds since the current state was entered.
    pub fn state_time_ms(&self) -> u32 {
        self.core.state_time_ms()
    }

    pub fn execution_count(&self) -> u32 {
        self.core.ctx.execution_count
    }

    pub fn pending_event(&self) -> Option<Event> {
        self.core.slot.peek()
    }

    pub fn slot(&self) -> &'q EventSlot {
        self.core.slot
    }

    pub fn is_critical_lock(&self) -> bool {
        self.core.errors.is_critical_lock()
    }

    pub fn current_error(&self) -> ErrorInfo {
        self.core.errors.current_error()
    }

    pub fn history_error(&self, age: usize) -> Option<ErrorInfo> {
        self.core.errors.history_error(age)
    }

    pub fn history_len(&self) -> usize {
        self.core.errors.history_len()
    }

    pub fn history_capacity(&self) -> usize {
        self.core.errors.history_capacity()
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.core.errors
    }

    pub fn config(&self) -> &CoreConfig {
        &self.core.config
    }

    pub fn table(&self) -> &StateTable<C, S> {
        &self.table
    }

    pub fn sink(&self) -> &S {
        &self.core.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.core.sink
    }

    /// Counters, with the slot's posted/dropped totals merged in.
    pub fn stats(&self) -> Stats {
        Stats {
            events_posted: self.core.slot.posted_count(),
            events_dropped: self.core.slot.dropped_count(),
            ..self.core.stats
        }
    }

    pub fn reset_stats(&mut self) {
        self.core.stats = Stats::default();
        self.core.slot.reset_counters();
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.core.snapshot()
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// A locked tick only forces CRITICAL_ERROR.  No entry, state or
    /// timeout logic runs and the slot is left untouched until `init()`.
    fn run_locked(&mut self) {
        if self.core.ctx.current_state != StateId::CriticalError {
            let from = self.exit_to(StateId::CriticalError);
            error!("critical lock: {from} forced to CRITICAL_ERROR");
            self.core.sink.emit(&CoreEvent::ForcedTransition {
                from,
                to: StateId::CriticalError,
            });
        }
    }

    fn enter_current(&mut self) {
        let state = self.core.ctx.current_state;
        if let Some(on_entry) = self.table.callbacks(state).on_entry {
            on_entry(&mut self.core);
        }
        self.core.ctx.state_changed = false;
        self.core.ctx.state_entry_ms = self.core.now_ms();
        self.core.ctx.execution_count = 0;
        self.core.stats.record_entry(state);
        self.core.sink.emit(&CoreEvent::StateEntered(state));
    }

    /// Run `on_exit` of the current state and switch to `next`.  Returns the
    /// state that was left.
    fn exit_to(&mut self, next: StateId) -> StateId {
        let from = self.core.ctx.current_state;
        if let Some(on_exit) = self.table.callbacks(from).on_exit {
            on_exit(&mut self.core);
        }
        self.core.sink.emit(&CoreEvent::StateExited(from));

        self.core.ctx.previous_state = from;
        self.core.ctx.current_state = next;
        self.core.ctx.state_changed = true;
        self.core.stats.transitions = self.core.stats.transitions.saturating_add(1);
        from
    }
}
