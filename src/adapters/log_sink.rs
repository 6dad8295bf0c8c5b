//! Log-based telemetry sink adapter.
//!
//! Implements [`TelemetrySink`] by writing each [`CoreEvent`] as one
//! structured log line.  A wire or ring-buffer sink would implement the
//! same trait.

use log::{debug, error, info, warn};

use crate::telemetry::{CoreEvent, TelemetrySink};

/// Adapter that logs every [`CoreEvent`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for LogSink {
    fn emit(&mut self, event: &CoreEvent) {
        match event {
            CoreEvent::Initialized => info!("INIT  | executor ready"),
            CoreEvent::StateEntered(s) => debug!("ENTER | {s}"),
            CoreEvent::StateExited(s) => debug!("EXIT  | {s}"),
            CoreEvent::Transition { from, to, event } => {
                info!("STATE | {from} -> {to} on {event}");
            }
            CoreEvent::ForcedTransition { from, to } => {
                warn!("STATE | {from} -> {to} (forced)");
            }
            CoreEvent::EventDropped { state, event } => {
                warn!("EVENT | {event} unmatched in {state}");
            }
            CoreEvent::EventRejected { event } => {
                warn!("EVENT | {event} rejected, queue full");
            }
            CoreEvent::TimeoutFired { state, elapsed_ms } => {
                warn!("TIMEO | {state} after {elapsed_ms}ms");
            }
            CoreEvent::ErrorReported(e) => {
                info!(
                    "ERROR | {} {} in {} at {}ms",
                    e.level, e.code, e.state, e.timestamp_ms
                );
            }
            CoreEvent::MinorHealed(code) => info!("ERROR | {code} self-healed"),
            CoreEvent::ErrorEscalated(code) => warn!("ERROR | {code} escalated to NORMAL"),
            CoreEvent::CriticalLock(code) => error!("ERROR | {code} CRITICAL, locked"),
            CoreEvent::RecoveryAttempt {
                code,
                attempt,
                outcome,
            } => {
                info!("RECOV | {code} attempt {attempt}: {outcome}");
            }
            CoreEvent::ResetRefused => warn!("RESET | refused, critical lock"),
            CoreEvent::Status(s) => {
                info!(
                    "STAT  | {} ({}ms, {} execs) prev={} err={}/{} lock={} transitions={}",
                    s.state,
                    s.time_in_state_ms,
                    s.execution_count,
                    s.previous_state,
                    s.current_error.level,
                    s.current_error.code,
                    s.critical_lock,
                    s.transitions,
                );
            }
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn emit(&mut self, _event: &CoreEvent) {}
}
