//! Canonical state callbacks and table builder.
//!
//! Each state is three plain `fn` pointers, generic over the injected
//! clock and sink.  Callbacks never block; "waiting" is state residency
//! plus the per-state timeout.
//!
//! ```text
//!  INIT ──INIT_COMPLETE──▶ IDLE ──START──▶ ACTIVE ──DATA_READY──▶ PROCESSING
//!                           ▲  ▲             │                        │
//!                           │  └────STOP─────┘                 PROCESSING_DONE
//!                           │                                         ▼
//!                           └─────STOP───── MONITORING ◀─COMM_COMPLETE─ COMMUNICATING
//!                                             │
//!                                             └─DATA_READY─▶ PROCESSING
//!
//!  CALIBRATING ──PROCESSING_DONE──▶ DIAGNOSTICS ──PROCESSING_DONE──▶ ACTIVE
//!
//!  any operational state ──ERROR_NORMAL──▶ RECOVERY ──RECOVERY_SUCCESS──▶ IDLE
//!  any operational state ──ERROR_CRITICAL──▶ CRITICAL_ERROR (terminal)
//!  RECOVERY ──RECOVERY_FAILED / TIMEOUT──▶ CRITICAL_ERROR
//!  INIT / PROCESSING / COMMUNICATING / CALIBRATING / DIAGNOSTICS ──TIMEOUT──▶ RECOVERY
//! ```

use log::{debug, error, info, warn};

use super::context::Core;
use super::table::{StateCallbacks, StateTable};
use super::StateId;
use crate::config::CoreConfig;
use crate::error::Result;
use crate::events::Event;
use crate::recovery::RecoveryOutcome;
use crate::telemetry::TelemetrySink;
use crate::time::Clock;

/// INIT steps before `INIT_COMPLETE`.
pub const INIT_REQUIRED_STEPS: u32 = 5;
/// PROCESSING ticks before `PROCESSING_DONE`.
pub const PROCESSING_CYCLES: u32 = 20;
/// COMMUNICATING ticks before the channel is checked.
pub const COMM_CYCLES: u32 = 8;
pub const CALIBRATION_CYCLES: u32 = 30;
pub const DIAGNOSTIC_CYCLES: u32 = 15;
/// CRITICAL_ERROR reminder period, in executions.
pub const CRITICAL_LOG_INTERVAL: u32 = 100;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the canonical table: callbacks, topology and timeouts from `config`.
pub fn canonical_table<C: Clock, S: TelemetrySink>(
    config: &CoreConfig,
) -> Result<StateTable<C, S>> {
    use Event as E;
    use StateId as St;

    let mut t = StateTable::new();

    t.set_callbacks(St::Init, StateCallbacks {
        on_entry: Some(init_entry::<C, S>),
        on_state: Some(init_state::<C, S>),
        on_exit: Some(init_exit::<C, S>),
    });
    t.set_callbacks(St::Idle, StateCallbacks {
        on_entry: Some(idle_entry::<C, S>),
        on_state: None,
        on_exit: Some(idle_exit::<C, S>),
    });
    t.set_callbacks(St::Active, StateCallbacks {
        on_entry: Some(active_entry::<C, S>),
        on_state: None,
        on_exit: Some(active_exit::<C, S>),
    });
    t.set_callbacks(St::Processing, StateCallbacks {
        on_entry: Some(processing_entry::<C, S>),
        on_state: Some(processing_state::<C, S>),
        on_exit: Some(processing_exit::<C, S>),
    });
    t.set_callbacks(St::Communicating, StateCallbacks {
        on_entry: Some(communicating_entry::<C, S>),
        on_state: Some(communicating_state::<C, S>),
        on_exit: Some(communicating_exit::<C, S>),
    });
    t.set_callbacks(St::Monitoring, StateCallbacks {
        on_entry: Some(monitoring_entry::<C, S>),
        on_state: None,
        on_exit: Some(monitoring_exit::<C, S>),
    });
    t.set_callbacks(St::Calibrating, StateCallbacks {
        on_entry: Some(calibrating_entry::<C, S>),
        on_state: Some(calibrating_state::<C, S>),
        on_exit: None,
    });
    t.set_callbacks(St::Diagnostics, StateCallbacks {
        on_entry: Some(diagnostics_entry::<C, S>),
        on_state: Some(diagnostics_state::<C, S>),
        on_exit: None,
    });
    t.set_callbacks(St::Recovery, StateCallbacks {
        on_entry: Some(recovery_entry::<C, S>),
        on_state: Some(recovery_state::<C, S>),
        on_exit: Some(recovery_exit::<C, S>),
    });
    t.set_callbacks(St::CriticalError, StateCallbacks {
        on_entry: Some(critical_entry::<C, S>),
        on_state: Some(critical_state::<C, S>),
        on_exit: Some(critical_exit::<C, S>),
    });

    // Primary topology, in match order.
    t.add_transition(St::Init, E::InitComplete, St::Idle)?;
    t.add_transition(St::Init, E::Timeout, St::Recovery)?;

    t.add_transition(St::Idle, E::Start, St::Active)?;

    t.add_transition(St::Active, E::DataReady, St::Processing)?;
    t.add_transition(St::Active, E::Stop, St::Idle)?;

    t.add_transition(St::Processing, E::ProcessingDone, St::Communicating)?;
    t.add_transition(St::Processing, E::Timeout, St::Recovery)?;

    t.add_transition(St::Communicating, E::CommComplete, St::Monitoring)?;
    t.add_transition(St::Communicating, E::Timeout, St::Recovery)?;

    t.add_transition(St::Monitoring, E::Stop, St::Idle)?;
    t.add_transition(St::Monitoring, E::DataReady, St::Processing)?;

    t.add_transition(St::Calibrating, E::ProcessingDone, St::Diagnostics)?;
    t.add_transition(St::Calibrating, E::Timeout, St::Recovery)?;

    t.add_transition(St::Diagnostics, E::ProcessingDone, St::Active)?;
    t.add_transition(St::Diagnostics, E::Timeout, St::Recovery)?;

    t.add_transition(St::Recovery, E::RecoverySuccess, St::Idle)?;
    t.add_transition(St::Recovery, E::RecoveryFailed, St::CriticalError)?;
    t.add_transition(St::Recovery, E::Timeout, St::CriticalError)?;

    // Error edges are universal: every state but CRITICAL_ERROR.
    for state in StateId::ALL {
        if state == St::CriticalError {
            continue;
        }
        t.add_transition(state, E::ErrorNormal, St::Recovery)?;
        t.add_transition(state, E::ErrorCritical, St::CriticalError)?;
    }

    for state in StateId::ALL {
        t.set_timeout(state, config.state_timeouts.get(state));
    }

    Ok(t)
}

// ═══════════════════════════════════════════════════════════════════════════
//  INIT
// ═══════════════════════════════════════════════════════════════════════════

fn init_entry<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    core.scratch_mut().init_steps = 0;
    info!("entering INIT");
}

fn init_state<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    let scratch = core.scratch_mut();
    scratch.init_steps = scratch.init_steps.saturating_add(1);
    let steps = scratch.init_steps;
    if steps >= INIT_REQUIRED_STEPS {
        info!("initialisation complete after {steps} steps");
        core.post_event(Event::InitComplete);
    }
}

fn init_exit<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("exiting INIT");
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE / ACTIVE / MONITORING: wait for external events
// ═══════════════════════════════════════════════════════════════════════════

fn idle_entry<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("entering IDLE, ready");
}

fn idle_exit<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("exiting IDLE");
}

fn active_entry<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("entering ACTIVE");
}

fn active_exit<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("exiting ACTIVE");
}

fn monitoring_entry<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("entering MONITORING");
}

fn monitoring_exit<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("exiting MONITORING");
}

// ═══════════════════════════════════════════════════════════════════════════
//  PROCESSING
// ═══════════════════════════════════════════════════════════════════════════

fn processing_entry<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("entering PROCESSING");
}

fn processing_state<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    let n = core.execution_count();
    if n >= PROCESSING_CYCLES {
        info!("processing complete after {n} cycles");
        core.post_event(Event::ProcessingDone);
    }
}

fn processing_exit<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("exiting PROCESSING");
}

// ═══════════════════════════════════════════════════════════════════════════
//  COMMUNICATING
// ═══════════════════════════════════════════════════════════════════════════

fn communicating_entry<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    core.scratch_mut().comm_started = false;
    debug!("entering COMMUNICATING");
}

fn communicating_state<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    if !core.scratch_mut().comm_started {
        info!("starting communication");
        core.scratch_mut().comm_started = true;
    }

    if core.execution_count() >= COMM_CYCLES && core.verify_comm_channel() {
        info!("communication complete and verified");
        core.post_event(Event::CommComplete);
    }
}

fn communicating_exit<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    core.scratch_mut().comm_started = false;
    debug!("exiting COMMUNICATING");
}

// ═══════════════════════════════════════════════════════════════════════════
//  CALIBRATING → DIAGNOSTICS
// ═══════════════════════════════════════════════════════════════════════════

fn calibrating_entry<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("entering CALIBRATING");
}

fn calibrating_state<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    if core.execution_count() >= CALIBRATION_CYCLES {
        info!("calibration complete");
        core.post_event(Event::ProcessingDone);
    }
}

fn diagnostics_entry<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("entering DIAGNOSTICS");
}

fn diagnostics_state<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    if core.execution_count() >= DIAGNOSTIC_CYCLES {
        info!("diagnostics passed");
        core.post_event(Event::ProcessingDone);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  RECOVERY
// ═══════════════════════════════════════════════════════════════════════════

fn recovery_entry<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    let err = core.current_error();
    warn!("entering RECOVERY for {} ({})", err.code, err.level);
}

fn recovery_state<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    match core.attempt_recovery() {
        RecoveryOutcome::Recovered => {
            info!("recovery successful");
            core.clear_error();
            core.post_event(Event::RecoverySuccess);
        }
        RecoveryOutcome::Exhausted => {
            error!(
                "recovery failed after {} attempts",
                core.current_error().retry_count
            );
            core.post_event(Event::RecoveryFailed);
        }
        RecoveryOutcome::Failed => {}
    }
}

fn recovery_exit<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    debug!("exiting RECOVERY");
}

// ═══════════════════════════════════════════════════════════════════════════
//  CRITICAL_ERROR
// ═══════════════════════════════════════════════════════════════════════════

fn critical_entry<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    error!("=== CRITICAL ERROR ===");
    let err = core.current_error();
    if !err.is_none() {
        error!(
            "error {} from state {} at {}ms",
            err.code, err.state, err.timestamp_ms
        );
    }
    error!("recovery exhausted, reset required");
}

fn critical_state<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    let n = core.execution_count();
    if n % CRITICAL_LOG_INTERVAL == 0 {
        error!("in critical error (exec count {n})");
    }
}

fn critical_exit<C: Clock, S: TelemetrySink>(_core: &mut Core<'_, C, S>) {
    warn!("leaving CRITICAL_ERROR");
}
