//! Error reporting and recovery, driven through the executor.

use core::sync::atomic::{AtomicU32, Ordering};

use smcore::adapters::ManualClock;
use smcore::fsm::{Core, Executor, StateCallbacks};
use smcore::telemetry::CoreEvent;
use smcore::{
    Clock, CoreConfig, Disposition, Error, ErrorCode, ErrorLevel, Event, EventSlot,
    RecoveryOutcome, StateId, TelemetrySink,
};

use crate::mock_platform::{RecordingSink, TestExecutor, boot, tick};

fn make<'q>(slot: &'q EventSlot, clock: &'q ManualClock, config: CoreConfig) -> TestExecutor<'q> {
    Executor::new(slot, clock, RecordingSink::new(), config).unwrap()
}

fn attempts(exec: &TestExecutor<'_>) -> Vec<(ErrorCode, u8, RecoveryOutcome)> {
    exec.sink()
        .events
        .iter()
        .filter_map(|e| match *e {
            CoreEvent::RecoveryAttempt {
                code,
                attempt,
                outcome,
            } => Some((code, attempt, outcome)),
            _ => None,
        })
        .collect()
}

#[test]
fn failing_strategy_exhausts_into_critical_error() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);

    assert_eq!(
        exec.report_error(ErrorLevel::Normal, ErrorCode::CalibrationFailed),
        Disposition::Recovery
    );
    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert_eq!(tick(&mut exec, &clock), StateId::CriticalError);

    assert_eq!(
        attempts(&exec),
        vec![
            (ErrorCode::CalibrationFailed, 1, RecoveryOutcome::Failed),
            (ErrorCode::CalibrationFailed, 2, RecoveryOutcome::Failed),
            (ErrorCode::CalibrationFailed, 3, RecoveryOutcome::Exhausted),
        ]
    );
    assert!(exec.sink().contains(&CoreEvent::Transition {
        from: StateId::Recovery,
        to: StateId::CriticalError,
        event: Event::RecoveryFailed,
    }));

    // Reached through the table, not the lock.
    assert!(!exec.is_critical_lock());
    exec.reset().unwrap();
    boot(&mut exec, &clock);
}

#[test]
fn zero_retry_budget_fails_on_first_attempt() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let config = CoreConfig {
        max_recovery_attempts: 0,
        ..CoreConfig::default()
    };
    let mut exec = make(&slot, &clock, config);
    boot(&mut exec, &clock);

    // TIMEOUT would recover by default; no attempt is ever made.
    exec.report_error(ErrorLevel::Normal, ErrorCode::Timeout);
    tick(&mut exec, &clock);
    assert_eq!(tick(&mut exec, &clock), StateId::CriticalError);
    assert_eq!(
        attempts(&exec),
        vec![(ErrorCode::Timeout, 1, RecoveryOutcome::Exhausted)]
    );
}

static SECOND_TRY_CALLS: AtomicU32 = AtomicU32::new(0);

fn succeed_on_second_try(code: ErrorCode) -> bool {
    assert_eq!(code, ErrorCode::BufferOverflow);
    SECOND_TRY_CALLS.fetch_add(1, Ordering::SeqCst) >= 1
}

fn always_fix(_code: ErrorCode) -> bool {
    true
}

#[test]
fn custom_handler_replaces_default_strategy() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);

    assert!(exec
        .register_recovery_handler(ErrorCode::BufferOverflow, Some(succeed_on_second_try))
        .is_none());

    exec.report_error(ErrorLevel::Normal, ErrorCode::BufferOverflow);
    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert_eq!(tick(&mut exec, &clock), StateId::Idle);

    assert_eq!(SECOND_TRY_CALLS.load(Ordering::SeqCst), 2);
    assert_eq!(
        attempts(&exec),
        vec![
            (ErrorCode::BufferOverflow, 1, RecoveryOutcome::Failed),
            (ErrorCode::BufferOverflow, 2, RecoveryOutcome::Recovered),
        ]
    );
    assert!(exec.current_error().is_none());
}

#[test]
fn handler_registration_returns_previous() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());

    assert!(exec
        .register_recovery_handler(ErrorCode::HardwareFault, Some(always_fix))
        .is_none());
    let prev = exec.register_recovery_handler(ErrorCode::HardwareFault, None);
    assert!(prev.is_some_and(|f| f(ErrorCode::HardwareFault)));

    // Back on the default strategy, which cannot fix hardware.
    boot(&mut exec, &clock);
    exec.report_error(ErrorLevel::Normal, ErrorCode::HardwareFault);
    tick(&mut exec, &clock);
    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert_eq!(
        attempts(&exec),
        vec![(ErrorCode::HardwareFault, 1, RecoveryOutcome::Failed)]
    );
}

#[test]
fn comm_lost_recovers_once_channel_verified() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);

    exec.report_error(ErrorLevel::Normal, ErrorCode::CommLost);
    assert!(!exec.signal_good_message());
    assert!(!exec.signal_good_message());

    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    // Third observation inside the window verifies the channel.
    assert_eq!(tick(&mut exec, &clock), StateId::Idle);
    assert_eq!(
        attempts(&exec),
        vec![(ErrorCode::CommLost, 1, RecoveryOutcome::Recovered)]
    );
    assert!(exec.error_handler().comm().is_verified());
}

#[test]
fn comm_lost_without_traffic_exhausts() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);

    exec.report_error(ErrorLevel::Normal, ErrorCode::CommLost);
    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert_eq!(tick(&mut exec, &clock), StateId::CriticalError);
    assert_eq!(exec.current_error().code, ErrorCode::CommLost);
}

#[test]
fn minor_error_escalates_after_window() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);

    assert_eq!(
        exec.report_error(ErrorLevel::Minor, ErrorCode::InvalidData),
        Disposition::Monitoring
    );
    assert_eq!(tick(&mut exec, &clock), StateId::Idle);

    clock.advance(60);
    assert_eq!(
        exec.report_error(ErrorLevel::Minor, ErrorCode::InvalidData),
        Disposition::Escalated
    );
    assert!(exec.sink().contains(&CoreEvent::ErrorEscalated(ErrorCode::InvalidData)));
    assert_eq!(exec.current_error().level, ErrorLevel::Normal);
    assert_eq!(exec.current_error().code, ErrorCode::InvalidData);

    assert_eq!(tick(&mut exec, &clock), StateId::Recovery);
    assert!(!exec.error_handler().minor_window_open());
}

#[test]
fn minor_errors_heal_in_place() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);
    exec.sink_mut().clear();

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        clock.advance(2);
        outcomes.push(exec.report_error(ErrorLevel::Minor, ErrorCode::CommCorrupt));
        assert_eq!(exec.execute(), StateId::Idle);
    }
    assert_eq!(outcomes.last(), Some(&Disposition::Healed));
    assert!(exec.sink().contains(&CoreEvent::MinorHealed(ErrorCode::CommCorrupt)));
    assert!(exec.sink().transitions().is_empty());
    assert!(exec.current_error().is_none());
    assert_eq!(exec.history_len(), 5);
}

#[test]
fn recovery_timeout_is_fatal() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let config = CoreConfig {
        max_recovery_attempts: 200,
        ..CoreConfig::default()
    };
    let mut exec = make(&slot, &clock, config);
    boot(&mut exec, &clock);

    exec.report_error(ErrorLevel::Normal, ErrorCode::ResourceUnavailable);
    let mut state = tick(&mut exec, &clock);
    assert_eq!(state, StateId::Recovery);
    for _ in 0..30 {
        clock.advance(100);
        state = exec.execute();
        if state != StateId::Recovery {
            break;
        }
    }
    assert_eq!(state, StateId::CriticalError);
    assert!(exec.sink().contains(&CoreEvent::Transition {
        from: StateId::Recovery,
        to: StateId::CriticalError,
        event: Event::Timeout,
    }));
    assert!(exec.current_error().retry_count < 200);
}

fn explode<C: Clock, S: TelemetrySink>(core: &mut Core<'_, C, S>) {
    core.report_error(ErrorLevel::Critical, ErrorCode::HardwareFault);
}

#[test]
fn critical_from_callback_locks_executor() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    exec.set_state_callbacks(
        StateId::Active,
        StateCallbacks {
            on_state: Some(explode::<&ManualClock, RecordingSink>),
            ..StateCallbacks::NONE
        },
    );
    boot(&mut exec, &clock);

    slot.post(Event::Start).unwrap();
    assert_eq!(tick(&mut exec, &clock), StateId::Active);
    assert_eq!(tick(&mut exec, &clock), StateId::CriticalError);
    assert!(exec.is_critical_lock());
    assert_eq!(exec.previous_state(), StateId::Active);
    assert!(exec.sink().contains(&CoreEvent::CriticalLock(ErrorCode::HardwareFault)));

    let err = exec.current_error();
    assert_eq!(err.level, ErrorLevel::Critical);
    assert_eq!(err.state, StateId::Active);

    // Forced in, so CRITICAL_ERROR's entry never runs under the lock.
    tick(&mut exec, &clock);
    assert!(!exec
        .sink()
        .contains(&CoreEvent::StateEntered(StateId::CriticalError)));
}

#[test]
fn lock_survives_everything_but_init() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);

    exec.report_error(ErrorLevel::Critical, ErrorCode::MemoryCorruption);
    assert_eq!(tick(&mut exec, &clock), StateId::CriticalError);

    // The slot is not drained while locked: ERROR_CRITICAL stays queued and
    // every later post is rejected.
    assert_eq!(exec.pending_event(), Some(Event::ErrorCritical));
    for event in [Event::Start, Event::RecoverySuccess, Event::InitComplete] {
        assert_eq!(slot.post(event), Err(Error::QueueFull(event)));
        assert_eq!(tick(&mut exec, &clock), StateId::CriticalError);
    }
    assert_eq!(exec.pending_event(), Some(Event::ErrorCritical));
    assert_eq!(exec.reset(), Err(Error::CriticalLock));
    exec.clear_error();
    assert!(exec.is_critical_lock());

    // Later reports are recorded but change nothing.
    let before = exec.current_error();
    assert_eq!(
        exec.report_error(ErrorLevel::Normal, ErrorCode::Timeout),
        Disposition::Ignored
    );
    assert_eq!(exec.history_error(0).map(|e| e.code), Some(ErrorCode::Timeout));
    assert_eq!(exec.current_error(), before);
    assert_eq!(tick(&mut exec, &clock), StateId::CriticalError);

    exec.init().unwrap();
    assert!(!exec.is_critical_lock());
    assert_eq!(exec.current_state(), StateId::Init);
    assert_eq!(exec.history_len(), 0);
    assert_eq!(exec.stats().transitions, 0);
    assert_eq!(exec.pending_event(), None);
    boot(&mut exec, &clock);
}
