//! End-to-end executor flows over the canonical table.

use smcore::adapters::ManualClock;
use smcore::fsm::Executor;
use smcore::fsm::states::{COMM_CYCLES, PROCESSING_CYCLES};
use smcore::telemetry::CoreEvent;
use smcore::{CoreConfig, Event, EventSlot, StateId};

use crate::mock_platform::{RecordingSink, TestExecutor, boot, tick, tick_while};

fn make<'q>(slot: &'q EventSlot, clock: &'q ManualClock, config: CoreConfig) -> TestExecutor<'q> {
    Executor::new(slot, clock, RecordingSink::new(), config).unwrap()
}

#[test]
fn full_operational_cycle() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut config = CoreConfig::default();
    config.state_timeouts.communicating = 500;
    let mut exec = make(&slot, &clock, config);

    boot(&mut exec, &clock);

    slot.post(Event::Start).unwrap();
    assert_eq!(tick(&mut exec, &clock), StateId::Active);

    slot.post(Event::DataReady).unwrap();
    assert_eq!(tick(&mut exec, &clock), StateId::Processing);

    let n = PROCESSING_CYCLES as usize + 5;
    assert_eq!(
        tick_while(&mut exec, &clock, StateId::Processing, n),
        StateId::Communicating
    );

    let n = COMM_CYCLES as usize + 10;
    assert_eq!(
        tick_while(&mut exec, &clock, StateId::Communicating, n),
        StateId::Monitoring
    );

    slot.post(Event::Stop).unwrap();
    assert_eq!(tick(&mut exec, &clock), StateId::Idle);

    let path: Vec<_> = exec.sink().transitions();
    assert_eq!(
        path,
        vec![
            (StateId::Init, StateId::Idle, Event::InitComplete),
            (StateId::Idle, StateId::Active, Event::Start),
            (StateId::Active, StateId::Processing, Event::DataReady),
            (StateId::Processing, StateId::Communicating, Event::ProcessingDone),
            (StateId::Communicating, StateId::Monitoring, Event::CommComplete),
            (StateId::Monitoring, StateId::Idle, Event::Stop),
        ]
    );
    assert_eq!(exec.stats().transitions, 6);
    assert_eq!(exec.stats().timeouts, 0);
}

#[test]
fn processing_takes_configured_cycles() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);
    slot.post(Event::Start).unwrap();
    tick(&mut exec, &clock);
    slot.post(Event::DataReady).unwrap();
    tick(&mut exec, &clock);

    // PROCESSING_DONE is posted on the tick after PROCESSING_CYCLES ticks.
    for _ in 0..PROCESSING_CYCLES {
        assert_eq!(tick(&mut exec, &clock), StateId::Processing);
    }
    assert_eq!(tick(&mut exec, &clock), StateId::Communicating);
}

#[test]
fn monitoring_loops_back_to_processing() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut config = CoreConfig::default();
    config.state_timeouts.communicating = 500;
    let mut exec = make(&slot, &clock, config);
    boot(&mut exec, &clock);
    slot.post(Event::Start).unwrap();
    tick(&mut exec, &clock);
    slot.post(Event::DataReady).unwrap();
    tick(&mut exec, &clock);
    tick_while(&mut exec, &clock, StateId::Processing, 50);
    tick_while(&mut exec, &clock, StateId::Communicating, 50);
    assert_eq!(exec.current_state(), StateId::Monitoring);

    slot.post(Event::DataReady).unwrap();
    assert_eq!(tick(&mut exec, &clock), StateId::Processing);
    assert_eq!(exec.previous_state(), StateId::Monitoring);
}

#[test]
fn communicating_times_out_without_healthy_channel() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut config = CoreConfig::default();
    // A window that can never fill.
    config.comm_verification_count = 200;
    let mut exec = make(&slot, &clock, config);
    boot(&mut exec, &clock);
    slot.post(Event::Start).unwrap();
    tick(&mut exec, &clock);
    slot.post(Event::DataReady).unwrap();
    tick(&mut exec, &clock);
    tick_while(&mut exec, &clock, StateId::Processing, 50);
    assert_eq!(exec.current_state(), StateId::Communicating);

    assert_eq!(
        tick_while(&mut exec, &clock, StateId::Communicating, 50),
        StateId::Recovery
    );
    assert!(exec.sink().count(|e| matches!(
        e,
        CoreEvent::TimeoutFired {
            state: StateId::Communicating,
            ..
        }
    )) >= 1);

    // No current error, so recovery succeeds straight away.
    assert_eq!(tick(&mut exec, &clock), StateId::Idle);
}

#[test]
fn init_timeout_goes_to_recovery() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    // Stall INIT: no callbacks means INIT_COMPLETE never comes.
    exec.set_state_callbacks(StateId::Init, smcore::fsm::StateCallbacks::NONE);

    exec.execute();
    clock.advance(4999);
    assert_eq!(exec.execute(), StateId::Init);
    clock.advance(1);
    assert_eq!(exec.execute(), StateId::Recovery);
}

#[test]
fn timeout_across_clock_wrap() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0xFFFF_FFF0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    exec.set_state_callbacks(StateId::Init, smcore::fsm::StateCallbacks::NONE);
    exec.set_state_timeout(StateId::Init, 32);

    exec.execute(); // entry at 0xFFFF_FFF0
    clock.set(0x0F);
    assert_eq!(exec.execute(), StateId::Init);
    clock.set(0x10);
    assert_eq!(exec.execute(), StateId::Recovery);
}

#[test]
fn unmatched_events_along_primary_path_are_dropped() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    for state in StateId::ALL {
        exec.set_state_callbacks(state, smcore::fsm::StateCallbacks::NONE);
        exec.set_state_timeout(state, 0);
    }
    // Walk the primary path with no-callback ticks and poke each state with an
    // event it has no edge for.
    let route = [
        (Event::InitComplete, StateId::Idle),
        (Event::Start, StateId::Active),
        (Event::DataReady, StateId::Processing),
        (Event::ProcessingDone, StateId::Communicating),
        (Event::CommComplete, StateId::Monitoring),
    ];
    for (advance, expected) in route {
        let here = exec.current_state();
        for stray in [Event::RecoverySuccess, Event::CommRequest] {
            slot.post(stray).unwrap();
            assert_eq!(exec.execute(), here, "{stray} moved {here}");
            assert_eq!(slot.peek(), None);
        }
        slot.post(advance).unwrap();
        assert_eq!(exec.execute(), expected);
    }
}

#[test]
fn current_state_query_is_idempotent() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);
    slot.post(Event::Start).unwrap();
    let a = exec.current_state();
    let b = exec.current_state();
    assert_eq!(a, b);
    assert_eq!(a, StateId::Idle);
}

#[test]
fn periodic_status_is_emitted() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut config = CoreConfig::default();
    config.status_interval_ms = 100;
    let mut exec = make(&slot, &clock, config);
    for _ in 0..50 {
        tick(&mut exec, &clock);
    }
    let statuses = exec
        .sink()
        .count(|e| matches!(e, CoreEvent::Status(_)));
    // 500 ms of ticks, first call only arms the timer.
    assert!((4..=5).contains(&statuses), "got {statuses}");

    let snap = exec.snapshot();
    assert_eq!(snap.state, StateId::Idle);
    assert!(!snap.critical_lock);
}

#[test]
fn stats_count_entries_and_reset() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    boot(&mut exec, &clock);
    slot.post(Event::Start).unwrap();
    tick(&mut exec, &clock);
    slot.post(Event::Stop).unwrap();
    tick(&mut exec, &clock);
    tick(&mut exec, &clock);

    let stats = exec.stats();
    assert_eq!(stats.entries(StateId::Init), 1);
    assert_eq!(stats.entries(StateId::Idle), 2);
    assert_eq!(stats.entries(StateId::Active), 1);
    assert_eq!(stats.transitions, 3);
    // INIT_COMPLETE + START + STOP.
    assert_eq!(stats.events_posted, 3);

    exec.reset_stats();
    assert_eq!(exec.stats(), smcore::diagnostics::Stats::default());
}

#[test]
fn transition_table_capacity_reported() {
    let slot = EventSlot::new();
    let clock = ManualClock::new(0);
    let mut exec = make(&slot, &clock, CoreConfig::default());
    let mut added = 0;
    while exec
        .add_transition(StateId::Monitoring, Event::CommRequest, StateId::Active)
        .is_ok()
    {
        added += 1;
        assert!(added <= smcore::config::MAX_TRANSITIONS_PER_STATE);
    }
    assert_eq!(
        exec.add_transition(StateId::Monitoring, Event::CommRequest, StateId::Active),
        Err(smcore::Error::TransitionTableFull(StateId::Monitoring))
    );
    assert_eq!(
        exec.table().get(StateId::Monitoring).transitions().len(),
        smcore::config::MAX_TRANSITIONS_PER_STATE
    );
}
