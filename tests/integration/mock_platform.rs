//! Mock platform for integration tests.
//!
//! Records every telemetry notification so tests can assert on the full
//! history, and wraps the boilerplate of ticking an executor against a
//! manual clock.

use smcore::adapters::ManualClock;
use smcore::fsm::Executor;
use smcore::telemetry::{CoreEvent, TelemetrySink};
use smcore::{Event, StateId};

/// Milliseconds the manual clock advances per tick.
pub const TICK_MS: u32 = 10;

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<CoreEvent>,
}

impl TelemetrySink for RecordingSink {
    fn emit(&mut self, event: &CoreEvent) {
        self.events.push(*event);
    }
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table-driven transitions, in order.
    pub fn transitions(&self) -> Vec<(StateId, StateId, Event)> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                CoreEvent::Transition { from, to, event } => Some((from, to, event)),
                _ => None,
            })
            .collect()
    }

    /// States whose `on_entry` ran, in order.
    pub fn entered(&self) -> Vec<StateId> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                CoreEvent::StateEntered(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Events taken out of the slot (matched or not).
    pub fn consumed(&self) -> usize {
        self.count(|e| {
            matches!(
                e,
                CoreEvent::Transition { .. } | CoreEvent::EventDropped { .. }
            )
        })
    }

    pub fn count(&self, pred: impl Fn(&CoreEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn contains(&self, event: &CoreEvent) -> bool {
        self.events.contains(event)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

// ── Executor helpers ──────────────────────────────────────────

pub type TestExecutor<'q> = Executor<'q, &'q ManualClock, RecordingSink>;

/// Advance the clock one period and run one tick.
pub fn tick(exec: &mut TestExecutor<'_>, clock: &ManualClock) -> StateId {
    clock.advance(TICK_MS);
    exec.execute()
}

/// Tick until the state differs from `state` or `max` ticks pass.
#[allow(dead_code)]
pub fn tick_while(
    exec: &mut TestExecutor<'_>,
    clock: &ManualClock,
    state: StateId,
    max: usize,
) -> StateId {
    for _ in 0..max {
        if tick(exec, clock) != state {
            break;
        }
    }
    exec.current_state()
}

/// Tick through INIT into IDLE.
pub fn boot(exec: &mut TestExecutor<'_>, clock: &ManualClock) {
    let state = tick_while(exec, clock, StateId::Init, 20);
    assert_eq!(state, StateId::Idle, "INIT did not complete");
}
