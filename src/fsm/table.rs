//! Transition table: one row per state.
//!
//! ```text
//! ┌────────────────┬────────────────────────────┬──────────────────────────┬─────────┐
//! │ StateId        │ callbacks                  │ transitions (ordered)    │ timeout │
//! ├────────────────┼────────────────────────────┼──────────────────────────┼─────────┤
//! │ Init           │ entry / state / exit fn    │ [(INIT_COMPLETE, Idle),…]│ 5000 ms │
//! │ …              │ …                          │ …                        │ …       │
//! │ CriticalError  │ entry / state / exit fn    │ []                       │ 0       │
//! └────────────────┴────────────────────────────┴──────────────────────────┴─────────┘
//! ```
//!
//! Transition lists are bounded and ordered; lookup returns the first entry
//! whose event matches.

use heapless::Vec;

use super::context::Core;
use super::StateId;
use crate::config::MAX_TRANSITIONS_PER_STATE;
use crate::error::{Error, Result};
use crate::events::Event;

/// One `(event, next_state)` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub event: Event,
    pub next: StateId,
}

/// Signature of every state callback.  Callbacks get the executor's
/// [`Core`] and may post events, report errors, or drive recovery.
pub type StateFn<C, S> = for<'a, 'q> fn(&'a mut Core<'q, C, S>);

/// `on_entry` / `on_state` / `on_exit` handles for one state.
pub struct StateCallbacks<C, S> {
    pub on_entry: Option<StateFn<C, S>>,
    pub on_state: Option<StateFn<C, S>>,
    pub on_exit: Option<StateFn<C, S>>,
}

impl<C, S> StateCallbacks<C, S> {
    pub const NONE: Self = Self {
        on_entry: None,
        on_state: None,
        on_exit: None,
    };
}

impl<C, S> Clone for StateCallbacks<C, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, S> Copy for StateCallbacks<C, S> {}

impl<C, S> Default for StateCallbacks<C, S> {
    fn default() -> Self {
        Self::NONE
    }
}

/// Everything the executor knows about one state.
pub struct StateConfig<C, S> {
    pub callbacks: StateCallbacks<C, S>,
    transitions: Vec<Transition, MAX_TRANSITIONS_PER_STATE>,
    /// `0` disables the timeout.
    pub timeout_ms: u32,
}

impl<C, S> StateConfig<C, S> {
    pub fn new() -> Self {
        Self {
            callbacks: StateCallbacks::NONE,
            transitions: Vec::new(),
            timeout_ms: 0,
        }
    }

    /// First transition matching `event`.
    pub fn next_state(&self, event: Event) -> Option<StateId> {
        self.transitions
            .iter()
            .find(|t| t.event == event)
            .map(|t| t.next)
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }
}

impl<C, S> Default for StateConfig<C, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-size table indexed by `StateId as usize`.
pub struct StateTable<C, S> {
    states: [StateConfig<C, S>; StateId::COUNT],
}

impl<C, S> Default for StateTable<C, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, S> StateTable<C, S> {
    /// Empty table: no callbacks, no transitions, no timeouts.
    pub fn new() -> Self {
        Self {
            states: core::array::from_fn(|_| StateConfig::new()),
        }
    }

    pub fn get(&self, state: StateId) -> &StateConfig<C, S> {
        &self.states[state as usize]
    }

    /// Append `(event, next)` to `state`'s list.
    ///
    /// Duplicates are accepted; the earlier entry keeps winning.
    pub fn add_transition(&mut self, state: StateId, event: Event, next: StateId) -> Result<()> {
        if event.is_none() {
            return Err(Error::InvalidEvent(event as u8));
        }
        self.states[state as usize]
            .transitions
            .push(Transition { event, next })
            .map_err(|_| Error::TransitionTableFull(state))
    }

    pub fn set_timeout(&mut self, state: StateId, timeout_ms: u32) {
        self.states[state as usize].timeout_ms = timeout_ms;
    }

    pub fn set_callbacks(&mut self, state: StateId, callbacks: StateCallbacks<C, S>) {
        self.states[state as usize].callbacks = callbacks;
    }

    pub fn callbacks(&self, state: StateId) -> StateCallbacks<C, S> {
        self.states[state as usize].callbacks
    }

    pub fn timeout(&self, state: StateId) -> u32 {
        self.states[state as usize].timeout_ms
    }

    pub fn lookup(&self, state: StateId, event: Event) -> Option<StateId> {
        self.states[state as usize].next_state(event)
    }
}
