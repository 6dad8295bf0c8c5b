//! Core configuration parameters
//!
//! Capacities are compile-time constants (all storage is fixed-size).
//! Timing and threshold parameters live in [`CoreConfig`], which is fixed
//! once the executor is initialised.  A config may be handed to the core as
//! JSON or as a postcard blob; both paths validate before returning.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fsm::StateId;

/// Maximum number of `(event, next_state)` entries per state.
pub const MAX_TRANSITIONS_PER_STATE: usize = 6;

/// Capacity of the circular error history.
pub const ERROR_HISTORY_SIZE: usize = 16;

/// Per-state timeout in milliseconds.  `0` disables the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateTimeouts {
    pub init: u32,
    pub idle: u32,
    pub active: u32,
    pub processing: u32,
    pub communicating: u32,
    pub monitoring: u32,
    pub calibrating: u32,
    pub diagnostics: u32,
    pub recovery: u32,
    pub critical_error: u32,
}

impl Default for StateTimeouts {
    fn default() -> Self {
        Self {
            init: 5000,
            idle: 0,
            active: 0,
            processing: 3000,
            communicating: 100,
            monitoring: 0,
            calibrating: 5000,
            diagnostics: 2000,
            recovery: 2000,
            critical_error: 0,
        }
    }
}

impl StateTimeouts {
    pub fn get(&self, state: StateId) -> u32 {
        match state {
            StateId::Init => self.init,
            StateId::Idle => self.idle,
            StateId::Active => self.active,
            StateId::Processing => self.processing,
            StateId::Communicating => self.communicating,
            StateId::Monitoring => self.monitoring,
            StateId::Calibrating => self.calibrating,
            StateId::Diagnostics => self.diagnostics,
            StateId::Recovery => self.recovery,
            StateId::CriticalError => self.critical_error,
        }
    }
}

/// Runtime configuration of the executor and error handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    // --- Scheduling ---
    /// Period at which the host calls `execute()` (milliseconds).
    pub task_period_ms: u32,

    // --- Recovery ---
    /// Recovery attempts before a normal error escalates.
    pub max_recovery_attempts: u8,
    /// Window in which a minor error must self-heal (milliseconds).
    pub minor_error_timeout_ms: u32,
    /// Good observations needed inside the window to self-heal.
    pub minor_heal_count: u8,

    // --- Comm verification ---
    /// Good messages needed to consider the channel healthy.
    pub comm_verification_count: u8,
    /// Verification window (milliseconds).
    pub comm_verification_window_ms: u32,

    // --- Diagnostics ---
    /// Interval between status snapshots; `0` disables them.
    pub status_interval_ms: u32,

    // --- Timeouts ---
    pub state_timeouts: StateTimeouts,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            task_period_ms: 10,

            max_recovery_attempts: 3,
            minor_error_timeout_ms: 50,
            minor_heal_count: 3,

            comm_verification_count: 3,
            comm_verification_window_ms: 50,

            status_interval_ms: 1000,

            state_timeouts: StateTimeouts::default(),
        }
    }
}

impl CoreConfig {
    /// Reject values the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.task_period_ms == 0 {
            return Err(Error::Config("task_period_ms must be non-zero"));
        }
        if self.comm_verification_count == 0 {
            return Err(Error::Config("comm_verification_count must be non-zero"));
        }
        if self.minor_heal_count == 0 {
            return Err(Error::Config("minor_heal_count must be non-zero"));
        }
        if self.state_timeouts.critical_error != 0 {
            return Err(Error::Config("CRITICAL_ERROR cannot time out"));
        }
        if self.max_recovery_attempts == 0 {
            warn!("max_recovery_attempts is zero - no recovery will be attempted");
        }
        Ok(())
    }

    /// Parse and validate a JSON config.  Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|_| Error::Config("malformed JSON config"))?;
        config.validate()?;
        Ok(config)
    }

    /// Decode and validate a postcard-encoded config blob.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            postcard::from_bytes(bytes).map_err(|_| Error::Config("malformed config blob"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|_| Error::Config("config encode failed"))
    }
}
