//! Tiered error handling.
//!
//! Reported faults are classified by severity:
//!
//! ```text
//!   MINOR ──(good comm inside window)──▶ healed, no state change
//!     │
//!     └──(window expires)──▶ NORMAL ──▶ ERROR_NORMAL ──▶ RECOVERY state
//!                                                          │
//!                       attempt_recovery() ok ◀────────────┤
//!                       retries exhausted ─▶ RECOVERY_FAILED ─▶ CRITICAL_ERROR
//!
//!   CRITICAL ──▶ sticky lock + ERROR_CRITICAL ──▶ CRITICAL_ERROR (terminal)
//! ```
//!
//! The handler is pure logic: it never touches the event slot itself.
//! [`ErrorHandler::report`] returns a [`Disposition`] and the caller posts
//! the event it names, so the handler can be unit-tested without an
//! executor.

pub mod history;

use core::fmt;
use core::str::FromStr;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::comm::CommVerifier;
use crate::config::{CoreConfig, ERROR_HISTORY_SIZE};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::fsm::StateId;
use crate::time::elapsed_ms;

pub use history::ErrorHistory;

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// Severity of a reported fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorLevel {
    None = 0,
    /// Transient; may self-heal without a state change.
    Minor = 1,
    /// Needs managed recovery through the RECOVERY state.
    Normal = 2,
    /// Unsafe; sets the sticky lock.
    Critical = 3,
}

impl ErrorLevel {
    pub const COUNT: usize = 4;

    pub const ALL: [ErrorLevel; Self::COUNT] =
        [Self::None, Self::Minor, Self::Normal, Self::Critical];

    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Minor => "MINOR",
            Self::Normal => "NORMAL",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.name().eq_ignore_ascii_case(s))
            .ok_or(Error::UnknownName("error level"))
    }
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    None = 0,
    Timeout = 1,
    CommLost = 2,
    CommCorrupt = 3,
    InvalidData = 4,
    BufferOverflow = 5,
    ResourceUnavailable = 6,
    CalibrationFailed = 7,
    HardwareFault = 8,
    WatchdogReset = 9,
    MemoryCorruption = 10,
}

impl ErrorCode {
    pub const COUNT: usize = 11;

    pub const ALL: [ErrorCode; Self::COUNT] = [
        Self::None,
        Self::Timeout,
        Self::CommLost,
        Self::CommCorrupt,
        Self::InvalidData,
        Self::BufferOverflow,
        Self::ResourceUnavailable,
        Self::CalibrationFailed,
        Self::HardwareFault,
        Self::WatchdogReset,
        Self::MemoryCorruption,
    ];

    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Timeout => "TIMEOUT",
            Self::CommLost => "COMM_LOST",
            Self::CommCorrupt => "COMM_CORRUPT",
            Self::InvalidData => "INVALID_DATA",
            Self::BufferOverflow => "BUFFER_OVERFLOW",
            Self::ResourceUnavailable => "RESOURCE_UNAVAILABLE",
            Self::CalibrationFailed => "CALIBRATION_FAILED",
            Self::HardwareFault => "HARDWARE_FAULT",
            Self::WatchdogReset => "WATCHDOG_RESET",
            Self::MemoryCorruption => "MEMORY_CORRUPTION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or(Error::UnknownName("error code"))
    }
}

/// One fault record.  History entries are immutable snapshots; the
/// handler's current error evolves across recovery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub level: ErrorLevel,
    pub code: ErrorCode,
    pub timestamp_ms: u32,
    /// State the executor was in when the fault was reported.
    pub state: StateId,
    pub retry_count: u8,
    pub recovered: bool,
}

impl ErrorInfo {
    pub const NONE: Self = Self {
        level: ErrorLevel::None,
        code: ErrorCode::None,
        timestamp_ms: 0,
        state: StateId::Init,
        retry_count: 0,
        recovered: false,
    };

    pub fn is_none(&self) -> bool {
        self.level == ErrorLevel::None
    }
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self::NONE
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of [`ErrorHandler::report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Level `None`, or the lock was already set.
    Ignored,
    /// Minor error inside its window, not yet healed.
    Monitoring,
    /// Minor error self-healed; no event.
    Healed,
    /// Normal error recorded; post `ERROR_NORMAL`.
    Recovery,
    /// Minor window expired and the error was promoted to normal.
    Escalated,
    /// Critical error; lock set, post `ERROR_CRITICAL`.
    Locked,
}

impl Disposition {
    /// Event the caller must post for this outcome.
    pub const fn event(self) -> Option<Event> {
        match self {
            Self::Recovery | Self::Escalated => Some(Event::ErrorNormal),
            Self::Locked => Some(Event::ErrorCritical),
            Self::Ignored | Self::Monitoring | Self::Healed => None,
        }
    }
}

/// Result of [`ErrorHandler::attempt_recovery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryOutcome {
    Recovered,
    /// This attempt failed; retries remain.
    Failed,
    /// Retry budget used up.
    Exhausted,
}

impl RecoveryOutcome {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Recovered)
    }
}

impl fmt::Display for RecoveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Recovered => "recovered",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
        })
    }
}

/// Custom recovery strategy for one error code.  Returns `true` on success.
pub type RecoveryFn = fn(ErrorCode) -> bool;

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Classifies faults, tracks the current error, and drives recovery.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    current: ErrorInfo,
    history: ErrorHistory<ERROR_HISTORY_SIZE>,

    /// Start of the minor-error heal window; `None` when no window is open.
    minor_window_start: Option<u32>,
    minor_good_count: u8,

    /// Sticky.  Only [`ErrorHandler::init`] clears it.
    critical_lock: bool,

    comm: CommVerifier,
    handlers: [Option<RecoveryFn>; ErrorCode::COUNT],

    max_recovery_attempts: u8,
    minor_error_timeout_ms: u32,
    minor_heal_count: u8,
}

impl ErrorHandler {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            current: ErrorInfo::NONE,
            history: ErrorHistory::new(),
            minor_window_start: None,
            minor_good_count: 0,
            critical_lock: false,
            comm: CommVerifier::from_config(config),
            handlers: [None; ErrorCode::COUNT],
            max_recovery_attempts: config.max_recovery_attempts,
            minor_error_timeout_ms: config.minor_error_timeout_ms,
            minor_heal_count: config.minor_heal_count,
        }
    }

    /// Host-level reset: forget everything, including the critical lock and
    /// registered recovery handlers.
    pub fn init(&mut self, config: &CoreConfig) {
        *self = Self::new(config);
    }

    /// Record a fault and decide what happens next.
    ///
    /// The fault is always appended to the history.  While the lock is set
    /// the current error is left untouched and `Ignored` is returned.
    pub fn report(
        &mut self,
        level: ErrorLevel,
        code: ErrorCode,
        now_ms: u32,
        state: StateId,
    ) -> Disposition {
        self.history.push(ErrorInfo {
            level,
            code,
            timestamp_ms: now_ms,
            state,
            retry_count: 0,
            recovered: false,
        });

        if self.critical_lock {
            debug!("error {code} ({level}) reported while locked");
            return Disposition::Ignored;
        }

        match level {
            ErrorLevel::None => Disposition::Ignored,
            ErrorLevel::Minor => self.handle_minor(code, now_ms, state),
            ErrorLevel::Normal => {
                self.handle_normal(code, now_ms, state);
                Disposition::Recovery
            }
            ErrorLevel::Critical => {
                self.handle_critical(code, now_ms, state);
                Disposition::Locked
            }
        }
    }

    fn handle_minor(&mut self, code: ErrorCode, now_ms: u32, state: StateId) -> Disposition {
        let start = match self.minor_window_start {
            Some(start) => start,
            None => {
                self.minor_window_start = Some(now_ms);
                self.minor_good_count = 0;
                now_ms
            }
        };

        if elapsed_ms(start, now_ms) > self.minor_error_timeout_ms {
            warn!("minor error {code} not healed in {}ms, escalating", self.minor_error_timeout_ms);
            self.close_minor_window();
            self.handle_normal(code, now_ms, state);
            return Disposition::Escalated;
        }

        if self.comm.observe(now_ms) {
            self.minor_good_count = self.minor_good_count.saturating_add(1);
            if self.minor_good_count >= self.minor_heal_count {
                info!("minor error {code} self-healed");
                self.close_minor_window();
                return Disposition::Healed;
            }
        }
        Disposition::Monitoring
    }

    fn handle_normal(&mut self, code: ErrorCode, now_ms: u32, state: StateId) {
        warn!("normal error {code} in {state}");
        self.current = ErrorInfo {
            level: ErrorLevel::Normal,
            code,
            timestamp_ms: now_ms,
            state,
            retry_count: 0,
            recovered: false,
        };
    }

    fn handle_critical(&mut self, code: ErrorCode, now_ms: u32, state: StateId) {
        log::error!("CRITICAL error {code} in {state}, locking");
        self.current = ErrorInfo {
            level: ErrorLevel::Critical,
            code,
            timestamp_ms: now_ms,
            state,
            retry_count: 0,
            recovered: false,
        };
        self.critical_lock = true;
    }

    fn close_minor_window(&mut self) {
        self.minor_window_start = None;
        self.minor_good_count = 0;
    }

    /// One bounded recovery attempt for the current error.
    pub fn attempt_recovery(&mut self, now_ms: u32) -> RecoveryOutcome {
        if self.current.is_none() {
            return RecoveryOutcome::Recovered;
        }

        self.current.retry_count = self.current.retry_count.saturating_add(1);
        if self.current.retry_count >= self.max_recovery_attempts {
            warn!(
                "recovery of {} exhausted after {} attempts",
                self.current.code, self.current.retry_count
            );
            return RecoveryOutcome::Exhausted;
        }

        let code = self.current.code;
        let ok = match self.handlers[code as usize] {
            Some(handler) => handler(code),
            None => self.default_strategy(code, now_ms),
        };

        if ok {
            self.current.recovered = true;
            RecoveryOutcome::Recovered
        } else {
            debug!("recovery attempt {} for {code} failed", self.current.retry_count);
            RecoveryOutcome::Failed
        }
    }

    fn default_strategy(&mut self, code: ErrorCode, now_ms: u32) -> bool {
        match code {
            ErrorCode::CommLost => self.comm.observe(now_ms),
            ErrorCode::Timeout => true,
            _ => false,
        }
    }

    /// Drop the current error.  Leaves the critical lock alone.
    pub fn clear_error(&mut self) {
        self.current = ErrorInfo::NONE;
    }

    /// Install (or with `None`, remove) a custom strategy for `code`.
    /// Returns the handler it replaced.
    pub fn register_recovery_handler(
        &mut self,
        code: ErrorCode,
        handler: Option<RecoveryFn>,
    ) -> Option<RecoveryFn> {
        core::mem::replace(&mut self.handlers[code as usize], handler)
    }

    /// Feed one good observation into the shared comm verifier.
    pub fn verify_comm_channel(&mut self, now_ms: u32) -> bool {
        self.comm.observe(now_ms)
    }

    pub fn comm(&self) -> &CommVerifier {
        &self.comm
    }

    // -- Queries --

    pub fn current_error(&self) -> ErrorInfo {
        self.current
    }

    pub fn is_critical_lock(&self) -> bool {
        self.critical_lock
    }

    /// History record at `age` (0 = most recent).
    pub fn history_error(&self, age: usize) -> Option<ErrorInfo> {
        self.history.get(age)
    }

    /// Number of valid history records (never more than the capacity).
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.history.capacity()
    }

    pub fn history(&self) -> &ErrorHistory<ERROR_HISTORY_SIZE> {
        &self.history
    }

    pub fn minor_window_open(&self) -> bool {
        self.minor_window_start.is_some()
    }
}
