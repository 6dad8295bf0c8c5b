//! smcore: cooperative state-machine executor with tiered error recovery.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    Host (outer ring)                          │
//! │  tick timer ──▶ Executor::execute()   ISR/thread ──▶ EventSlot│
//! │  comm layer ──▶ signal_good_message()                         │
//! │                                                               │
//! │  ──────────── Capability boundary (Clock, TelemetrySink) ──── │
//! │                                                               │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │  Executor ◀──events── ErrorHandler ──▶ CommVerifier      │  │
//! │  │  (table, context)      (history, lock)  (window verifier)│  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core performs no I/O and holds no global state.  Every executor owns
//! its context; the only cross-context entry point is [`EventSlot::post`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod comm;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod fsm;
pub mod recovery;
pub mod telemetry;
pub mod time;

pub use config::CoreConfig;
pub use error::{Error, Result};
pub use events::{Event, EventSlot};
pub use fsm::{Executor, StateId};
pub use recovery::{Disposition, ErrorCode, ErrorInfo, ErrorLevel, RecoveryOutcome};
pub use telemetry::{CoreEvent, TelemetrySink};
pub use time::Clock;
