//! Adapters: concrete implementations of the core's capability traits.
//!
//! | Adapter        | Implements      | Connects to                  |
//! |----------------|-----------------|------------------------------|
//! | `clock`        | Clock           | Manual test time / `Instant` |
//! | `log_sink`     | TelemetrySink   | `log` macros                 |
//! |                | TelemetrySink   | nowhere (`NullSink`)         |
//! | `console_log`  | `log::Log`      | stderr                       |
//!
//! The critical-section capability is not an adapter here: the host links
//! a `critical-section` implementation (`std` feature on host targets).

pub mod clock;
#[cfg(feature = "std")]
pub mod console_log;
pub mod log_sink;

pub use clock::ManualClock;
#[cfg(feature = "std")]
pub use clock::SystemClock;
pub use log_sink::{LogSink, NullSink};
