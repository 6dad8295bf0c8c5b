//! Fuzz target: executor driven by an arbitrary command stream
//!
//! Each input byte pair is decoded into one host-side command (post, raw
//! post, error report, good message, clock step, reset) followed by one
//! tick.  Asserts that the executor never panics and that the lock and
//! history invariants hold after every tick.  Locked ticks leave the slot
//! alone.
//!
//! cargo fuzz run fuzz_event_stream

#![no_main]

use libfuzzer_sys::fuzz_target;
use smcore::adapters::{ManualClock, NullSink};
use smcore::{CoreConfig, ErrorCode, ErrorLevel, Event, EventSlot, Executor, StateId};

fuzz_target!(|data: &[u8]| {
    let slot = EventSlot::new();
    let clock = ManualClock::new(u32::MAX - 1000);
    let Ok(mut exec) = Executor::new(&slot, &clock, NullSink, CoreConfig::default()) else {
        return;
    };

    for pair in data.chunks(2) {
        let op = pair[0];
        let arg = pair.get(1).copied().unwrap_or(0);

        match op % 6 {
            0 => {
                let _ = slot.post_raw(arg);
            }
            1 => {
                let event = Event::from_u8(arg % Event::COUNT as u8).unwrap_or(Event::Start);
                let _ = exec.post_event(event);
            }
            2 => {
                let level = ErrorLevel::from_u8(arg % 4).unwrap_or(ErrorLevel::Minor);
                let code = ErrorCode::from_u8(arg / 4 % 11).unwrap_or(ErrorCode::Timeout);
                exec.report_error(level, code);
            }
            3 => {
                exec.signal_good_message();
            }
            4 => clock.advance(u32::from(arg) * 10),
            _ => {
                let locked = exec.is_critical_lock();
                assert_eq!(exec.reset().is_err(), locked, "reset must fail iff locked");
            }
        }

        let locked = exec.is_critical_lock();
        let state = exec.execute();
        if locked {
            assert_eq!(state, StateId::CriticalError, "lock must force CRITICAL_ERROR");
        } else {
            assert!(exec.pending_event().is_none(), "tick must consume the slot");
        }
        assert!(exec.history_len() <= exec.history_capacity());
    }

    // A host re-init always recovers.
    exec.init().expect("canonical table builds");
    assert!(!exec.is_critical_lock());
    assert_eq!(exec.current_state(), StateId::Init);
});
