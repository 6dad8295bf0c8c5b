//! Fuzz target: `CoreConfig::decode` / `CoreConfig::from_json`
//!
//! Arbitrary bytes must either be rejected with an error or produce a
//! config that passes validation and can drive an executor.
//!
//! cargo fuzz run fuzz_config_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use smcore::adapters::{ManualClock, NullSink};
use smcore::{CoreConfig, EventSlot, Executor};

fuzz_target!(|data: &[u8]| {
    let mut decoded = Vec::new();
    if let Ok(config) = CoreConfig::decode(data) {
        decoded.push(config);
    }
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(config) = CoreConfig::from_json(text) {
            decoded.push(config);
        }
    }

    for config in decoded {
        assert!(config.validate().is_ok(), "decoded config must be valid");

        let slot = EventSlot::new();
        let clock = ManualClock::new(0);
        let mut exec = Executor::new(&slot, &clock, NullSink, config)
            .expect("validated config builds an executor");
        for _ in 0..32 {
            exec.execute();
            clock.advance(exec.config().task_period_ms);
        }
    }
});
