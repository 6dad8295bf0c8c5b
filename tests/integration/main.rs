//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one subsystem against
//! the mock platform.  All tests run on the host with the std-backed
//! critical-section implementation.

mod executor_tests;
mod mock_platform;
mod recovery_flow_tests;
