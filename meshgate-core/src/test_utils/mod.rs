//! Shared test utilities
//!
//! Used by the in-crate unit tests, the integration suites under
//! `tests/`, and the scenario harness binary.

mod fixtures;

pub use fixtures::{
    write_identity_files, MockTransport, RecordingWake, TestIdentity, TEST_PASSWORD,
};
