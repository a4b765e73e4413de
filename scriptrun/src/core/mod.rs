//! Deterministic, pure logic shared by the script runner.
//!
//! Core modules must be free of I/O side effects. They operate on strings and
//! paths handed to them and return deterministic outputs suitable for tests.

pub mod language;
pub mod platform;
pub mod version;
