//! Stable exit codes for scriptrun CLI commands.
//!
//! `scriptrun run` otherwise forwards the script's own exit code.

/// Command succeeded.
pub const OK: i32 = 0;
/// Runner error (bad arguments, missing runtime, failed setup) or a script
/// killed by a signal.
pub const INVALID: i32 = 1;
/// The script exceeded its timeout and was killed.
pub const TIMEOUT: i32 = 124;
