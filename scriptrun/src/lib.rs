//! Script runtime resolution and invocation.
//!
//! Given a script, this crate works out which language runtime it needs, finds
//! a matching interpreter (or asks a configured installer for one) and runs the
//! script with arguments, environment, working directory and timeout. The
//! architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (language detection, version
//!   constraints, platform naming). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (processes, PATH search, runtime
//!   cache, config file, installers).
//!
//! [`runtimes`] wires the two together per language, and [`run`] implements the
//! CLI-facing orchestration (inline scripts, timeout and env parsing).

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
pub mod runtimes;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
