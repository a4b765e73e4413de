//! Per-language script execution.
//!
//! Each runner resolves its interpreter through [`RunContext::resolve`]
//! (detection, constraint check, optional install), prepares the script
//! (dependency install, compilation) and launches it with the caller's
//! arguments, working directory, environment and timeout.

pub mod java;
pub mod node;
pub mod powershell;
pub mod python;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::language::Language;
use crate::io::cache::{RuntimeCache, RuntimeInfo};
use crate::io::config::ScriptrunConfig;
use crate::io::deps::DepsRequest;
use crate::io::detector::RuntimeDetector;
use crate::io::installer::RuntimeInstaller;
use crate::io::process::{CommandOutput, ProcessSpec};

/// Caller-controlled parameters of one script run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Version constraint (`>=3.9`, `18`, `latest`); any version when `None`.
    pub version: Option<String>,
    pub timeout: Option<Duration>,
    pub working_dir: Option<PathBuf>,
    /// Variables layered over the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Positional arguments passed to the script.
    pub args: Vec<String>,
    /// `Some(true)` forces dependency install, `Some(false)` skips it,
    /// `None` installs only when a manifest sits next to the script.
    pub install_deps: Option<bool>,
}

/// Outcome of a script run: captured output plus the runtime that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub language: Language,
    pub runtime_path: PathBuf,
    pub runtime_version: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Lossy UTF-8 rendering of `stdout_bytes`.
    pub stdout: String,
    pub stderr: String,
    /// Output exactly as the script wrote it.
    #[serde(skip)]
    pub stdout_bytes: Vec<u8>,
    #[serde(skip)]
    pub stderr_bytes: Vec<u8>,
}

impl RunResult {
    pub fn new(language: Language, info: &RuntimeInfo, output: &CommandOutput) -> Self {
        Self {
            language,
            runtime_path: info.path.clone(),
            runtime_version: info.version.clone(),
            exit_code: output.status.code(),
            timed_out: output.timed_out,
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
            stdout_bytes: output.stdout.clone(),
            stderr_bytes: output.stderr.clone(),
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Shared collaborators for runtime resolution and execution.
pub struct RunContext<'a> {
    pub config: &'a ScriptrunConfig,
    pub cache: &'a RuntimeCache,
    pub installer: &'a dyn RuntimeInstaller,
    /// Searched instead of the process `PATH` when set.
    pub path_override: Option<OsString>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a ScriptrunConfig,
        cache: &'a RuntimeCache,
        installer: &'a dyn RuntimeInstaller,
    ) -> Self {
        Self {
            config,
            cache,
            installer,
            path_override: None,
        }
    }

    pub fn with_path(mut self, path: Option<OsString>) -> Self {
        self.path_override = path;
        self
    }

    pub fn detector(&self, language: Language) -> RuntimeDetector {
        RuntimeDetector::new(language, self.config.binary_variants(language))
            .with_path(self.path_override.clone())
    }

    /// Find (or install) an interpreter that satisfies `opts.version`.
    pub fn resolve(&self, language: Language, opts: &RunOptions) -> Result<RuntimeInfo> {
        self.detector(language)
            .find_or_install(opts.version.as_deref(), self.cache, self.installer)
            .with_context(|| format!("failed to setup {} runtime", language.display_name()))
    }

    pub fn deps_request<'o>(&'o self, opts: &'o RunOptions) -> DepsRequest<'o> {
        DepsRequest {
            install_deps: opts.install_deps,
            working_dir: opts.working_dir.as_deref(),
            timeout: opts.timeout,
            path_override: self.path_override.as_ref(),
        }
    }

    /// Process spec for `program` with the run's cwd, env, timeout and limits.
    pub fn process(&self, program: impl Into<PathBuf>, opts: &RunOptions) -> ProcessSpec {
        ProcessSpec::new(program)
            .cwd(opts.working_dir.clone())
            .envs(&opts.env)
            .timeout(opts.timeout)
            .output_limit(self.config.output_limit_bytes)
    }
}

/// Run `script` with the runtime for `language`.
pub fn run_script(
    ctx: &RunContext<'_>,
    language: Language,
    script: &Path,
    opts: &RunOptions,
) -> Result<RunResult> {
    match language {
        Language::Python => python::run_python(ctx, script, opts),
        Language::Node => node::run_node(ctx, script, opts),
        Language::Java => java::run_java(ctx, script, opts),
        Language::Powershell => powershell::run_powershell(ctx, script, opts),
    }
}

/// Directory containing `script`, `.` for bare file names.
pub(crate) fn script_dir(script: &Path) -> PathBuf {
    match script.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
