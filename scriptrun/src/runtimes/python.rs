//! Python script execution.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::language::Language;
use crate::io::deps::install_python_dependencies;
use crate::io::process::run_process;
use crate::runtimes::{RunContext, RunOptions, RunResult, script_dir};

/// Run a Python script, installing `requirements.txt` first when present.
#[instrument(skip_all, fields(script = %script.display()))]
pub fn run_python(ctx: &RunContext<'_>, script: &Path, opts: &RunOptions) -> Result<RunResult> {
    let runtime = ctx.resolve(Language::Python, opts)?;

    install_python_dependencies(&script_dir(script), &ctx.deps_request(opts))
        .context("failed to install Python dependencies")?;

    let spec = ctx
        .process(&runtime.path, opts)
        .arg(script)
        .args(&opts.args);
    info!(runtime = %runtime.path.display(), version = %runtime.version, "running python script");
    let output = run_process(&spec)?;
    Ok(RunResult::new(Language::Python, &runtime, &output))
}
