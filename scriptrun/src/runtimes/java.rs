//! Java execution for `.jar`, `.java` and `.class` files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument};

use crate::core::language::{Language, script_extension};
use crate::core::platform::{Os, binary_name};
use crate::io::cache::RuntimeInfo;
use crate::io::path_search::{binary_exists, search_path};
use crate::io::process::run_process;
use crate::runtimes::{RunContext, RunOptions, RunResult, script_dir};

/// Run a Java program.
///
/// Sources are compiled into a private class directory that is removed after
/// the run, so the script's directory is never written to.
#[instrument(skip_all, fields(script = %script.display()))]
pub fn run_java(ctx: &RunContext<'_>, script: &Path, opts: &RunOptions) -> Result<RunResult> {
    let ext = script_extension(&script.to_string_lossy());
    match ext.as_deref() {
        Some(".jar") => {
            let runtime = ctx.resolve(Language::Java, opts)?;
            let spec = ctx
                .process(&runtime.path, opts)
                .arg("-jar")
                .arg(script)
                .args(&opts.args);
            info!(command = %spec.display_command(), "running jar");
            let output = run_process(&spec)?;
            Ok(RunResult::new(Language::Java, &runtime, &output))
        }
        Some(".java") => {
            let runtime = ctx.resolve(Language::Java, opts)?;
            let class_name = class_name(script)?;
            let classes = tempfile::Builder::new()
                .prefix("scriptrun-java-")
                .tempdir()
                .context("create class output directory")?;
            compile(ctx, &runtime, script, classes.path(), opts)?;
            run_class(ctx, &runtime, classes.path(), &class_name, opts)
        }
        Some(".class") => {
            let runtime = ctx.resolve(Language::Java, opts)?;
            let class_name = class_name(script)?;
            run_class(ctx, &runtime, &script_dir(script), &class_name, opts)
        }
        other => bail!(
            "unsupported Java file type: {} (expected .java, .jar or .class)",
            other.unwrap_or("(none)")
        ),
    }
}

fn class_name(script: &Path) -> Result<String> {
    script
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| anyhow!("cannot derive class name from {}", script.display()))
}

/// `javac` next to the detected `java`, else the first one on PATH.
fn find_javac(ctx: &RunContext<'_>, runtime: &RuntimeInfo) -> Result<PathBuf> {
    let sibling = runtime
        .path
        .with_file_name(binary_name("javac", Os::current()));
    if binary_exists(&sibling) {
        return Ok(sibling);
    }
    search_path("javac", ctx.path_override.as_ref()).context("javac not found next to java or in PATH")
}

fn compile(
    ctx: &RunContext<'_>,
    runtime: &RuntimeInfo,
    source: &Path,
    out_dir: &Path,
    opts: &RunOptions,
) -> Result<()> {
    let javac = find_javac(ctx, runtime)?;
    let spec = ctx
        .process(javac, opts)
        .arg("-d")
        .arg(out_dir)
        .arg(source);
    debug!(command = %spec.display_command(), "compiling java source");
    let output = run_process(&spec)?;
    if output.timed_out {
        bail!("{} timed out", spec.display_command());
    }
    if !output.status.success() {
        bail!("compilation failed: {}", output.stderr_lossy().trim());
    }
    Ok(())
}

fn run_class(
    ctx: &RunContext<'_>,
    runtime: &RuntimeInfo,
    class_path: &Path,
    class_name: &str,
    opts: &RunOptions,
) -> Result<RunResult> {
    let spec = ctx
        .process(&runtime.path, opts)
        .arg("-cp")
        .arg(class_path)
        .arg(class_name)
        .args(&opts.args);
    info!(command = %spec.display_command(), "running java class");
    let output = run_process(&spec)?;
    Ok(RunResult::new(Language::Java, runtime, &output))
}
