//! PowerShell script execution.

use std::path::Path;

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::language::Language;
use crate::io::process::run_process;
use crate::runtimes::{RunContext, RunOptions, RunResult};

/// Run a `.ps1` script with `pwsh -NoProfile -File`.
#[instrument(skip_all, fields(script = %script.display()))]
pub fn run_powershell(
    ctx: &RunContext<'_>,
    script: &Path,
    opts: &RunOptions,
) -> Result<RunResult> {
    let runtime = ctx.resolve(Language::Powershell, opts)?;
    let spec = ctx
        .process(&runtime.path, opts)
        .args(["-NoProfile", "-File"])
        .arg(script)
        .args(&opts.args);
    info!(command = %spec.display_command(), version = %runtime.version, "running powershell script");
    let output = run_process(&spec)?;
    Ok(RunResult::new(Language::Powershell, &runtime, &output))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::io::cache::RuntimeCache;
    use crate::io::config::ScriptrunConfig;
    use crate::io::installer::NoInstaller;
    use crate::test_support::FakeInterpreter;
    use std::ffi::OsString;

    #[test]
    fn runs_with_file_flag_and_args() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fake = FakeInterpreter::powershell(temp.path(), "7.4.1").expect("fake");
        let config = ScriptrunConfig::default();
        let cache = RuntimeCache::in_memory();
        let ctx = RunContext::new(&config, &cache, &NoInstaller)
            .with_path(Some(OsString::from(fake.bin_dir())));
        let script = temp.path().join("check.ps1");
        let opts = RunOptions {
            args: vec!["-Name".to_string(), "x".to_string()],
            ..RunOptions::default()
        };

        let result = run_powershell(&ctx, &script, &opts).expect("run");
        assert_eq!(result.runtime_version, "7.4.1");
        assert!(result.stdout.contains(&format!(
            "argv:-NoProfile -File {} -Name x",
            script.display()
        )));
    }

    #[test]
    fn missing_pwsh_fails_setup() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ScriptrunConfig::default();
        let cache = RuntimeCache::in_memory();
        let ctx = RunContext::new(&config, &cache, &NoInstaller)
            .with_path(Some(OsString::from(temp.path())));

        let err = run_powershell(&ctx, &temp.path().join("x.ps1"), &RunOptions::default())
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("failed to setup PowerShell runtime"), "{message}");
        assert!(message.contains("no installer configured"), "{message}");
    }
}
