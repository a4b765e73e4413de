//! Node.js script execution, including `npx:` packages and TypeScript.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};

use crate::core::language::{Language, script_extension};
use crate::io::cache::RuntimeInfo;
use crate::io::deps::install_node_dependencies;
use crate::io::path_search::search_path;
use crate::io::process::run_process;
use crate::runtimes::{RunContext, RunOptions, RunResult, script_dir};

/// Script prefix that runs a package through `npx` instead of a file.
pub const NPX_PREFIX: &str = "npx:";

/// Run a Node.js script.
///
/// `npx:<package> [args]` runs through `npx` without runtime detection.
/// `.ts`/`.tsx` files run through `tsx`, falling back to `ts-node`.
#[instrument(skip_all, fields(script = %script.display()))]
pub fn run_node(ctx: &RunContext<'_>, script: &Path, opts: &RunOptions) -> Result<RunResult> {
    let script_text = script.to_string_lossy();
    if let Some(command) = script_text.strip_prefix(NPX_PREFIX) {
        return run_npx(ctx, command, opts);
    }

    let runtime = ctx.resolve(Language::Node, opts)?;

    install_node_dependencies(&script_dir(script), &ctx.deps_request(opts))
        .context("failed to install Node dependencies")?;

    let program = match script_extension(&script_text).as_deref() {
        Some(".ts" | ".tsx") => typescript_runner(ctx)?,
        _ => runtime.path.clone(),
    };
    let spec = ctx.process(program, opts).arg(script).args(&opts.args);
    info!(command = %spec.display_command(), version = %runtime.version, "running node script");
    let output = run_process(&spec)?;
    Ok(RunResult::new(Language::Node, &runtime, &output))
}

fn run_npx(ctx: &RunContext<'_>, command: &str, opts: &RunOptions) -> Result<RunResult> {
    let words: Vec<&str> = command.split_whitespace().collect();
    if words.is_empty() {
        bail!("npx script needs a package name after {NPX_PREFIX}");
    }
    let npx = search_path("npx", ctx.path_override.as_ref())?;
    let spec = ctx.process(&npx, opts).args(words).args(&opts.args);
    info!(command = %spec.display_command(), "running npx package");
    let output = run_process(&spec)?;
    let runtime = RuntimeInfo {
        path: npx,
        version: "npx".to_string(),
    };
    Ok(RunResult::new(Language::Node, &runtime, &output))
}

/// `tsx` if installed, else `ts-node`.
fn typescript_runner(ctx: &RunContext<'_>) -> Result<PathBuf> {
    for candidate in ["tsx", "ts-node"] {
        if let Ok(path) = search_path(candidate, ctx.path_override.as_ref()) {
            debug!(runner = candidate, path = %path.display(), "typescript runner");
            return Ok(path);
        }
    }
    bail!("TypeScript execution requires tsx or ts-node")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::io::cache::RuntimeCache;
    use crate::io::config::ScriptrunConfig;
    use crate::io::installer::NoInstaller;
    use crate::test_support::{FakeInterpreter, write_executable};
    use std::ffi::OsString;
    use std::fs;

    struct Fixture {
        _temp: tempfile::TempDir,
        root: PathBuf,
        fake: FakeInterpreter,
        config: ScriptrunConfig,
        cache: RuntimeCache,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().to_path_buf();
        let fake = FakeInterpreter::node(&root, "20.11.0").expect("fake");
        Fixture {
            _temp: temp,
            root,
            fake,
            config: ScriptrunConfig::default(),
            cache: RuntimeCache::in_memory(),
        }
    }

    impl Fixture {
        fn ctx(&self) -> RunContext<'_> {
            RunContext::new(&self.config, &self.cache, &NoInstaller)
                .with_path(Some(OsString::from(self.fake.bin_dir())))
        }
    }

    #[test]
    fn runs_script_with_node() {
        let fx = fixture();
        let script = fx.root.join("app.js");
        fs::write(&script, "console.log('hi')\n").expect("write");
        let opts = RunOptions {
            args: vec!["--flag".to_string()],
            ..RunOptions::default()
        };

        let result = run_node(&fx.ctx(), &script, &opts).expect("run");
        assert!(result.success());
        assert_eq!(result.runtime_version, "20.11.0");
        assert!(
            result
                .stdout
                .contains(&format!("argv:{} --flag", script.display()))
        );
    }

    #[test]
    fn typescript_prefers_tsx() {
        let fx = fixture();
        write_executable(
            &fx.fake.bin_dir().join("tsx"),
            "#!/bin/sh\necho \"tsx:$*\"\n",
        )
        .expect("tsx");
        write_executable(
            &fx.fake.bin_dir().join("ts-node"),
            "#!/bin/sh\necho \"ts-node:$*\"\n",
        )
        .expect("ts-node");
        let script = fx.root.join("main.ts");

        let result = run_node(&fx.ctx(), &script, &RunOptions::default()).expect("run");
        assert_eq!(result.stdout.trim(), format!("tsx:{}", script.display()));
    }

    #[test]
    fn typescript_falls_back_to_ts_node() {
        let fx = fixture();
        write_executable(
            &fx.fake.bin_dir().join("ts-node"),
            "#!/bin/sh\necho \"ts-node:$*\"\n",
        )
        .expect("ts-node");
        let script = fx.root.join("main.tsx");

        let result = run_node(&fx.ctx(), &script, &RunOptions::default()).expect("run");
        assert!(result.stdout.starts_with("ts-node:"));
    }

    #[test]
    fn typescript_without_runner_fails() {
        let fx = fixture();
        let err = run_node(&fx.ctx(), &fx.root.join("main.ts"), &RunOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "TypeScript execution requires tsx or ts-node");
    }

    #[test]
    fn npx_prefix_skips_detection() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bin = temp.path().join("bin");
        write_executable(&bin.join("npx"), "#!/bin/sh\necho \"npx:$*\"\n").expect("npx");
        let config = ScriptrunConfig::default();
        let cache = RuntimeCache::in_memory();
        let ctx = RunContext::new(&config, &cache, &NoInstaller)
            .with_path(Some(OsString::from(&bin)));
        let opts = RunOptions {
            args: vec!["extra".to_string()],
            ..RunOptions::default()
        };

        let result = run_node(&ctx, Path::new("npx:cowsay  hello"), &opts).expect("run");
        assert_eq!(result.stdout.trim(), "npx:cowsay hello extra");
        assert_eq!(result.runtime_version, "npx");
        assert_eq!(result.runtime_path, bin.join("npx"));
        assert_eq!(cache.get(Language::Node).expect("get"), None);
    }

    #[test]
    fn empty_npx_command_is_rejected() {
        let fx = fixture();
        let err = run_node(&fx.ctx(), Path::new("npx:  "), &RunOptions::default()).unwrap_err();
        assert!(err.to_string().contains("needs a package name"));
    }
}
