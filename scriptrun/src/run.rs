//! Orchestration for a single `scriptrun run`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tracing::{debug, instrument};

use crate::core::language::{Language, detect_language, parse_runtime_spec};
use crate::runtimes::node::NPX_PREFIX;
use crate::runtimes::{RunContext, RunOptions, RunResult, run_script};

/// Raw, unvalidated parameters of one run as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ScriptRequest {
    /// Script path, or `npx:<package>` for Node packages.
    pub script: Option<String>,
    /// Inline script text; requires `runtime`.
    pub inline: Option<String>,
    /// `language[@version]`; detected from the extension when absent.
    pub runtime: Option<String>,
    /// Version constraint, overriding any `@version` in `runtime`.
    pub version: Option<String>,
    /// Timeout text such as `30s` or `1h30m`.
    pub timeout: Option<String>,
    pub working_dir: Option<PathBuf>,
    /// `KEY=VALUE` entries.
    pub env: Vec<String>,
    pub install_deps: Option<bool>,
    pub args: Vec<String>,
}

/// Resolve `request` into a language, script file and options, then run it.
///
/// A non-zero script exit is reported in the returned [`RunResult`]; errors
/// are reserved for requests that never reach the script.
#[instrument(skip_all)]
pub fn execute_script(ctx: &RunContext<'_>, request: &ScriptRequest) -> Result<RunResult> {
    let (runtime_language, runtime_version) = match request.runtime.as_deref() {
        Some(spec) => {
            let (language, version) = parse_runtime_spec(spec)?;
            (Some(language), version)
        }
        None => (None, None),
    };

    let timeout = match request.timeout.as_deref() {
        Some(text) => Some(parse_duration(text)?),
        None => ctx.config.default_timeout(),
    };
    if let Some(dir) = &request.working_dir
        && !dir.is_dir()
    {
        bail!("working directory not found: {}", dir.display());
    }

    let opts = RunOptions {
        version: request.version.clone().or(runtime_version),
        timeout,
        working_dir: request.working_dir.clone(),
        env: parse_env_pairs(&request.env)?,
        args: request.args.clone(),
        install_deps: request.install_deps,
    };
    debug!(?opts, "resolved run options");

    if let Some(code) = &request.inline {
        if request.script.is_some() {
            bail!("pass either a script path or --script, not both");
        }
        let language = runtime_language
            .ok_or_else(|| anyhow!("--runtime is required when running an inline script"))?;
        let inline = InlineScript::write(language, code)?;
        return run_script(ctx, language, inline.path(), &opts);
    }

    let script = request
        .script
        .as_deref()
        .ok_or_else(|| anyhow!("no script given; pass a script path or --script"))?;
    let language = match runtime_language {
        Some(language) => language,
        None if script.starts_with(NPX_PREFIX) => Language::Node,
        None => detect_language(script)?,
    };
    if script.starts_with(NPX_PREFIX) {
        return run_script(ctx, language, Path::new(script), &opts);
    }
    if !Path::new(script).is_file() {
        bail!("script not found: {script}");
    }
    // The interpreter runs in --working-dir, so resolve against our own cwd first.
    let script = std::path::absolute(script)
        .with_context(|| format!("resolve script path {script}"))?;
    run_script(ctx, language, &script, &opts)
}

/// Inline script text materialised in a private temporary directory.
struct InlineScript {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

impl InlineScript {
    fn write(language: Language, code: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("scriptrun-inline-")
            .tempdir()
            .context("create inline script directory")?;
        let stem = match language {
            // javac requires the file name to match the public class.
            Language::Java => java_class_name(code),
            _ => "script".to_string(),
        };
        let path = dir
            .path()
            .join(format!("{stem}{}", language.script_extension()));
        fs::write(&path, code).with_context(|| format!("write {}", path.display()))?;
        debug!(path = %path.display(), "inline script written");
        Ok(Self { _dir: dir, path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

fn java_class_name(code: &str) -> String {
    static PUBLIC_CLASS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"public\s+(?:final\s+)?class\s+(\w+)").unwrap());
    PUBLIC_CLASS
        .captures(code)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "Main".to_string())
}

/// Parse timeout text made of `<n><unit>` segments, where `n` may carry a
/// fraction and `unit` is one of `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`.
///
/// Examples: `250ms`, `1.5s`, `100us`, `1h30m`.
pub fn parse_duration(text: &str) -> Result<Duration> {
    const SEGMENT_RE: &str = r"([0-9]*)(?:\.([0-9]*))?(ns|us|µs|ms|s|m|h)";
    static FULL: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(&format!("^(?:{SEGMENT_RE})+$")).unwrap());
    static SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(SEGMENT_RE).unwrap());

    let invalid =
        || anyhow!("invalid timeout {text:?}: expected e.g. 30s, 1.5s, 5m, 1h30m or 250ms");
    let trimmed = text.trim();
    if !FULL.is_match(trimmed) {
        return Err(invalid());
    }
    let mut nanos: u128 = 0;
    for caps in SEGMENT.captures_iter(trimmed) {
        let whole = caps.get(1).map_or("", |m| m.as_str());
        let fraction = caps.get(2).map_or("", |m| m.as_str());
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        let unit: u128 = match &caps[3] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            _ => 3_600_000_000_000,
        };
        let segment = segment_nanos(whole, fraction, unit)
            .ok_or_else(|| anyhow!("invalid timeout {text:?}: out of range"))?;
        nanos = nanos.saturating_add(segment);
    }
    if nanos == 0 {
        bail!("invalid timeout {text:?}: must be greater than zero");
    }
    let secs = u64::try_from(nanos / 1_000_000_000)
        .map_err(|_| anyhow!("invalid timeout {text:?}: out of range"))?;
    Ok(Duration::new(secs, (nanos % 1_000_000_000) as u32))
}

/// `whole.fraction` units in nanoseconds; digits past nanosecond precision are dropped.
fn segment_nanos(whole: &str, fraction: &str, unit: u128) -> Option<u128> {
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit)?;
    let mut scale = unit;
    for digit in fraction.bytes() {
        scale /= 10;
        if scale == 0 {
            break;
        }
        nanos = nanos.checked_add(u128::from(digit - b'0') * scale)?;
    }
    Some(nanos)
}

/// Parse `KEY=VALUE` entries; later entries win.
pub fn parse_env_pairs(entries: &[String]) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();
    for entry in entries {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid env entry {entry:?}: expected KEY=VALUE"))?;
        if key.is_empty() {
            bail!("invalid env entry {entry:?}: empty variable name");
        }
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::cache::RuntimeCache;
    use crate::io::config::ScriptrunConfig;
    use crate::io::installer::NoInstaller;

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration(" 2m5s ").unwrap(), Duration::from_secs(125));
    }

    #[test]
    fn parses_fractional_and_sub_millisecond_durations() {
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration(".5m").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("100us").unwrap(), Duration::from_micros(100));
        assert_eq!(parse_duration("2µs").unwrap(), Duration::from_micros(2));
        assert_eq!(parse_duration("10ns").unwrap(), Duration::from_nanos(10));
        assert_eq!(
            parse_duration("1m0.25s").unwrap(),
            Duration::from_millis(60_250)
        );
    }

    #[test]
    fn rejects_invalid_durations() {
        for text in [
            "", "30", "abc", "5 m", "1d", "0s", "-5s", "0.0ms", ".s", "1.5", "1e3s",
            "99999999999999999999999999999999999999999h",
        ] {
            let err = parse_duration(text).unwrap_err();
            assert!(err.to_string().starts_with("invalid timeout"), "{text}: {err}");
        }
    }

    #[test]
    fn env_pairs_split_on_first_equals() {
        let env = parse_env_pairs(&[
            "TEST_API_KEY=abc".to_string(),
            "URL=http://x?a=b".to_string(),
            "EMPTY=".to_string(),
        ])
        .unwrap();
        assert_eq!(env["TEST_API_KEY"], "abc");
        assert_eq!(env["URL"], "http://x?a=b");
        assert_eq!(env["EMPTY"], "");
    }

    #[test]
    fn env_entry_without_equals_is_an_error() {
        let err = parse_env_pairs(&["NOVALUE".to_string()]).unwrap_err();
        assert!(err.to_string().contains("expected KEY=VALUE"));
        let err = parse_env_pairs(&["=x".to_string()]).unwrap_err();
        assert!(err.to_string().contains("empty variable name"));
    }

    #[test]
    fn java_class_name_falls_back_to_main() {
        assert_eq!(
            java_class_name("public class Greeter { public static void main(String[] a) {} }"),
            "Greeter"
        );
        assert_eq!(java_class_name("public final class Tool {}"), "Tool");
        assert_eq!(java_class_name("class Hidden {}"), "Main");
    }

    fn with_ctx<T>(f: impl FnOnce(&RunContext<'_>) -> T) -> T {
        let config = ScriptrunConfig::default();
        let cache = RuntimeCache::in_memory();
        let ctx = RunContext::new(&config, &cache, &NoInstaller);
        f(&ctx)
    }

    #[test]
    fn inline_requires_runtime() {
        let err = with_ctx(|ctx| {
            execute_script(
                ctx,
                &ScriptRequest {
                    inline: Some("print(1)".to_string()),
                    ..ScriptRequest::default()
                },
            )
        })
        .unwrap_err();
        assert!(err.to_string().contains("--runtime is required"));
    }

    #[test]
    fn missing_script_is_an_error() {
        let err = with_ctx(|ctx| execute_script(ctx, &ScriptRequest::default())).unwrap_err();
        assert!(err.to_string().starts_with("no script given"));

        let err = with_ctx(|ctx| {
            execute_script(
                ctx,
                &ScriptRequest {
                    script: Some("does/not/exist.py".to_string()),
                    ..ScriptRequest::default()
                },
            )
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "script not found: does/not/exist.py");
    }

    #[test]
    fn unsupported_extension_is_reported_before_lookup() {
        let err = with_ctx(|ctx| {
            execute_script(
                ctx,
                &ScriptRequest {
                    script: Some("notes.rb".to_string()),
                    ..ScriptRequest::default()
                },
            )
        })
        .unwrap_err();
        assert!(err.to_string().starts_with("unsupported file extension: .rb"));
    }

    #[test]
    fn invalid_runtime_spec_is_rejected() {
        let err = with_ctx(|ctx| {
            execute_script(
                ctx,
                &ScriptRequest {
                    inline: Some("x".to_string()),
                    runtime: Some("ruby@3".to_string()),
                    ..ScriptRequest::default()
                },
            )
        })
        .unwrap_err();
        assert!(err.to_string().starts_with("unsupported runtime: ruby"));
    }

    #[cfg(unix)]
    mod fake_runtimes {
        use super::*;
        use crate::test_support::FakeInterpreter;
        use std::ffi::OsString;

        fn run(fake: &FakeInterpreter, request: &ScriptRequest) -> Result<RunResult> {
            let config = ScriptrunConfig::default();
            let cache = RuntimeCache::in_memory();
            let ctx = RunContext::new(&config, &cache, &NoInstaller)
                .with_path(Some(OsString::from(fake.bin_dir())));
            execute_script(&ctx, request)
        }

        #[test]
        fn inline_script_runs_from_temp_file() {
            let temp = tempfile::tempdir().expect("tempdir");
            let fake = FakeInterpreter::python(temp.path(), "3.11.4").expect("fake");

            let result = run(
                &fake,
                &ScriptRequest {
                    inline: Some("print('hi')".to_string()),
                    runtime: Some("python".to_string()),
                    args: vec!["x".to_string()],
                    ..ScriptRequest::default()
                },
            )
            .expect("run");
            let argv = result
                .stdout
                .lines()
                .find_map(|line| line.strip_prefix("argv:"))
                .expect("argv line")
                .to_string();
            assert!(argv.ends_with("script.py x"), "{argv}");
            let script = argv.trim_end_matches(" x");
            assert!(
                !Path::new(script).exists(),
                "inline script must be removed after the run"
            );
        }

        #[test]
        fn explicit_version_overrides_runtime_spec() {
            let temp = tempfile::tempdir().expect("tempdir");
            let fake = FakeInterpreter::python(temp.path(), "3.11.4").expect("fake");
            let script = temp.path().join("hello.py");
            fs::write(&script, "print('hi')\n").expect("write");

            let request = ScriptRequest {
                script: Some(script.display().to_string()),
                runtime: Some("python@<3".to_string()),
                version: Some(">=3.10".to_string()),
                ..ScriptRequest::default()
            };
            let result = run(&fake, &request).expect("run");
            assert_eq!(result.runtime_version, "3.11.4");

            let err = run(
                &fake,
                &ScriptRequest {
                    version: None,
                    ..request
                },
            )
            .unwrap_err();
            assert!(format!("{err:#}").contains("python@<3"));
        }

        #[test]
        fn env_and_timeout_reach_the_child() {
            let temp = tempfile::tempdir().expect("tempdir");
            let fake = FakeInterpreter::python(temp.path(), "3.11.4").expect("fake");
            let script = temp.path().join("slow.py");
            fs::write(&script, "").expect("write");

            let result = run(
                &fake,
                &ScriptRequest {
                    script: Some(script.display().to_string()),
                    env: vec!["FAKE_SLEEP=5".to_string()],
                    timeout: Some("200ms".to_string()),
                    ..ScriptRequest::default()
                },
            )
            .expect("run");
            assert!(result.timed_out);
        }

        #[test]
        fn relative_script_is_resolved_before_changing_dir() {
            let temp = tempfile::tempdir().expect("tempdir");
            let fake = FakeInterpreter::python(temp.path(), "3.11.4").expect("fake");
            let workdir = temp.path().join("work");
            fs::create_dir(&workdir).expect("mkdir");

            // Tests run with the package root as cwd.
            let result = run(
                &fake,
                &ScriptRequest {
                    script: Some("testdata/hello.py".to_string()),
                    working_dir: Some(workdir.clone()),
                    ..ScriptRequest::default()
                },
            )
            .expect("run");
            let expected = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/hello.py");
            assert!(
                result
                    .stdout
                    .contains(&format!("argv:{}", expected.display())),
                "{}",
                result.stdout
            );
            let canonical = workdir.canonicalize().expect("canonicalize");
            assert!(
                result
                    .stdout
                    .contains(&format!("cwd:{}", canonical.display())),
                "{}",
                result.stdout
            );
        }

        #[test]
        fn missing_working_dir_is_an_error() {
            let temp = tempfile::tempdir().expect("tempdir");
            let fake = FakeInterpreter::python(temp.path(), "3.11.4").expect("fake");
            let err = run(
                &fake,
                &ScriptRequest {
                    inline: Some("print(1)".to_string()),
                    runtime: Some("python".to_string()),
                    working_dir: Some(temp.path().join("nope")),
                    ..ScriptRequest::default()
                },
            )
            .unwrap_err();
            assert!(err.to_string().starts_with("working directory not found"));
        }
    }
}
