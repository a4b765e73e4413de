//! Test-only helpers: fake interpreters and fixture expectations.
//!
//! Fake interpreters are small `/bin/sh` scripts placed in a private bin
//! directory. They answer the version probe like the real tool and otherwise
//! echo how they were invoked, so runner behavior can be checked without any
//! language runtime installed.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::language::Language;
use crate::core::platform::HostPlatform;
use crate::io::installer::RuntimeInstaller;

/// Directory holding the fixture scripts shipped with the crate.
pub fn testdata_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

/// Write `contents` to `path` and mark it executable.
pub fn write_executable(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("chmod {}", path.display()))?;
    }
    Ok(())
}

/// Body shared by every fake interpreter once the version probe is handled.
///
/// `FAKE_EXIT` sets the exit code and `FAKE_SLEEP` replaces the process with
/// `sleep` so timeouts can be exercised. `FAKE_RAW` is written to stdout with
/// `printf %b`, so `\0377` emits a single 0xff byte.
const INVOCATION_ECHO: &str = r#"if [ -n "$FAKE_SLEEP" ]; then exec sleep "$FAKE_SLEEP"; fi
echo "argv:$*"
echo "cwd:$(pwd)"
echo "TEST_API_KEY:${TEST_API_KEY:-not_set}"
if [ -n "$FAKE_RAW" ]; then printf '%b' "$FAKE_RAW"; fi
if [ -n "$FAKE_STDERR" ]; then echo "$FAKE_STDERR" >&2; fi
exit "${FAKE_EXIT:-0}"
"#;

/// A shell script standing in for an interpreter binary.
#[derive(Debug, Clone)]
pub struct FakeInterpreter {
    bin_dir: PathBuf,
    name: String,
    version_flag: String,
    version_to_stderr: bool,
}

impl FakeInterpreter {
    /// Fake `python3` reporting `Python <version>`.
    pub fn python(root: &Path, version: &str) -> Result<Self> {
        let fake = Self {
            bin_dir: root.join("bin"),
            name: "python3".to_string(),
            version_flag: "--version".to_string(),
            version_to_stderr: false,
        };
        fake.write(&format!("Python {version}"))?;
        Ok(fake)
    }

    /// Fake `node` reporting `v<version>`.
    pub fn node(root: &Path, version: &str) -> Result<Self> {
        let fake = Self {
            bin_dir: root.join("bin"),
            name: "node".to_string(),
            version_flag: "--version".to_string(),
            version_to_stderr: false,
        };
        fake.write(&format!("v{version}"))?;
        Ok(fake)
    }

    /// Fake `java` reporting `openjdk version "<version>"` on stderr.
    pub fn java(root: &Path, version: &str) -> Result<Self> {
        let fake = Self {
            bin_dir: root.join("bin"),
            name: "java".to_string(),
            version_flag: "-version".to_string(),
            version_to_stderr: true,
        };
        fake.write(&format!("openjdk version \\\"{version}\\\" 2024-01-16"))?;
        Ok(fake)
    }

    /// Fake `pwsh` reporting `PowerShell <version>`.
    pub fn powershell(root: &Path, version: &str) -> Result<Self> {
        let fake = Self {
            bin_dir: root.join("bin"),
            name: "pwsh".to_string(),
            version_flag: "--version".to_string(),
            version_to_stderr: false,
        };
        fake.write(&format!("PowerShell {version}"))?;
        Ok(fake)
    }

    /// Fake `name` printing arbitrary text for `--version`.
    pub fn with_version_output(root: &Path, name: &str, output: &str) -> Result<Self> {
        let fake = Self {
            bin_dir: root.join("bin"),
            name: name.to_string(),
            version_flag: "--version".to_string(),
            version_to_stderr: false,
        };
        fake.write(output)?;
        Ok(fake)
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn path(&self) -> PathBuf {
        self.bin_dir.join(&self.name)
    }

    /// Rewrite the binary so it reports a different version line.
    pub fn rewrite_version(&self, language: Language, version: &str) -> Result<()> {
        let line = match language {
            Language::Python => format!("Python {version}"),
            Language::Node => format!("v{version}"),
            Language::Java => format!("openjdk version \\\"{version}\\\" 2024-01-16"),
            Language::Powershell => format!("PowerShell {version}"),
        };
        self.write(&line)
    }

    fn write(&self, version_line: &str) -> Result<()> {
        let redirect = if self.version_to_stderr { " >&2" } else { "" };
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"{flag}\" ]; then echo \"{version_line}\"{redirect}; exit 0; fi\n{INVOCATION_ECHO}",
            flag = self.version_flag,
        );
        write_executable(&self.path(), &script)
    }
}

/// Fake `javac` that "compiles" by creating `<Class>.class` in the `-d` dir.
///
/// Sources containing `syntax error` fail with a compiler-style message.
pub fn fake_javac(bin_dir: &Path) -> Result<PathBuf> {
    let path = bin_dir.join("javac");
    write_executable(
        &path,
        r#"#!/bin/sh
out="."
if [ "$1" = "-d" ]; then out="$2"; shift 2; fi
src="$1"
if grep -q 'syntax error' "$src"; then
  echo "$src:1: error: ';' expected" >&2
  exit 1
fi
name=$(basename "$src" .java)
mkdir -p "$out"
echo "compiled" > "$out/$name.class"
"#,
    )?;
    Ok(path)
}

/// Installer double that records requests and optionally upgrades a fake.
pub struct RecordingInstaller {
    calls: RefCell<Vec<String>>,
    upgrade: Option<(FakeInterpreter, String)>,
}

impl RecordingInstaller {
    /// Records the call, then fails.
    pub fn failing() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            upgrade: None,
        }
    }

    /// Records the call and rewrites `fake` to report `version`.
    pub fn upgrading(fake: FakeInterpreter, version: &str) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            upgrade: Some((fake, version.to_string())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl RuntimeInstaller for RecordingInstaller {
    fn install(&self, language: Language, version: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("{}@{}", language.name(), version));
        match &self.upgrade {
            Some((fake, new_version)) => fake.rewrite_version(language, new_version),
            None => Err(anyhow::anyhow!("scripted install failure")),
        }
    }
}

/// Lines the hello fixture prints for the given interpreter version and args.
pub fn expected_hello_lines(version: &str, platform: &HostPlatform, args: &[&str]) -> Vec<String> {
    let mut lines = vec![
        format!("Hello from Python {version}!"),
        format!("Platform: {platform}"),
    ];
    if !args.is_empty() {
        lines.push(format!("Arguments: {}", args.join(" ")));
    }
    lines
}

/// The `TEST_API_KEY` line the verification fixtures print.
pub fn expected_api_key_line(value: Option<&str>) -> String {
    format!("TEST_API_KEY: {}", value.unwrap_or("not_set"))
}
