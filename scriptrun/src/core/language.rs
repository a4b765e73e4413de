//! Supported script languages and how to recognise them.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Result, anyhow, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::platform::Os;

const SUPPORTED_EXTENSIONS: &str = ".py, .js, .ts, .java, .jar, .ps1";

/// Language runtime a script is executed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Node,
    Java,
    Powershell,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::Node,
        Language::Java,
        Language::Powershell,
    ];

    /// Stable lowercase name, also used as the runtime cache key.
    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Node => "node",
            Language::Java => "java",
            Language::Powershell => "powershell",
        }
    }

    /// Human-facing name used in error messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Node => "Node",
            Language::Java => "Java",
            Language::Powershell => "PowerShell",
        }
    }

    /// Extension given to inline scripts written to a temporary file.
    pub fn script_extension(self) -> &'static str {
        match self {
            Language::Python => ".py",
            Language::Node => ".js",
            Language::Java => ".java",
            Language::Powershell => ".ps1",
        }
    }

    /// Interpreter binary names tried in order when searching `PATH`.
    pub fn binary_variants(self, os: Os) -> Vec<String> {
        let names: &[&str] = match self {
            Language::Python => &["python3", "python"],
            Language::Node => &["node"],
            Language::Java => &["java"],
            // Windows PowerShell only exists on Windows; Unix only ships pwsh.
            Language::Powershell if os == Os::Windows => &["pwsh", "powershell"],
            Language::Powershell => &["pwsh"],
        };
        names.iter().map(|name| name.to_string()).collect()
    }

    /// Arguments that make the interpreter print its version.
    pub fn version_args(self) -> &'static [&'static str] {
        match self {
            Language::Java => &["-version"],
            _ => &["--version"],
        }
    }

    fn version_regex(self) -> &'static Regex {
        static PYTHON: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"Python\s+(\d+\.\d+(?:\.\d+)?)").unwrap());
        static NODE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"v?(\d+\.\d+(?:\.\d+)?)").unwrap());
        static JAVA: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r#"version\s+"?(\d+(?:\.\d+)*)"?"#).unwrap());
        static POWERSHELL: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"PowerShell\s+(\d+\.\d+(?:\.\d+)?)").unwrap());
        match self {
            Language::Python => &PYTHON,
            Language::Node => &NODE,
            Language::Java => &JAVA,
            Language::Powershell => &POWERSHELL,
        }
    }

    /// Extract the version number from the output of the version command.
    pub fn parse_version_output(self, output: &str) -> Option<String> {
        let captures = self.version_regex().captures(output)?;
        let version = captures.get(1)?.as_str().trim();
        if version.is_empty() {
            None
        } else {
            Some(version.to_string())
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "node" | "nodejs" | "js" => Ok(Language::Node),
            "java" => Ok(Language::Java),
            "powershell" | "pwsh" => Ok(Language::Powershell),
            other => Err(anyhow!(
                "unsupported runtime: {other} (supported: python, node, java, powershell)"
            )),
        }
    }
}

/// Lowercased extension of `script` including the leading dot.
///
/// Both `/` and `\` count as separators so Windows paths classify the same way
/// on every host.
pub fn script_extension(script: &str) -> Option<String> {
    let file_name = script.rsplit(['/', '\\']).next().unwrap_or(script);
    let dot = file_name.rfind('.')?;
    Some(file_name[dot..].to_ascii_lowercase())
}

/// Pick the runtime for a script from its file extension.
pub fn detect_language(script: &str) -> Result<Language> {
    let Some(ext) = script_extension(script) else {
        bail!("unsupported file extension: (none) (supported: {SUPPORTED_EXTENSIONS})");
    };
    match ext.as_str() {
        ".py" => Ok(Language::Python),
        ".js" | ".mjs" | ".cjs" | ".ts" | ".tsx" => Ok(Language::Node),
        ".java" | ".jar" | ".class" => Ok(Language::Java),
        ".ps1" => Ok(Language::Powershell),
        other => bail!("unsupported file extension: {other} (supported: {SUPPORTED_EXTENSIONS})"),
    }
}

/// Split `runtime@version` into the language and the optional version part.
pub fn parse_runtime_spec(spec: &str) -> Result<(Language, Option<String>)> {
    let (runtime, version) = match spec.split_once('@') {
        Some((runtime, version)) => (runtime, Some(version.trim())),
        None => (spec, None),
    };
    let language = runtime.parse()?;
    let version = version.filter(|v| !v.is_empty()).map(str::to_string);
    Ok((language, version))
}
