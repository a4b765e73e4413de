//! Script runner configuration stored under `<home>/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::language::Language;
use crate::core::platform::Os;
use crate::io::atomic::write_atomic;
use crate::io::process::DEFAULT_OUTPUT_LIMIT_BYTES;

/// Environment variable that relocates the state directory.
pub const HOME_ENV: &str = "SCRIPTRUN_HOME";

/// Script runner configuration (TOML).
///
/// Missing fields default to values that work without any config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScriptrunConfig {
    /// Timeout applied when a run does not pass one. `0` disables it.
    pub default_timeout_secs: u64,

    /// Bytes of script stdout/stderr kept per stream.
    pub output_limit_bytes: usize,

    /// Runtime cache location; `<home>/cache/runtimes.json` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,

    pub install: InstallConfig,

    /// Per-language overrides keyed by language name (`python`, `node`, ...).
    pub runtimes: BTreeMap<String, RuntimeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallConfig {
    /// Command used to install a missing runtime, e.g. `["deps", "install"]`.
    /// `<language>@<version>` is appended. Empty disables installation.
    pub command: Vec<String>,

    /// Wall-clock budget for one installation.
    pub timeout_secs: u64,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 10 * 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interpreter names tried in order instead of the built-in list.
    pub binaries: Vec<String>,
}

impl Default for ScriptrunConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 0,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            cache_path: None,
            install: InstallConfig::default(),
            runtimes: BTreeMap::new(),
        }
    }
}

impl ScriptrunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.install.timeout_secs == 0 {
            return Err(anyhow!("install.timeout_secs must be > 0"));
        }
        if self.install.command.first().is_some_and(|c| c.trim().is_empty()) {
            return Err(anyhow!("install.command must start with a program name"));
        }
        for (language, runtime) in &self.runtimes {
            language
                .parse::<Language>()
                .with_context(|| format!("runtimes.{language}"))?;
            if runtime.binaries.iter().any(|b| b.trim().is_empty()) {
                return Err(anyhow!(
                    "runtimes.{language}.binaries must not contain empty names"
                ));
            }
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_secs > 0).then(|| Duration::from_secs(self.default_timeout_secs))
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install.timeout_secs)
    }

    /// Interpreter names to search for `language`, honouring overrides.
    pub fn binary_variants(&self, language: Language) -> Vec<String> {
        match self.runtimes.get(language.name()) {
            Some(runtime) if !runtime.binaries.is_empty() => runtime.binaries.clone(),
            _ => language.binary_variants(Os::current()),
        }
    }

    pub fn cache_path_in(&self, home: &Path) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| home.join("cache").join("runtimes.json"))
    }
}

/// State directory: `$SCRIPTRUN_HOME`, else `~/.scriptrun`.
pub fn default_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|home| home.join(".scriptrun"))
        .ok_or_else(|| anyhow!("cannot determine home directory; set {HOME_ENV}"))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ScriptrunConfig::default()`.
pub fn load_config(path: &Path) -> Result<ScriptrunConfig> {
    if !path.exists() {
        let cfg = ScriptrunConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ScriptrunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk.
pub fn write_config(path: &Path, cfg: &ScriptrunConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
