//! Runtime detection: PATH search, version probe, constraint check, install.

use std::ffi::OsString;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::language::Language;
use crate::core::version::Constraint;
use crate::io::cache::{RuntimeCache, RuntimeInfo};
use crate::io::installer::RuntimeInstaller;
use crate::io::path_search::{binary_exists, find_binary};
use crate::io::process::{ProcessSpec, run_process};

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Finds an interpreter for one language and reports its version.
#[derive(Debug, Clone)]
pub struct RuntimeDetector {
    pub language: Language,
    pub binary_variants: Vec<String>,
    /// Searched instead of the process `PATH` when set.
    pub path_override: Option<OsString>,
}

impl RuntimeDetector {
    pub fn new(language: Language, binary_variants: Vec<String>) -> Self {
        Self {
            language,
            binary_variants,
            path_override: None,
        }
    }

    pub fn with_path(mut self, path: Option<OsString>) -> Self {
        self.path_override = path;
        self
    }

    /// Locate the interpreter, preferring a cache entry whose binary still exists.
    #[instrument(skip_all, fields(language = %self.language))]
    pub fn detect(&self, cache: &RuntimeCache) -> Result<RuntimeInfo> {
        if let Some(info) = cache.get(self.language)? {
            if binary_exists(&info.path) {
                debug!(path = %info.path.display(), version = %info.version, "using cached runtime");
                return Ok(info);
            }
            debug!(path = %info.path.display(), "cached runtime is gone, searching PATH");
            cache.invalidate(self.language)?;
        }

        let path = find_binary(&self.binary_variants, self.path_override.as_ref()).map_err(|_| {
            anyhow!(
                "{} runtime not found in PATH (searched: {})",
                self.language,
                self.binary_variants.join(", ")
            )
        })?;
        debug!(path = %path.display(), "found binary");

        let version = self
            .probe_version(&path)
            .with_context(|| format!("get {} version", self.language))?;
        debug!(version = %version, "runtime version");

        let info = RuntimeInfo { path, version };
        if let Err(e) = cache.set(self.language, info.clone()) {
            warn!(err = %e, "failed to cache runtime info");
        }
        Ok(info)
    }

    /// Run the version command and parse its combined output.
    fn probe_version(&self, binary: &std::path::Path) -> Result<String> {
        let spec = ProcessSpec::new(binary)
            .args(self.language.version_args().iter().copied())
            .timeout(Some(VERSION_PROBE_TIMEOUT));
        let output = run_process(&spec)?;
        if output.timed_out {
            bail!("{} timed out", spec.display_command());
        }
        if !output.status.success() {
            bail!(
                "{} exited with status {:?}",
                spec.display_command(),
                output.status.code()
            );
        }
        // `java -version` reports on stderr.
        let combined = output.combined_lossy();
        self.language
            .parse_version_output(&combined)
            .ok_or_else(|| anyhow!("failed to parse version from output: {}", combined.trim()))
    }

    /// Whether `version` satisfies `constraint`; an empty constraint always does.
    pub fn check_constraint(&self, version: &str, constraint: &str) -> Result<bool> {
        if constraint.trim().is_empty() {
            return Ok(true);
        }
        let parsed = Constraint::parse(constraint)?;
        let matches = parsed.check(version);
        debug!(
            language = %self.language,
            version,
            constraint = %parsed,
            matches,
            "checked version constraint"
        );
        Ok(matches)
    }

    /// Detect the runtime, installing it when missing or when the detected
    /// version does not satisfy `constraint`.
    #[instrument(skip_all, fields(language = %self.language, constraint = constraint.unwrap_or("")))]
    pub fn find_or_install(
        &self,
        constraint: Option<&str>,
        cache: &RuntimeCache,
        installer: &dyn RuntimeInstaller,
    ) -> Result<RuntimeInfo> {
        let constraint = constraint.map(str::trim).filter(|c| !c.is_empty());
        if let Some(c) = constraint {
            // Reject malformed constraints before touching PATH or the installer.
            Constraint::parse(c)?;
        }

        match self.detect(cache) {
            Ok(info) => {
                let Some(c) = constraint else {
                    return Ok(info);
                };
                if self.check_constraint(&info.version, c)? {
                    return Ok(info);
                }
                info!(
                    version = %info.version,
                    constraint = c,
                    "runtime version does not match constraint, will install"
                );
                cache.invalidate(self.language)?;
            }
            Err(e) => {
                info!(err = %e, "runtime not found, will install");
            }
        }

        self.install(constraint, cache, installer)
    }

    fn install(
        &self,
        constraint: Option<&str>,
        cache: &RuntimeCache,
        installer: &dyn RuntimeInstaller,
    ) -> Result<RuntimeInfo> {
        let version = constraint.unwrap_or("stable");
        info!(version, "installing runtime");
        installer
            .install(self.language, version)
            .with_context(|| format!("install {}", self.language))?;

        cache.invalidate(self.language)?;
        let info = self
            .detect(cache)
            .context("runtime installed but detection failed")?;

        if let Some(c) = constraint
            && !self.check_constraint(&info.version, c)?
        {
            cache.invalidate(self.language)?;
            bail!(
                "installed {} version {} does not satisfy constraint {}",
                self.language,
                info.version,
                c
            );
        }
        info!(path = %info.path.display(), version = %info.version, "runtime installed");
        Ok(info)
    }
}
