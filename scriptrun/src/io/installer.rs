//! Installation of missing interpreters.
//!
//! The [`RuntimeInstaller`] trait decouples detection from the tool that
//! actually provisions interpreters. The CLI wires in a [`CommandInstaller`]
//! when `install.command` is configured; tests use scripted installers.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, instrument, warn};

use crate::core::language::Language;
use crate::io::process::{ProcessSpec, run_process};

/// Abstraction over runtime provisioning backends.
pub trait RuntimeInstaller {
    /// Install `language` at `version` (a constraint or `stable`) so that a
    /// subsequent PATH search finds it.
    fn install(&self, language: Language, version: &str) -> Result<()>;
}

/// Installer used when nothing is configured: always fails with a hint.
pub struct NoInstaller;

impl RuntimeInstaller for NoInstaller {
    fn install(&self, language: Language, version: &str) -> Result<()> {
        Err(anyhow!(
            "no installer configured for {language}@{version}; install it manually or set install.command in the config"
        ))
    }
}

/// Installer that runs an external command with `<language>@<version>` appended.
pub struct CommandInstaller {
    pub command: Vec<String>,
    pub timeout: Duration,
}

impl RuntimeInstaller for CommandInstaller {
    #[instrument(skip_all, fields(language = %language, version))]
    fn install(&self, language: Language, version: &str) -> Result<()> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("install command is empty");
        };
        let target = format!("{}@{}", language.name(), version);
        let spec = ProcessSpec::new(program)
            .args(args)
            .arg(&target)
            .timeout(Some(self.timeout));

        info!(command = %spec.display_command(), "installing runtime");
        let output = run_process(&spec).with_context(|| format!("run installer for {target}"))?;
        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "installer timed out");
            bail!("installer for {target} timed out after {:?}", self.timeout);
        }
        if !output.status.success() {
            bail!(
                "installer for {target} failed with status {:?}: {}",
                output.status.code(),
                output.stderr_lossy().trim()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_installer_explains_how_to_fix() {
        let err = NoInstaller.install(Language::Python, "stable").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("python@stable"));
        assert!(message.contains("install.command"));
    }

    #[cfg(unix)]
    #[test]
    fn command_installer_appends_target_and_reports_failure() {
        let installer = CommandInstaller {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo \"cannot install $0\" >&2; exit 4".to_string(),
            ],
            timeout: Duration::from_secs(5),
        };
        let err = installer.install(Language::Node, ">=18").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cannot install node@>=18"), "{message}");
        assert!(message.contains("Some(4)"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn command_installer_succeeds_on_zero_exit() {
        let installer = CommandInstaller {
            command: vec!["true".to_string()],
            timeout: Duration::from_secs(5),
        };
        installer.install(Language::Java, "17").expect("install");
    }
}
