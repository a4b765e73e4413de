//! Package dependency installation for scripts (`pip`, `npm`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, info, instrument};

use crate::io::path_search::search_path;
use crate::io::process::{ProcessSpec, run_process};

/// How dependency installation is decided for one run.
#[derive(Debug, Clone, Copy)]
pub struct DepsRequest<'a> {
    /// `Some(true)` forces, `Some(false)` skips, `None` looks for a manifest.
    pub install_deps: Option<bool>,
    pub working_dir: Option<&'a Path>,
    pub timeout: Option<Duration>,
    pub path_override: Option<&'a OsString>,
}

fn should_install(policy: Option<bool>, manifests: &[PathBuf]) -> bool {
    match policy {
        Some(forced) => forced,
        None => manifests.iter().any(|m| m.is_file()),
    }
}

/// Install `requirements.txt` next to the script with pip.
///
/// `pyproject.toml` counts as a manifest for detection, but only
/// `requirements.txt` is installed.
#[instrument(skip_all, fields(script_dir = %script_dir.display()))]
pub fn install_python_dependencies(script_dir: &Path, request: &DepsRequest<'_>) -> Result<()> {
    let requirements = script_dir.join("requirements.txt");
    let pyproject = script_dir.join("pyproject.toml");
    if !should_install(request.install_deps, &[requirements.clone(), pyproject]) {
        return Ok(());
    }
    if !requirements.is_file() {
        debug!("no requirements.txt, nothing to install");
        return Ok(());
    }

    let pip = search_path("pip3", request.path_override)
        .or_else(|_| search_path("pip", request.path_override))?;
    let spec = ProcessSpec::new(pip)
        .arg("install")
        .arg("-r")
        .arg(&requirements)
        .cwd(request.working_dir.map(Path::to_path_buf))
        .timeout(request.timeout);
    info!(requirements = %requirements.display(), "installing python dependencies");
    run_installer(&spec)
}

/// Run `npm install` when a `package.json` sits next to the script.
#[instrument(skip_all, fields(script_dir = %script_dir.display()))]
pub fn install_node_dependencies(script_dir: &Path, request: &DepsRequest<'_>) -> Result<()> {
    let package_json = script_dir.join("package.json");
    if !should_install(request.install_deps, std::slice::from_ref(&package_json)) {
        return Ok(());
    }
    if !package_json.is_file() {
        debug!("no package.json, nothing to install");
        return Ok(());
    }

    let npm = search_path("npm", request.path_override)?;
    let cwd = request
        .working_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| script_dir.to_path_buf());
    let spec = ProcessSpec::new(npm)
        .arg("install")
        .cwd(Some(cwd))
        .timeout(request.timeout);
    info!(package_json = %package_json.display(), "installing node dependencies");
    run_installer(&spec)
}

fn run_installer(spec: &ProcessSpec) -> Result<()> {
    let output = run_process(spec)?;
    if output.timed_out {
        bail!("{} timed out", spec.display_command());
    }
    if !output.status.success() {
        bail!(
            "{} failed with status {:?}: {}",
            spec.display_command(),
            output.status.code(),
            output.stderr_lossy().trim()
        );
    }
    Ok(())
}
