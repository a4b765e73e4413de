//! Interpreter lookup on `PATH`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::trace;

use crate::core::platform::{Os, binary_name};

/// Find a single binary, optionally restricted to an explicit path list.
///
/// `path_override` uses the platform's `PATH` syntax; `None` searches the real
/// `PATH` of this process.
pub fn search_path(name: &str, path_override: Option<&OsString>) -> Result<PathBuf> {
    let os = Os::current();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut candidates = vec![binary_name(name, os)];
    if candidates[0] != name {
        candidates.push(name.to_string());
    }

    let mut last_err = None;
    for candidate in &candidates {
        let found = match path_override {
            Some(paths) => which::which_in(candidate, Some(paths), &cwd),
            None => which::which(candidate),
        };
        match found {
            Ok(path) => {
                trace!(binary = %candidate, path = %path.display(), "found binary");
                return Ok(path);
            }
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(e).with_context(|| format!("{name} not found in PATH")),
        None => Err(anyhow!("{name} not found in PATH")),
    }
}

/// Return the first variant found on `PATH`.
pub fn find_binary(variants: &[String], path_override: Option<&OsString>) -> Result<PathBuf> {
    variants
        .iter()
        .find_map(|variant| search_path(variant, path_override).ok())
        .ok_or_else(|| anyhow!("none of {} found in PATH", variants.join(", ")))
}

/// Whether `path` still points at an existing file.
pub fn binary_exists(path: &Path) -> bool {
    path.is_file()
}
