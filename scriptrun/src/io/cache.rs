//! Detected interpreter cache (`<home>/cache/runtimes.json`).
//!
//! Detection runs the interpreter's version command, which is slow for some
//! runtimes (notably Java). Results are kept per language and persisted so
//! later invocations can skip the PATH search and version probe.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::language::Language;
use crate::io::atomic::write_atomic;

/// Interpreter location and version as detected on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub path: PathBuf,
    pub version: String,
}

/// Runtime cache handle, shared by reference between detectors.
#[derive(Debug, Default)]
pub struct RuntimeCache {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, RuntimeInfo>>,
}

impl RuntimeCache {
    /// Cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file at `path`; a missing or corrupt file yields an
    /// empty cache that the next write replaces.
    pub fn open(path: &Path) -> Result<Self> {
        let entries: BTreeMap<String, RuntimeInfo> = if path.exists() {
            let contents =
                fs::read(path).with_context(|| format!("read runtime cache {}", path.display()))?;
            match serde_json::from_slice(&contents) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %path.display(), err = %err, "runtime cache is corrupt, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "runtime cache loaded");
        Ok(Self::at(path, entries))
    }

    /// Empty cache bound to `path` without reading whatever is there.
    pub fn discard(path: &Path) -> Self {
        Self::at(path, BTreeMap::new())
    }

    fn at(path: &Path, entries: BTreeMap<String, RuntimeInfo>) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            entries: RwLock::new(entries),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, language: Language) -> Result<Option<RuntimeInfo>> {
        Ok(self.read()?.get(language.name()).cloned())
    }

    /// Snapshot of all cached entries keyed by language name.
    pub fn entries(&self) -> Result<BTreeMap<String, RuntimeInfo>> {
        Ok(self.read()?.clone())
    }

    pub fn set(&self, language: Language, info: RuntimeInfo) -> Result<()> {
        let mut entries = self.write()?;
        entries.insert(language.name().to_string(), info);
        self.persist(&entries)
    }

    pub fn invalidate(&self, language: Language) -> Result<()> {
        let mut entries = self.write()?;
        if entries.remove(language.name()).is_some() {
            debug!(language = %language, "runtime cache entry invalidated");
        }
        self.persist(&entries)
    }

    pub fn clear(&self) -> Result<()> {
        let mut entries = self.write()?;
        entries.clear();
        self.persist(&entries)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, RuntimeInfo>>> {
        self.entries
            .read()
            .map_err(|_| anyhow!("runtime cache lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, RuntimeInfo>>> {
        self.entries
            .write()
            .map_err(|_| anyhow!("runtime cache lock poisoned"))
    }

    /// Write entries to disk; caller holds the write lock.
    fn persist(&self, entries: &BTreeMap<String, RuntimeInfo>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut buf = serde_json::to_string_pretty(entries).context("serialize runtime cache")?;
        buf.push('\n');
        write_atomic(path, &buf)
    }
}
