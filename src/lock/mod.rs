//! Per-package baseline lock files
//!
//! Each package root holds a `stitcher.lock` mapping SURIs to the baseline
//! part of their fingerprints. Locks are loaded lazily, cached for the life
//! of the manager and only rewritten when their content changed.

mod legacy;

pub use legacy::LEGACY_DIR;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::transaction::{write_atomic, TransactionManager};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock file name inside a package root
pub const LOCK_FILE: &str = "stitcher.lock";

/// Format version written to and expected from lock files
pub const LOCK_VERSION: &str = "1.0";

/// SURI to baseline fingerprint
pub type LockData = BTreeMap<String, Fingerprint>;

/// On-disk shape of a lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    pub version: String,
    pub fingerprints: LockData,
}

impl LockFile {
    pub fn new(fingerprints: LockData) -> Self {
        Self {
            version: LOCK_VERSION.to_string(),
            fingerprints,
        }
    }

    /// Canonical text: sorted keys, two-space indent, trailing newline
    pub fn to_canonical_string(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

/// Why a lock file was read as empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Loaded,
    Missing,
    VersionMismatch,
    Corrupt,
}

/// Read a lock file, degrading every failure to an empty map
pub fn read_lock(path: &Path) -> (LockData, LockStatus) {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return (LockData::new(), LockStatus::Missing),
    };

    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!("lock file {} is not valid JSON: {}", path.display(), e);
            return (LockData::new(), LockStatus::Corrupt);
        }
    };

    if value.get("version").and_then(|v| v.as_str()) != Some(LOCK_VERSION) {
        warn!("lock file {} has an unsupported version; ignoring it", path.display());
        return (LockData::new(), LockStatus::VersionMismatch);
    }

    match serde_json::from_value::<LockFile>(value) {
        Ok(lock) => (lock.fingerprints, LockStatus::Loaded),
        Err(e) => {
            warn!("lock file {} is corrupt: {}", path.display(), e);
            (LockData::new(), LockStatus::Corrupt)
        }
    }
}

/// Write a lock atomically; an empty map removes the file instead
pub fn write_lock(path: &Path, data: &LockData) -> Result<()> {
    if data.is_empty() {
        if path.exists() {
            fs::remove_file(path)?;
        }
        return Ok(());
    }
    let text = LockFile::new(data.clone()).to_canonical_string()?;
    write_atomic(path, text.as_bytes())?;
    Ok(())
}

struct CachedLock {
    /// Content as read from disk
    original: LockData,
    current: LockData,
}

/// Cached access to every package lock in a workspace
pub struct LockManager {
    root: PathBuf,
    stitcher_dir: PathBuf,
    cache: HashMap<PathBuf, CachedLock>,
    corrupt: Vec<PathBuf>,
    legacy_checked: bool,
}

impl LockManager {
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            root: workspace.root().to_path_buf(),
            stitcher_dir: workspace.stitcher_dir(),
            cache: HashMap::new(),
            corrupt: Vec::new(),
            legacy_checked: false,
        }
    }

    /// Path of the lock file for a package root
    pub fn lock_path(package_root: &Path) -> PathBuf {
        package_root.join(LOCK_FILE)
    }

    fn entry(&mut self, package_root: &Path) -> &mut CachedLock {
        let corrupt = &mut self.corrupt;
        self.cache
            .entry(package_root.to_path_buf())
            .or_insert_with(|| {
                let path = Self::lock_path(package_root);
                let (data, status) = read_lock(&path);
                debug!("loaded lock {} ({:?}, {} entries)", path.display(), status, data.len());
                if matches!(status, LockStatus::Corrupt | LockStatus::VersionMismatch) {
                    corrupt.push(path);
                }
                CachedLock {
                    original: data.clone(),
                    current: data,
                }
            })
    }

    /// All baselines of a package
    pub fn load(&mut self, package_root: &Path) -> &LockData {
        &self.entry(package_root).current
    }

    /// Baseline for one SURI
    pub fn get(&mut self, package_root: &Path, suri: &str) -> Option<Fingerprint> {
        self.entry(package_root).current.get(suri).cloned()
    }

    /// Record a baseline; only `baseline_*` keys are kept
    pub fn set(&mut self, package_root: &Path, suri: &str, fingerprint: &Fingerprint) {
        let baseline = fingerprint.baseline_only();
        let lock = &mut self.entry(package_root).current;
        if baseline.is_empty() {
            lock.remove(suri);
        } else {
            lock.insert(suri.to_string(), baseline);
        }
    }

    pub fn remove(&mut self, package_root: &Path, suri: &str) -> Option<Fingerprint> {
        self.entry(package_root).current.remove(suri)
    }

    /// Mutable access to a package's baselines
    pub fn entries_mut(&mut self, package_root: &Path) -> &mut LockData {
        &mut self.entry(package_root).current
    }

    /// Lock files found corrupt or of an unknown version so far
    pub fn corrupt_locks(&self) -> &[PathBuf] {
        &self.corrupt
    }

    /// Packages whose baselines differ from what was loaded
    pub fn dirty_packages(&self) -> Vec<PathBuf> {
        let mut dirty: Vec<PathBuf> = self
            .cache
            .iter()
            .filter(|(_, lock)| lock.original != lock.current)
            .map(|(root, _)| root.clone())
            .collect();
        dirty.sort();
        dirty
    }

    /// Serialized text for a package as it would be saved; `None` removes the file
    pub fn pending_content(&self, package_root: &Path) -> Result<Option<String>> {
        match self.cache.get(package_root) {
            Some(lock) if !lock.current.is_empty() => Ok(Some(
                LockFile::new(lock.current.clone()).to_canonical_string()?,
            )),
            _ => Ok(None),
        }
    }

    /// Stage every changed lock into a transaction instead of writing it
    ///
    /// Call [`LockManager::mark_saved`] once the transaction committed.
    pub fn stage_into(&self, workspace: &Workspace, tx: &mut TransactionManager) -> Result<usize> {
        let dirty = self.dirty_packages();
        for root in &dirty {
            let path = workspace.to_workspace_relative(&Self::lock_path(root))?;
            match self.pending_content(root)? {
                Some(content) => tx.add_write(path, content),
                None => tx.add_delete_file(path),
            }
        }
        Ok(dirty.len())
    }

    /// Write every changed lock; returns the number of files touched
    pub fn flush(&mut self) -> Result<usize> {
        let mut written = 0;
        for root in self.dirty_packages() {
            if let Some(lock) = self.cache.get_mut(&root) {
                write_lock(&Self::lock_path(&root), &lock.current)?;
                lock.original = lock.current.clone();
                written += 1;
            }
        }
        Ok(written)
    }

    /// Mark every cached lock as saved without writing
    ///
    /// Used after lock content was committed through a transaction.
    pub fn mark_saved(&mut self) {
        for lock in self.cache.values_mut() {
            lock.original = lock.current.clone();
        }
    }

    /// Fold a legacy signature tree into package locks, once per manager
    pub fn migrate_legacy(&mut self, workspace: &Workspace) -> Result<usize> {
        if self.legacy_checked {
            return Ok(0);
        }
        self.legacy_checked = true;

        let legacy_root = self.stitcher_dir.join(LEGACY_DIR);
        if !legacy_root.is_dir() {
            return Ok(0);
        }

        let entries = legacy::read_tree(&legacy_root)?;
        let mut migrated = 0;
        for (source_path, fingerprints) in entries {
            let package = workspace.owning_package_of(&source_path);
            for (suri, fingerprint) in fingerprints {
                let lock = self.entries_mut(&package);
                // Entries already present in a lock are newer
                if !lock.contains_key(&suri) {
                    lock.insert(suri, fingerprint.baseline_only());
                    migrated += 1;
                }
            }
        }

        self.flush()?;
        fs::remove_dir_all(&legacy_root)?;
        debug!(
            "migrated {} legacy signatures from {} under {}",
            migrated,
            legacy_root.display(),
            self.root.display()
        );
        Ok(migrated)
    }
}
