//! Workspace discovery
//!
//! This module answers three questions for the rest of the engine:
//! - where the workspace root is
//! - which files are candidates for analysis (VCS-aware, with a filesystem fallback)
//! - which package owns a given file

mod config;

pub use config::{StitcherConfig, TargetConfig};

use crate::error::{Result, StitcherError};
use git2::{Repository as GitRepo, StatusOptions};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Package manifest file name
pub const MANIFEST: &str = "pyproject.toml";

/// Directory holding engine state (index, temp files, legacy signatures)
pub const STITCHER_DIR: &str = ".stitcher";

/// A resolved workspace
pub struct Workspace {
    /// Absolute path to the workspace root
    root: PathBuf,
    /// Configuration read from the root manifest
    config: StitcherConfig,
}

impl Workspace {
    /// Resolve the workspace containing `start` and load its configuration
    pub fn discover<P: AsRef<Path>>(start: P) -> Result<Self> {
        let start = start.as_ref();
        let start = start
            .canonicalize()
            .map_err(|_| StitcherError::WorkspaceNotFound(start.to_path_buf()))?;
        Self::open(Self::root_from(&start))
    }

    /// Open a workspace whose root is already known
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StitcherError::WorkspaceNotFound(root));
        }
        let config = StitcherConfig::load_or_default(&root)?;
        Ok(Self { root, config })
    }

    /// Walk ancestors of `start` looking for a VCS marker or a workspace manifest
    pub fn root_from(start: &Path) -> PathBuf {
        for dir in start.ancestors() {
            if dir.join(".git").exists() {
                return dir.to_path_buf();
            }
            if declares_workspace(&dir.join(MANIFEST)) {
                return dir.to_path_buf();
            }
        }
        start.to_path_buf()
    }

    /// Get the workspace root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &StitcherConfig {
        &self.config
    }

    /// Get the path to the .stitcher directory
    pub fn stitcher_dir(&self) -> PathBuf {
        self.root.join(STITCHER_DIR)
    }

    /// Absolute path for a workspace-relative path
    pub fn absolute(&self, rel_path: &str) -> PathBuf {
        self.root.join(rel_path)
    }

    /// List candidate files as workspace-relative, forward-slash paths
    pub fn discover_files(&self) -> Result<BTreeSet<String>> {
        let files = if self.root.join(".git").exists() {
            match self.discover_with_git() {
                Ok(files) => files,
                Err(e) => {
                    debug!("git discovery failed ({}), falling back to filesystem walk", e);
                    self.discover_with_walk()?
                }
            }
        } else {
            self.discover_with_walk()?
        };

        Ok(files
            .into_iter()
            .filter(|p| !p.starts_with(&format!("{}/", STITCHER_DIR)))
            .collect())
    }

    /// Tracked files plus untracked files that are not ignored
    fn discover_with_git(&self) -> Result<BTreeSet<String>> {
        let repo = GitRepo::open(&self.root)?;
        let mut files = BTreeSet::new();

        let index = repo.index()?;
        for entry in index.iter() {
            let path = String::from_utf8_lossy(&entry.path).to_string();
            if self.root.join(&path).is_file() {
                files.insert(path);
            }
        }

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = repo.statuses(Some(&mut opts))?;
        for entry in statuses.iter() {
            if !entry.status().is_wt_new() {
                continue;
            }
            if let Some(path) = entry.path() {
                if self.root.join(path).is_file() {
                    files.insert(path.to_string());
                }
            }
        }

        Ok(files)
    }

    /// Walk the filesystem, skipping dot directories
    fn discover_with_walk(&self) -> Result<BTreeSet<String>> {
        let mut files = BTreeSet::new();

        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 {
                    return true;
                }
                let name = e.file_name().to_str().unwrap_or("");
                !(e.file_type().is_dir()
                    && (name.starts_with('.') || name == "__pycache__" || name == "node_modules"))
            })
        {
            let entry = entry.map_err(|e| {
                StitcherError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
            if entry.file_type().is_file() {
                files.insert(self.to_workspace_relative(entry.path())?);
            }
        }

        Ok(files)
    }

    /// Python sources belonging to a target, sorted
    pub fn source_files(&self, target: &TargetConfig) -> Result<Vec<String>> {
        let files = self.discover_files()?;
        Ok(files
            .into_iter()
            .filter(|p| p.ends_with(".py"))
            .filter(|p| target.includes(p))
            .collect())
    }

    /// Nearest ancestor of `abs_path` containing a manifest, not crossing the root
    pub fn owning_package(&self, abs_path: &Path) -> PathBuf {
        let start = if abs_path.is_dir() {
            Some(abs_path)
        } else {
            abs_path.parent()
        };

        let mut current = start;
        while let Some(dir) = current {
            if !dir.starts_with(&self.root) {
                break;
            }
            if dir.join(MANIFEST).is_file() {
                return dir.to_path_buf();
            }
            if dir == self.root {
                break;
            }
            current = dir.parent();
        }

        self.root.clone()
    }

    /// Owning package for a workspace-relative path
    pub fn owning_package_of(&self, rel_path: &str) -> PathBuf {
        self.owning_package(&self.absolute(rel_path))
    }

    /// Forward-slash path relative to the root; fails outside the root
    pub fn to_workspace_relative(&self, abs_path: &Path) -> Result<String> {
        let relative = abs_path
            .strip_prefix(&self.root)
            .map_err(|_| StitcherError::OutsideWorkspace {
                path: abs_path.to_path_buf(),
                root: self.root.clone(),
            })?;
        Ok(normalize_relative(relative))
    }

    /// Dotted module name for a Python source, following package `__init__.py` files
    pub fn module_fqn(&self, rel_path: &str) -> Option<String> {
        module_fqn_for(rel_path, |dir| self.root.join(dir).join("__init__.py").is_file())
    }
}

/// Join path components with forward slashes, dropping `.` segments
pub fn normalize_relative(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(os) => os.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute a module FQN given a predicate telling which directories are packages
pub fn module_fqn_for(rel_path: &str, is_package: impl Fn(&str) -> bool) -> Option<String> {
    let (dir, file) = match rel_path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, rel_path),
    };

    let stem = file
        .strip_suffix(".py")
        .or_else(|| file.strip_suffix(".pyi"))?;

    let mut parts: Vec<&str> = Vec::new();
    if stem != "__init__" {
        parts.push(stem);
    }

    let mut current = dir;
    while let Some(d) = current {
        if !is_package(d) {
            break;
        }
        let (parent, name) = match d.rsplit_once('/') {
            Some((parent, name)) => (Some(parent), name),
            None => (None, d),
        };
        parts.push(name);
        current = parent;
    }

    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(parts.join("."))
}

/// Whether a manifest declares a workspace
fn declares_workspace(manifest: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(manifest) else {
        return false;
    };
    let Ok(value) = content.parse::<toml::Table>() else {
        return false;
    };
    value
        .get("tool")
        .and_then(|t| t.get("uv"))
        .and_then(|uv| uv.get("workspace"))
        .is_some()
}
