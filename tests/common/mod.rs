//! Workspace builder shared by the scenario tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use stitcher::feedback::MemoryFeedback;
use stitcher::{StitcherApp, Workspace};
use tempfile::TempDir;

/// A throwaway workspace rooted at a directory with a `.git` marker
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        Self { dir }
    }

    /// Add a file, creating parent directories
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.write(path, content);
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.path(path)).unwrap()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path(path).exists()
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::open(self.root()).unwrap()
    }

    pub fn app<'a>(&self, feedback: &'a MemoryFeedback) -> StitcherApp<'a> {
        StitcherApp::new(self.workspace(), feedback).unwrap()
    }

    /// Fingerprints of the lock file at `lock_path`
    pub fn lock(&self, lock_path: &str) -> serde_json::Map<String, serde_json::Value> {
        let value: serde_json::Value = serde_json::from_str(&self.read(lock_path)).unwrap();
        value["fingerprints"].as_object().cloned().unwrap()
    }

    /// One baseline field of a lock entry
    pub fn baseline(&self, lock_path: &str, suri: &str, key: &str) -> Option<String> {
        self.lock(lock_path)
            .get(suri)?
            .get(key)?
            .as_str()
            .map(str::to_string)
    }
}
