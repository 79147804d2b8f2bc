//! Staged file operations with atomic commit and rollback
//!
//! Operations are collected first and applied together by
//! [`TransactionManager::commit`]: writes, then moves, then file deletes,
//! then directory deletes. Deleted paths are parked in a trash directory
//! under `.stitcher/tmp` until the commit succeeds, so a failure at any
//! point restores the previous state.

use crate::error::{Result, StitcherError};
use similar::TextDiff;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Directory for temp files and the delete trash, relative to `.stitcher`
pub const TMP_DIR: &str = "tmp";

/// A single staged filesystem change; paths are workspace-relative
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOp {
    WriteFile { path: String, content: String },
    MoveFile { src: String, dest: String },
    DeleteFile { path: String },
    DeleteDirectory { path: String },
}

impl FileOp {
    fn phase(&self) -> u8 {
        match self {
            FileOp::WriteFile { .. } => 0,
            FileOp::MoveFile { .. } => 1,
            FileOp::DeleteFile { .. } => 2,
            FileOp::DeleteDirectory { .. } => 3,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FileOp::WriteFile { .. } => "write",
            FileOp::MoveFile { .. } => "move",
            FileOp::DeleteFile { .. } => "delete",
            FileOp::DeleteDirectory { .. } => "delete directory",
        }
    }
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOp::WriteFile { path, .. } => write!(f, "[WRITE] {}", path),
            FileOp::MoveFile { src, dest } => write!(f, "[MOVE] {} -> {}", src, dest),
            FileOp::DeleteFile { path } => write!(f, "[DELETE] {}", path),
            FileOp::DeleteDirectory { path } => write!(f, "[DELETE DIR] {}/", path),
        }
    }
}

/// Undo record for one applied operation
enum JournalEntry {
    /// File did not exist before the write
    Created(PathBuf),
    /// Directory created to hold a write or move target
    CreatedDir(PathBuf),
    /// File existed; its previous bytes
    Overwritten(PathBuf, Vec<u8>),
    Moved { from: PathBuf, to: PathBuf },
    /// Moved into the trash
    Trashed { original: PathBuf, trashed: PathBuf },
}

/// Collects file operations and applies them as one unit
pub struct TransactionManager {
    root: PathBuf,
    tmp_dir: PathBuf,
    ops: Vec<FileOp>,
}

impl TransactionManager {
    pub fn new(root: impl Into<PathBuf>, stitcher_dir: impl AsRef<Path>) -> Self {
        Self {
            root: root.into(),
            tmp_dir: stitcher_dir.as_ref().join(TMP_DIR),
            ops: Vec::new(),
        }
    }

    pub fn add_write(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.ops.push(FileOp::WriteFile {
            path: path.into(),
            content: content.into(),
        });
    }

    pub fn add_move(&mut self, src: impl Into<String>, dest: impl Into<String>) {
        self.ops.push(FileOp::MoveFile {
            src: src.into(),
            dest: dest.into(),
        });
    }

    pub fn add_delete_file(&mut self, path: impl Into<String>) {
        self.ops.push(FileOp::DeleteFile { path: path.into() });
    }

    pub fn add_delete_dir(&mut self, path: impl Into<String>) {
        self.ops.push(FileOp::DeleteDirectory { path: path.into() });
    }

    pub fn add(&mut self, op: FileOp) {
        self.ops.push(op);
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = FileOp>) {
        self.ops.extend(ops);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Operations in the order they will be applied
    pub fn ops(&self) -> Vec<&FileOp> {
        let mut ops: Vec<&FileOp> = self.ops.iter().collect();
        ops.sort_by_key(|op| op.phase());
        ops
    }

    /// Human-readable description of the pending operations
    ///
    /// Writes to existing files include a unified diff against the current
    /// content. Nothing on disk is touched.
    pub fn preview(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for op in self.ops() {
            lines.push(op.to_string());
            if let FileOp::WriteFile { path, content } = op {
                let old = fs::read_to_string(self.root.join(path)).unwrap_or_default();
                if old != *content {
                    let diff = TextDiff::from_lines(old.as_str(), content.as_str());
                    let rendered = diff
                        .unified_diff()
                        .context_radius(2)
                        .header(&format!("a/{}", path), &format!("b/{}", path))
                        .to_string();
                    lines.push(rendered.trim_end().to_string());
                }
            }
        }
        lines
    }

    /// Apply every operation; on failure restore the pre-commit state
    pub fn commit(&mut self) -> Result<usize> {
        let ops: Vec<FileOp> = self.ops().into_iter().cloned().collect();
        if ops.is_empty() {
            return Ok(0);
        }

        let trash = self.tmp_dir.join(format!("trash-{}", uuid::Uuid::new_v4()));
        let mut journal: Vec<JournalEntry> = Vec::new();

        for op in &ops {
            if let Err(source) = self.apply(op, &trash, &mut journal) {
                error!("{} failed ({}); rolling back {} operations", op, source, journal.len());
                self.rollback(journal);
                let _ = fs::remove_dir_all(&trash);
                return Err(StitcherError::Transaction {
                    op: op.to_string(),
                    source,
                });
            }
        }

        if trash.exists() {
            if let Err(e) = fs::remove_dir_all(&trash) {
                warn!("could not empty trash {}: {}", trash.display(), e);
            }
        }
        debug!("committed {} file operations", ops.len());
        self.ops.clear();
        Ok(ops.len())
    }

    fn apply(&self, op: &FileOp, trash: &Path, journal: &mut Vec<JournalEntry>) -> std::io::Result<()> {
        debug!("applying {} op: {}", op.name(), op);
        match op {
            FileOp::WriteFile { path, content } => {
                let target = self.root.join(path);
                let entry = match fs::read(&target) {
                    Ok(previous) => JournalEntry::Overwritten(target.clone(), previous),
                    Err(_) => JournalEntry::Created(target.clone()),
                };
                if let Some(parent) = target.parent() {
                    self.create_parents(parent, journal)?;
                }
                write_atomic(&target, content.as_bytes())?;
                journal.push(entry);
            }
            FileOp::MoveFile { src, dest } => {
                let from = self.root.join(src);
                let to = self.root.join(dest);
                if !from.exists() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("move source {} does not exist", src),
                    ));
                }
                if to.exists() {
                    self.trash_path(&to, trash, journal)?;
                }
                if let Some(parent) = to.parent() {
                    self.create_parents(parent, journal)?;
                }
                fs::rename(&from, &to)?;
                journal.push(JournalEntry::Moved { from, to });
            }
            FileOp::DeleteFile { path } | FileOp::DeleteDirectory { path } => {
                let target = self.root.join(path);
                if target.exists() {
                    self.trash_path(&target, trash, journal)?;
                } else {
                    debug!("{} already absent", path);
                }
            }
        }
        Ok(())
    }

    /// Create `dir` and its missing ancestors inside the root, journaling each
    fn create_parents(&self, dir: &Path, journal: &mut Vec<JournalEntry>) -> std::io::Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(d) = current {
            if d.exists() || !d.starts_with(&self.root) || d == self.root {
                break;
            }
            missing.push(d.to_path_buf());
            current = d.parent();
        }
        fs::create_dir_all(dir)?;
        journal.extend(missing.into_iter().rev().map(JournalEntry::CreatedDir));
        Ok(())
    }

    fn trash_path(&self, target: &Path, trash: &Path, journal: &mut Vec<JournalEntry>) -> std::io::Result<()> {
        let relative = target.strip_prefix(&self.root).unwrap_or(target);
        let parked = trash.join(format!("{}-{}", journal.len(), sanitize(relative)));
        fs::create_dir_all(trash)?;
        fs::rename(target, &parked)?;
        journal.push(JournalEntry::Trashed {
            original: target.to_path_buf(),
            trashed: parked,
        });
        Ok(())
    }

    fn rollback(&self, journal: Vec<JournalEntry>) {
        for entry in journal.into_iter().rev() {
            let result = match &entry {
                JournalEntry::Created(path) => fs::remove_file(path),
                JournalEntry::CreatedDir(path) => fs::remove_dir(path),
                JournalEntry::Overwritten(path, previous) => write_atomic(path, previous),
                JournalEntry::Moved { from, to } => fs::rename(to, from),
                JournalEntry::Trashed { original, trashed } => {
                    if let Some(parent) = original.parent() {
                        let _ = fs::create_dir_all(parent);
                    }
                    fs::rename(trashed, original)
                }
            };
            if let Err(e) = result {
                error!("rollback step failed: {}", e);
            }
        }
    }
}

fn sanitize(relative: &Path) -> String {
    relative
        .to_string_lossy()
        .replace(|c: char| c == '/' || c == '\\', "__")
}

/// Write through a sibling temp file and rename it into place
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> TransactionManager {
        TransactionManager::new(dir.path(), dir.path().join(".stitcher"))
    }

    fn read(dir: &TempDir, rel: &str) -> Option<String> {
        fs::read_to_string(dir.path().join(rel)).ok()
    }

    #[test]
    fn test_commit_orders_phases() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "old\n").unwrap();
        fs::create_dir_all(dir.path().join("gone")).unwrap();
        fs::write(dir.path().join("gone/x.py"), "x").unwrap();

        let mut tx = manager(&dir);
        tx.add_delete_dir("gone");
        tx.add_move("a.py", "pkg/b.py");
        tx.add_write("a.py", "new\n");

        let ops: Vec<String> = tx.ops().iter().map(|op| op.to_string()).collect();
        assert_eq!(ops, vec!["[WRITE] a.py", "[MOVE] a.py -> pkg/b.py", "[DELETE DIR] gone/"]);

        assert_eq!(tx.commit().unwrap(), 3);
        assert_eq!(read(&dir, "pkg/b.py").as_deref(), Some("new\n"));
        assert!(read(&dir, "a.py").is_none());
        assert!(!dir.path().join("gone").exists());
        assert!(tx.is_empty());

        let tmp = dir.path().join(".stitcher/tmp");
        let leftovers = fs::read_dir(&tmp).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_failed_commit_restores_everything() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.py"), "original\n").unwrap();
        fs::write(dir.path().join("doomed.py"), "doomed\n").unwrap();

        let mut tx = manager(&dir);
        tx.add_write("keep.py", "changed\n");
        tx.add_write("fresh.py", "fresh\n");
        tx.add_delete_file("doomed.py");
        tx.add_move("missing.py", "elsewhere.py");

        let err = tx.commit().unwrap_err();
        assert!(matches!(err, StitcherError::Transaction { .. }));

        assert_eq!(read(&dir, "keep.py").as_deref(), Some("original\n"));
        assert!(read(&dir, "fresh.py").is_none());
        assert_eq!(read(&dir, "doomed.py").as_deref(), Some("doomed\n"));
    }

    #[test]
    fn test_rollback_removes_created_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();

        let mut tx = manager(&dir);
        tx.add_write("new/deep/b.txt", "b\n");
        tx.add_write("pkg/sub/c.txt", "c\n");
        tx.add_move("missing.py", "elsewhere.py");

        assert!(tx.commit().is_err());
        assert!(!dir.path().join("new").exists());
        assert!(!dir.path().join("pkg/sub").exists());
        assert!(dir.path().join("pkg").is_dir());
    }

    #[test]
    fn test_preview_shows_diff_without_touching_disk() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m.py"), "class MessageBus:\n    pass\n").unwrap();

        let mut tx = manager(&dir);
        tx.add_write("m.py", "class FeedbackBus:\n    pass\n");
        let preview = tx.preview().join("\n");

        assert!(preview.contains("[WRITE] m.py"));
        assert!(preview.contains("-class MessageBus:"));
        assert!(preview.contains("+class FeedbackBus:"));
        assert_eq!(read(&dir, "m.py").as_deref(), Some("class MessageBus:\n    pass\n"));
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_atomic(&path, b"hi").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hi");
        assert_eq!(fs::read_dir(dir.path().join("a/b")).unwrap().count(), 1);
    }
}
