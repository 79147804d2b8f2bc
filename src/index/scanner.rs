//! Incremental index refresh
//!
//! Four stages run in order over the sorted file list: discover (and prune),
//! stat, hash, parse. A file is only reparsed when both its stat and its
//! content hash changed, so a refresh with no edits writes nothing.

use super::{linker, IndexStore, IndexingStatus, ScanStats};
use crate::error::{Result, StitcherError};
use crate::fingerprint::sha256_bytes_hex;
use crate::lang::{AdapterRegistry, FileAnalysis};
use crate::workspace::Workspace;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// Keeps an [`IndexStore`] in step with the workspace
pub struct Scanner<'a> {
    workspace: &'a Workspace,
    store: &'a IndexStore,
    registry: &'a AdapterRegistry,
}

impl<'a> Scanner<'a> {
    pub fn new(workspace: &'a Workspace, store: &'a IndexStore, registry: &'a AdapterRegistry) -> Self {
        Self {
            workspace,
            store,
            registry,
        }
    }

    /// Bring the index up to date and link references
    pub fn refresh(&self) -> Result<ScanStats> {
        let discovered = self.workspace.discover_files()?;
        let stats = self.store.transaction(|store| {
            let stats = self.scan(store, &discovered)?;
            linker::link(store)?;
            Ok(stats)
        })?;

        info!(
            "index refreshed: {} added, {} updated, {} deleted, {} skipped, {} failed",
            stats.added, stats.updated, stats.deleted, stats.skipped, stats.failed
        );
        Ok(stats)
    }

    fn scan(&self, store: &IndexStore, discovered: &BTreeSet<String>) -> Result<ScanStats> {
        let mut stats = ScanStats::default();

        // Stage 1: discover
        let deleted: Vec<String> = store
            .all_files()?
            .into_iter()
            .map(|f| f.path)
            .filter(|p| !discovered.contains(p))
            .collect();
        if !deleted.is_empty() {
            debug!("pruning {} vanished files", deleted.len());
            stats.deleted = store.prune_files(&deleted)?;
        }

        for path in discovered {
            let abs = self.workspace.absolute(path);

            // Stage 2: stat
            let Some((mtime, size)) = stat(&abs) else {
                warn!("cannot stat {}; skipping", path);
                stats.failed += 1;
                continue;
            };
            let known = store.file_by_path(path)?;
            if let Some(file) = &known {
                if file.last_mtime == mtime
                    && file.last_size == size
                    && file.indexing_status == IndexingStatus::Clean
                {
                    stats.skipped += 1;
                    continue;
                }
            }

            // Stage 3: hash
            let bytes = match fs::read(&abs) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("cannot read {}: {}", path, e);
                    stats.failed += 1;
                    continue;
                }
            };
            let hash = sha256_bytes_hex(&bytes);
            if let Some(file) = &known {
                if file.content_hash == hash && file.indexing_status == IndexingStatus::Clean {
                    store.update_file_stat(file.id, mtime, size)?;
                    stats.skipped += 1;
                    continue;
                }
            }

            // Stage 4: parse
            let file_id = store.upsert_file(path, &hash, mtime, size, IndexingStatus::Dirty)?;
            let analysis = match self.analyze(path, &bytes) {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!("failed to index {}: {}", path, e);
                    stats.failed += 1;
                    FileAnalysis::default()
                }
            };
            store.replace_file_analysis(file_id, &analysis)?;

            if known.is_some() {
                stats.updated += 1;
            } else {
                stats.added += 1;
            }
        }

        Ok(stats)
    }

    fn analyze(&self, path: &str, bytes: &[u8]) -> Result<FileAnalysis> {
        let Some(adapter) = self.registry.for_path(path) else {
            return Ok(FileAnalysis::default());
        };
        let source = std::str::from_utf8(bytes)
            .map_err(|e| StitcherError::parse(path, format!("not UTF-8: {}", e)))?;
        let module_fqn = self.workspace.module_fqn(path);
        adapter.analyze(path, module_fqn.as_deref(), source)
    }
}

/// Modification time in nanoseconds and size in bytes
fn stat(path: &Path) -> Option<(i64, i64)> {
    let meta = fs::metadata(path).ok()?;
    let mtime = meta
        .modified()
        .ok()?
        .duration_since(UNIX_EPOCH)
        .ok()?
        .as_nanos() as i64;
    Some((mtime, meta.len() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn workspace(files: &[(&str, &str)]) -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let ws = Workspace::open(dir.path()).unwrap();
        (dir, ws)
    }

    fn dump(store: &IndexStore) -> Vec<String> {
        let mut out = Vec::new();
        for file in store.all_files().unwrap() {
            out.push(format!("{:?}", file));
            for symbol in store.symbols_for_file(file.id).unwrap() {
                out.push(format!("{:?}", symbol));
            }
            for reference in store.references_in_file(file.id).unwrap() {
                out.push(format!("{:?}", reference));
            }
        }
        out
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let (_dir, ws) = workspace(&[
            ("pkg/__init__.py", "from .bus import MessageBus\n"),
            ("pkg/bus.py", "class MessageBus:\n    pass\n"),
            ("README.md", "# readme\n"),
        ]);
        let store = IndexStore::open_in_memory().unwrap();
        let registry = AdapterRegistry::with_defaults();
        let scanner = Scanner::new(&ws, &store, &registry);

        let first = scanner.refresh().unwrap();
        assert_eq!(first.added, 3);
        let snapshot = dump(&store);

        let second = scanner.refresh().unwrap();
        assert!(!second.changed());
        assert_eq!(second.skipped, 3);
        assert_eq!(dump(&store), snapshot);
    }

    #[test]
    fn test_refresh_tracks_edits_and_deletes() {
        let (dir, ws) = workspace(&[
            ("pkg/__init__.py", ""),
            ("pkg/a.py", "def f():\n    pass\n"),
            ("pkg/b.py", "def g():\n    pass\n"),
        ]);
        let store = IndexStore::open_in_memory().unwrap();
        let registry = AdapterRegistry::with_defaults();
        let scanner = Scanner::new(&ws, &store, &registry);
        scanner.refresh().unwrap();

        let a_id = store.file_by_path("pkg/a.py").unwrap().unwrap().id;
        fs::write(dir.path().join("pkg/a.py"), "def f2():\n    pass\n").unwrap();
        fs::remove_file(dir.path().join("pkg/b.py")).unwrap();

        let stats = scanner.refresh().unwrap();
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(store.file_by_path("pkg/a.py").unwrap().unwrap().id, a_id);
        assert!(store.symbol_by_fqn("pkg.a.f").unwrap().is_none());
        assert!(store.symbol_by_fqn("pkg.a.f2").unwrap().is_some());
        assert!(store.symbol_by_fqn("pkg.b.g").unwrap().is_none());
    }

    #[test]
    fn test_parse_failure_marks_file_clean_and_empty() {
        let (_dir, ws) = workspace(&[("broken.py", "def (:\n"), ("ok.py", "X = 1\n")]);
        let store = IndexStore::open_in_memory().unwrap();
        let registry = AdapterRegistry::with_defaults();
        let stats = Scanner::new(&ws, &store, &registry).refresh().unwrap();

        assert_eq!(stats.failed, 1);
        let broken = store.file_by_path("broken.py").unwrap().unwrap();
        assert_eq!(broken.indexing_status, IndexingStatus::Clean);
        assert!(store.symbols_for_file(broken.id).unwrap().is_empty());
        assert!(store.symbol_by_fqn("ok.X").unwrap().is_some());
    }

    #[test]
    fn test_stat_missing_file() {
        assert!(stat(&PathBuf::from("/definitely/not/here.py")).is_none());
    }
}
