//! Application layer
//!
//! [`StitcherApp`] is built once per invocation from a workspace and a
//! feedback sink and exposes one method per command. It owns the wiring
//! between index, locks, documents and the engines; the CLI only maps
//! arguments and exit codes.

mod coverage;
mod pump;

pub use coverage::{CoverageReport, CoverageRow};
pub use pump::{PumpOptions, PumpReport};

use crate::check::{CheckOptions, CheckReport, ConsistencyEngine};
use crate::doc::{DocumentManager, HydrateOptions};
use crate::error::StitcherError;
use crate::feedback::{msg, Feedback, Message};
use crate::index::{IndexStore, ScanStats, Scanner};
use crate::interaction::{InteractionHandler, NoOpInteractionHandler, TerminalInteractionHandler};
use crate::lang::{AdapterRegistry, LanguageAdapter, ModuleDef};
use crate::lock::LockManager;
use crate::refactor::{MigrationSpec, Planner, RefactorPlan};
use crate::transaction::TransactionManager;
use crate::workspace::{TargetConfig, Workspace};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Index database location under `.stitcher`
pub const INDEX_DB: &str = "index/index.db";

/// Composition root for every command
pub struct StitcherApp<'a> {
    workspace: Workspace,
    registry: AdapterRegistry,
    feedback: &'a dyn Feedback,
}

/// A planned refactor waiting for confirmation
pub struct PreparedRefactor {
    pub plan: RefactorPlan,
    tx: TransactionManager,
    locks: LockManager,
}

impl PreparedRefactor {
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// One line per staged operation, with diffs for rewritten files
    pub fn preview(&self) -> Vec<String> {
        self.tx.preview()
    }
}

impl<'a> StitcherApp<'a> {
    /// Build the app for an opened workspace
    pub fn new(workspace: Workspace, feedback: &'a dyn Feedback) -> Result<Self> {
        workspace
            .config()
            .validate_disjoint(&workspace)
            .context("Invalid target configuration")?;
        Ok(Self {
            workspace,
            registry: AdapterRegistry::with_defaults(),
            feedback,
        })
    }

    /// Find the workspace containing `start` and build the app for it
    pub fn discover(start: &Path, feedback: &'a dyn Feedback) -> Result<Self> {
        let workspace = Workspace::discover(start)
            .with_context(|| format!("No workspace found at {}", start.display()))?;
        debug!("workspace root: {}", workspace.root().display());
        Self::new(workspace, feedback)
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn index_path(&self) -> PathBuf {
        self.workspace.stitcher_dir().join(INDEX_DB)
    }

    fn open_index(&self) -> Result<IndexStore> {
        let path = self.index_path();
        IndexStore::open(&path).with_context(|| format!("Failed to open index at {}", path.display()))
    }

    fn refresh_index(&self, store: &IndexStore) -> Result<ScanStats> {
        let stats = Scanner::new(&self.workspace, store, &self.registry).refresh()?;
        debug!("index refresh: {:?}", stats);
        Ok(stats)
    }

    /// Lock manager with the legacy signature tree folded in
    fn lock_manager(&self) -> Result<LockManager> {
        let mut locks = LockManager::new(&self.workspace);
        let migrated = locks.migrate_legacy(&self.workspace)?;
        if migrated > 0 {
            self.feedback
                .emit(Message::info(msg::lock::LEGACY_MIGRATED).with("count", migrated));
        }
        Ok(locks)
    }

    fn documents(&self, target: &TargetConfig) -> DocumentManager {
        DocumentManager::new(self.workspace.root(), target.docstring_style)
    }

    /// Every source file of every target, with its target
    fn sources(&self) -> Result<Vec<(&TargetConfig, String)>> {
        let mut out = Vec::new();
        for target in &self.workspace.config().targets {
            for path in self.workspace.source_files(target)? {
                out.push((target, path));
            }
        }
        Ok(out)
    }

    /// Parse a source file; failures are reported and yield `None`
    fn load_module(&self, path: &str) -> Result<Option<(&dyn LanguageAdapter, String, ModuleDef)>> {
        let Some(adapter) = self.registry.for_path(path) else {
            return Ok(None);
        };
        let source = fs::read_to_string(self.workspace.absolute(path))
            .with_context(|| format!("Failed to read {}", path))?;
        match adapter.parse_module(path, &source) {
            Ok(module) => Ok(Some((adapter, source, module))),
            Err(e) => {
                warn!("skipping {}: {}", path, e);
                self.feedback.emit(
                    Message::warning(msg::index::FILE_FAILED)
                        .with("path", path)
                        .with("reason", e),
                );
                Ok(None)
            }
        }
    }

    fn new_transaction(&self) -> TransactionManager {
        TransactionManager::new(self.workspace.root(), self.workspace.stitcher_dir())
    }

    /// `index build`
    pub fn index_build(&self) -> Result<ScanStats> {
        self.feedback.emit(Message::info(msg::index::RUN_START));
        let store = self.open_index()?;
        let stats = self.refresh_index(&store)?;
        self.feedback.emit(
            Message::success(msg::index::RUN_COMPLETE)
                .with("added", stats.added)
                .with("updated", stats.updated)
                .with("deleted", stats.deleted)
                .with("skipped", stats.skipped),
        );
        Ok(stats)
    }

    /// `init`: externalise code docs and record baselines for every symbol
    pub fn init(&self) -> Result<usize> {
        let store = self.open_index()?;
        self.refresh_index(&store)?;
        let mut locks = self.lock_manager()?;
        let engine = ConsistencyEngine::new(&self.workspace, &self.registry, self.feedback);

        let options = HydrateOptions {
            reconcile: true,
            ..HydrateOptions::default()
        };
        let mut created = 0;
        for (target, path) in self.sources()? {
            let Some((_, _, module)) = self.load_module(&path)? else {
                continue;
            };
            let docs = self.documents(target);
            let had_sidecar = self.workspace.absolute(&docs.sidecar_path(&path)).is_file();
            let result = docs.hydrate_module(&module, &options)?;
            if !had_sidecar && !result.updated.is_empty() {
                created += 1;
                self.feedback.emit(
                    Message::success(msg::init::FILE_CREATED).with("path", docs.sidecar_path(&path)),
                );
            }

            let Some(file) = engine.analyze_file(target, &path, &mut locks)? else {
                continue;
            };
            for (state, _) in &file.states {
                if !state.exists_in_code {
                    continue;
                }
                let baseline = state.accepted_baseline();
                if !baseline.is_empty() {
                    locks.set(&file.package_root, &state.suri, &baseline);
                }
            }
        }

        let mut tx = self.new_transaction();
        locks.stage_into(&self.workspace, &mut tx)?;
        tx.commit().context("Failed to write lock files")?;
        locks.mark_saved();

        if created == 0 {
            self.feedback.emit(Message::info(msg::init::NO_DOCS_FOUND));
        } else {
            self.feedback
                .emit(Message::success(msg::init::RUN_COMPLETE).with("count", created));
        }
        Ok(created)
    }

    /// `check` with the handler chosen from the terminal and flags
    pub fn check(&self, options: &CheckOptions, non_interactive: bool) -> Result<CheckReport> {
        if !non_interactive && TerminalInteractionHandler::is_available() {
            self.check_with(options, &mut TerminalInteractionHandler::new())
        } else {
            let mut handler = NoOpInteractionHandler::for_check(options.force_relink, options.reconcile);
            self.check_with(options, &mut handler)
        }
    }

    /// `check` with an explicit interaction handler
    pub fn check_with(&self, options: &CheckOptions, handler: &mut dyn InteractionHandler) -> Result<CheckReport> {
        let mut locks = self.lock_manager()?;
        let engine = ConsistencyEngine::new(&self.workspace, &self.registry, self.feedback);
        let report = engine.run(&mut locks, handler, options)?;
        info!(
            "check: {} files, {} errors, {} warnings",
            report.files, report.errors, report.warnings
        );
        Ok(report)
    }

    /// `pump` with the handler chosen from the terminal and flags
    pub fn pump(&self, options: &PumpOptions, non_interactive: bool) -> Result<PumpReport> {
        if !non_interactive && TerminalInteractionHandler::is_available() {
            self.pump_with(options, &mut TerminalInteractionHandler::new())
        } else {
            let mut handler = NoOpInteractionHandler::for_pump(options.force, options.reconcile);
            self.pump_with(options, &mut handler)
        }
    }

    /// `inject`: write sidecar docs back into code
    pub fn inject(&self) -> Result<usize> {
        let mut tx = self.new_transaction();
        let mut found_docs = false;

        for (target, path) in self.sources()? {
            let docs = self.documents(target);
            let rendered = self.rendered_docs(&docs, &path, target)?;
            if rendered.is_empty() {
                continue;
            }
            found_docs = true;
            let Some((adapter, source, _)) = self.load_module(&path)? else {
                continue;
            };
            let injected = adapter.inject_docstrings(&source, &rendered)?;
            if injected != source {
                self.feedback
                    .emit(Message::success(msg::inject::FILE_SUCCESS).with("path", &path));
                tx.add_write(path, injected);
            }
        }

        if !found_docs {
            self.feedback.emit(Message::info(msg::inject::NO_DOCS_FOUND));
            return Ok(0);
        }
        let count = tx.len();
        tx.commit().context("Failed to write injected sources")?;
        self.feedback
            .emit(Message::success(msg::inject::RUN_COMPLETE).with("count", count));
        Ok(count)
    }

    /// `strip`: remove every doc string from code
    pub fn strip(&self) -> Result<usize> {
        let mut tx = self.new_transaction();
        for (_, path) in self.sources()? {
            let Some((adapter, source, _)) = self.load_module(&path)? else {
                continue;
            };
            let stripped = adapter.strip_docstrings(&source, None)?;
            if stripped != source {
                self.feedback
                    .emit(Message::success(msg::strip::FILE_SUCCESS).with("path", &path));
                tx.add_write(path, stripped);
            }
        }

        let count = tx.len();
        tx.commit().context("Failed to write stripped sources")?;
        self.feedback
            .emit(Message::success(msg::strip::RUN_COMPLETE).with("count", count));
        Ok(count)
    }

    /// `generate`: write type stubs carrying the sidecar docs
    pub fn generate(&self) -> Result<usize> {
        let mut tx = self.new_transaction();
        for (target, path) in self.sources()? {
            let Some((adapter, _, module)) = self.load_module(&path)? else {
                continue;
            };
            let docs = self.documents(target);
            let rendered = self.rendered_docs(&docs, &path, target)?;
            let stub = adapter.render_stub(&module, &rendered);
            let stub_path = stub_path_for(&path, adapter.stub_extension(), target.stub_path.as_deref());

            self.feedback
                .emit(Message::success(msg::generate::FILE_SUCCESS).with("path", &stub_path));
            tx.add_write(stub_path, stub);
        }

        let count = tx.len();
        tx.commit().context("Failed to write stub files")?;
        self.feedback
            .emit(Message::success(msg::generate::RUN_COMPLETE).with("count", count));
        Ok(count)
    }

    /// Sidecar docs of a file rendered as doc string text
    fn rendered_docs(
        &self,
        docs: &DocumentManager,
        path: &str,
        target: &TargetConfig,
    ) -> Result<BTreeMap<String, String>> {
        let irs = docs
            .load_docs_for_module(path)
            .with_context(|| format!("Failed to read sidecar of {}", path))?;
        Ok(irs
            .into_iter()
            .filter(|(_, ir)| !ir.is_empty())
            .map(|(fragment, ir)| (fragment, ir.render(target.docstring_style)))
            .collect())
    }

    /// Plan a migration against a freshly refreshed index
    pub fn refactor_plan(&self, spec: &MigrationSpec) -> Result<PreparedRefactor> {
        self.feedback.emit(Message::info(msg::refactor::PLANNING));
        let store = self.open_index()?;
        self.refresh_index(&store)?;
        let mut locks = self.lock_manager()?;

        let planner = Planner::new(&self.workspace, &store, &self.registry, self.feedback);
        let plan = planner.plan(spec, &mut locks)?;
        let tx = plan.transaction(&self.workspace, &locks)?;
        Ok(PreparedRefactor { plan, tx, locks })
    }

    /// Show the staged operations of a prepared refactor
    pub fn refactor_preview(&self, prepared: &PreparedRefactor) -> bool {
        if prepared.is_empty() {
            self.feedback.emit(Message::info(msg::refactor::NO_CHANGES));
            return false;
        }
        self.feedback
            .emit(Message::info(msg::refactor::PREVIEW_HEADER).with("count", prepared.len()));
        for line in prepared.preview() {
            self.feedback.raw(&line);
        }
        true
    }

    /// Report a refactor declined at confirmation
    pub fn refactor_aborted(&self) {
        self.feedback.emit(Message::warning(msg::refactor::ABORTED));
    }

    /// Commit a prepared refactor and bring the index up to date
    pub fn refactor_commit(&self, mut prepared: PreparedRefactor) -> Result<usize> {
        self.feedback.emit(Message::info(msg::refactor::APPLYING));
        let applied = prepared.tx.commit().context("Refactor commit failed")?;
        prepared.locks.mark_saved();

        let store = self.open_index()?;
        self.refresh_index(&store)?;
        self.feedback
            .emit(Message::success(msg::refactor::SUCCESS).with("count", applied));
        Ok(applied)
    }

    /// Load, plan and commit a migration spec without asking
    pub fn refactor_apply(&self, spec_path: &Path, dry_run: bool) -> Result<usize> {
        let spec = MigrationSpec::load(spec_path)?;
        let prepared = self.refactor_plan(&spec)?;
        if !self.refactor_preview(&prepared) || dry_run {
            return Ok(0);
        }
        self.refactor_commit(prepared)
    }
}

/// Workspace-relative stub path for a source file
fn stub_path_for(source_path: &str, stub_extension: &str, stub_dir: Option<&str>) -> String {
    let stem = source_path
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(source_path);
    match stub_dir {
        Some(dir) => format!("{}/{}.{}", dir.trim_end_matches('/'), stem, stub_extension),
        None => format!("{}.{}", stem, stub_extension),
    }
}

/// Catalogue message for an error that ended a command
pub fn error_message(err: &anyhow::Error) -> Message {
    let text = format!("{:#}", err);
    match err.downcast_ref::<StitcherError>() {
        Some(StitcherError::Config(_)) => Message::error(msg::error::CONFIG).with("error", text),
        _ => Message::error(msg::error::GENERIC).with("error", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::MemoryFeedback;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/__init__.py"), "").unwrap();
        fs::write(
            dir.path().join("pkg/m.py"),
            "def func(a: int):\n    \"\"\"D.\"\"\"\n    return a\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_stub_path_for() {
        assert_eq!(stub_path_for("pkg/m.py", "pyi", None), "pkg/m.pyi");
        assert_eq!(stub_path_for("pkg/m.py", "pyi", Some("typings/")), "typings/pkg/m.pyi");
    }

    #[test]
    fn test_init_creates_sidecar_and_lock() {
        let dir = workspace();
        let feedback = MemoryFeedback::new();
        let app = StitcherApp::new(Workspace::open(dir.path()).unwrap(), &feedback).unwrap();

        assert_eq!(app.init().unwrap(), 1);
        assert!(feedback.has(msg::init::FILE_CREATED));
        assert!(dir.path().join("pkg/m.stitcher.yaml").is_file());

        let lock = fs::read_to_string(dir.path().join("stitcher.lock")).unwrap();
        assert!(lock.contains("py://pkg/m.py#func"));
        assert!(lock.contains("baseline_code_structure_hash"));
    }

    #[test]
    fn test_strip_then_inject_restores_doc() {
        let dir = workspace();
        let feedback = MemoryFeedback::new();
        let app = StitcherApp::new(Workspace::open(dir.path()).unwrap(), &feedback).unwrap();
        app.init().unwrap();

        assert_eq!(app.strip().unwrap(), 1);
        let stripped = fs::read_to_string(dir.path().join("pkg/m.py")).unwrap();
        assert!(!stripped.contains("\"\"\"D.\"\"\""));

        assert_eq!(app.inject().unwrap(), 1);
        let injected = fs::read_to_string(dir.path().join("pkg/m.py")).unwrap();
        assert!(injected.contains("D."));
    }

    #[test]
    fn test_generate_writes_stub_next_to_source() {
        let dir = workspace();
        let feedback = MemoryFeedback::new();
        let app = StitcherApp::new(Workspace::open(dir.path()).unwrap(), &feedback).unwrap();
        app.init().unwrap();

        app.generate().unwrap();
        let stub = fs::read_to_string(dir.path().join("pkg/m.pyi")).unwrap();
        assert!(stub.contains("def func(a: int)"));
        assert!(stub.contains("D."));
    }

    #[test]
    fn test_index_build_reports_counts() {
        let dir = workspace();
        let feedback = MemoryFeedback::new();
        let app = StitcherApp::new(Workspace::open(dir.path()).unwrap(), &feedback).unwrap();

        let first = app.index_build().unwrap();
        assert!(first.added >= 2);
        let second = app.index_build().unwrap();
        assert_eq!(second.added, 0);
        assert!(app.index_path().is_file());
        assert_eq!(feedback.find(msg::index::RUN_COMPLETE).len(), 2);
    }
}
