//! Consistency engine
//!
//! For every source file the engine builds a [`SymbolState`] per fragment
//! seen in code, sidecar or baseline, classifies it, applies the automatic
//! resolutions, asks the interaction handler about the rest and commits
//! the resulting sidecar and lock changes in one transaction.

pub mod resolve;
pub mod state;
pub mod violation;

pub use state::{classify, Outcome, SymbolState};
pub use violation::{InteractionContext, Violation, ViolationKind};

use crate::doc::{code_fragments, render_sidecar, sidecar_path_for, DocumentManager, SidecarDoc};
use crate::error::Result;
use crate::feedback::{msg, Feedback, Message};
use crate::fingerprint::Fingerprint;
use crate::interaction::{settle, InteractionHandler, NoOpInteractionHandler, ResolutionAction};
use crate::lang::{is_public_fragment, AdapterRegistry};
use crate::lock::LockManager;
use crate::suri::{Suri, MODULE_DOC_FRAGMENT};
use crate::transaction::TransactionManager;
use crate::workspace::{TargetConfig, Workspace};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Flags of a check run
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Accept new signatures whose doc did not change
    pub force_relink: bool,
    /// Accept co-evolved signatures and docs
    pub reconcile: bool,
}

/// Classified view of one source file
#[derive(Debug, Clone)]
pub struct FileCheck {
    pub path: String,
    pub package_root: PathBuf,
    /// No sidecar and no baselines yet
    pub untracked: bool,
    /// Public definitions that could be documented
    pub public_count: usize,
    pub states: Vec<(SymbolState, Outcome)>,
    pub sidecar: SidecarDoc,
    pub sidecar_changed: bool,
}

/// Summary of a check run
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
    pub aborted: bool,
    /// Unresolved violations in report order
    pub violations: Vec<Violation>,
}

impl CheckReport {
    pub fn success(&self) -> bool {
        self.errors == 0 && !self.aborted
    }
}

/// Per-file state machine over code, sidecar and baseline
pub struct ConsistencyEngine<'a> {
    workspace: &'a Workspace,
    registry: &'a AdapterRegistry,
    feedback: &'a dyn Feedback,
}

/// Interactive violation waiting for a decision
struct Pending {
    file: usize,
    state: usize,
    context: InteractionContext,
}

impl<'a> ConsistencyEngine<'a> {
    pub fn new(workspace: &'a Workspace, registry: &'a AdapterRegistry, feedback: &'a dyn Feedback) -> Self {
        Self {
            workspace,
            registry,
            feedback,
        }
    }

    /// Build and classify the states of one file
    ///
    /// Returns `None` for files no adapter handles or that cannot be parsed.
    pub fn analyze_file(
        &self,
        target: &TargetConfig,
        path: &str,
        locks: &mut LockManager,
    ) -> Result<Option<FileCheck>> {
        let Some(adapter) = self.registry.for_path(path) else {
            return Ok(None);
        };
        let source = fs::read_to_string(self.workspace.absolute(path))?;
        let module = match adapter.parse_module(path, &source) {
            Ok(module) => module,
            Err(e) => {
                warn!("skipping {}: {}", path, e);
                self.feedback.emit(
                    Message::warning(msg::index::FILE_FAILED)
                        .with("path", path)
                        .with("reason", e),
                );
                return Ok(None);
            }
        };

        let docs = DocumentManager::new(self.workspace.root(), target.docstring_style);
        let sidecar = match docs.load_sidecar(path) {
            Ok(sidecar) => sidecar,
            Err(e) => {
                warn!("skipping {}: unreadable sidecar: {}", path, e);
                self.feedback.emit(
                    Message::warning(msg::index::FILE_FAILED)
                        .with("path", sidecar_path_for(path))
                        .with("reason", e),
                );
                return Ok(None);
            }
        };

        let package_root = self.workspace.owning_package_of(path);
        let baselines: BTreeMap<String, Fingerprint> = locks
            .load(&package_root)
            .iter()
            .filter_map(|(key, fp)| {
                let suri = Suri::parse(key).ok()?;
                if suri.path() != path {
                    return None;
                }
                Some((suri.fragment()?.to_string(), fp.clone()))
            })
            .collect();

        let code_docs = docs.flatten_module_docs(&module);
        let fingerprints = adapter.code_fingerprints(&module);
        let fragments: BTreeMap<String, bool> = code_fragments(&module).into_iter().collect();
        let yaml_docs = docs.sidecar_irs(&sidecar);
        let yaml_hashes = docs.compute_yaml_content_hashes(&sidecar);

        let public_count = fragments
            .iter()
            .filter(|(fragment, can_be_missing)| **can_be_missing && is_public_fragment(fragment))
            .count();
        let untracked = sidecar.is_empty() && baselines.is_empty();

        let all: BTreeSet<&String> = fragments
            .keys()
            .chain(sidecar.keys())
            .chain(baselines.keys())
            .collect();

        let mut states = Vec::with_capacity(all.len());
        for fragment in all {
            let mut state = SymbolState {
                fragment: fragment.clone(),
                suri: Suri::for_symbol(path, fragment)?.to_string(),
                is_public: is_public_fragment(fragment),
                can_be_missing: fragments.get(fragment).copied().unwrap_or(false),
                source_doc: code_docs.get(fragment).cloned(),
                exists_in_yaml: sidecar.contains_key(fragment),
                yaml_doc: yaml_docs.get(fragment).cloned(),
                yaml_content_hash: yaml_hashes.get(fragment).cloned(),
                ..SymbolState::default()
            };
            // The module body is always addressable, documented or not
            if fragments.contains_key(fragment) || fragment == MODULE_DOC_FRAGMENT {
                state = state.with_code(fingerprints.get(fragment));
            }
            state = state.with_baseline(baselines.get(fragment));

            let outcome = classify(&state);
            states.push((state, outcome));
        }

        Ok(Some(FileCheck {
            path: path.to_string(),
            package_root,
            untracked,
            public_count,
            states,
            sidecar,
            sidecar_changed: false,
        }))
    }

    /// Check every target of the workspace
    pub fn run(
        &self,
        locks: &mut LockManager,
        handler: &mut dyn InteractionHandler,
        options: &CheckOptions,
    ) -> Result<CheckReport> {
        let mut files = Vec::new();
        for target in &self.workspace.config().targets {
            for path in self.workspace.source_files(target)? {
                if let Some(file) = self.analyze_file(target, &path, locks)? {
                    files.push(file);
                }
            }
        }
        debug!("analyzed {} files", files.len());

        for path in locks.corrupt_locks() {
            let shown = self
                .workspace
                .to_workspace_relative(path)
                .unwrap_or_else(|_| path.display().to_string());
            self.feedback
                .emit(Message::warning(msg::lock::CORRUPT).with("path", shown));
        }

        let mut report = CheckReport {
            files: files.len(),
            ..CheckReport::default()
        };
        let mut violations: Vec<Vec<Violation>> = vec![Vec::new(); files.len()];
        let mut notes: Vec<Vec<Message>> = vec![Vec::new(); files.len()];
        let mut pending: Vec<Pending> = Vec::new();

        for (fi, file) in files.iter().enumerate() {
            if file.untracked {
                if file.public_count > 0 {
                    report.warnings += 1;
                    self.feedback.emit(
                        Message::warning(msg::check::FILE_UNTRACKED)
                            .with("path", &file.path)
                            .with("count", file.public_count),
                    );
                }
                continue;
            }

            for (si, (state, outcome)) in file.states.iter().enumerate() {
                match outcome {
                    Outcome::New => {
                        locks.set(&file.package_root, &state.suri, &state.accepted_baseline());
                    }
                    Outcome::DocImprovement => {
                        locks.set(&file.package_root, &state.suri, &state.accepted_baseline());
                        notes[fi].push(
                            Message::info(msg::check::STATE_DOC_UPDATED)
                                .with("key", &state.fragment)
                                .with("path", &file.path),
                        );
                    }
                    Outcome::Stale => {
                        locks.remove(&file.package_root, &state.suri);
                    }
                    Outcome::Missing => violations[fi].push(Violation::new(
                        ViolationKind::Missing,
                        &file.path,
                        &state.fragment,
                    )),
                    Outcome::Pending => violations[fi].push(Violation::new(
                        ViolationKind::Pending,
                        &file.path,
                        &state.fragment,
                    )),
                    Outcome::Redundant => violations[fi].push(Violation::new(
                        ViolationKind::Redundant,
                        &file.path,
                        &state.fragment,
                    )),
                    Outcome::Conflict => violations[fi].push(Violation::new(
                        ViolationKind::Conflict,
                        &file.path,
                        &state.fragment,
                    )),
                    Outcome::DanglingDoc | Outcome::SignatureDrift | Outcome::CoEvolution => {
                        pending.push(Pending {
                            file: fi,
                            state: si,
                            context: self.context_for(file, state, *outcome),
                        });
                    }
                    Outcome::Synchronized | Outcome::Untouched => {}
                }
            }
        }

        let (decisions, aborted) = self.decide(&pending, handler, options)?;
        report.aborted = aborted;

        for (item, action) in pending.iter().zip(decisions) {
            let kind = item.context.kind;
            let resolved = if aborted {
                None
            } else {
                let state = files[item.file].states[item.state].0.clone();
                resolve::apply_resolution(&mut files[item.file], &state, kind, action, locks)
            };
            match resolved {
                Some(note) => notes[item.file].push(note),
                None => violations[item.file].push(Violation::new(
                    kind,
                    &item.context.file_path,
                    &item.context.fragment,
                )),
            }
        }

        let mut tx = TransactionManager::new(self.workspace.root(), self.workspace.stitcher_dir());
        if !aborted {
            for (fi, file) in files.iter().enumerate().filter(|(_, f)| f.sidecar_changed) {
                let sidecar_path = sidecar_path_for(&file.path);
                if file.sidecar.is_empty() {
                    tx.add_delete_file(sidecar_path.clone());
                    notes[fi].push(
                        Message::info(msg::check::STATE_SIDECAR_DELETED).with("path", sidecar_path),
                    );
                } else {
                    tx.add_write(sidecar_path, render_sidecar(&file.sidecar)?);
                }
            }
            locks.stage_into(self.workspace, &mut tx)?;
        }

        for (fi, file) in files.iter().enumerate() {
            let file_violations = &mut violations[fi];
            file_violations.sort_by(|a, b| (&a.fragment, a.kind).cmp(&(&b.fragment, b.kind)));
            self.report_file(&file.path, file_violations, &notes[fi], &mut report);
            report.violations.append(file_violations);
        }

        if aborted {
            self.feedback.emit(Message::error(msg::check::RUN_ABORTED));
            return Ok(report);
        }

        let applied = tx.commit()?;
        locks.mark_saved();
        if applied > 0 {
            info!("check wrote {} file operations", applied);
        }

        let summary = if report.errors > 0 {
            Message::error(msg::check::RUN_FAIL).with("count", report.errors)
        } else if report.warnings > 0 {
            Message::success(msg::check::RUN_SUCCESS_WITH_WARNINGS).with("count", report.warnings)
        } else {
            Message::success(msg::check::RUN_SUCCESS)
        };
        self.feedback.emit(summary);
        Ok(report)
    }

    fn context_for(&self, file: &FileCheck, state: &SymbolState, outcome: Outcome) -> InteractionContext {
        let kind = match outcome {
            Outcome::SignatureDrift => ViolationKind::SignatureDrift,
            Outcome::CoEvolution => ViolationKind::CoEvolution,
            _ => ViolationKind::DanglingDoc,
        };
        let style = self
            .workspace
            .config()
            .targets
            .iter()
            .find(|t| t.includes(&file.path))
            .map(|t| t.docstring_style)
            .unwrap_or_default();

        InteractionContext::new(kind, &file.path, &state.fragment)
            .with_signature_diff(
                state.baseline_signature_text.as_deref(),
                state.signature_text.as_deref(),
            )
            .with_doc_text(state.yaml_doc.as_ref().map(|doc| doc.render(style)))
    }

    /// Flags answer first; the handler is asked only about the rest
    fn decide(
        &self,
        pending: &[Pending],
        handler: &mut dyn InteractionHandler,
        options: &CheckOptions,
    ) -> Result<(Vec<ResolutionAction>, bool)> {
        let preset = NoOpInteractionHandler::for_check(options.force_relink, options.reconcile);
        let mut decisions = vec![ResolutionAction::Skip; pending.len()];
        let mut asked_idx = Vec::new();

        for (idx, item) in pending.iter().enumerate() {
            match preset.default_for(item.context.kind) {
                ResolutionAction::Skip => asked_idx.push(idx),
                action => decisions[idx] = action,
            }
        }
        if asked_idx.is_empty() {
            return Ok((decisions, false));
        }

        let asked: Vec<InteractionContext> =
            asked_idx.iter().map(|&idx| pending[idx].context.clone()).collect();
        let answers = handler.decide(&asked)?;
        let (answers, aborted) = settle(&asked, answers);
        for (idx, action) in asked_idx.into_iter().zip(answers) {
            decisions[idx] = action;
        }
        Ok((decisions, aborted))
    }

    fn report_file(&self, path: &str, violations: &[Violation], notes: &[Message], report: &mut CheckReport) {
        let errors = violations
            .iter()
            .filter(|v| v.kind.level() == crate::feedback::Level::Error)
            .count();
        let warnings = violations.len() - errors;

        if errors > 0 {
            self.feedback
                .emit(Message::error(msg::check::FILE_FAIL).with("path", path).with("count", errors));
        } else if warnings > 0 {
            self.feedback.emit(
                Message::warning(msg::check::FILE_WARN)
                    .with("path", path)
                    .with("count", warnings),
            );
        }
        for violation in violations {
            self.feedback.emit(violation.message());
        }
        for note in notes {
            self.feedback.emit(note.clone());
        }

        report.errors += errors;
        report.warnings += warnings;
    }
}
