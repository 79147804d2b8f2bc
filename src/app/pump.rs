//! `pump`: move code doc strings into sidecars

use super::StitcherApp;
use crate::check::resolve::hydrate_choice;
use crate::check::{ConsistencyEngine, InteractionContext, ViolationKind};
use crate::doc::{HydrateChoice, HydrateOptions};
use crate::feedback::{msg, Message};
use crate::interaction::{settle, InteractionHandler};
use crate::lang::{LanguageAdapter, ModuleDef};
use crate::workspace::TargetConfig;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Flags of a pump run
#[derive(Debug, Clone, Copy, Default)]
pub struct PumpOptions {
    /// Remove pumped doc strings from code
    pub strip: bool,
    /// Code wins every conflict
    pub force: bool,
    /// Sidecar wins every conflict
    pub reconcile: bool,
}

/// Summary of a pump run
#[derive(Debug, Clone, Default)]
pub struct PumpReport {
    pub updated_files: usize,
    pub updated_docs: usize,
    pub conflicts: usize,
    pub stripped_files: usize,
    pub aborted: bool,
}

impl PumpReport {
    pub fn success(&self) -> bool {
        self.conflicts == 0 && !self.aborted
    }
}

struct Candidate<'t, 'r> {
    target: &'t TargetConfig,
    path: String,
    adapter: &'r dyn LanguageAdapter,
    source: String,
    module: ModuleDef,
    resolutions: BTreeMap<String, HydrateChoice>,
}

impl StitcherApp<'_> {
    /// `pump` with an explicit interaction handler
    ///
    /// Conflicts the flags leave open go to the handler in one batch; an
    /// abort leaves every file untouched.
    pub fn pump_with(&self, options: &PumpOptions, handler: &mut dyn InteractionHandler) -> Result<PumpReport> {
        let mut locks = self.lock_manager()?;
        let engine = ConsistencyEngine::new(&self.workspace, &self.registry, self.feedback);
        let mut report = PumpReport::default();

        let mut candidates = Vec::new();
        let mut contexts = Vec::new();
        let mut owners = Vec::new();
        for (target, path) in self.sources()? {
            let Some((adapter, source, module)) = self.load_module(&path)? else {
                continue;
            };
            let docs = self.documents(target);
            let preview = docs.hydrate_module(
                &module,
                &HydrateOptions {
                    force: options.force,
                    reconcile: options.reconcile,
                    dry_run: true,
                    ..HydrateOptions::default()
                },
            )?;

            if !preview.conflicts.is_empty() {
                let code_docs = docs.flatten_module_docs(&module);
                let sidecar_docs = docs.load_docs_for_module(&path)?;
                for fragment in &preview.conflicts {
                    let (Some(code), Some(side)) = (code_docs.get(fragment), sidecar_docs.get(fragment)) else {
                        continue;
                    };
                    contexts.push(
                        InteractionContext::new(ViolationKind::Conflict, &path, fragment).with_doc_diff(
                            &side.render(target.docstring_style),
                            &code.render(target.docstring_style),
                            "sidecar",
                            "code",
                        ),
                    );
                    owners.push(candidates.len());
                }
            }
            candidates.push(Candidate {
                target,
                path,
                adapter,
                source,
                module,
                resolutions: BTreeMap::new(),
            });
        }

        if !contexts.is_empty() {
            let answers = handler.decide(&contexts)?;
            let (answers, aborted) = settle(&contexts, answers);
            if aborted {
                report.aborted = true;
                self.feedback.emit(Message::error(msg::pump::RUN_ABORTED));
                return Ok(report);
            }
            for ((context, action), owner) in contexts.iter().zip(answers).zip(owners) {
                candidates[owner]
                    .resolutions
                    .insert(context.fragment.clone(), hydrate_choice(action));
            }
        }

        let mut tx = self.new_transaction();
        for candidate in candidates {
            let docs = self.documents(candidate.target);
            let result = docs.hydrate_module(
                &candidate.module,
                &HydrateOptions {
                    force: options.force,
                    reconcile: options.reconcile,
                    resolutions: candidate.resolutions,
                    dry_run: false,
                },
            )?;
            let path = candidate.path;

            for fragment in &result.conflicts {
                self.feedback.emit(
                    Message::error(msg::pump::ERROR_CONFLICT)
                        .with("path", &path)
                        .with("key", fragment),
                );
            }
            report.conflicts += result.conflicts.len();

            if !result.reconciled.is_empty() {
                self.feedback.emit(
                    Message::info(msg::pump::INFO_RECONCILED)
                        .with("path", &path)
                        .with("count", result.reconciled.len()),
                );
            }

            if !result.updated.is_empty() {
                report.updated_files += 1;
                report.updated_docs += result.updated.len();
                self.feedback.emit(
                    Message::success(msg::pump::FILE_SUCCESS)
                        .with("path", &path)
                        .with("count", result.updated.len()),
                );

                if let Some(file) = engine.analyze_file(candidate.target, &path, &mut locks)? {
                    for (state, _) in &file.states {
                        if state.exists_in_code && result.updated.contains(&state.fragment) {
                            locks.set(&file.package_root, &state.suri, &state.accepted_baseline());
                        }
                    }
                }
            }

            if options.strip {
                let pumped: BTreeSet<String> = result
                    .updated
                    .iter()
                    .chain(&result.reconciled)
                    .cloned()
                    .collect();
                if pumped.is_empty() {
                    continue;
                }
                let stripped = candidate.adapter.strip_docstrings(&candidate.source, Some(&pumped))?;
                if stripped != candidate.source {
                    debug!("stripping {} doc strings from {}", pumped.len(), path);
                    report.stripped_files += 1;
                    self.feedback
                        .emit(Message::info(msg::pump::STRIP_FILE).with("path", &path));
                    tx.add_write(path, stripped);
                }
            }
        }

        locks.stage_into(&self.workspace, &mut tx)?;
        tx.commit().context("Failed to write pump results")?;
        locks.mark_saved();

        let summary = if report.conflicts > 0 {
            Message::error(msg::pump::RUN_CONFLICT).with("count", report.conflicts)
        } else if report.updated_files > 0 {
            Message::success(msg::pump::RUN_COMPLETE).with("count", report.updated_files)
        } else {
            Message::info(msg::pump::RUN_NO_CHANGES)
        };
        self.feedback.emit(summary);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::MemoryFeedback;
    use crate::interaction::{ResolutionAction, ScriptedInteractionHandler};
    use crate::workspace::Workspace;
    use std::fs;
    use tempfile::TempDir;

    fn workspace(sidecar: Option<&str>) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(
            dir.path().join("m.py"),
            "def func(a: int):\n    \"\"\"Code doc.\"\"\"\n    return a\n",
        )
        .unwrap();
        if let Some(content) = sidecar {
            fs::write(dir.path().join("m.stitcher.yaml"), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_pump_new_docs_and_strip() {
        let dir = workspace(None);
        let feedback = MemoryFeedback::new();
        let app = StitcherApp::new(Workspace::open(dir.path()).unwrap(), &feedback).unwrap();
        let mut handler = ScriptedInteractionHandler::new(ResolutionAction::Skip);

        let options = PumpOptions {
            strip: true,
            ..PumpOptions::default()
        };
        let report = app.pump_with(&options, &mut handler).unwrap();

        assert!(report.success());
        assert_eq!(report.updated_files, 1);
        assert_eq!(report.stripped_files, 1);
        assert!(feedback.has(msg::pump::RUN_COMPLETE));

        let sidecar = fs::read_to_string(dir.path().join("m.stitcher.yaml")).unwrap();
        assert!(sidecar.contains("Code doc."));
        let code = fs::read_to_string(dir.path().join("m.py")).unwrap();
        assert!(!code.contains("Code doc."));
        let lock = fs::read_to_string(dir.path().join("stitcher.lock")).unwrap();
        assert!(lock.contains("py://m.py#func"));
    }

    #[test]
    fn test_pump_conflict_unresolved_fails() {
        let dir = workspace(Some("func: Sidecar doc.\n"));
        let feedback = MemoryFeedback::new();
        let app = StitcherApp::new(Workspace::open(dir.path()).unwrap(), &feedback).unwrap();
        let mut handler = ScriptedInteractionHandler::new(ResolutionAction::Skip);

        let report = app.pump_with(&PumpOptions::default(), &mut handler).unwrap();

        assert!(!report.success());
        assert_eq!(report.conflicts, 1);
        assert!(feedback.has(msg::pump::ERROR_CONFLICT));
        assert!(feedback.has(msg::pump::RUN_CONFLICT));
        let seen = handler.seen();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].doc_diff.as_deref().is_some_and(|d| d.contains("+Code doc.")));
    }

    #[test]
    fn test_pump_conflict_overwrite_choice() {
        let dir = workspace(Some("func: Sidecar doc.\n"));
        let feedback = MemoryFeedback::new();
        let app = StitcherApp::new(Workspace::open(dir.path()).unwrap(), &feedback).unwrap();
        let mut handler = ScriptedInteractionHandler::new(ResolutionAction::HydrateOverwrite);

        let report = app.pump_with(&PumpOptions::default(), &mut handler).unwrap();

        assert!(report.success());
        let sidecar = fs::read_to_string(dir.path().join("m.stitcher.yaml")).unwrap();
        assert!(sidecar.contains("Code doc."));
        assert!(!sidecar.contains("Sidecar doc."));
    }

    #[test]
    fn test_pump_abort_writes_nothing() {
        let dir = workspace(Some("func: Sidecar doc.\n"));
        let feedback = MemoryFeedback::new();
        let app = StitcherApp::new(Workspace::open(dir.path()).unwrap(), &feedback).unwrap();
        let mut handler = ScriptedInteractionHandler::new(ResolutionAction::Abort);

        let report = app.pump_with(&PumpOptions::default(), &mut handler).unwrap();

        assert!(report.aborted);
        assert!(feedback.has(msg::pump::RUN_ABORTED));
        assert_eq!(
            fs::read_to_string(dir.path().join("m.stitcher.yaml")).unwrap(),
            "func: Sidecar doc.\n"
        );
        assert!(!dir.path().join("stitcher.lock").exists());
    }
}
