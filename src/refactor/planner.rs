//! Turning a migration spec into file operations

use super::intent::{intents_for, Intent};
use super::migration::{MigrationSpec, Operation};
use super::sidecar::{fragment_of, rename_fragment_keys, rewrite_suri_keys, take_entries_under, SuriRewrite};
use super::RefactorPlan;
use crate::doc::{load_sidecar, render_sidecar, sidecar_path_for, SidecarDoc};
use crate::error::{Result, StitcherError};
use crate::feedback::{msg, Feedback, Message};
use crate::index::{IndexStore, SymbolKind};
use crate::lang::{AdapterRegistry, Location, RenameSite, SiteKind};
use crate::lock::LockManager;
use crate::suri::Suri;
use crate::transaction::FileOp;
use crate::workspace::Workspace;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use tracing::{debug, warn};

/// Plans refactors against a refreshed index
pub struct Planner<'a> {
    workspace: &'a Workspace,
    store: &'a IndexStore,
    registry: &'a AdapterRegistry,
    feedback: &'a dyn Feedback,
}

/// Sidecar as loaded and as rewritten so far
struct SidecarEdit {
    original: SidecarDoc,
    current: SidecarDoc,
}

impl<'a> Planner<'a> {
    pub fn new(
        workspace: &'a Workspace,
        store: &'a IndexStore,
        registry: &'a AdapterRegistry,
        feedback: &'a dyn Feedback,
    ) -> Self {
        Self {
            workspace,
            store,
            registry,
            feedback,
        }
    }

    /// Plan every operation of `spec`
    ///
    /// Lock changes are applied to `locks` in memory; stage them together
    /// with the returned operations.
    pub fn plan(&self, spec: &MigrationSpec, locks: &mut LockManager) -> Result<RefactorPlan> {
        let mut plan = RefactorPlan::default();
        let mut intents = Vec::new();

        for op in &spec.operations {
            let expanded = intents_for(op, self.workspace, self.store)?;
            match op {
                Operation::RenameSymbol { old_fqn, new_fqn } if expanded.is_empty() => {
                    warn!("rename source {} not found in the index", old_fqn);
                    self.feedback
                        .emit(Message::warning(msg::refactor::SYMBOL_NOT_FOUND).with("fqn", old_fqn));
                    plan.not_found.push(old_fqn.clone());
                }
                Operation::RenameSymbol { old_fqn, new_fqn } => self.check_rename_target(old_fqn, new_fqn)?,
                Operation::MoveFile { src, dest } => self.check_move(src, dest)?,
                _ => {}
            }
            intents.extend(expanded);
        }

        let mut renames = BTreeMap::new();
        for intent in &intents {
            if let Intent::Rename { old_fqn, new_fqn } = intent {
                if old_fqn != new_fqn {
                    renames.insert(old_fqn.clone(), new_fqn.clone());
                }
            }
        }
        self.extend_with_aliases(&mut renames)?;
        debug!("rename map: {:?}", renames);

        let deleted = deleted_paths(&intents);
        plan.ops.extend(self.rewrite_sources(&renames, &deleted)?);
        self.rebase_moved_sources(&intents, &mut plan.ops)?;

        let mut sidecars: BTreeMap<String, SidecarEdit> = BTreeMap::new();
        for intent in &intents {
            if let Intent::SidecarUpdate {
                source_path,
                sidecar_path,
                module_fqn,
                old_fqn,
                new_fqn,
            } = intent
            {
                let (Some(old_fragment), Some(new_fragment)) =
                    (fragment_of(old_fqn, module_fqn), fragment_of(new_fqn, module_fqn))
                else {
                    debug!("{} -> {} leaves module {}; keys unchanged", old_fqn, new_fqn, module_fqn);
                    continue;
                };
                if old_fragment == new_fragment {
                    continue;
                }

                let edit = self.sidecar_edit(&mut sidecars, sidecar_path)?;
                edit.current = rename_fragment_keys(&edit.current, &old_fragment, &new_fragment);

                let package = self.workspace.owning_package_of(source_path);
                let lock = locks.entries_mut(&package);
                *lock = rewrite_suri_keys(
                    lock,
                    &SuriRewrite::rename(source_path.as_str(), old_fragment, new_fragment),
                );
            }
        }

        let mut file_ops = Vec::new();
        for intent in &intents {
            match intent {
                Intent::MoveFile { src, dest } => {
                    let src_sidecar = sidecar_path_for(src);
                    if self.workspace.absolute(&src_sidecar).is_file() {
                        file_ops.push(FileOp::MoveFile {
                            src: src_sidecar,
                            dest: sidecar_path_for(dest),
                        });
                    }

                    let src_package = self.workspace.owning_package_of(src);
                    let dest_package = self.workspace.owning_package_of(dest);
                    let taken = take_entries_under(locks.entries_mut(&src_package), src, false);
                    let moved = rewrite_suri_keys(&taken, &SuriRewrite::move_file(src.as_str(), dest.as_str()));
                    locks.entries_mut(&dest_package).extend(moved);

                    file_ops.push(FileOp::MoveFile {
                        src: src.clone(),
                        dest: dest.clone(),
                    });
                }
                Intent::DeleteFile { path } => {
                    let sidecar = sidecar_path_for(path);
                    if self.workspace.absolute(&sidecar).is_file() {
                        file_ops.push(FileOp::DeleteFile { path: sidecar });
                    }
                    let package = self.workspace.owning_package_of(path);
                    take_entries_under(locks.entries_mut(&package), path, false);
                    file_ops.push(FileOp::DeleteFile { path: path.clone() });
                }
                Intent::DeleteDirectory { path } => {
                    for package in self.packages_under(path)? {
                        take_entries_under(locks.entries_mut(&package), path, true);
                    }
                    file_ops.push(FileOp::DeleteDirectory { path: path.clone() });
                }
                Intent::Scaffold { path, content } => file_ops.push(FileOp::WriteFile {
                    path: path.clone(),
                    content: content.clone(),
                }),
                Intent::Rename { .. } | Intent::SidecarUpdate { .. } => {}
            }
        }

        for (path, edit) in sidecars {
            if edit.current == edit.original {
                continue;
            }
            if edit.current.is_empty() {
                plan.ops.push(FileOp::DeleteFile { path });
            } else {
                plan.ops.push(FileOp::WriteFile {
                    path,
                    content: render_sidecar(&edit.current)?,
                });
            }
        }
        plan.ops.extend(file_ops);
        plan.renames = renames;
        Ok(plan)
    }

    fn check_rename_target(&self, old_fqn: &str, new_fqn: &str) -> Result<()> {
        if old_fqn == new_fqn {
            return Ok(());
        }
        match self.store.symbol_by_fqn(new_fqn)? {
            Some(existing) if existing.kind.is_definition() => Err(StitcherError::Planning(format!(
                "cannot rename {} to {}: {} already exists",
                old_fqn, new_fqn, existing.id
            ))),
            _ => Ok(()),
        }
    }

    fn check_move(&self, src: &str, dest: &str) -> Result<()> {
        if !self.workspace.absolute(src).is_file() {
            return Err(StitcherError::Planning(format!("cannot move {}: no such file", src)));
        }
        if src != dest && self.workspace.absolute(dest).exists() {
            return Err(StitcherError::Planning(format!(
                "cannot move {} to {}: destination exists",
                src, dest
            )));
        }
        Ok(())
    }

    /// Re-exports spelled with the old short name follow the rename
    fn extend_with_aliases(&self, renames: &mut BTreeMap<String, String>) -> Result<()> {
        let mut queue: Vec<(String, String)> = renames.iter().map(|(o, n)| (o.clone(), n.clone())).collect();

        while let Some((old, new)) = queue.pop() {
            let old_short = short_name(&old);
            let new_short = short_name(&new);
            if old_short == new_short {
                continue;
            }

            for alias in self.store.aliases_of(&old)? {
                if alias.alias_target_fqn.as_deref() != Some(old.as_str()) || alias.name != old_short {
                    continue;
                }
                let Some((parent, _)) = alias.canonical_fqn.rsplit_once('.') else {
                    continue;
                };
                if renames.contains_key(&alias.canonical_fqn) {
                    continue;
                }
                let alias_new = format!("{}.{}", parent, new_short);
                debug!("re-export {} follows as {}", alias.canonical_fqn, alias_new);
                renames.insert(alias.canonical_fqn.clone(), alias_new.clone());
                queue.push((alias.canonical_fqn, alias_new));
            }
        }
        Ok(())
    }

    /// One write per source file holding a renamed definition or reference
    fn rewrite_sources(&self, renames: &BTreeMap<String, String>, deleted: &[String]) -> Result<Vec<FileOp>> {
        let mut sites: BTreeMap<String, Vec<RenameSite>> = BTreeMap::new();
        let mut seen: HashSet<(String, Location, SiteKind)> = HashSet::new();

        for (old, new) in renames {
            for (path, reference) in self.store.references_to_fqn(old)? {
                let Some(target) = reference.target_fqn else {
                    continue;
                };
                let Some(new_target) = renamed(&target, renames) else {
                    continue;
                };
                let kind = SiteKind::from(reference.kind);
                if !seen.insert((path.clone(), reference.location, kind)) {
                    continue;
                }
                sites.entry(path).or_default().push(RenameSite {
                    location: reference.location,
                    kind,
                    old_fqn: target,
                    new_fqn: new_target,
                });
            }

            for symbol in self.store.definitions_under(old)? {
                if symbol.canonical_fqn != *old || symbol.kind == SymbolKind::Module {
                    continue;
                }
                let path = Suri::parse(&symbol.id)?.path().to_string();
                if !seen.insert((path.clone(), symbol.location, SiteKind::Definition)) {
                    continue;
                }
                sites.entry(path).or_default().push(RenameSite {
                    location: symbol.location,
                    kind: SiteKind::Definition,
                    old_fqn: old.clone(),
                    new_fqn: new.clone(),
                });
            }
        }

        let mut ops = Vec::new();
        for (path, file_sites) in sites {
            if deleted.iter().any(|d| path == *d || path.starts_with(&format!("{}/", d))) {
                continue;
            }
            let Some(adapter) = self.registry.for_path(&path) else {
                continue;
            };
            let source = fs::read_to_string(self.workspace.absolute(&path))?;
            let rewritten = adapter.apply_renames(&source, &file_sites)?;
            if rewritten != source {
                debug!("{}: {} rename sites", path, file_sites.len());
                ops.push(FileOp::WriteFile {
                    path,
                    content: rewritten,
                });
            }
        }
        Ok(ops)
    }

    /// Relative imports inside a moved file are resolved from its new package
    ///
    /// Runs on top of any rename write already planned for the file, since
    /// writes land before the move.
    fn rebase_moved_sources(&self, intents: &[Intent], ops: &mut Vec<FileOp>) -> Result<()> {
        for intent in intents {
            let Intent::MoveFile { src, dest } = intent else {
                continue;
            };
            let (Some(old_module), Some(new_module)) =
                (self.workspace.module_fqn(src), self.workspace.module_fqn(dest))
            else {
                continue;
            };
            if old_module == new_module {
                continue;
            }
            let Some(adapter) = self.registry.for_path(src) else {
                continue;
            };

            let planned = ops.iter_mut().find_map(|op| match op {
                FileOp::WriteFile { path, content } if path == src => Some(content),
                _ => None,
            });
            match planned {
                Some(content) => {
                    *content = adapter.rebase_relative_imports(content, src, &old_module, dest, &new_module)?;
                }
                None => {
                    let source = fs::read_to_string(self.workspace.absolute(src))?;
                    let rebased = adapter.rebase_relative_imports(&source, src, &old_module, dest, &new_module)?;
                    if rebased != source {
                        debug!("{}: relative imports rebased for {}", src, dest);
                        ops.push(FileOp::WriteFile {
                            path: src.clone(),
                            content: rebased,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn sidecar_edit<'s>(
        &self,
        sidecars: &'s mut BTreeMap<String, SidecarEdit>,
        sidecar_path: &str,
    ) -> Result<&'s mut SidecarEdit> {
        if !sidecars.contains_key(sidecar_path) {
            let doc = load_sidecar(&self.workspace.absolute(sidecar_path))?;
            sidecars.insert(
                sidecar_path.to_string(),
                SidecarEdit {
                    original: doc.clone(),
                    current: doc,
                },
            );
        }
        sidecars
            .get_mut(sidecar_path)
            .ok_or_else(|| StitcherError::Planning(format!("sidecar {} vanished", sidecar_path)))
    }

    /// Package roots owning indexed files under a directory
    fn packages_under(&self, dir: &str) -> Result<BTreeSet<std::path::PathBuf>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut packages = BTreeSet::new();
        packages.insert(self.workspace.owning_package_of(dir));
        for file in self.store.all_files()? {
            if file.path.starts_with(&prefix) {
                packages.insert(self.workspace.owning_package_of(&file.path));
            }
        }
        Ok(packages)
    }
}

fn short_name(fqn: &str) -> &str {
    fqn.rsplit('.').next().unwrap_or(fqn)
}

/// New name of `fqn` under the longest matching rename
pub(super) fn renamed(fqn: &str, renames: &BTreeMap<String, String>) -> Option<String> {
    renames
        .iter()
        .filter(|(old, _)| {
            fqn == old.as_str() || (fqn.starts_with(old.as_str()) && fqn[old.len()..].starts_with('.'))
        })
        .max_by_key(|(old, _)| old.len())
        .map(|(old, new)| format!("{}{}", new, &fqn[old.len()..]))
}

fn deleted_paths(intents: &[Intent]) -> Vec<String> {
    intents
        .iter()
        .filter_map(|intent| match intent {
            Intent::DeleteFile { path } | Intent::DeleteDirectory { path } => {
                Some(path.trim_end_matches('/').to_string())
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renamed_prefers_longest_match() {
        let mut renames = BTreeMap::new();
        renames.insert("pkg.bus".to_string(), "pkg.transport".to_string());
        renames.insert("pkg.bus.MessageBus".to_string(), "pkg.transport.FeedbackBus".to_string());

        assert_eq!(
            renamed("pkg.bus.MessageBus.info", &renames).as_deref(),
            Some("pkg.transport.FeedbackBus.info")
        );
        assert_eq!(renamed("pkg.bus.other", &renames).as_deref(), Some("pkg.transport.other"));
        assert_eq!(renamed("pkg.busy", &renames), None);
    }
}
