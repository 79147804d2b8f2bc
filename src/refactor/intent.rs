//! Intents: what each declared operation means for code, sidecars and locks

use super::migration::Operation;
use crate::doc::sidecar_path_for;
use crate::error::Result;
use crate::index::IndexStore;
use crate::suri::Suri;
use crate::workspace::Workspace;

/// A single planned effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Rename {
        old_fqn: String,
        new_fqn: String,
    },
    MoveFile {
        src: String,
        dest: String,
    },
    DeleteFile {
        path: String,
    },
    DeleteDirectory {
        path: String,
    },
    Scaffold {
        path: String,
        content: String,
    },
    /// Rename keys of the sidecar of the file defining `old_fqn`
    SidecarUpdate {
        source_path: String,
        sidecar_path: String,
        module_fqn: String,
        old_fqn: String,
        new_fqn: String,
    },
}

/// Expand one operation into intents
///
/// A rename of an unknown symbol yields nothing; the caller reports it.
pub fn intents_for(op: &Operation, workspace: &Workspace, store: &IndexStore) -> Result<Vec<Intent>> {
    let mut out = Vec::new();

    match op {
        Operation::RenameSymbol { old_fqn, new_fqn } => {
            let Some(symbol) = store.symbol_by_fqn(old_fqn)? else {
                return Ok(out);
            };
            out.push(Intent::Rename {
                old_fqn: old_fqn.clone(),
                new_fqn: new_fqn.clone(),
            });

            if symbol.kind.is_definition() {
                let source_path = Suri::parse(&symbol.id)?.path().to_string();
                if let Some(module_fqn) = workspace.module_fqn(&source_path) {
                    out.push(Intent::SidecarUpdate {
                        sidecar_path: sidecar_path_for(&source_path),
                        source_path,
                        module_fqn,
                        old_fqn: old_fqn.clone(),
                        new_fqn: new_fqn.clone(),
                    });
                }
            }
        }
        Operation::MoveFile { src, dest } => {
            if let (Some(old_module), Some(new_module)) =
                (workspace.module_fqn(src), workspace.module_fqn(dest))
            {
                if old_module != new_module {
                    out.push(Intent::Rename {
                        old_fqn: old_module.clone(),
                        new_fqn: new_module.clone(),
                    });
                    for member in store.definitions_under(&old_module)? {
                        if member.canonical_fqn == old_module || Suri::parse(&member.id)?.path() != src {
                            continue;
                        }
                        let suffix = &member.canonical_fqn[old_module.len()..];
                        out.push(Intent::Rename {
                            old_fqn: member.canonical_fqn.clone(),
                            new_fqn: format!("{}{}", new_module, suffix),
                        });
                    }
                }
            }
            out.push(Intent::MoveFile {
                src: src.clone(),
                dest: dest.clone(),
            });
        }
        Operation::DeleteFile { path } => out.push(Intent::DeleteFile { path: path.clone() }),
        Operation::DeleteDirectory { path } => {
            out.push(Intent::DeleteDirectory { path: path.clone() })
        }
        Operation::Scaffold { path, content } => out.push(Intent::Scaffold {
            path: path.clone(),
            content: content.clone(),
        }),
    }

    Ok(out)
}
