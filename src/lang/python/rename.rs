//! Batch rename over Python source
//!
//! Sites come from the index, so only positions that resolved to the renamed
//! symbol are touched. Each site is checked against the syntax tree before
//! it is rewritten; stale positions are skipped.

use super::discovery::{relative_import_parts, resolve_relative};
use super::{apply_text_edits, is_package_init, node_text, parse_tree, TextEdit};
use crate::error::Result;
use crate::lang::{RenameSite, SiteKind};
use tracing::{debug, warn};
use tree_sitter::Node;

/// Rewrite all `sites` in `source` in one pass
pub fn apply_renames(source: &str, sites: &[RenameSite]) -> Result<String> {
    let tree = parse_tree("<rename>", source)?;
    let root = tree.root_node();
    let mut edits: Vec<TextEdit> = Vec::new();

    for site in sites {
        let Some((start, end)) = site.location.byte_range(source) else {
            warn!("rename site {:?} is outside the file", site.location);
            continue;
        };
        let Some(node) = node_at(root, start, end) else {
            debug!("no syntax node at {:?}; index is stale", site.location);
            continue;
        };

        let original = node_text(node, source);
        let replacement = match site.kind {
            SiteKind::Definition => definition_text(original, &site.old_fqn, &site.new_fqn),
            SiteKind::ImportModule => Some(site.new_fqn.clone()),
            SiteKind::ImportName | SiteKind::Usage => {
                chain_text(original, &site.old_fqn, &site.new_fqn)
            }
        };

        match replacement {
            Some(text) if text != original => edits.push(TextEdit { start, end, text }),
            Some(_) => {}
            None => debug!(
                "'{}' at {:?} does not spell {}; left unchanged",
                original, site.location, site.old_fqn
            ),
        }

        if site.kind == SiteKind::ImportName {
            if let Some(edit) = moved_import_module(node, source, &site.old_fqn, &site.new_fqn) {
                edits.push(edit);
            }
        }
    }

    Ok(apply_text_edits(source, edits))
}

/// Outermost node spanning exactly `start..end`
fn node_at(root: Node, start: usize, end: usize) -> Option<Node> {
    let mut node = root.descendant_for_byte_range(start, end)?;
    if node.start_byte() != start || node.end_byte() != end {
        return None;
    }
    while let Some(parent) = node.parent() {
        if parent.start_byte() != start || parent.end_byte() != end {
            break;
        }
        node = parent;
    }
    Some(node)
}

fn definition_text(original: &str, old_fqn: &str, new_fqn: &str) -> Option<String> {
    let old_name = old_fqn.rsplit('.').next()?;
    let new_name = new_fqn.rsplit('.').next()?;
    (original == old_name).then(|| new_name.to_string())
}

/// New spelling of a name or dotted chain that resolved to `old_fqn`
///
/// The head of the chain stands for a bound prefix of the resolved name and
/// every later segment is literal. When the bound prefix is unchanged only
/// literal segments change; otherwise the import that binds the head is
/// rewritten at its own site and the head keeps its local spelling unless it
/// names the renamed segment directly.
fn chain_text(original: &str, old_fqn: &str, new_fqn: &str) -> Option<String> {
    let text: Vec<&str> = original.split('.').map(str::trim).collect();
    let old: Vec<&str> = old_fqn.split('.').collect();
    let new: Vec<&str> = new_fqn.split('.').collect();

    let tail = text.len().checked_sub(1)?;
    if text.len() > old.len() || text[1..] != old[old.len() - tail..] {
        return None;
    }
    let head_span = old.len() - tail;

    let segments: Vec<&str> = if new.len() >= head_span && new[..head_span] == old[..head_span] {
        std::iter::once(text[0])
            .chain(new[head_span..].iter().copied())
            .collect()
    } else {
        if new.len() <= tail {
            return None;
        }
        let aliased = text[0] != old[head_span - 1];
        let head = if aliased {
            text[0]
        } else {
            new[new.len() - tail - 1]
        };
        std::iter::once(head)
            .chain(new[new.len() - tail..].iter().copied())
            .collect()
    };

    Some(segments.join("."))
}

/// Rewrite the module of a single-name `from` import when the name moved modules
fn moved_import_module(name_node: Node, source: &str, old_fqn: &str, new_fqn: &str) -> Option<TextEdit> {
    let (old_parent, _) = old_fqn.rsplit_once('.')?;
    let (new_parent, _) = new_fqn.rsplit_once('.')?;
    if old_parent == new_parent {
        return None;
    }

    let mut stmt = name_node.parent()?;
    if stmt.kind() == "aliased_import" {
        stmt = stmt.parent()?;
    }
    if stmt.kind() != "import_from_statement" {
        return None;
    }

    let mut cursor = stmt.walk();
    let name_count = stmt.children_by_field_name("name", &mut cursor).count();
    if name_count != 1 {
        warn!(
            "cannot move '{}' out of a multi-name import; update the import by hand",
            node_text(name_node, source)
        );
        return None;
    }

    let module = stmt.child_by_field_name("module_name")?;
    Some(TextEdit {
        start: module.start_byte(),
        end: module.end_byte(),
        text: new_parent.to_string(),
    })
}

/// Make relative imports absolute where moving the file changes their meaning
///
/// Each `from .x import y` is resolved as if the file still lived at
/// `old_path` as `old_module`; when the same text would resolve differently
/// from `new_path` as `new_module`, the module is spelled out absolutely.
pub fn rebase_relative_imports(
    source: &str,
    old_path: &str,
    old_module: &str,
    new_path: &str,
    new_module: &str,
) -> Result<String> {
    let tree = parse_tree(old_path, source)?;
    let mut edits: Vec<TextEdit> = Vec::new();

    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.kind() != "import_from_statement" {
            let mut cursor = node.walk();
            stack.extend(node.named_children(&mut cursor));
            continue;
        }
        let Some(module) = node
            .child_by_field_name("module_name")
            .filter(|m| m.kind() == "relative_import")
        else {
            continue;
        };

        let (dots, rest) = relative_import_parts(module, source);
        let before = resolve_relative(old_module, is_package_init(old_path), dots, rest.as_deref());
        let after = resolve_relative(new_module, is_package_init(new_path), dots, rest.as_deref());
        match before {
            Some(absolute) if after.as_deref() != Some(absolute.as_str()) => {
                debug!("'{}' in {} becomes '{}'", node_text(module, source), old_path, absolute);
                edits.push(TextEdit {
                    start: module.start_byte(),
                    end: module.end_byte(),
                    text: absolute,
                });
            }
            Some(_) => {}
            None => warn!(
                "'{}' in {} reaches above the top-level package; left unchanged",
                node_text(module, source),
                old_path
            ),
        }
    }

    Ok(apply_text_edits(source, edits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::python::discovery::analyze;

    /// Sites for every reference and definition matching the rename
    fn sites_for(path: &str, fqn: &str, source: &str, old: &str, new: &str) -> Vec<RenameSite> {
        let analysis = analyze(path, Some(fqn), source).unwrap();
        let mut sites = Vec::new();
        for symbol in &analysis.symbols {
            if symbol.canonical_fqn == old {
                sites.push(RenameSite {
                    location: symbol.location,
                    kind: SiteKind::Definition,
                    old_fqn: old.to_string(),
                    new_fqn: new.to_string(),
                });
            }
        }
        for reference in &analysis.references {
            let target = reference.target_fqn.as_deref().unwrap();
            if target == old || target.starts_with(&format!("{}.", old)) {
                sites.push(RenameSite {
                    location: reference.location,
                    kind: reference.kind.into(),
                    old_fqn: target.to_string(),
                    new_fqn: format!("{}{}", new, &target[old.len()..]),
                });
            }
        }
        sites
    }

    #[test]
    fn test_rename_definition_and_local_usage() {
        let source = "class MessageBus:\n    pass\n\n\ndef make():\n    return MessageBus()\n";
        let sites = sites_for(
            "pkg/bus.py",
            "pkg.bus",
            source,
            "pkg.bus.MessageBus",
            "pkg.bus.FeedbackBus",
        );
        let out = apply_renames(source, &sites).unwrap();
        assert_eq!(
            out,
            "class FeedbackBus:\n    pass\n\n\ndef make():\n    return FeedbackBus()\n"
        );
    }

    #[test]
    fn test_rename_relative_import() {
        let source = "from .bus import MessageBus\n\n__all__ = [\"MessageBus\"]\n";
        let sites = sites_for(
            "pkg/__init__.py",
            "pkg",
            source,
            "pkg.bus.MessageBus",
            "pkg.bus.FeedbackBus",
        );
        let out = apply_renames(source, &sites).unwrap();
        assert_eq!(out, "from .bus import FeedbackBus\n\n__all__ = [\"FeedbackBus\"]\n");
    }

    #[test]
    fn test_all_entry_keeps_alias_spelling() {
        let source = "from .bus import MessageBus as MB, Other\n__all__ = (\"MB\", \"Other\")\n";
        let sites = sites_for(
            "pkg/__init__.py",
            "pkg",
            source,
            "pkg.bus.MessageBus",
            "pkg.bus.FeedbackBus",
        );
        let out = apply_renames(source, &sites).unwrap();
        assert_eq!(out, "from .bus import FeedbackBus as MB, Other\n__all__ = (\"MB\", \"Other\")\n");
    }

    #[test]
    fn test_rebase_relative_imports_into_subpackage() {
        let source = "from .util import helper\nfrom . import util\nfrom .. import top\n\n\ndef f():\n    from .util import other\n";
        let out = rebase_relative_imports(source, "pkg/bus.py", "pkg.bus", "pkg/sub/bus.py", "pkg.sub.bus").unwrap();
        assert_eq!(
            out,
            "from pkg.util import helper\nfrom pkg import util\nfrom .. import top\n\n\ndef f():\n    from pkg.util import other\n"
        );
    }

    #[test]
    fn test_rebase_keeps_imports_within_same_package() {
        let source = "from .util import helper\n";
        let out = rebase_relative_imports(source, "pkg/bus.py", "pkg.bus", "pkg/transport.py", "pkg.transport").unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn test_alias_spelling_is_kept() {
        let source = "from pkg.bus import MessageBus as MB\n\nbus = MB()\nother = MessageBus\n";
        let sites = sites_for(
            "app.py",
            "app",
            source,
            "pkg.bus.MessageBus",
            "pkg.bus.FeedbackBus",
        );
        let out = apply_renames(source, &sites).unwrap();
        assert_eq!(
            out,
            "from pkg.bus import FeedbackBus as MB\n\nbus = MB()\nother = MessageBus\n"
        );
    }

    #[test]
    fn test_rename_dotted_chain_and_module() {
        let source = "import pkg.bus\n\nx = pkg.bus.MessageBus.info\n";
        let sites = sites_for("app.py", "app", source, "pkg.bus", "pkg.transport");
        let out = apply_renames(source, &sites).unwrap();
        assert_eq!(out, "import pkg.transport\n\nx = pkg.transport.MessageBus.info\n");
    }

    #[test]
    fn test_relative_import_becomes_absolute_when_module_renamed() {
        let source = "from .bus import MessageBus\n";
        let sites = sites_for("pkg/__init__.py", "pkg", source, "pkg.bus", "pkg.transport");
        let out = apply_renames(source, &sites).unwrap();
        assert_eq!(out, "from pkg.transport import MessageBus\n");
    }

    #[test]
    fn test_shadowed_name_is_untouched() {
        let source = "from pkg.bus import MessageBus\n\ndef f(MessageBus):\n    return MessageBus\n";
        let sites = sites_for(
            "app.py",
            "app",
            source,
            "pkg.bus.MessageBus",
            "pkg.bus.FeedbackBus",
        );
        let out = apply_renames(source, &sites).unwrap();
        assert_eq!(
            out,
            "from pkg.bus import FeedbackBus\n\ndef f(MessageBus):\n    return MessageBus\n"
        );
    }

    #[test]
    fn test_chain_text() {
        assert_eq!(
            chain_text("MessageBus", "pkg.bus.MessageBus", "pkg.bus.FeedbackBus").as_deref(),
            Some("FeedbackBus")
        );
        assert_eq!(
            chain_text("b.MessageBus", "pkg.bus.MessageBus", "pkg.bus.FeedbackBus").as_deref(),
            Some("b.FeedbackBus")
        );
        assert_eq!(
            chain_text("bus.MessageBus", "pkg.bus.MessageBus", "pkg.transport.MessageBus").as_deref(),
            Some("transport.MessageBus")
        );
        assert_eq!(
            chain_text("x.info", "pkg.bus.MessageBus.info", "pkg.bus.FeedbackBus.info").as_deref(),
            Some("x.info")
        );
        assert_eq!(chain_text("other.name", "pkg.bus.MessageBus.info", "pkg.bus.FeedbackBus.info"), None);
    }
}
