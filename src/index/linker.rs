//! Post-scan resolution of names to symbol ids
//!
//! Linking only fills ids that are still null, so running it twice is a
//! no-op. Ids left pointing at symbols that no longer exist are cleared
//! first and then re-resolved by name.

use super::IndexStore;
use crate::error::Result;
use tracing::debug;

/// Counters for one linking pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub references: usize,
    pub aliases: usize,
    pub cleared: usize,
}

/// Resolve unresolved references and aliases against the symbol table
pub fn link(store: &IndexStore) -> Result<LinkStats> {
    let conn = store.connection();
    let mut stats = LinkStats::default();

    stats.cleared += conn.execute(
        r#"
        UPDATE "references" SET target_id = NULL
        WHERE target_id IS NOT NULL
          AND target_fqn IS NOT NULL
          AND target_id NOT IN (SELECT id FROM symbols)
        "#,
        [],
    )?;
    stats.cleared += conn.execute(
        r#"
        UPDATE symbols SET alias_target_id = NULL
        WHERE alias_target_id IS NOT NULL
          AND alias_target_id NOT IN (SELECT id FROM symbols)
        "#,
        [],
    )?;

    stats.references = conn.execute(
        r#"
        UPDATE "references" SET target_id = (
            SELECT s.id FROM symbols s
            WHERE s.canonical_fqn = "references".target_fqn
            ORDER BY s.kind = 'alias', s.rowid
            LIMIT 1
        )
        WHERE target_id IS NULL
          AND target_fqn IS NOT NULL
          AND EXISTS (SELECT 1 FROM symbols s WHERE s.canonical_fqn = "references".target_fqn)
        "#,
        [],
    )?;

    stats.aliases = conn.execute(
        r#"
        UPDATE symbols SET alias_target_id = (
            SELECT s.id FROM symbols s
            WHERE s.canonical_fqn = symbols.alias_target_fqn
              AND s.id != symbols.id
            ORDER BY s.kind = 'alias', s.rowid
            LIMIT 1
        )
        WHERE kind = 'alias'
          AND alias_target_id IS NULL
          AND alias_target_fqn IS NOT NULL
          AND EXISTS (
              SELECT 1 FROM symbols s
              WHERE s.canonical_fqn = symbols.alias_target_fqn AND s.id != symbols.id
          )
        "#,
        [],
    )?;

    debug!(
        "linked {} references and {} aliases ({} stale ids cleared)",
        stats.references, stats.aliases, stats.cleared
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexingStatus;
    use crate::lang::python::discovery::analyze;

    fn index(store: &IndexStore, path: &str, fqn: &str, source: &str) {
        let id = store
            .upsert_file(path, "h", 1, 1, IndexingStatus::Dirty)
            .unwrap();
        store
            .replace_file_analysis(id, &analyze(path, Some(fqn), source).unwrap())
            .unwrap();
    }

    #[test]
    fn test_link_resolves_and_is_idempotent() {
        let store = IndexStore::open_in_memory().unwrap();
        index(&store, "pkg/bus.py", "pkg.bus", "class MessageBus:\n    pass\n");
        index(&store, "pkg/__init__.py", "pkg", "from .bus import MessageBus\n");

        let first = link(&store).unwrap();
        assert!(first.references > 0);
        assert_eq!(first.aliases, 1);

        let alias = store.symbol_by_id("py://pkg/__init__.py#MessageBus").unwrap().unwrap();
        assert_eq!(alias.alias_target_id.as_deref(), Some("py://pkg/bus.py#MessageBus"));

        let refs = store.references_to_fqn("pkg.bus.MessageBus").unwrap();
        assert!(refs
            .iter()
            .all(|(_, r)| r.target_id.as_deref() == Some("py://pkg/bus.py#MessageBus")));

        let second = link(&store).unwrap();
        assert_eq!(second, LinkStats::default());
    }

    #[test]
    fn test_link_leaves_unknown_names_unresolved() {
        let store = IndexStore::open_in_memory().unwrap();
        index(&store, "app.py", "app", "import os\n\nos.getcwd()\n");
        link(&store).unwrap();

        let file = store.file_by_path("app.py").unwrap().unwrap();
        let refs = store.references_in_file(file.id).unwrap();
        assert!(!refs.is_empty());
        assert!(refs.iter().all(|r| r.target_id.is_none()));
    }

    #[test]
    fn test_stale_ids_are_relinked() {
        let store = IndexStore::open_in_memory().unwrap();
        index(&store, "pkg/bus.py", "pkg.bus", "class MessageBus:\n    pass\n");
        index(&store, "app.py", "app", "from pkg.bus import MessageBus\n");
        link(&store).unwrap();

        index(&store, "pkg/bus.py", "pkg.bus", "X = 1\n");
        let stats = link(&store).unwrap();
        assert!(stats.cleared > 0);

        let refs = store.references_to_fqn("pkg.bus.MessageBus").unwrap();
        assert!(refs.iter().all(|(_, r)| r.target_id.is_none()));
    }
}
