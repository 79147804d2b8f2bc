//! SQLite index of files, symbols and references
//!
//! This module handles persistent storage of:
//! - Every discovered file with its stat and content hash
//! - Symbols (definitions and import aliases) keyed by SURI
//! - References from a file to a fully qualified name, linked to symbol ids
//!
//! The [`Scanner`] keeps the store in step with the workspace and the
//! [`linker`] resolves names to ids once a scan completes.

pub mod linker;
pub mod records;
mod scanner;
mod schema;

pub use records::{
    FileRecord, IndexingStatus, ReferenceKind, ReferenceRecord, ScanStats, SymbolKind,
    SymbolRecord,
};
pub use scanner::Scanner;
pub use schema::{SCHEMA, SCHEMA_VERSION};

use crate::error::Result;
use crate::lang::{FileAnalysis, Location};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

const SYMBOL_COLUMNS: &str = "id, file_id, name, kind, logical_path, canonical_fqn, \
     alias_target_fqn, alias_target_id, lineno, col_offset, end_lineno, end_col_offset, \
     signature_hash, signature_text, docstring_hash, docstring_content";

const REFERENCE_COLUMNS: &str = "r.id, r.source_file_id, r.target_fqn, r.target_id, r.kind, \
     r.lineno, r.col_offset, r.end_lineno, r.end_col_offset";

/// Database connection wrapper
pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    /// Open or create an index at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!("opened index at {}", path.display());

        let store = Self { conn };
        store.initialize()?;

        Ok(store)
    }

    /// Open an in-memory index (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let store = Self { conn };
        store.initialize()?;

        Ok(store)
    }

    /// Create the schema, rebuilding it when the stored version is stale
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;

        let version: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| {
                row.get(0)
            })
            .optional()?;

        match version.as_deref() {
            Some(v) if v == SCHEMA_VERSION => {}
            Some(v) => {
                info!("index schema {} is stale (want {}); rebuilding", v, SCHEMA_VERSION);
                self.conn.execute_batch(schema::DROP_TABLES)?;
                self.conn.execute_batch(SCHEMA)?;
                self.set_schema_version()?;
            }
            None => self.set_schema_version()?,
        }

        Ok(())
    }

    fn set_schema_version(&self) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Run `f` inside one transaction; any error rolls the whole scope back
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    // ==================== Files ====================

    /// Get a file record by workspace-relative path
    pub fn file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, path, content_hash, last_mtime, last_size, indexing_status
                 FROM files WHERE path = ?1",
                params![path],
                file_from_row,
            )
            .optional()?;
        Ok(result)
    }

    /// All tracked files ordered by path
    pub fn all_files(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, content_hash, last_mtime, last_size, indexing_status
             FROM files ORDER BY path",
        )?;
        let rows = stmt.query_map([], file_from_row)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    /// Insert a file or update its hash and stat, returning its id
    ///
    /// Existing files keep their id, so references from other files stay valid.
    pub fn upsert_file(
        &self,
        path: &str,
        content_hash: &str,
        mtime: i64,
        size: i64,
        status: IndexingStatus,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO files (path, content_hash, last_mtime, last_size, indexing_status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(path) DO UPDATE SET
                content_hash = excluded.content_hash,
                last_mtime = excluded.last_mtime,
                last_size = excluded.last_size,
                indexing_status = excluded.indexing_status
            "#,
            params![path, content_hash, mtime, size, status as i64],
        )?;
        let id = self
            .conn
            .query_row("SELECT id FROM files WHERE path = ?1", params![path], |row| {
                row.get(0)
            })?;
        Ok(id)
    }

    /// Refresh stat fields without touching analysis
    pub fn update_file_stat(&self, id: i64, mtime: i64, size: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE files SET last_mtime = ?2, last_size = ?3 WHERE id = ?1",
            params![id, mtime, size],
        )?;
        Ok(())
    }

    pub fn set_file_status(&self, id: i64, status: IndexingStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE files SET indexing_status = ?2 WHERE id = ?1",
            params![id, status as i64],
        )?;
        Ok(())
    }

    /// Delete files and, through the cascade, their symbols and references
    pub fn prune_files(&self, paths: &[String]) -> Result<usize> {
        let mut removed = 0;
        let mut stmt = self.conn.prepare("DELETE FROM files WHERE path = ?1")?;
        for path in paths {
            removed += stmt.execute(params![path])?;
        }
        // Cascades need foreign keys; clear orphans explicitly as well
        self.conn.execute(
            "DELETE FROM symbols WHERE file_id NOT IN (SELECT id FROM files)",
            [],
        )?;
        self.conn.execute(
            r#"DELETE FROM "references" WHERE source_file_id NOT IN (SELECT id FROM files)"#,
            [],
        )?;
        Ok(removed)
    }

    /// Replace every symbol and reference of a file and mark it clean
    pub fn replace_file_analysis(&self, file_id: i64, analysis: &FileAnalysis) -> Result<()> {
        self.conn
            .execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;
        self.conn.execute(
            r#"DELETE FROM "references" WHERE source_file_id = ?1"#,
            params![file_id],
        )?;

        let mut insert_symbol = self.conn.prepare(
            r#"
            INSERT OR REPLACE INTO symbols (
                id, file_id, name, kind, logical_path, canonical_fqn,
                alias_target_fqn, alias_target_id, lineno, col_offset,
                end_lineno, end_col_offset, signature_hash, signature_text,
                docstring_hash, docstring_content
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )?;
        for symbol in &analysis.symbols {
            insert_symbol.execute(params![
                symbol.id,
                file_id,
                symbol.name,
                symbol.kind.as_str(),
                symbol.logical_path,
                symbol.canonical_fqn,
                symbol.alias_target_fqn,
                symbol.alias_target_id,
                symbol.location.lineno as i64,
                symbol.location.col_offset as i64,
                symbol.location.end_lineno as i64,
                symbol.location.end_col_offset as i64,
                symbol.signature_hash,
                symbol.signature_text,
                symbol.docstring_hash,
                symbol.docstring_content,
            ])?;
        }

        let mut insert_reference = self.conn.prepare(
            r#"
            INSERT INTO "references" (
                source_file_id, target_fqn, target_id, kind,
                lineno, col_offset, end_lineno, end_col_offset
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for reference in &analysis.references {
            insert_reference.execute(params![
                file_id,
                reference.target_fqn,
                reference.target_id,
                reference.kind.as_str(),
                reference.location.lineno as i64,
                reference.location.col_offset as i64,
                reference.location.end_lineno as i64,
                reference.location.end_col_offset as i64,
            ])?;
        }

        self.set_file_status(file_id, IndexingStatus::Clean)
    }

    // ==================== Symbols ====================

    /// Symbols of a file in emission order
    pub fn symbols_for_file(&self, file_id: i64) -> Result<Vec<SymbolRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM symbols WHERE file_id = ?1 ORDER BY rowid",
            SYMBOL_COLUMNS
        ))?;
        let rows = stmt.query_map(params![file_id], SymbolRow::from_row)?;
        collect_symbols(rows)
    }

    /// Symbols of a file looked up by path; empty when the file is unknown
    pub fn symbols_for_path(&self, path: &str) -> Result<Vec<SymbolRecord>> {
        match self.file_by_path(path)? {
            Some(file) => self.symbols_for_file(file.id),
            None => Ok(Vec::new()),
        }
    }

    /// Get a symbol by SURI
    pub fn symbol_by_id(&self, id: &str) -> Result<Option<SymbolRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM symbols WHERE id = ?1", SYMBOL_COLUMNS),
                params![id],
                SymbolRow::from_row,
            )
            .optional()?;
        row.map(SymbolRow::into_symbol).transpose()
    }

    /// Symbol with a canonical FQN, preferring definitions over aliases
    pub fn symbol_by_fqn(&self, fqn: &str) -> Result<Option<SymbolRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM symbols WHERE canonical_fqn = ?1
                     ORDER BY kind = 'alias', rowid LIMIT 1",
                    SYMBOL_COLUMNS
                ),
                params![fqn],
                SymbolRow::from_row,
            )
            .optional()?;
        row.map(SymbolRow::into_symbol).transpose()
    }

    /// Definitions whose FQN is `fqn` or lies beneath it
    pub fn definitions_under(&self, fqn: &str) -> Result<Vec<SymbolRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM symbols
             WHERE kind != 'alias'
               AND (canonical_fqn = ?1 OR substr(canonical_fqn, 1, length(?2)) = ?2)
             ORDER BY canonical_fqn",
            SYMBOL_COLUMNS
        ))?;
        let prefix = format!("{}.", fqn);
        let rows = stmt.query_map(params![fqn, prefix], SymbolRow::from_row)?;
        collect_symbols(rows)
    }

    /// Aliases whose target is `fqn` or lies beneath it
    pub fn aliases_of(&self, fqn: &str) -> Result<Vec<SymbolRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM symbols
             WHERE kind = 'alias'
               AND (alias_target_fqn = ?1 OR substr(alias_target_fqn, 1, length(?2)) = ?2)
             ORDER BY id",
            SYMBOL_COLUMNS
        ))?;
        let prefix = format!("{}.", fqn);
        let rows = stmt.query_map(params![fqn, prefix], SymbolRow::from_row)?;
        collect_symbols(rows)
    }

    /// Number of symbols in the store
    pub fn symbol_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ==================== References ====================

    /// References to `fqn` or to any name beneath it, with their source path
    ///
    /// Ordered by path and then position so callers can batch per file.
    pub fn references_to_fqn(&self, fqn: &str) -> Result<Vec<(String, ReferenceRecord)>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT f.path, {} FROM "references" r
            JOIN files f ON f.id = r.source_file_id
            WHERE r.target_fqn = ?1 OR substr(r.target_fqn, 1, length(?2)) = ?2
            ORDER BY f.path, r.lineno, r.col_offset
            "#,
            REFERENCE_COLUMNS
        ))?;
        let prefix = format!("{}.", fqn);
        let rows = stmt.query_map(params![fqn, prefix], |row| {
            Ok((row.get::<_, String>(0)?, ReferenceRow::from_row(row, 1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (path, reference) = row?;
            out.push((path, reference.into_reference()?));
        }
        Ok(out)
    }

    /// References that originate in a file
    pub fn references_in_file(&self, file_id: i64) -> Result<Vec<ReferenceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"SELECT {} FROM "references" r WHERE r.source_file_id = ?1 ORDER BY r.id"#,
            REFERENCE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![file_id], |row| ReferenceRow::from_row(row, 0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_reference()?);
        }
        Ok(out)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn file_from_row(row: &Row) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        content_hash: row.get(2)?,
        last_mtime: row.get(3)?,
        last_size: row.get(4)?,
        indexing_status: IndexingStatus::from_i64(row.get(5)?),
    })
}

fn collect_symbols(
    rows: impl Iterator<Item = rusqlite::Result<SymbolRow>>,
) -> Result<Vec<SymbolRecord>> {
    let mut symbols = Vec::new();
    for row in rows {
        symbols.push(row?.into_symbol()?);
    }
    Ok(symbols)
}

fn location_at(row: &Row, offset: usize) -> rusqlite::Result<Location> {
    Ok(Location::new(
        row.get::<_, i64>(offset)? as usize,
        row.get::<_, i64>(offset + 1)? as usize,
        row.get::<_, i64>(offset + 2)? as usize,
        row.get::<_, i64>(offset + 3)? as usize,
    ))
}

/// Internal row type for database mapping
struct SymbolRow {
    id: String,
    file_id: i64,
    name: String,
    kind: String,
    logical_path: Option<String>,
    canonical_fqn: String,
    alias_target_fqn: Option<String>,
    alias_target_id: Option<String>,
    location: Location,
    signature_hash: Option<String>,
    signature_text: Option<String>,
    docstring_hash: Option<String>,
    docstring_content: Option<String>,
}

impl SymbolRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file_id: row.get(1)?,
            name: row.get(2)?,
            kind: row.get(3)?,
            logical_path: row.get(4)?,
            canonical_fqn: row.get(5)?,
            alias_target_fqn: row.get(6)?,
            alias_target_id: row.get(7)?,
            location: location_at(row, 8)?,
            signature_hash: row.get(12)?,
            signature_text: row.get(13)?,
            docstring_hash: row.get(14)?,
            docstring_content: row.get(15)?,
        })
    }

    fn into_symbol(self) -> Result<SymbolRecord> {
        let kind = SymbolKind::parse(&self.kind).ok_or_else(|| {
            crate::error::StitcherError::parse(
                "index",
                format!("unknown symbol kind '{}' for {}", self.kind, self.id),
            )
        })?;
        Ok(SymbolRecord {
            id: self.id,
            file_id: self.file_id,
            name: self.name,
            kind,
            logical_path: self.logical_path,
            canonical_fqn: self.canonical_fqn,
            alias_target_fqn: self.alias_target_fqn,
            alias_target_id: self.alias_target_id,
            location: self.location,
            signature_hash: self.signature_hash,
            signature_text: self.signature_text,
            docstring_hash: self.docstring_hash,
            docstring_content: self.docstring_content,
        })
    }
}

/// Internal row type for database mapping
struct ReferenceRow {
    id: i64,
    source_file_id: i64,
    target_fqn: Option<String>,
    target_id: Option<String>,
    kind: String,
    location: Location,
}

impl ReferenceRow {
    fn from_row(row: &Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            source_file_id: row.get(offset + 1)?,
            target_fqn: row.get(offset + 2)?,
            target_id: row.get(offset + 3)?,
            kind: row.get(offset + 4)?,
            location: location_at(row, offset + 5)?,
        })
    }

    fn into_reference(self) -> Result<ReferenceRecord> {
        let kind = ReferenceKind::parse(&self.kind).ok_or_else(|| {
            crate::error::StitcherError::parse(
                "index",
                format!("unknown reference kind '{}'", self.kind),
            )
        })?;
        Ok(ReferenceRecord {
            id: self.id,
            source_file_id: self.source_file_id,
            target_fqn: self.target_fqn,
            target_id: self.target_id,
            kind,
            location: self.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::python::discovery::analyze;

    fn store_with(files: &[(&str, &str, &str)]) -> IndexStore {
        let store = IndexStore::open_in_memory().unwrap();
        for (path, fqn, source) in files {
            let id = store
                .upsert_file(path, "hash", 1, source.len() as i64, IndexingStatus::Dirty)
                .unwrap();
            let analysis = analyze(path, Some(fqn), source).unwrap();
            store.replace_file_analysis(id, &analysis).unwrap();
        }
        store
    }

    #[test]
    fn test_upsert_keeps_file_id() {
        let store = IndexStore::open_in_memory().unwrap();
        let first = store
            .upsert_file("pkg/a.py", "h1", 1, 10, IndexingStatus::Dirty)
            .unwrap();
        let second = store
            .upsert_file("pkg/a.py", "h2", 2, 12, IndexingStatus::Clean)
            .unwrap();
        assert_eq!(first, second);

        let file = store.file_by_path("pkg/a.py").unwrap().unwrap();
        assert_eq!(file.content_hash, "h2");
        assert_eq!(file.indexing_status, IndexingStatus::Clean);
    }

    #[test]
    fn test_symbols_roundtrip_through_store() {
        let store = store_with(&[("pkg/bus.py", "pkg.bus", "class MessageBus:\n    def info(self):\n        pass\n")]);
        let symbols = store.symbols_for_path("pkg/bus.py").unwrap();
        let ids: Vec<&str> = symbols.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "py://pkg/bus.py",
                "py://pkg/bus.py#MessageBus",
                "py://pkg/bus.py#MessageBus.info"
            ]
        );

        let class = store.symbol_by_fqn("pkg.bus.MessageBus").unwrap().unwrap();
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(class.location, Location::new(1, 6, 1, 16));
    }

    #[test]
    fn test_reference_queries_match_prefix_only_on_segments() {
        let store = store_with(&[
            ("pkg/bus.py", "pkg.bus", "class MessageBus:\n    pass\n"),
            (
                "app.py",
                "app",
                "from pkg.bus import MessageBus\nimport pkg.busy\n\nMessageBus()\n",
            ),
        ]);

        let refs = store.references_to_fqn("pkg.bus").unwrap();
        let targets: Vec<&str> = refs
            .iter()
            .filter_map(|(_, r)| r.target_fqn.as_deref())
            .collect();
        assert!(targets.contains(&"pkg.bus"));
        assert!(targets.contains(&"pkg.bus.MessageBus"));
        assert!(!targets.contains(&"pkg.busy"));
        assert!(refs.iter().all(|(path, _)| path == "app.py"));
    }

    #[test]
    fn test_prune_cascades() {
        let store = store_with(&[("pkg/bus.py", "pkg.bus", "class MessageBus:\n    pass\n")]);
        assert!(store.symbol_count().unwrap() > 0);

        let removed = store.prune_files(&["pkg/bus.py".to_string()]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.symbol_count().unwrap(), 0);
        assert!(store.file_by_path("pkg/bus.py").unwrap().is_none());
    }

    #[test]
    fn test_stale_schema_is_rebuilt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        {
            let store = IndexStore::open(&path).unwrap();
            store
                .upsert_file("a.py", "h", 1, 1, IndexingStatus::Clean)
                .unwrap();
            store
                .connection()
                .execute("UPDATE meta SET value = '0' WHERE key = 'schema_version'", [])
                .unwrap();
        }
        let store = IndexStore::open(&path).unwrap();
        assert!(store.all_files().unwrap().is_empty());
    }
}
