//! Database schema definition

/// Bumped whenever a table changes shape; a mismatch rebuilds the index
pub const SCHEMA_VERSION: &str = "1";

/// Tables dropped when the stored schema version is stale
pub const DROP_TABLES: &str = r#"
DROP TABLE IF EXISTS "references";
DROP TABLE IF EXISTS symbols;
DROP TABLE IF EXISTS files;
"#;

/// SQL schema for the index database
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Schema bookkeeping
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Every discovered file, whether or not an adapter understands it
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    content_hash TEXT NOT NULL,
    last_mtime INTEGER NOT NULL,
    last_size INTEGER NOT NULL,
    indexing_status INTEGER NOT NULL DEFAULT 0
);

-- Definitions and import aliases, keyed by SURI
CREATE TABLE IF NOT EXISTS symbols (
    id TEXT PRIMARY KEY,
    file_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    logical_path TEXT,
    canonical_fqn TEXT NOT NULL,
    alias_target_fqn TEXT,
    alias_target_id TEXT,
    lineno INTEGER NOT NULL,
    col_offset INTEGER NOT NULL,
    end_lineno INTEGER NOT NULL,
    end_col_offset INTEGER NOT NULL,
    signature_hash TEXT,
    signature_text TEXT,
    docstring_hash TEXT,
    docstring_content TEXT,
    FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);
CREATE INDEX IF NOT EXISTS idx_symbols_fqn ON symbols(canonical_fqn);

-- Uses of symbols; target_fqn is resolved to target_id by the linker
CREATE TABLE IF NOT EXISTS "references" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_file_id INTEGER NOT NULL,
    target_fqn TEXT,
    target_id TEXT,
    kind TEXT NOT NULL,
    lineno INTEGER NOT NULL,
    col_offset INTEGER NOT NULL,
    end_lineno INTEGER NOT NULL,
    end_col_offset INTEGER NOT NULL,
    FOREIGN KEY (source_file_id) REFERENCES files(id) ON DELETE CASCADE,
    CHECK (target_fqn IS NOT NULL OR target_id IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS idx_references_file ON "references"(source_file_id);
CREATE INDEX IF NOT EXISTS idx_references_fqn ON "references"(target_fqn);
CREATE INDEX IF NOT EXISTS idx_references_target ON "references"(target_id);
"#;
