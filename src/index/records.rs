//! Record types persisted by the index store

use crate::lang::ir::Location;
use serde::{Deserialize, Serialize};

/// Kind of an indexed symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Module,
    Function,
    Class,
    Method,
    Variable,
    Alias,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Module => "module",
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Variable => "variable",
            SymbolKind::Alias => "alias",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "module" => Some(SymbolKind::Module),
            "function" => Some(SymbolKind::Function),
            "class" => Some(SymbolKind::Class),
            "method" => Some(SymbolKind::Method),
            "variable" => Some(SymbolKind::Variable),
            "alias" => Some(SymbolKind::Alias),
            _ => None,
        }
    }

    /// Whether the symbol is a definition that can carry documentation
    pub fn is_definition(&self) -> bool {
        !matches!(self, SymbolKind::Alias)
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a reference site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Module path of an import statement
    ImportModule,
    /// Name imported by a `from` import
    ImportName,
    /// Name or dotted chain in expression position
    Usage,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::ImportModule => "import_module",
            ReferenceKind::ImportName => "import_name",
            ReferenceKind::Usage => "usage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "import_module" => Some(ReferenceKind::ImportModule),
            "import_name" => Some(ReferenceKind::ImportName),
            "usage" => Some(ReferenceKind::Usage),
            _ => None,
        }
    }
}

/// Indexing state of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingStatus {
    Dirty = 0,
    Clean = 1,
}

impl IndexingStatus {
    pub fn from_i64(value: i64) -> Self {
        if value == 1 {
            IndexingStatus::Clean
        } else {
            IndexingStatus::Dirty
        }
    }
}

/// A tracked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub content_hash: String,
    pub last_mtime: i64,
    pub last_size: i64,
    pub indexing_status: IndexingStatus,
}

/// A definition or alias within a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    /// SURI of the symbol
    pub id: String,
    /// Owning file; zero until the store assigns it
    pub file_id: i64,
    pub name: String,
    pub kind: SymbolKind,
    /// Fragment within the file; `None` for the module itself
    pub logical_path: Option<String>,
    pub canonical_fqn: String,
    pub alias_target_fqn: Option<String>,
    pub alias_target_id: Option<String>,
    /// Span of the name token
    pub location: Location,
    pub signature_hash: Option<String>,
    pub signature_text: Option<String>,
    pub docstring_hash: Option<String>,
    pub docstring_content: Option<String>,
}

/// A use of some symbol within a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    /// Row id; zero until persisted
    pub id: i64,
    pub source_file_id: i64,
    pub target_fqn: Option<String>,
    pub target_id: Option<String>,
    pub kind: ReferenceKind,
    pub location: Location,
}

impl ReferenceRecord {
    /// Unresolved reference to a fully qualified name
    pub fn to_fqn(target_fqn: impl Into<String>, kind: ReferenceKind, location: Location) -> Self {
        Self {
            id: 0,
            source_file_id: 0,
            target_fqn: Some(target_fqn.into()),
            target_id: None,
            kind,
            location,
        }
    }
}

/// Counters reported by a refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ScanStats {
    /// Whether the refresh reparsed or removed anything
    pub fn changed(&self) -> bool {
        self.added + self.updated + self.deleted > 0
    }
}
