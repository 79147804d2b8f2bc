//! Language adapters
//!
//! Everything that needs to understand source text goes through a
//! [`LanguageAdapter`]. Adapters are values held in an [`AdapterRegistry`]
//! keyed by file extension, so the scanner, the document manager and the
//! refactor planner never depend on a concrete language.

pub mod ir;
pub mod python;

pub use ir::{
    is_public_fragment, Argument, ArgumentKind, Attribute, ClassDef, FunctionDef, Location,
    ModuleDef,
};
pub use python::PythonAdapter;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::index::records::{ReferenceKind, ReferenceRecord, SymbolRecord};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Symbols and references emitted for one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileAnalysis {
    pub symbols: Vec<SymbolRecord>,
    pub references: Vec<ReferenceRecord>,
}

/// What a rename site refers to in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    /// The name token of a definition
    Definition,
    /// The module path of an import statement
    ImportModule,
    /// A name imported by a `from` import
    ImportName,
    /// A name or dotted chain in expression position
    Usage,
}

impl From<ReferenceKind> for SiteKind {
    fn from(kind: ReferenceKind) -> Self {
        match kind {
            ReferenceKind::ImportModule => SiteKind::ImportModule,
            ReferenceKind::ImportName => SiteKind::ImportName,
            ReferenceKind::Usage => SiteKind::Usage,
        }
    }
}

/// One position to rewrite during a batch rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameSite {
    pub location: Location,
    pub kind: SiteKind,
    /// Fully qualified name the site currently resolves to
    pub old_fqn: String,
    /// Fully qualified name it must resolve to afterwards
    pub new_fqn: String,
}

/// Capabilities the engine needs from a host language
pub trait LanguageAdapter {
    /// Source file extension handled by the adapter (without the dot)
    fn extension(&self) -> &'static str;

    /// SURI scheme for symbols of this language
    fn scheme(&self) -> &'static str;

    /// Extension of generated stub files
    fn stub_extension(&self) -> &'static str;

    /// Parse source text into the module IR
    fn parse_module(&self, path: &str, source: &str) -> Result<ModuleDef>;

    /// Emit symbol and reference records for one file
    fn analyze(&self, path: &str, module_fqn: Option<&str>, source: &str) -> Result<FileAnalysis>;

    /// Current code fingerprints for every documentable fragment
    fn code_fingerprints(&self, module: &ModuleDef) -> BTreeMap<String, Fingerprint>;

    /// Remove doc strings, restricted to `whitelist` fragments when given
    fn strip_docstrings(&self, source: &str, whitelist: Option<&BTreeSet<String>>) -> Result<String>;

    /// Replace or insert doc strings keyed by fragment
    fn inject_docstrings(&self, source: &str, docs: &BTreeMap<String, String>) -> Result<String>;

    /// Rewrite every rename site in one pass
    fn apply_renames(&self, source: &str, sites: &[RenameSite]) -> Result<String>;

    /// Keep the file's own relative imports valid after it moves to `new_path`
    fn rebase_relative_imports(
        &self,
        source: &str,
        old_path: &str,
        old_module: &str,
        new_path: &str,
        new_module: &str,
    ) -> Result<String>;

    /// Render a type stub with the given docs
    fn render_stub(&self, module: &ModuleDef, docs: &BTreeMap<String, String>) -> String;
}

/// Adapters keyed by file extension
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Box<dyn LanguageAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with every built-in adapter
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PythonAdapter::new()));
        registry
    }

    pub fn register(&mut self, adapter: Box<dyn LanguageAdapter>) {
        self.adapters.insert(adapter.extension(), adapter);
    }

    /// Adapter for an extension, if registered
    pub fn for_extension(&self, ext: &str) -> Option<&dyn LanguageAdapter> {
        self.adapters.get(ext).map(|a| a.as_ref())
    }

    /// Adapter for a path, chosen by its extension
    pub fn for_path(&self, path: &str) -> Option<&dyn LanguageAdapter> {
        let file = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file.rsplit_once('.')?;
        self.for_extension(ext)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = AdapterRegistry::with_defaults();
        assert!(registry.for_path("pkg/bus.py").is_some());
        assert_eq!(registry.for_path("pkg/bus.py").unwrap().scheme(), "py");
        assert!(registry.for_path("README.md").is_none());
        assert!(registry.for_path("Makefile").is_none());
    }
}
