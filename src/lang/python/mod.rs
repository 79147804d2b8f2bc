//! Python adapter built on tree-sitter
//!
//! - [`parser`] turns source text into the module IR
//! - [`discovery`] emits symbol and reference records for the index
//! - [`fingerprint`] computes structure hashes and signature text
//! - [`transform`] strips and injects doc strings
//! - [`rename`] rewrites usage sites for the refactor planner
//! - [`stub`] renders `.pyi` files

pub mod discovery;
pub mod fingerprint;
pub mod parser;
pub mod rename;
pub mod stub;
pub mod transform;

use super::{FileAnalysis, LanguageAdapter, Location, ModuleDef, RenameSite};
use crate::error::{Result, StitcherError};
use crate::fingerprint::Fingerprint;
use crate::suri::PY_SCHEME;
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::{Node, Parser, Tree};

/// The Python language adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonAdapter;

impl PythonAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageAdapter for PythonAdapter {
    fn extension(&self) -> &'static str {
        "py"
    }

    fn scheme(&self) -> &'static str {
        PY_SCHEME
    }

    fn stub_extension(&self) -> &'static str {
        "pyi"
    }

    fn parse_module(&self, path: &str, source: &str) -> Result<ModuleDef> {
        parser::parse_module(path, source)
    }

    fn analyze(&self, path: &str, module_fqn: Option<&str>, source: &str) -> Result<FileAnalysis> {
        discovery::analyze(path, module_fqn, source)
    }

    fn code_fingerprints(&self, module: &ModuleDef) -> BTreeMap<String, Fingerprint> {
        fingerprint::module_fingerprints(module)
    }

    fn strip_docstrings(&self, source: &str, whitelist: Option<&BTreeSet<String>>) -> Result<String> {
        transform::strip_docstrings(source, whitelist)
    }

    fn inject_docstrings(&self, source: &str, docs: &BTreeMap<String, String>) -> Result<String> {
        transform::inject_docstrings(source, docs)
    }

    fn apply_renames(&self, source: &str, sites: &[RenameSite]) -> Result<String> {
        rename::apply_renames(source, sites)
    }

    fn rebase_relative_imports(
        &self,
        source: &str,
        old_path: &str,
        old_module: &str,
        new_path: &str,
        new_module: &str,
    ) -> Result<String> {
        rename::rebase_relative_imports(source, old_path, old_module, new_path, new_module)
    }

    fn render_stub(&self, module: &ModuleDef, docs: &BTreeMap<String, String>) -> String {
        stub::render_stub(module, docs)
    }
}

/// Parse Python source, rejecting text with syntax errors
pub(crate) fn parse_tree(path: &str, source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| StitcherError::parse(path, format!("failed to load Python grammar: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| StitcherError::parse(path, "parser returned no tree"))?;

    if tree.root_node().has_error() {
        let line = first_error_line(tree.root_node()).unwrap_or(0);
        return Err(StitcherError::parse(path, format!("syntax error near line {}", line)));
    }

    Ok(tree)
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error_line)
}

pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

pub(crate) fn location_of(node: Node) -> Location {
    let start = node.start_position();
    let end = node.end_position();
    Location::new(start.row + 1, start.column, end.row + 1, end.column)
}

/// Collapse whitespace runs so that equivalent expressions compare equal
pub(crate) fn normalize_expr(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Named children, skipping comments
pub(crate) fn statements(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// Definition node and its decorator wrapper, if any
pub(crate) fn unwrap_decorated(node: Node) -> Option<(Node, Option<Node>)> {
    match node.kind() {
        "function_definition" | "class_definition" => Some((node, None)),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .map(|def| (def, Some(node))),
        _ => None,
    }
}

/// Decorator expressions attached to a decorated definition
pub(crate) fn decorators(wrapper: Option<Node>, source: &str) -> Vec<String> {
    let Some(wrapper) = wrapper else {
        return Vec::new();
    };
    let mut cursor = wrapper.walk();
    wrapper
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "decorator")
        .map(|n| normalize_expr(node_text(n, source).trim_start_matches('@')))
        .collect()
}

/// Whether a statement is a bare string literal
pub(crate) fn docstring_literal(stmt: Node) -> Option<Node> {
    if stmt.kind() != "expression_statement" || stmt.named_child_count() != 1 {
        return None;
    }
    let expr = stmt.named_child(0)?;
    (expr.kind() == "string").then_some(expr)
}

/// The doc string statement of a block: its first statement, if a string
pub(crate) fn block_docstring(block: Node) -> Option<Node> {
    let first = statements(block).into_iter().next()?;
    docstring_literal(first).map(|_| first)
}

/// The statement following `stmt` within its block, skipping comments
pub(crate) fn next_statement(stmt: Node) -> Option<Node> {
    let mut current = stmt.next_named_sibling();
    while let Some(node) = current {
        if node.kind() != "comment" {
            return Some(node);
        }
        current = node.next_named_sibling();
    }
    None
}

/// Decoded value of a doc string statement, cleaned of indentation
pub(crate) fn docstring_value(stmt: Node, source: &str) -> Option<String> {
    let literal = docstring_literal(stmt)?;
    string_literal_value(node_text(literal, source)).map(|s| crate::docstring::cleandoc(&s))
}

/// Decode a Python string literal; byte strings and f-strings yield `None`
pub(crate) fn string_literal_value(raw: &str) -> Option<String> {
    let prefix_len = raw.find(|c: char| c == '"' || c == '\'')?;
    let prefix = raw[..prefix_len].to_ascii_lowercase();
    if prefix.contains('b') || prefix.contains('f') {
        return None;
    }

    let body = &raw[prefix_len..];
    let quote = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|q| body.len() >= 2 * q.len() && body.starts_with(*q) && body.ends_with(*q))?;
    let inner = &body[quote.len()..body.len() - quote.len()];

    if prefix.contains('r') {
        Some(inner.to_string())
    } else {
        Some(unescape(inner))
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Replacement of `start..end` in a source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Apply non-overlapping edits; the first edit at a position wins
pub(crate) fn apply_text_edits(source: &str, mut edits: Vec<TextEdit>) -> String {
    edits.sort_by_key(|e| (e.start, e.end));

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.text);
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Byte offset of the start of the line containing `offset`
pub(crate) fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |idx| idx + 1)
}

/// Byte offset of the newline ending the line containing `offset`
pub(crate) fn line_end(source: &str, offset: usize) -> usize {
    source[offset..]
        .find('\n')
        .map_or(source.len(), |idx| offset + idx)
}

/// Whether a relative path names a package initializer
pub(crate) fn is_package_init(path: &str) -> bool {
    path.rsplit('/').next() == Some("__init__.py")
}
