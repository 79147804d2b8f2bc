//! Symbol and reference discovery for the index
//!
//! Definitions come from the module IR. References are found by a visitor
//! that threads an explicit scope stack: module bindings (definitions and
//! imports), class bodies and function locals. A name only produces a
//! reference when it resolves to a module-level binding, so locals that
//! shadow an import are never reported.

use super::fingerprint::{
    attribute_canonical, attribute_signature_text, class_canonical, class_signature_text,
    function_canonical, function_signature_text,
};
use super::parser::module_from_tree;
use super::{is_package_init, location_of, node_text, parse_tree};
use crate::error::Result;
use crate::fingerprint::sha256_hex;
use crate::index::records::{ReferenceKind, ReferenceRecord, SymbolKind, SymbolRecord};
use crate::lang::ir::{Location, ModuleDef};
use crate::lang::FileAnalysis;
use crate::suri::Suri;
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

/// Analyze one file into symbol and reference records
pub fn analyze(path: &str, module_fqn: Option<&str>, source: &str) -> Result<FileAnalysis> {
    let tree = parse_tree(path, source)?;
    let root = tree.root_node();
    let module = module_from_tree(path, root, source);

    let fqn = module_fqn
        .map(str::to_string)
        .unwrap_or_else(|| fallback_module_name(path));
    let is_package = is_package_init(path);

    let mut symbols = definition_symbols(path, &fqn, &module)?;

    let imports = ImportResolver {
        module_fqn: &fqn,
        is_package,
    };
    let mut taken: HashSet<String> = symbols
        .iter()
        .filter_map(|s| s.logical_path.clone())
        .collect();
    for binding in module_import_bindings(root, source, &imports) {
        // Definitions win over imports of the same name
        if !taken.insert(binding.local.clone()) {
            continue;
        }
        symbols.push(SymbolRecord {
            id: Suri::for_symbol(path, &binding.local)?.to_string(),
            file_id: 0,
            name: binding.local.clone(),
            kind: SymbolKind::Alias,
            logical_path: Some(binding.local.clone()),
            canonical_fqn: format!("{}.{}", fqn, binding.local),
            alias_target_fqn: Some(binding.target),
            alias_target_id: None,
            location: binding.location,
            signature_hash: None,
            signature_text: None,
            docstring_hash: None,
            docstring_content: None,
        });
    }

    let mut visitor = ReferenceVisitor {
        source,
        imports,
        scopes: vec![Scope {
            kind: ScopeKind::Module,
            names: module_scope(root, source, &fqn, &imports),
        }],
        references: Vec::new(),
    };
    visitor.visit(root);

    Ok(FileAnalysis {
        symbols,
        references: visitor.references,
    })
}

fn fallback_module_name(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.strip_suffix(".py").unwrap_or(file).to_string()
}

struct DefinitionSpec<'a> {
    fragment: String,
    name: &'a str,
    kind: SymbolKind,
    location: Location,
    canonical: Option<String>,
    signature: Option<String>,
    docstring: Option<&'a str>,
}

fn definition_symbols(path: &str, fqn: &str, module: &ModuleDef) -> Result<Vec<SymbolRecord>> {
    let mut specs: Vec<DefinitionSpec> = Vec::new();

    for attr in &module.attributes {
        specs.push(DefinitionSpec {
            fragment: attr.name.clone(),
            name: &attr.name,
            kind: SymbolKind::Variable,
            location: attr.location,
            canonical: Some(attribute_canonical(attr)),
            signature: Some(attribute_signature_text(attr)),
            docstring: attr.docstring.as_deref(),
        });
    }
    for func in &module.functions {
        specs.push(DefinitionSpec {
            fragment: func.name.clone(),
            name: &func.name,
            kind: SymbolKind::Function,
            location: func.location,
            canonical: Some(function_canonical(func)),
            signature: Some(function_signature_text(func)),
            docstring: func.docstring.as_deref(),
        });
    }
    for class in &module.classes {
        specs.push(DefinitionSpec {
            fragment: class.name.clone(),
            name: &class.name,
            kind: SymbolKind::Class,
            location: class.location,
            canonical: Some(class_canonical(class)),
            signature: Some(class_signature_text(class)),
            docstring: class.docstring.as_deref(),
        });
        for attr in &class.attributes {
            specs.push(DefinitionSpec {
                fragment: format!("{}.{}", class.name, attr.name),
                name: &attr.name,
                kind: SymbolKind::Variable,
                location: attr.location,
                canonical: Some(attribute_canonical(attr)),
                signature: Some(attribute_signature_text(attr)),
                docstring: attr.docstring.as_deref(),
            });
        }
        for method in &class.methods {
            specs.push(DefinitionSpec {
                fragment: format!("{}.{}", class.name, method.name),
                name: &method.name,
                kind: SymbolKind::Method,
                location: method.location,
                canonical: Some(function_canonical(method)),
                signature: Some(function_signature_text(method)),
                docstring: method.docstring.as_deref(),
            });
        }
    }

    let module_name = fqn.rsplit('.').next().unwrap_or(fqn);
    let mut symbols = vec![SymbolRecord {
        id: Suri::for_file(path)?.to_string(),
        file_id: 0,
        name: module_name.to_string(),
        kind: SymbolKind::Module,
        logical_path: None,
        canonical_fqn: fqn.to_string(),
        alias_target_fqn: None,
        alias_target_id: None,
        location: Location::new(1, 0, 1, 0),
        signature_hash: None,
        signature_text: None,
        docstring_hash: module.docstring.as_deref().map(sha256_hex),
        docstring_content: module.docstring.clone(),
    }];

    let mut seen: HashSet<String> = HashSet::new();
    for spec in specs {
        // Redefinitions keep the first occurrence so SURIs stay unique
        if !seen.insert(spec.fragment.clone()) {
            continue;
        }
        symbols.push(SymbolRecord {
            id: Suri::for_symbol(path, &spec.fragment)?.to_string(),
            file_id: 0,
            name: spec.name.to_string(),
            kind: spec.kind,
            canonical_fqn: format!("{}.{}", fqn, spec.fragment),
            logical_path: Some(spec.fragment),
            alias_target_fqn: None,
            alias_target_id: None,
            location: spec.location,
            signature_hash: spec.canonical.as_deref().map(sha256_hex),
            signature_text: spec.signature,
            docstring_hash: spec.docstring.map(sha256_hex),
            docstring_content: spec.docstring.map(str::to_string),
        });
    }

    Ok(symbols)
}

/// A name bound by an import
struct ImportBinding {
    local: String,
    target: String,
    location: Location,
}

/// Resolves import module paths against the importing module
#[derive(Clone, Copy)]
struct ImportResolver<'a> {
    module_fqn: &'a str,
    is_package: bool,
}

impl ImportResolver<'_> {
    /// Absolute module named by the `module_name` of a `from` import
    fn from_module(&self, node: Node, source: &str) -> Option<String> {
        match node.kind() {
            "relative_import" => {
                let (dots, rest) = relative_import_parts(node, source);
                resolve_relative(self.module_fqn, self.is_package, dots, rest.as_deref())
            }
            _ => Some(dotted(node, source)),
        }
    }

    /// Bindings and reference sites of one import statement
    fn bindings(&self, stmt: Node, source: &str) -> Vec<ImportBinding> {
        let mut out = Vec::new();
        match stmt.kind() {
            "import_statement" => {
                let mut cursor = stmt.walk();
                for name in stmt.children_by_field_name("name", &mut cursor) {
                    match name.kind() {
                        "dotted_name" => {
                            let full = dotted(name, source);
                            let head = full.split('.').next().unwrap_or(&full).to_string();
                            let location = name
                                .named_child(0)
                                .map(location_of)
                                .unwrap_or_else(|| location_of(name));
                            out.push(ImportBinding {
                                local: head.clone(),
                                target: head,
                                location,
                            });
                        }
                        "aliased_import" => {
                            if let (Some(target), Some(alias)) = (
                                name.child_by_field_name("name"),
                                name.child_by_field_name("alias"),
                            ) {
                                out.push(ImportBinding {
                                    local: node_text(alias, source).to_string(),
                                    target: dotted(target, source),
                                    location: location_of(alias),
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            "import_from_statement" => {
                let Some(module) = stmt
                    .child_by_field_name("module_name")
                    .and_then(|m| self.from_module(m, source))
                else {
                    return out;
                };
                let mut cursor = stmt.walk();
                for name in stmt.children_by_field_name("name", &mut cursor) {
                    let (name_node, local_node) = match name.kind() {
                        "aliased_import" => match (
                            name.child_by_field_name("name"),
                            name.child_by_field_name("alias"),
                        ) {
                            (Some(n), Some(a)) => (n, a),
                            _ => continue,
                        },
                        _ => (name, name),
                    };
                    out.push(ImportBinding {
                        local: node_text(local_node, source).to_string(),
                        target: format!("{}.{}", module, dotted(name_node, source)),
                        location: location_of(local_node),
                    });
                }
            }
            _ => {}
        }
        out
    }
}

/// Leading dot count and trailing module path of a `relative_import` node
pub(crate) fn relative_import_parts(node: Node, source: &str) -> (usize, Option<String>) {
    let mut dots = 0;
    let mut rest = None;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_prefix" => dots = node_text(child, source).trim().len(),
            "dotted_name" => rest = Some(dotted(child, source)),
            _ => {}
        }
    }
    (dots, rest)
}

/// Resolve `from ..x import y` style module paths
pub(crate) fn resolve_relative(
    module_fqn: &str,
    is_package: bool,
    dots: usize,
    rest: Option<&str>,
) -> Option<String> {
    let mut parts: Vec<&str> = module_fqn.split('.').filter(|p| !p.is_empty()).collect();
    if !is_package {
        parts.pop();
    }
    for _ in 1..dots {
        parts.pop()?;
    }
    if let Some(rest) = rest {
        parts.extend(rest.split('.'));
    }
    (!parts.is_empty()).then(|| parts.join("."))
}

fn dotted(node: Node, source: &str) -> String {
    node_text(node, source)
        .split('.')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(".")
}

fn is_import(node: Node) -> bool {
    matches!(node.kind(), "import_statement" | "import_from_statement")
}

fn is_scope_boundary(node: Node) -> bool {
    matches!(
        node.kind(),
        "function_definition" | "class_definition" | "lambda"
    )
}

/// Imports at module scope, including those nested in `if`/`try` blocks
fn module_import_bindings(root: Node, source: &str, imports: &ImportResolver) -> Vec<ImportBinding> {
    let mut out = Vec::new();
    collect_until_scope(root, &mut |node| {
        if is_import(node) {
            out.extend(imports.bindings(node, source));
        }
    });
    out
}

/// Visit `node`'s descendants without entering nested scopes
fn collect_until_scope<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children {
        f(child);
        if !is_scope_boundary(child) && !is_import(child) {
            collect_until_scope(child, f);
        }
    }
}

/// Identifiers a target expression binds (`a`, `a, b`, `[a, *b]`)
fn target_names(node: Node, source: &str, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" => out.push(node_text(node, source).to_string()),
        "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern"
        | "as_pattern_target" | "parenthesized_expression" => {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            for child in children {
                target_names(child, source, out);
            }
        }
        _ => {}
    }
}

/// Names a node binds in the scope it belongs to
fn bound_names(node: Node, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    match node.kind() {
        "assignment" | "augmented_assignment" | "for_statement" => {
            if let Some(left) = node.child_by_field_name("left") {
                target_names(left, source, &mut out);
            }
        }
        "named_expression" => {
            if let Some(name) = node.child_by_field_name("name") {
                target_names(name, source, &mut out);
            }
        }
        "as_pattern" => {
            if let Some(alias) = node.child_by_field_name("alias") {
                target_names(alias, source, &mut out);
            }
        }
        "function_definition" | "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.push(node_text(name, source).to_string());
            }
        }
        _ => {}
    }
    out
}

fn module_scope(
    root: Node,
    source: &str,
    fqn: &str,
    imports: &ImportResolver,
) -> HashMap<String, Option<String>> {
    let mut names: HashMap<String, Option<String>> = HashMap::new();
    collect_until_scope(root, &mut |node| {
        if is_import(node) {
            for binding in imports.bindings(node, source) {
                names.insert(binding.local, Some(binding.target));
            }
            return;
        }
        let definition = matches!(node.kind(), "function_definition" | "class_definition");
        for name in bound_names(node, source) {
            let target = Some(format!("{}.{}", fqn, name));
            if definition {
                names.insert(name, target);
            } else {
                names.entry(name).or_insert(target);
            }
        }
    });
    names
}

/// Locals of a function or class body; imports inside bind their targets
fn local_scope(body: Node, source: &str, imports: &ImportResolver) -> HashMap<String, Option<String>> {
    let mut names: HashMap<String, Option<String>> = HashMap::new();
    let mut globals: HashSet<String> = HashSet::new();
    collect_until_scope(body, &mut |node| {
        if is_import(node) {
            for binding in imports.bindings(node, source) {
                names.insert(binding.local, Some(binding.target));
            }
            return;
        }
        if matches!(node.kind(), "global_statement" | "nonlocal_statement") {
            let mut cursor = node.walk();
            for ident in node.named_children(&mut cursor) {
                globals.insert(node_text(ident, source).to_string());
            }
            return;
        }
        for name in bound_names(node, source) {
            names.entry(name).or_insert(None);
        }
    });
    names.retain(|name, _| !globals.contains(name));
    names
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Class,
    Function,
}

struct Scope {
    kind: ScopeKind,
    /// `Some(fqn)` for names bound to a known target, `None` for plain locals
    names: HashMap<String, Option<String>>,
}

struct ReferenceVisitor<'s> {
    source: &'s str,
    imports: ImportResolver<'s>,
    scopes: Vec<Scope>,
    references: Vec<ReferenceRecord>,
}

impl<'s> ReferenceVisitor<'s> {
    fn resolve(&self, name: &str) -> Option<String> {
        let innermost = self.scopes.len().saturating_sub(1);
        for (idx, scope) in self.scopes.iter().enumerate().rev() {
            // Class bodies are not visible from nested functions
            if scope.kind == ScopeKind::Class && idx != innermost {
                continue;
            }
            if let Some(binding) = scope.names.get(name) {
                return binding.clone();
            }
        }
        None
    }

    fn push_ref(&mut self, target: String, kind: ReferenceKind, node: Node) {
        self.references
            .push(ReferenceRecord::to_fqn(target, kind, location_of(node)));
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit_field(&mut self, node: Node, field: &str) {
        if let Some(child) = node.child_by_field_name(field) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "import_statement" => self.visit_import(node),
            "import_from_statement" => self.visit_from_import(node),
            "future_import_statement" | "global_statement" | "nonlocal_statement" | "comment"
            | "string_content" | "escape_sequence" => {}
            "function_definition" => self.visit_function(node),
            "class_definition" => self.visit_class(node),
            "lambda" => {
                let mut names = HashMap::new();
                if let Some(params) = node.child_by_field_name("parameters") {
                    for name in parameter_names(params, self.source) {
                        names.insert(name, None);
                    }
                }
                self.scopes.push(Scope {
                    kind: ScopeKind::Function,
                    names,
                });
                self.visit_field(node, "body");
                self.scopes.pop();
            }
            "assignment" | "augmented_assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    if !is_binding_target(left) {
                        self.visit(left);
                    }
                    if self.scopes.len() == 1 && node_text(left, self.source) == "__all__" {
                        if let Some(right) = node.child_by_field_name("right") {
                            self.visit_exports(right);
                        }
                    }
                }
                self.visit_field(node, "type");
                self.visit_field(node, "right");
            }
            "for_statement" | "for_in_clause" => {
                if let Some(left) = node.child_by_field_name("left") {
                    if !is_binding_target(left) {
                        self.visit(left);
                    }
                }
                self.visit_field(node, "right");
                self.visit_field(node, "body");
                self.visit_field(node, "alternative");
            }
            "named_expression" => self.visit_field(node, "value"),
            "keyword_argument" => self.visit_field(node, "value"),
            "as_pattern" => {
                let mut cursor = node.walk();
                let children: Vec<Node> = node.named_children(&mut cursor).collect();
                for child in children {
                    if child.kind() != "as_pattern_target" {
                        self.visit(child);
                    }
                }
            }
            "attribute" => self.visit_attribute(node),
            "identifier" => {
                let name = node_text(node, self.source);
                if let Some(target) = self.resolve(name) {
                    self.push_ref(target, ReferenceKind::Usage, node);
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_attribute(&mut self, node: Node) {
        match chain_segments(node, self.source) {
            Some(segments) => {
                let Some(head) = self.resolve(&segments[0]) else {
                    return;
                };
                let target = std::iter::once(head)
                    .chain(segments[1..].iter().cloned())
                    .collect::<Vec<_>>()
                    .join(".");
                self.push_ref(target, ReferenceKind::Usage, node);
            }
            None => self.visit_field(node, "object"),
        }
    }

    /// Names listed in `__all__` refer to the module bindings they spell
    fn visit_exports(&mut self, list: Node) {
        if !matches!(list.kind(), "list" | "tuple") {
            return;
        }
        let mut cursor = list.walk();
        let items: Vec<Node> = list.named_children(&mut cursor).collect();
        for item in items {
            let Some(content) = plain_string_content(item) else {
                continue;
            };
            if let Some(target) = self.resolve(node_text(content, self.source)) {
                self.push_ref(target, ReferenceKind::Usage, content);
            }
        }
    }

    fn visit_import(&mut self, stmt: Node) {
        let mut cursor = stmt.walk();
        let names: Vec<Node> = stmt.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let module = match name.kind() {
                "aliased_import" => name.child_by_field_name("name"),
                _ => Some(name),
            };
            if let Some(module) = module {
                let target = dotted(module, self.source);
                self.push_ref(target, ReferenceKind::ImportModule, module);
            }
        }
    }

    fn visit_from_import(&mut self, stmt: Node) {
        let Some(module_node) = stmt.child_by_field_name("module_name") else {
            return;
        };
        let Some(module) = self.imports.from_module(module_node, self.source) else {
            return;
        };
        self.push_ref(module.clone(), ReferenceKind::ImportModule, module_node);

        let mut cursor = stmt.walk();
        let names: Vec<Node> = stmt.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let name_node = match name.kind() {
                "aliased_import" => name.child_by_field_name("name"),
                _ => Some(name),
            };
            if let Some(name_node) = name_node {
                let target = format!("{}.{}", module, dotted(name_node, self.source));
                self.push_ref(target, ReferenceKind::ImportName, name_node);
            }
        }
    }

    fn visit_function(&mut self, node: Node) {
        let mut names: HashMap<String, Option<String>> = HashMap::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            // Annotations and defaults are evaluated in the enclosing scope
            let mut cursor = params.walk();
            let children: Vec<Node> = params.named_children(&mut cursor).collect();
            for param in children {
                self.visit_field(param, "type");
                self.visit_field(param, "value");
            }
            for name in parameter_names(params, self.source) {
                names.insert(name, None);
            }
        }
        self.visit_field(node, "return_type");

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        for (name, binding) in local_scope(body, self.source, &self.imports) {
            names.insert(name, binding);
        }
        self.scopes.push(Scope {
            kind: ScopeKind::Function,
            names,
        });
        self.visit(body);
        self.scopes.pop();
    }

    fn visit_class(&mut self, node: Node) {
        self.visit_field(node, "superclasses");
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let names = local_scope(body, self.source, &self.imports);
        self.scopes.push(Scope {
            kind: ScopeKind::Class,
            names,
        });
        self.visit(body);
        self.scopes.pop();
    }
}

/// The content node of a string literal without interpolation or implicit concatenation
fn plain_string_content(node: Node) -> Option<Node> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    let parts: Vec<Node> = node
        .named_children(&mut cursor)
        .filter(|c| !matches!(c.kind(), "string_start" | "string_end"))
        .collect();
    match parts.as_slice() {
        [content] if content.kind() == "string_content" => Some(*content),
        _ => None,
    }
}

fn is_binding_target(node: Node) -> bool {
    matches!(
        node.kind(),
        "identifier" | "pattern_list" | "tuple_pattern" | "list_pattern"
    )
}

fn parameter_names(params: Node, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let name = match param.kind() {
            "identifier" => Some(param),
            "default_parameter" | "typed_default_parameter" => param.child_by_field_name("name"),
            "typed_parameter" => param.named_child(0).map(|inner| match inner.kind() {
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    inner.named_child(0).unwrap_or(inner)
                }
                _ => inner,
            }),
            "list_splat_pattern" | "dictionary_splat_pattern" => param.named_child(0),
            _ => None,
        };
        if let Some(name) = name {
            out.push(node_text(name, source).to_string());
        }
    }
    out
}

/// Segments of a pure `a.b.c` chain; `None` when the chain contains calls or subscripts
fn chain_segments(node: Node, source: &str) -> Option<Vec<String>> {
    match node.kind() {
        "identifier" => Some(vec![node_text(node, source).to_string()]),
        "attribute" => {
            let mut segments = chain_segments(node.child_by_field_name("object")?, source)?;
            segments.push(node_text(node.child_by_field_name("attribute")?, source).to_string());
            Some(segments)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs_to<'a>(analysis: &'a FileAnalysis, target: &str) -> Vec<&'a ReferenceRecord> {
        analysis
            .references
            .iter()
            .filter(|r| r.target_fqn.as_deref() == Some(target))
            .collect()
    }

    #[test]
    fn test_definitions_and_aliases() {
        let source = "from .bus import MessageBus\nimport os.path as osp\n\nclass Bus:\n    def info(self):\n        pass\n";
        let analysis = analyze("pkg/__init__.py", Some("pkg"), source).unwrap();

        let ids: Vec<_> = analysis.symbols.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "py://pkg/__init__.py",
                "py://pkg/__init__.py#Bus",
                "py://pkg/__init__.py#Bus.info",
                "py://pkg/__init__.py#MessageBus",
                "py://pkg/__init__.py#osp",
            ]
        );

        let alias = &analysis.symbols[3];
        assert_eq!(alias.kind, SymbolKind::Alias);
        assert_eq!(alias.canonical_fqn, "pkg.MessageBus");
        assert_eq!(alias.alias_target_fqn.as_deref(), Some("pkg.bus.MessageBus"));
        assert_eq!(analysis.symbols[4].alias_target_fqn.as_deref(), Some("os.path"));

        let method = &analysis.symbols[2];
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.canonical_fqn, "pkg.Bus.info");
        assert_eq!(method.location, Location::new(5, 8, 5, 12));
    }

    #[test]
    fn test_import_references() {
        let source = "from .bus import MessageBus\n";
        let analysis = analyze("pkg/__init__.py", Some("pkg"), source).unwrap();

        let module_refs = refs_to(&analysis, "pkg.bus");
        assert_eq!(module_refs.len(), 1);
        assert_eq!(module_refs[0].kind, ReferenceKind::ImportModule);
        assert_eq!(module_refs[0].location, Location::new(1, 5, 1, 9));

        let name_refs = refs_to(&analysis, "pkg.bus.MessageBus");
        assert_eq!(name_refs.len(), 1);
        assert_eq!(name_refs[0].kind, ReferenceKind::ImportName);
        assert_eq!(name_refs[0].location, Location::new(1, 17, 1, 27));
    }

    #[test]
    fn test_usages_respect_shadowing() {
        let source = "\
from pkg.bus import MessageBus
import pkg.bus

def make(MessageBus=None):
    return MessageBus

def build():
    bus = MessageBus()
    return pkg.bus.MessageBus.info
";
        let analysis = analyze("app.py", Some("app"), source).unwrap();
        let usages: Vec<_> = analysis
            .references
            .iter()
            .filter(|r| r.kind == ReferenceKind::Usage)
            .map(|r| (r.target_fqn.clone().unwrap(), r.location.lineno))
            .collect();

        assert!(usages.contains(&("pkg.bus.MessageBus".to_string(), 8)));
        assert!(usages.contains(&("pkg.bus.MessageBus.info".to_string(), 9)));
        // the parameter shadows the import inside make()
        assert!(!usages.iter().any(|(_, line)| *line == 5));
    }

    #[test]
    fn test_all_entries_reference_bindings() {
        let source = "from .bus import MessageBus\n\ndef helper():\n    pass\n\n__all__ = [\"MessageBus\", \"helper\", \"missing\"]\n";
        let analysis = analyze("pkg/__init__.py", Some("pkg"), source).unwrap();

        let bus: Vec<_> = refs_to(&analysis, "pkg.bus.MessageBus")
            .into_iter()
            .filter(|r| r.kind == ReferenceKind::Usage)
            .collect();
        assert_eq!(bus.len(), 1);
        assert_eq!(bus[0].location, Location::new(6, 12, 6, 22));

        assert_eq!(refs_to(&analysis, "pkg.helper").len(), 1);
        assert!(!analysis
            .references
            .iter()
            .any(|r| r.target_fqn.as_deref().is_some_and(|t| t.ends_with("missing"))));
    }

    #[test]
    fn test_module_level_definitions_are_bound() {
        let source = "class Bus:\n    pass\n\ndef make():\n    return Bus()\n";
        let analysis = analyze("pkg/bus.py", Some("pkg.bus"), source).unwrap();
        let refs = refs_to(&analysis, "pkg.bus.Bus");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].location.lineno, 5);
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative("pkg.sub.mod", false, 1, Some("bus")).as_deref(),
            Some("pkg.sub.bus")
        );
        assert_eq!(
            resolve_relative("pkg.sub.mod", false, 2, None).as_deref(),
            Some("pkg")
        );
        assert_eq!(
            resolve_relative("pkg", true, 1, Some("bus")).as_deref(),
            Some("pkg.bus")
        );
        assert_eq!(resolve_relative("mod", false, 2, None), None);
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        assert!(analyze("bad.py", Some("bad"), "def (:\n").is_err());
    }
}
