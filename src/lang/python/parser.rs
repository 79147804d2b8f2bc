//! Python source to module IR

use super::{
    block_docstring, decorators, docstring_value, location_of, next_statement, node_text,
    normalize_expr, parse_tree, statements, string_literal_value, unwrap_decorated,
};
use crate::error::Result;
use crate::lang::ir::{Argument, ArgumentKind, Attribute, ClassDef, FunctionDef, ModuleDef};
use tree_sitter::Node;

/// Parse a Python file into the module IR
pub fn parse_module(path: &str, source: &str) -> Result<ModuleDef> {
    let tree = parse_tree(path, source)?;
    Ok(module_from_tree(path, tree.root_node(), source))
}

/// Build the module IR from an already parsed tree
pub(crate) fn module_from_tree(path: &str, root: Node, source: &str) -> ModuleDef {
    let mut module = ModuleDef {
        file_path: path.to_string(),
        docstring: block_docstring(root).and_then(|s| docstring_value(s, source)),
        ..ModuleDef::default()
    };

    for stmt in statements(root) {
        match stmt.kind() {
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                module.imports.push(node_text(stmt, source).to_string());
            }
            "expression_statement" => {
                if let Some(names) = parse_dunder_all(stmt, source) {
                    module.dunder_all = Some(names);
                } else if let Some(attr) = parse_attribute(stmt, source) {
                    module.attributes.push(attr);
                }
            }
            _ => {
                let Some((def, wrapper)) = unwrap_decorated(stmt) else {
                    continue;
                };
                match def.kind() {
                    "function_definition" => {
                        if let Some(func) = parse_function(def, wrapper, source) {
                            module.functions.push(func);
                        }
                    }
                    "class_definition" => {
                        if let Some(class) = parse_class(def, wrapper, source) {
                            module.classes.push(class);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    module
}

pub(crate) fn parse_function(node: Node, wrapper: Option<Node>, source: &str) -> Option<FunctionDef> {
    let name_node = node.child_by_field_name("name")?;
    let decorators = decorators(wrapper, source);

    let is_async = node.child(0).map_or(false, |c| c.kind() == "async");
    let is_static = decorators.iter().any(|d| d == "staticmethod");
    let is_class = decorators.iter().any(|d| d == "classmethod");

    let args = node
        .child_by_field_name("parameters")
        .map(|params| parse_parameters(params, source))
        .unwrap_or_default();

    let return_annotation = node
        .child_by_field_name("return_type")
        .map(|n| normalize_expr(node_text(n, source)));

    let docstring = node
        .child_by_field_name("body")
        .and_then(block_docstring)
        .and_then(|s| docstring_value(s, source));

    Some(FunctionDef {
        name: node_text(name_node, source).to_string(),
        args,
        return_annotation,
        decorators,
        docstring,
        is_async,
        is_static,
        is_class,
        location: location_of(name_node),
    })
}

fn parse_parameters(params: Node, source: &str) -> Vec<Argument> {
    let mut args: Vec<Argument> = Vec::new();
    let mut keyword_only = false;

    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let positional_kind = if keyword_only {
            ArgumentKind::KeywordOnly
        } else {
            ArgumentKind::PositionalOrKeyword
        };

        match param.kind() {
            "identifier" => args.push(Argument {
                name: node_text(param, source).to_string(),
                kind: positional_kind,
                annotation: None,
                default: None,
            }),
            "typed_parameter" => {
                let annotation = param
                    .child_by_field_name("type")
                    .map(|n| normalize_expr(node_text(n, source)));
                let Some(inner) = param.named_child(0) else {
                    continue;
                };
                let (name, kind) = match inner.kind() {
                    "list_splat_pattern" => {
                        keyword_only = true;
                        (splat_name(inner, source), ArgumentKind::VarPositional)
                    }
                    "dictionary_splat_pattern" => {
                        (splat_name(inner, source), ArgumentKind::VarKeyword)
                    }
                    _ => (node_text(inner, source).to_string(), positional_kind),
                };
                args.push(Argument {
                    name,
                    kind,
                    annotation,
                    default: None,
                });
            }
            "default_parameter" | "typed_default_parameter" => {
                let Some(name) = param.child_by_field_name("name") else {
                    continue;
                };
                args.push(Argument {
                    name: node_text(name, source).to_string(),
                    kind: positional_kind,
                    annotation: param
                        .child_by_field_name("type")
                        .map(|n| normalize_expr(node_text(n, source))),
                    default: param
                        .child_by_field_name("value")
                        .map(|n| normalize_expr(node_text(n, source))),
                });
            }
            "list_splat_pattern" => {
                keyword_only = true;
                args.push(Argument {
                    name: splat_name(param, source),
                    kind: ArgumentKind::VarPositional,
                    annotation: None,
                    default: None,
                });
            }
            "dictionary_splat_pattern" => args.push(Argument {
                name: splat_name(param, source),
                kind: ArgumentKind::VarKeyword,
                annotation: None,
                default: None,
            }),
            "keyword_separator" => keyword_only = true,
            "positional_separator" => {
                for arg in args.iter_mut() {
                    if arg.kind == ArgumentKind::PositionalOrKeyword {
                        arg.kind = ArgumentKind::PositionalOnly;
                    }
                }
            }
            _ => {}
        }
    }

    args
}

fn splat_name(node: Node, source: &str) -> String {
    node.named_child(0)
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_else(|| {
            node_text(node, source)
                .trim_start_matches('*')
                .to_string()
        })
}

pub(crate) fn parse_class(node: Node, wrapper: Option<Node>, source: &str) -> Option<ClassDef> {
    let name_node = node.child_by_field_name("name")?;

    let bases = node
        .child_by_field_name("superclasses")
        .map(|list| {
            let mut cursor = list.walk();
            list.named_children(&mut cursor)
                .filter(|n| n.kind() != "comment")
                .map(|n| normalize_expr(node_text(n, source)))
                .collect()
        })
        .unwrap_or_default();

    let mut class = ClassDef {
        name: node_text(name_node, source).to_string(),
        bases,
        decorators: decorators(wrapper, source),
        docstring: None,
        methods: Vec::new(),
        attributes: Vec::new(),
        location: location_of(name_node),
    };

    let Some(body) = node.child_by_field_name("body") else {
        return Some(class);
    };
    class.docstring = block_docstring(body).and_then(|s| docstring_value(s, source));

    for stmt in statements(body) {
        if stmt.kind() == "expression_statement" {
            if let Some(attr) = parse_attribute(stmt, source) {
                class.attributes.push(attr);
            }
            continue;
        }
        if let Some((def, wrapper)) = unwrap_decorated(stmt) {
            if def.kind() == "function_definition" {
                if let Some(method) = parse_function(def, wrapper, source) {
                    class.methods.push(method);
                }
            }
        }
    }

    Some(class)
}

/// The `assignment` node of a simple `name = value` / `name: T` statement
pub(crate) fn simple_assignment(stmt: Node) -> Option<(Node, Node)> {
    if stmt.kind() != "expression_statement" || stmt.named_child_count() != 1 {
        return None;
    }
    let assignment = stmt.named_child(0)?;
    if assignment.kind() != "assignment" {
        return None;
    }
    let left = assignment.child_by_field_name("left")?;
    (left.kind() == "identifier").then_some((assignment, left))
}

fn parse_attribute(stmt: Node, source: &str) -> Option<Attribute> {
    let (assignment, left) = simple_assignment(stmt)?;
    let name = node_text(left, source);
    if name == "__all__" {
        return None;
    }

    let docstring = next_statement(stmt).and_then(|next| docstring_value(next, source));

    Some(Attribute {
        name: name.to_string(),
        annotation: assignment
            .child_by_field_name("type")
            .map(|n| normalize_expr(node_text(n, source))),
        value: assignment
            .child_by_field_name("right")
            .map(|n| normalize_expr(node_text(n, source))),
        docstring,
        location: location_of(left),
    })
}

fn parse_dunder_all(stmt: Node, source: &str) -> Option<Vec<String>> {
    let (assignment, left) = simple_assignment(stmt)?;
    if node_text(left, source) != "__all__" {
        return None;
    }
    let right = assignment.child_by_field_name("right")?;
    if !matches!(right.kind(), "list" | "tuple") {
        return None;
    }

    let mut cursor = right.walk();
    let names = right
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "string")
        .filter_map(|n| string_literal_value(node_text(n, source)))
        .collect();
    Some(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#""""Module doc."""
import os
from .bus import MessageBus as MB

__all__ = ["func", "Bus"]

TIMEOUT: int = 30
"""Seconds to wait."""


@decorator
async def func(a: int, b: str = "x", *args, key, **kwargs) -> bool:
    """Do it."""
    return True


def pos(a, /, b, *, c=1):
    pass


class Bus(Base, metaclass=Meta):
    """A bus."""

    name: str

    def send(self, msg) -> None:
        """Send."""

    @staticmethod
    def make() -> "Bus":
        ...

    @classmethod
    def build(cls):
        ...
"#;

    #[test]
    fn test_module_level() {
        let module = parse_module("pkg/m.py", SOURCE).unwrap();
        assert_eq!(module.docstring.as_deref(), Some("Module doc."));
        assert_eq!(module.imports.len(), 2);
        assert_eq!(
            module.dunder_all,
            Some(vec!["func".to_string(), "Bus".to_string()])
        );
        assert_eq!(module.attributes.len(), 1);
        let timeout = &module.attributes[0];
        assert_eq!(timeout.name, "TIMEOUT");
        assert_eq!(timeout.annotation.as_deref(), Some("int"));
        assert_eq!(timeout.value.as_deref(), Some("30"));
        assert_eq!(timeout.docstring.as_deref(), Some("Seconds to wait."));
    }

    #[test]
    fn test_function_signature() {
        let module = parse_module("pkg/m.py", SOURCE).unwrap();
        let func = &module.functions[0];
        assert_eq!(func.name, "func");
        assert!(func.is_async);
        assert_eq!(func.decorators, vec!["decorator"]);
        assert_eq!(func.docstring.as_deref(), Some("Do it."));
        assert_eq!(func.return_annotation.as_deref(), Some("bool"));

        let kinds: Vec<_> = func.args.iter().map(|a| (a.name.as_str(), a.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("a", ArgumentKind::PositionalOrKeyword),
                ("b", ArgumentKind::PositionalOrKeyword),
                ("args", ArgumentKind::VarPositional),
                ("key", ArgumentKind::KeywordOnly),
                ("kwargs", ArgumentKind::VarKeyword),
            ]
        );
        assert_eq!(func.args[0].annotation.as_deref(), Some("int"));
        assert_eq!(func.args[1].default.as_deref(), Some("\"x\""));
        assert_eq!(func.location.lineno, 12);
    }

    #[test]
    fn test_positional_only_and_keyword_only() {
        let module = parse_module("pkg/m.py", SOURCE).unwrap();
        let pos = &module.functions[1];
        let kinds: Vec<_> = pos.args.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ArgumentKind::PositionalOnly,
                ArgumentKind::PositionalOrKeyword,
                ArgumentKind::KeywordOnly,
            ]
        );
        assert!(pos.docstring.is_none());
    }

    #[test]
    fn test_class_members() {
        let module = parse_module("pkg/m.py", SOURCE).unwrap();
        let class = &module.classes[0];
        assert_eq!(class.name, "Bus");
        assert_eq!(class.bases, vec!["Base", "metaclass=Meta"]);
        assert_eq!(class.docstring.as_deref(), Some("A bus."));
        assert_eq!(class.attributes.len(), 1);
        assert_eq!(class.attributes[0].name, "name");
        assert_eq!(class.attributes[0].value, None);

        let names: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["send", "make", "build"]);
        assert!(class.methods[1].is_static);
        assert!(class.methods[2].is_class);
        assert_eq!(class.methods[0].docstring.as_deref(), Some("Send."));

        assert_eq!(
            module.fragments(),
            vec![
                "__doc__",
                "TIMEOUT",
                "func",
                "pos",
                "Bus",
                "Bus.name",
                "Bus.send",
                "Bus.make",
                "Bus.build"
            ]
        );
    }

    #[test]
    fn test_syntax_error_is_reported() {
        assert!(parse_module("bad.py", "class :\n").is_err());
    }
}
