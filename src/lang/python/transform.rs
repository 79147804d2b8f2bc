//! Doc string strip and inject transforms
//!
//! Both transforms work on positions from the syntax tree and splice the
//! original text, so formatting and comments outside the touched doc strings
//! are preserved byte for byte.

use super::parser::simple_assignment;
use super::{
    apply_text_edits, block_docstring, docstring_literal, line_end, line_start, next_statement,
    parse_tree, statements, unwrap_decorated, TextEdit,
};
use crate::error::Result;
use crate::suri::MODULE_DOC_FRAGMENT;
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::Node;

const INDENT: &str = "    ";

/// Where a missing doc string would be inserted
#[derive(Clone, Copy)]
enum InsertPoint<'t> {
    ModuleTop,
    /// First statement of a definition body
    Body { def: Node<'t>, body: Node<'t> },
    /// Line after an assignment
    After(Node<'t>),
}

struct DocTarget<'t> {
    fragment: String,
    doc_stmt: Option<Node<'t>>,
    /// Block the doc statement lives in, when it is the block's doc string
    block: Option<Node<'t>>,
    insert: InsertPoint<'t>,
}

fn collect_targets<'t>(root: Node<'t>, source: &str) -> Vec<DocTarget<'t>> {
    let mut targets = vec![DocTarget {
        fragment: MODULE_DOC_FRAGMENT.to_string(),
        doc_stmt: block_docstring(root),
        block: Some(root),
        insert: InsertPoint::ModuleTop,
    }];
    collect_block(root, "", source, &mut targets, true);
    targets
}

fn collect_block<'t>(
    block: Node<'t>,
    prefix: &str,
    source: &str,
    targets: &mut Vec<DocTarget<'t>>,
    descend_classes: bool,
) {
    for stmt in statements(block) {
        if let Some((_, left)) = simple_assignment(stmt) {
            let name = super::node_text(left, source);
            if name == "__all__" {
                continue;
            }
            targets.push(DocTarget {
                fragment: format!("{}{}", prefix, name),
                doc_stmt: next_statement(stmt).filter(|n| docstring_literal(*n).is_some()),
                block: None,
                insert: InsertPoint::After(stmt),
            });
            continue;
        }

        let Some((def, _)) = unwrap_decorated(stmt) else {
            continue;
        };
        let (Some(name), Some(body)) = (def.child_by_field_name("name"), def.child_by_field_name("body"))
        else {
            continue;
        };
        let fragment = format!("{}{}", prefix, super::node_text(name, source));
        targets.push(DocTarget {
            fragment: fragment.clone(),
            doc_stmt: block_docstring(body),
            block: Some(body),
            insert: InsertPoint::Body { def, body },
        });
        if def.kind() == "class_definition" && descend_classes {
            collect_block(body, &format!("{}.", fragment), source, targets, false);
        }
    }
}

/// Remove doc strings; only fragments in `whitelist` when one is given
pub fn strip_docstrings(source: &str, whitelist: Option<&BTreeSet<String>>) -> Result<String> {
    let tree = parse_tree("<strip>", source)?;
    let targets = collect_targets(tree.root_node(), source);

    let mut edits = Vec::new();
    for target in &targets {
        let Some(stmt) = target.doc_stmt else {
            continue;
        };
        if whitelist.map_or(false, |w| !w.contains(&target.fragment)) {
            continue;
        }
        edits.push(removal_edit(source, stmt, target.block));
    }

    Ok(apply_text_edits(source, edits))
}

fn removal_edit(source: &str, stmt: Node, block: Option<Node>) -> TextEdit {
    let only_statement = block.map_or(false, |b| statements(b).len() == 1);
    let needs_pass = only_statement && block.map_or(false, |b| b.kind() == "block");

    if needs_pass {
        return TextEdit {
            start: stmt.start_byte(),
            end: stmt.end_byte(),
            text: "pass".to_string(),
        };
    }

    let start = line_start(source, stmt.start_byte());
    let end = line_end(source, stmt.end_byte());
    let before = &source[start..stmt.start_byte()];
    let after = source[stmt.end_byte()..end].trim();
    if before.trim().is_empty() && (after.is_empty() || after.starts_with('#')) {
        TextEdit {
            start,
            end: (end + 1).min(source.len()),
            text: String::new(),
        }
    } else {
        TextEdit {
            start: stmt.start_byte(),
            end: stmt.end_byte(),
            text: String::new(),
        }
    }
}

/// Replace or insert doc strings for the fragments in `docs`
pub fn inject_docstrings(source: &str, docs: &BTreeMap<String, String>) -> Result<String> {
    let tree = parse_tree("<inject>", source)?;
    let targets = collect_targets(tree.root_node(), source);

    let mut edits = Vec::new();
    for target in &targets {
        let Some(doc) = docs.get(&target.fragment) else {
            continue;
        };

        if let Some(stmt) = target.doc_stmt {
            let Some(literal) = docstring_literal(stmt) else {
                continue;
            };
            let indent = indentation_at(source, stmt.start_byte());
            edits.push(TextEdit {
                start: literal.start_byte(),
                end: literal.end_byte(),
                text: format_docstring(doc, &indent),
            });
            continue;
        }

        edits.push(insertion_edit(source, target.insert, doc));
    }

    Ok(apply_text_edits(source, edits))
}

fn insertion_edit(source: &str, point: InsertPoint, doc: &str) -> TextEdit {
    match point {
        InsertPoint::ModuleTop => {
            let offset = header_comments_end(source);
            let mut text = format_docstring(doc, "");
            text.push('\n');
            if !source[offset..].trim().is_empty() {
                text.push('\n');
            }
            TextEdit {
                start: offset,
                end: offset,
                text,
            }
        }
        InsertPoint::Body { def, body } => {
            let colon = body.prev_sibling().filter(|n| n.kind() == ":");
            let header_row = colon.map_or(def.start_position().row, |c| c.end_position().row);
            if body.start_position().row == header_row {
                let indent = format!("{}{}", indentation_at(source, def.start_byte()), INDENT);
                TextEdit {
                    start: colon.map_or(body.start_byte(), |c| c.end_byte()),
                    end: body.start_byte(),
                    text: format!("\n{}{}\n{}", indent, format_docstring(doc, &indent), indent),
                }
            } else {
                let indent = indentation_at(source, body.start_byte());
                let start = line_start(source, body.start_byte());
                TextEdit {
                    start,
                    end: start,
                    text: format!("{}{}\n", indent, format_docstring(doc, &indent)),
                }
            }
        }
        InsertPoint::After(stmt) => {
            let indent = indentation_at(source, stmt.start_byte());
            let end = line_end(source, stmt.end_byte());
            TextEdit {
                start: end,
                end,
                text: format!("\n{}{}", indent, format_docstring(doc, &indent)),
            }
        }
    }
}

/// Leading whitespace of the line containing `offset`
fn indentation_at(source: &str, offset: usize) -> String {
    let start = line_start(source, offset);
    source[start..offset]
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect()
}

/// End of a leading shebang / encoding comment block
fn header_comments_end(source: &str) -> usize {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#!") || (trimmed.starts_with('#') && trimmed.contains("coding")) {
            offset += line.len();
        } else {
            break;
        }
    }
    offset
}

/// Render doc text as a triple-quoted literal indented for its block
pub fn format_docstring(doc: &str, indent: &str) -> String {
    let mut escaped = doc.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"");
    if escaped.ends_with('"') {
        escaped.pop();
        escaped.push_str("\\\"");
    }

    if !escaped.contains('\n') {
        return format!("\"\"\"{}\"\"\"", escaped);
    }

    let mut out = String::from("\"\"\"");
    for (idx, line) in escaped.lines().enumerate() {
        if idx > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out.push('\n');
    out.push_str(indent);
    out.push_str("\"\"\"");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::python::parser::parse_module;

    const SOURCE: &str = "\"\"\"Module.\"\"\"\n\nLIMIT = 3\n\"\"\"Max tries.\"\"\"\n\n\ndef func(a: int):\n    \"\"\"D.\"\"\"\n\n\nclass Bus:\n    \"\"\"A bus.\"\"\"\n\n    def send(self):\n        \"\"\"Send.\"\"\"\n        return 1\n";

    #[test]
    fn test_strip_all() {
        let out = strip_docstrings(SOURCE, None).unwrap();
        assert_eq!(
            out,
            "\nLIMIT = 3\n\n\ndef func(a: int):\n    pass\n\n\nclass Bus:\n\n    def send(self):\n        return 1\n"
        );
        let module = parse_module("m.py", &out).unwrap();
        assert!(module.docstring.is_none());
        assert!(module.functions[0].docstring.is_none());
    }

    #[test]
    fn test_strip_whitelist() {
        let whitelist: BTreeSet<String> = ["Bus.send".to_string()].into_iter().collect();
        let out = strip_docstrings(SOURCE, Some(&whitelist)).unwrap();
        let module = parse_module("m.py", &out).unwrap();
        assert_eq!(module.docstring.as_deref(), Some("Module."));
        assert_eq!(module.classes[0].docstring.as_deref(), Some("A bus."));
        assert!(module.classes[0].methods[0].docstring.is_none());
    }

    #[test]
    fn test_inject_replaces_and_inserts() {
        let stripped = strip_docstrings(SOURCE, None).unwrap();
        let docs: BTreeMap<String, String> = [
            ("__doc__", "Module."),
            ("LIMIT", "Max tries."),
            ("func", "Line one.\n\nLine two."),
            ("Bus", "A bus."),
            ("Bus.send", "Send."),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let out = inject_docstrings(&stripped, &docs).unwrap();
        let module = parse_module("m.py", &out).unwrap();
        assert_eq!(module.docstring.as_deref(), Some("Module."));
        assert_eq!(module.attributes[0].docstring.as_deref(), Some("Max tries."));
        assert_eq!(
            module.functions[0].docstring.as_deref(),
            Some("Line one.\n\nLine two.")
        );
        assert_eq!(module.classes[0].docstring.as_deref(), Some("A bus."));
        assert_eq!(module.classes[0].methods[0].docstring.as_deref(), Some("Send."));

        let again = inject_docstrings(&out, &docs).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn test_inject_one_line_body() {
        let docs: BTreeMap<String, String> =
            [("f".to_string(), "Doc.".to_string())].into_iter().collect();
        let out = inject_docstrings("def f(): pass\n", &docs).unwrap();
        assert_eq!(out, "def f():\n    \"\"\"Doc.\"\"\"\n    pass\n");
    }

    #[test]
    fn test_format_docstring_escapes() {
        assert_eq!(format_docstring("say \"hi\"", ""), "\"\"\"say \"hi\\\"\"\"\"");
        assert_eq!(
            format_docstring("a\n\nb", "    "),
            "\"\"\"a\n\n    b\n    \"\"\""
        );
        let module = parse_module(
            "m.py",
            &format!("def f():\n    {}\n", format_docstring("C:\\path \"q\"", "    ")),
        )
        .unwrap();
        assert_eq!(module.functions[0].docstring.as_deref(), Some("C:\\path \"q\""));
    }
}
