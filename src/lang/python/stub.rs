//! `.pyi` stub rendering

use super::fingerprint::{class_signature_text, function_signature_text};
use super::transform::format_docstring;
use crate::lang::ir::{Attribute, ClassDef, FunctionDef, ModuleDef};
use crate::suri::MODULE_DOC_FRAGMENT;
use std::collections::BTreeMap;

/// Render a stub for `module`, taking doc strings from `docs`
///
/// Bodies are elided to `...`. Doc strings are looked up by fragment, so the
/// stub reflects the sidecar rather than whatever is left in the source.
pub fn render_stub(module: &ModuleDef, docs: &BTreeMap<String, String>) -> String {
    let mut blocks: Vec<String> = Vec::new();

    if let Some(doc) = docs.get(MODULE_DOC_FRAGMENT) {
        blocks.push(format!("{}\n", format_docstring(doc, "")));
    }

    if !module.imports.is_empty() {
        let mut block = String::new();
        for import in &module.imports {
            block.push_str(import);
            block.push('\n');
        }
        blocks.push(block);
    }

    if !module.attributes.is_empty() {
        let mut block = String::new();
        for attr in &module.attributes {
            render_attribute(&mut block, attr, "", docs.get(&attr.name));
        }
        blocks.push(block);
    }

    for func in &module.functions {
        let mut block = String::new();
        render_function(&mut block, func, "", docs.get(&func.name));
        blocks.push(block);
    }

    for class in &module.classes {
        blocks.push(render_class(class, docs));
    }

    blocks.join("\n")
}

fn render_attribute(out: &mut String, attr: &Attribute, indent: &str, doc: Option<&String>) {
    out.push_str(indent);
    match &attr.annotation {
        Some(ann) => out.push_str(&format!("{}: {}", attr.name, ann)),
        None => out.push_str(&format!("{} = ...", attr.name)),
    }
    out.push('\n');
    if let Some(doc) = doc {
        out.push_str(indent);
        out.push_str(&format_docstring(doc, indent));
        out.push('\n');
    }
}

fn render_function(out: &mut String, func: &FunctionDef, indent: &str, doc: Option<&String>) {
    for decorator in &func.decorators {
        out.push_str(&format!("{}@{}\n", indent, decorator));
    }
    out.push_str(indent);
    out.push_str(&function_signature_text(func));
    match doc {
        Some(doc) => {
            let inner = format!("{}    ", indent);
            out.push('\n');
            out.push_str(&format!("{}{}\n", inner, format_docstring(doc, &inner)));
            out.push_str(&format!("{}...\n", inner));
        }
        None => out.push_str(" ...\n"),
    }
}

fn render_class(class: &ClassDef, docs: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for decorator in &class.decorators {
        out.push_str(&format!("@{}\n", decorator));
    }
    out.push_str(&class_signature_text(class));
    out.push('\n');

    let inner = "    ";
    let mut members: Vec<String> = Vec::new();
    if let Some(doc) = docs.get(&class.name) {
        members.push(format!("{}{}\n", inner, format_docstring(doc, inner)));
    }
    for attr in &class.attributes {
        let mut block = String::new();
        render_attribute(
            &mut block,
            attr,
            inner,
            docs.get(&format!("{}.{}", class.name, attr.name)),
        );
        members.push(block);
    }
    for method in &class.methods {
        let mut block = String::new();
        render_function(
            &mut block,
            method,
            inner,
            docs.get(&format!("{}.{}", class.name, method.name)),
        );
        members.push(block);
    }

    if members.is_empty() {
        out.push_str(&format!("{}...\n", inner));
    } else {
        out.push_str(&members.join(""));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::python::parser::parse_module;

    #[test]
    fn test_render_stub() {
        let source = "import os\n\nLIMIT: int = 3\n\n\nasync def fetch(url: str, *, retries=2) -> bytes:\n    return b''\n\n\nclass Bus(Base):\n    name = 'x'\n\n    @staticmethod\n    def send(msg):\n        pass\n";
        let module = parse_module("pkg/bus.py", source).unwrap();
        let docs: BTreeMap<String, String> = [
            ("__doc__", "Bus module."),
            ("fetch", "Fetch a URL."),
            ("Bus.send", "Send."),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let stub = render_stub(&module, &docs);
        assert_eq!(
            stub,
            "\"\"\"Bus module.\"\"\"\n\nimport os\n\nLIMIT: int\n\nasync def fetch(url: str, *, retries=2) -> bytes:\n    \"\"\"Fetch a URL.\"\"\"\n    ...\n\nclass Bus(Base):\n    name = ...\n    @staticmethod\n    def send(msg):\n        \"\"\"Send.\"\"\"\n        ...\n"
        );

        let reparsed = parse_module("pkg/bus.pyi", &stub).unwrap();
        assert_eq!(reparsed.functions[0].docstring.as_deref(), Some("Fetch a URL."));
        assert_eq!(reparsed.classes[0].methods[0].name, "send");
    }

    #[test]
    fn test_empty_class_body() {
        let module = parse_module("m.py", "class Empty:\n    pass\n").unwrap();
        assert_eq!(render_stub(&module, &BTreeMap::new()), "class Empty:\n    ...\n");
    }
}
