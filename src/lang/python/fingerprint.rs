//! Structure hashes and signature text for Python definitions
//!
//! The structure hash covers the parts of a definition that change what its
//! documentation describes: name, flags, return annotation and every argument
//! as `name:kind:annotation:default`. Decorators and doc strings are left out.

use crate::fingerprint::{
    sha256_hex, Fingerprint, CURRENT_CODE_DOCSTRING_HASH, CURRENT_CODE_SIGNATURE_TEXT,
    CURRENT_CODE_STRUCTURE_HASH,
};
use crate::lang::ir::{Argument, ArgumentKind, Attribute, ClassDef, FunctionDef, ModuleDef};
use crate::suri::MODULE_DOC_FRAGMENT;
use std::collections::BTreeMap;
use tracing::warn;

/// Canonical text hashed for a function
pub fn function_canonical(func: &FunctionDef) -> String {
    let mut parts = vec![
        format!("name:{}", func.name),
        format!("async:{}", func.is_async),
        format!("static:{}", func.is_static),
        format!("class:{}", func.is_class),
        format!("ret:{}", func.return_annotation.as_deref().unwrap_or("")),
    ];
    for arg in &func.args {
        parts.push(format!(
            "{}:{}:{}:{}",
            arg.name,
            arg.kind.as_str(),
            arg.annotation.as_deref().unwrap_or(""),
            arg.default.as_deref().unwrap_or("")
        ));
    }
    parts.join("|")
}

pub fn function_structure_hash(func: &FunctionDef) -> String {
    sha256_hex(&function_canonical(func))
}

/// `def` line of a function, without decorators or body
pub fn function_signature_text(func: &FunctionDef) -> String {
    let mut out = String::new();
    if func.is_async {
        out.push_str("async ");
    }
    out.push_str("def ");
    out.push_str(&func.name);
    out.push('(');
    out.push_str(&render_args(&func.args));
    out.push(')');
    if let Some(ret) = &func.return_annotation {
        out.push_str(" -> ");
        out.push_str(ret);
    }
    out.push(':');
    out
}

/// Argument list with `/` and `*` markers restored
pub fn render_args(args: &[Argument]) -> String {
    let last_positional_only = args
        .iter()
        .rposition(|a| a.kind == ArgumentKind::PositionalOnly);
    let mut star_seen = false;
    let mut parts: Vec<String> = Vec::with_capacity(args.len() + 2);

    for (idx, arg) in args.iter().enumerate() {
        match arg.kind {
            ArgumentKind::VarPositional => star_seen = true,
            ArgumentKind::KeywordOnly if !star_seen => {
                parts.push("*".to_string());
                star_seen = true;
            }
            _ => {}
        }
        parts.push(render_arg(arg));
        if Some(idx) == last_positional_only {
            parts.push("/".to_string());
        }
    }

    parts.join(", ")
}

fn render_arg(arg: &Argument) -> String {
    let prefix = match arg.kind {
        ArgumentKind::VarPositional => "*",
        ArgumentKind::VarKeyword => "**",
        _ => "",
    };
    let mut out = format!("{}{}", prefix, arg.name);
    match (&arg.annotation, &arg.default) {
        (Some(ann), Some(default)) => out.push_str(&format!(": {} = {}", ann, default)),
        (Some(ann), None) => out.push_str(&format!(": {}", ann)),
        (None, Some(default)) => out.push_str(&format!("={}", default)),
        (None, None) => {}
    }
    out
}

pub fn class_canonical(class: &ClassDef) -> String {
    format!("name:{}|class|bases:{}", class.name, class.bases.join(","))
}

pub fn class_signature_text(class: &ClassDef) -> String {
    if class.bases.is_empty() {
        format!("class {}:", class.name)
    } else {
        format!("class {}({}):", class.name, class.bases.join(", "))
    }
}

pub fn attribute_canonical(attr: &Attribute) -> String {
    format!(
        "name:{}|attr|ann:{}",
        attr.name,
        attr.annotation.as_deref().unwrap_or("")
    )
}

pub fn attribute_signature_text(attr: &Attribute) -> String {
    match &attr.annotation {
        Some(ann) => format!("{}: {}", attr.name, ann),
        None => attr.name.clone(),
    }
}

fn build(canonical: &str, signature: String, docstring: Option<&str>) -> Fingerprint {
    let mut fp = Fingerprint::new();
    let entries = [
        (CURRENT_CODE_STRUCTURE_HASH, Some(sha256_hex(canonical))),
        (CURRENT_CODE_SIGNATURE_TEXT, Some(signature)),
        (CURRENT_CODE_DOCSTRING_HASH, docstring.map(sha256_hex)),
    ];
    for (key, value) in entries {
        if let Some(value) = value {
            if let Err(e) = fp.set(key, value) {
                warn!("skipping fingerprint entry: {}", e);
            }
        }
    }
    fp
}

pub fn function_fingerprint(func: &FunctionDef) -> Fingerprint {
    build(
        &function_canonical(func),
        function_signature_text(func),
        func.docstring.as_deref(),
    )
}

pub fn class_fingerprint(class: &ClassDef) -> Fingerprint {
    build(
        &class_canonical(class),
        class_signature_text(class),
        class.docstring.as_deref(),
    )
}

pub fn attribute_fingerprint(attr: &Attribute) -> Fingerprint {
    build(
        &attribute_canonical(attr),
        attribute_signature_text(attr),
        attr.docstring.as_deref(),
    )
}

/// Fingerprints keyed by fragment for every documentable definition
pub fn module_fingerprints(module: &ModuleDef) -> BTreeMap<String, Fingerprint> {
    let mut out = BTreeMap::new();

    if let Some(doc) = &module.docstring {
        let mut fp = Fingerprint::new();
        if fp.set(CURRENT_CODE_DOCSTRING_HASH, sha256_hex(doc)).is_ok() {
            out.insert(MODULE_DOC_FRAGMENT.to_string(), fp);
        }
    }
    for attr in &module.attributes {
        out.insert(attr.name.clone(), attribute_fingerprint(attr));
    }
    for func in &module.functions {
        out.insert(func.name.clone(), function_fingerprint(func));
    }
    for class in &module.classes {
        out.insert(class.name.clone(), class_fingerprint(class));
        for attr in &class.attributes {
            out.insert(
                format!("{}.{}", class.name, attr.name),
                attribute_fingerprint(attr),
            );
        }
        for method in &class.methods {
            out.insert(
                format!("{}.{}", class.name, method.name),
                function_fingerprint(method),
            );
        }
    }

    out
}
