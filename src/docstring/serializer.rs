//! Conversion between the docstring IR and sidecar values
//!
//! Raw style stores a plain string. Structured style stores a mapping with
//! `Summary`, `Extended` and section keys. In both styles `Addon.*` keys are
//! carried through untouched; a raw doc with addons is written as a mapping
//! with a `Raw` key.

use super::{
    DocstringIR, DocstringItem, DocstringSection, DocstringStyle, SectionContent, SectionKind,
    ADDON_PREFIX,
};
use crate::fingerprint::sha256_hex;
use serde_yaml::{Mapping, Value};
use tracing::debug;

const RAW_KEY: &str = "Raw";
const SUMMARY_KEY: &str = "Summary";
const EXTENDED_KEY: &str = "Extended";

/// Serialize the IR into a sidecar value
pub fn to_sidecar_value(ir: &DocstringIR, style: DocstringStyle) -> Value {
    match style {
        DocstringStyle::Raw => {
            let text = ir.render(DocstringStyle::Raw);
            if ir.addons.is_empty() {
                return Value::String(text);
            }
            let mut map = Mapping::new();
            map.insert(RAW_KEY.into(), Value::String(text));
            append_addons(&mut map, ir);
            Value::Mapping(map)
        }
        DocstringStyle::Google => {
            if ir.extended.is_none() && ir.sections.is_empty() && ir.addons.is_empty() {
                return Value::String(ir.summary.clone().unwrap_or_default());
            }

            let mut map = Mapping::new();
            if let Some(summary) = &ir.summary {
                map.insert(SUMMARY_KEY.into(), Value::String(summary.clone()));
            }
            if let Some(extended) = &ir.extended {
                map.insert(EXTENDED_KEY.into(), Value::String(extended.clone()));
            }
            for section in &ir.sections {
                let key = section.title.as_deref().unwrap_or(section.kind.title());
                let value = match &section.content {
                    SectionContent::Text(text) => Value::String(text.clone()),
                    SectionContent::Items(items) => {
                        let mut items_map = Mapping::new();
                        for item in items {
                            items_map.insert(
                                Value::String(item.name.clone().unwrap_or_default()),
                                Value::String(item.description.clone()),
                            );
                        }
                        Value::Mapping(items_map)
                    }
                };
                map.insert(key.into(), value);
            }
            append_addons(&mut map, ir);
            Value::Mapping(map)
        }
    }
}

fn append_addons(map: &mut Mapping, ir: &DocstringIR) {
    for (key, value) in &ir.addons {
        map.insert(Value::String(key.clone()), value.clone());
    }
}

/// Deserialize a sidecar value into the IR
pub fn from_sidecar_value(value: &Value, style: DocstringStyle) -> DocstringIR {
    match value {
        Value::String(text) => DocstringIR::parse(text, style),
        Value::Mapping(map) => from_mapping(map, style),
        Value::Null => DocstringIR::default(),
        other => DocstringIR::from_text(&scalar_text(other)),
    }
}

fn from_mapping(map: &Mapping, style: DocstringStyle) -> DocstringIR {
    let mut ir = DocstringIR::default();

    for (key, value) in map {
        let Some(key) = key.as_str() else {
            continue;
        };

        if key.starts_with(ADDON_PREFIX) {
            ir.addons.insert(key.to_string(), value.clone());
            continue;
        }

        match key {
            RAW_KEY => {
                let parsed = DocstringIR::parse(&scalar_text(value), style);
                ir.summary = parsed.summary;
                ir.extended = parsed.extended;
                ir.sections = parsed.sections;
            }
            SUMMARY_KEY => ir.summary = Some(scalar_text(value)),
            EXTENDED_KEY => ir.extended = Some(scalar_text(value)),
            other => match SectionKind::from_title(other) {
                Some(kind) => {
                    let content = match value {
                        Value::Mapping(items) => SectionContent::Items(
                            items
                                .iter()
                                .map(|(name, desc)| DocstringItem {
                                    name: name.as_str().map(str::to_string),
                                    annotation: None,
                                    description: scalar_text(desc),
                                    default: None,
                                })
                                .collect(),
                        ),
                        other => SectionContent::Text(scalar_text(other)),
                    };
                    let title = (other != kind.title()).then(|| other.to_string());
                    ir.sections.push(DocstringSection {
                        kind,
                        title,
                        content,
                    });
                }
                None => debug!("ignoring unknown sidecar key '{}'", other),
            },
        }
    }

    ir
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Content hash of a sidecar value: strings as-is, mappings as sorted-key JSON
pub fn value_content_hash(value: &Value) -> String {
    match value {
        Value::String(s) => sha256_hex(s),
        other => {
            let canonical = serde_json::to_value(other)
                .ok()
                .and_then(|json| serde_json::to_string(&json).ok())
                .unwrap_or_else(|| scalar_text(other));
            sha256_hex(&canonical)
        }
    }
}
