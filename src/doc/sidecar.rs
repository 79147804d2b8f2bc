//! Sidecar YAML files

use crate::error::{Result, StitcherError};
use crate::transaction::write_atomic;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Suffix replacing the source extension
pub const SIDECAR_SUFFIX: &str = ".stitcher.yaml";

/// Top-level sidecar mapping, fragment to value
pub type SidecarDoc = BTreeMap<String, Value>;

/// Sidecar path for a source path (`pkg/bus.py` -> `pkg/bus.stitcher.yaml`)
pub fn sidecar_path_for(source_path: &str) -> String {
    let (dir, file) = match source_path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, source_path),
    };
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    match dir {
        Some(dir) => format!("{}/{}{}", dir, stem, SIDECAR_SUFFIX),
        None => format!("{}{}", stem, SIDECAR_SUFFIX),
    }
}

/// Whether a path names a sidecar file
pub fn is_sidecar_path(path: &str) -> bool {
    path.ends_with(SIDECAR_SUFFIX)
}

/// Parse sidecar text; non-string keys are dropped
pub fn parse_sidecar(path: &str, content: &str) -> Result<SidecarDoc> {
    let value: Value = serde_yaml::from_str(content)?;
    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(SidecarDoc::new()),
        _ => {
            return Err(StitcherError::parse(
                path,
                "sidecar top level must be a mapping",
            ))
        }
    };

    let mut doc = SidecarDoc::new();
    for (key, value) in mapping {
        match key {
            Value::String(key) => {
                doc.insert(key, value);
            }
            other => warn!("{}: ignoring non-string key {:?}", path, other),
        }
    }
    Ok(doc)
}

/// Render a sidecar with sorted keys; multi-line strings become literal blocks
pub fn render_sidecar(doc: &SidecarDoc) -> Result<String> {
    let mut mapping = Mapping::new();
    for (key, value) in doc {
        mapping.insert(Value::String(key.clone()), value.clone());
    }
    Ok(serde_yaml::to_string(&Value::Mapping(mapping))?)
}

/// Load a sidecar; a missing file is an empty document
pub fn load_sidecar(path: &Path) -> Result<SidecarDoc> {
    match fs::read_to_string(path) {
        Ok(content) => parse_sidecar(&path.display().to_string(), &content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SidecarDoc::new()),
        Err(e) => Err(e.into()),
    }
}

/// Save a sidecar atomically; an empty document deletes the file
pub fn save_sidecar(path: &Path, doc: &SidecarDoc) -> Result<()> {
    if doc.is_empty() {
        if path.exists() {
            fs::remove_file(path)?;
        }
        return Ok(());
    }
    write_atomic(path, render_sidecar(doc)?.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_path_for() {
        assert_eq!(sidecar_path_for("pkg/bus.py"), "pkg/bus.stitcher.yaml");
        assert_eq!(sidecar_path_for("m.py"), "m.stitcher.yaml");
        assert!(is_sidecar_path("pkg/bus.stitcher.yaml"));
    }

    #[test]
    fn test_render_sorts_and_uses_literal_blocks() {
        let mut doc = SidecarDoc::new();
        doc.insert("zeta".to_string(), Value::String("Z.".to_string()));
        doc.insert("alpha".to_string(), Value::String("Line one.\n\nLine two.".to_string()));

        let text = render_sidecar(&doc).unwrap();
        assert!(text.find("alpha").unwrap() < text.find("zeta").unwrap());
        assert!(text.contains("alpha: |"));

        let back = parse_sidecar("m.stitcher.yaml", &text).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_empty_save_deletes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.stitcher.yaml");
        let mut doc = SidecarDoc::new();
        doc.insert("f".to_string(), Value::String("D.".to_string()));

        save_sidecar(&path, &doc).unwrap();
        assert_eq!(load_sidecar(&path).unwrap(), doc);

        save_sidecar(&path, &SidecarDoc::new()).unwrap();
        assert!(!path.exists());
        assert!(load_sidecar(&path).unwrap().is_empty());
    }

    #[test]
    fn test_non_mapping_is_parse_error() {
        assert!(parse_sidecar("x.yaml", "- a\n- b\n").is_err());
        assert!(parse_sidecar("x.yaml", "").unwrap().is_empty());
    }
}
