//! Reader for the per-file signature layout that predates lock files
//!
//! The old layout kept one JSON document per source file under
//! `.stitcher/signatures/`, at the source path with `.py` replaced by
//! `.json`, mapping fragments to fingerprints.

use crate::fingerprint::Fingerprint;
use crate::error::Result;
use crate::suri::Suri;
use crate::workspace::normalize_relative;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Legacy directory name under `.stitcher/`
pub const LEGACY_DIR: &str = "signatures";

/// Source path and its `(SURI, fingerprint)` pairs for every legacy file
pub(super) fn read_tree(legacy_root: &Path) -> Result<Vec<(String, Vec<(String, Fingerprint)>)>> {
    let mut out = Vec::new();

    for entry in WalkDir::new(legacy_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let Some(relative) = path
            .strip_prefix(legacy_root)
            .ok()
            .map(normalize_relative)
        else {
            continue;
        };
        let Some(stem) = relative.strip_suffix(".json") else {
            continue;
        };
        let source_path = format!("{}.py", stem);

        let content = fs::read_to_string(path)?;
        let parsed: BTreeMap<String, Fingerprint> = match serde_json::from_str(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("skipping unreadable legacy signature file {}: {}", relative, e);
                continue;
            }
        };

        let mut entries = Vec::new();
        for (fragment, fingerprint) in parsed {
            let suri = Suri::for_symbol(&source_path, &fragment)?;
            entries.push((suri.to_string(), fingerprint));
        }
        out.push((source_path, entries));
    }

    Ok(out)
}
