//! Typed content fingerprints
//!
//! A fingerprint is an open map of hashes and rendered texts. Keys follow the
//! grammar `(baseline|current)_<domain>_<aspect>_(hash|text)`, which keeps the
//! persisted lock format self-describing while rejecting anything else.

use crate::error::{Result, StitcherError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const CURRENT_CODE_STRUCTURE_HASH: &str = "current_code_structure_hash";
pub const CURRENT_CODE_SIGNATURE_TEXT: &str = "current_code_signature_text";
pub const CURRENT_CODE_DOCSTRING_HASH: &str = "current_code_docstring_hash";
pub const BASELINE_CODE_STRUCTURE_HASH: &str = "baseline_code_structure_hash";
pub const BASELINE_CODE_SIGNATURE_TEXT: &str = "baseline_code_signature_text";
pub const BASELINE_YAML_CONTENT_HASH: &str = "baseline_yaml_content_hash";

/// SHA-256 of a string, lowercase hex
pub fn sha256_hex(content: &str) -> String {
    sha256_bytes_hex(content.as_bytes())
}

/// SHA-256 of raw bytes, lowercase hex
pub fn sha256_bytes_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Check a key against the fingerprint key grammar
pub fn is_valid_key(key: &str) -> bool {
    let parts: Vec<&str> = key.split('_').collect();
    if parts.len() != 4 {
        return false;
    }

    let lower = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase());

    matches!(parts[0], "baseline" | "current")
        && lower(parts[1])
        && lower(parts[2])
        && matches!(parts[3], "hash" | "text")
}

fn validate_key(key: &str) -> Result<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(StitcherError::InvalidFingerprintKey(key.to_string()))
    }
}

/// A validated map of fingerprint entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Fingerprint {
    entries: BTreeMap<String, String>,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set a value, rejecting keys outside the grammar
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Builder form of [`Fingerprint::set`]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    /// Keep only the `baseline_*` entries, the part persisted in lock files
    pub fn baseline_only(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| k.starts_with("baseline_"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl TryFrom<BTreeMap<String, String>> for Fingerprint {
    type Error = StitcherError;

    fn try_from(entries: BTreeMap<String, String>) -> Result<Self> {
        for key in entries.keys() {
            validate_key(key)?;
        }
        Ok(Self { entries })
    }
}

impl From<Fingerprint> for BTreeMap<String, String> {
    fn from(fp: Fingerprint) -> Self {
        fp.entries
    }
}
