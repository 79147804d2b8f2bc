//! Per-symbol three-way state and its classification
//!
//! Code and sidecar are independent inputs; both are compared against the
//! baseline from the lock file, never against each other transitively.

use crate::docstring::DocstringIR;
use crate::doc::same_doc;
use crate::fingerprint::{
    Fingerprint, BASELINE_CODE_SIGNATURE_TEXT, BASELINE_CODE_STRUCTURE_HASH,
    BASELINE_YAML_CONTENT_HASH, CURRENT_CODE_SIGNATURE_TEXT, CURRENT_CODE_STRUCTURE_HASH,
};

/// Everything known about one fragment of one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolState {
    pub fragment: String,
    pub suri: String,
    pub is_public: bool,
    /// Whether an undocumented definition should be reported
    pub can_be_missing: bool,
    pub exists_in_code: bool,
    pub source_doc: Option<DocstringIR>,
    pub signature_hash: Option<String>,
    pub signature_text: Option<String>,
    pub exists_in_yaml: bool,
    pub yaml_doc: Option<DocstringIR>,
    pub yaml_content_hash: Option<String>,
    pub baseline_signature_hash: Option<String>,
    pub baseline_signature_text: Option<String>,
    pub baseline_yaml_content_hash: Option<String>,
}

impl SymbolState {
    /// Fill the current-code fields from a fingerprint
    pub fn with_code(mut self, fingerprint: Option<&Fingerprint>) -> Self {
        self.exists_in_code = true;
        if let Some(fp) = fingerprint {
            self.signature_hash = fp.get(CURRENT_CODE_STRUCTURE_HASH).map(str::to_string);
            self.signature_text = fp.get(CURRENT_CODE_SIGNATURE_TEXT).map(str::to_string);
        }
        self
    }

    /// Fill the baseline fields from a lock entry
    pub fn with_baseline(mut self, fingerprint: Option<&Fingerprint>) -> Self {
        if let Some(fp) = fingerprint {
            self.baseline_signature_hash = fp.get(BASELINE_CODE_STRUCTURE_HASH).map(str::to_string);
            self.baseline_signature_text = fp.get(BASELINE_CODE_SIGNATURE_TEXT).map(str::to_string);
            self.baseline_yaml_content_hash = fp.get(BASELINE_YAML_CONTENT_HASH).map(str::to_string);
        }
        self
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline_signature_hash.is_some() || self.baseline_yaml_content_hash.is_some()
    }

    /// Baseline fingerprint accepting the current signature and sidecar doc
    pub fn accepted_baseline(&self) -> Fingerprint {
        let mut fp = Fingerprint::new();
        let entries = [
            (BASELINE_CODE_STRUCTURE_HASH, &self.signature_hash),
            (BASELINE_CODE_SIGNATURE_TEXT, &self.signature_text),
            (BASELINE_YAML_CONTENT_HASH, &self.yaml_content_hash),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                // Keys are the fixed baseline constants
                let _ = fp.set(key, value.clone());
            }
        }
        fp
    }

    /// Baseline accepting the current signature but keeping the old doc hash
    pub fn relinked_baseline(&self) -> Fingerprint {
        let mut fp = self.accepted_baseline();
        fp.remove(BASELINE_YAML_CONTENT_HASH);
        if let Some(hash) = &self.baseline_yaml_content_hash {
            let _ = fp.set(BASELINE_YAML_CONTENT_HASH, hash.clone());
        }
        fp
    }
}

/// Classification of a [`SymbolState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Doc in code, not externalised
    Pending,
    /// Public definition documented nowhere
    Missing,
    /// Identical doc in code and sidecar
    Redundant,
    /// Differing docs in code and sidecar
    Conflict,
    /// Sidecar documents a symbol that is gone
    DanglingDoc,
    /// Code, sidecar and baseline agree
    Synchronized,
    /// Only the sidecar doc changed since the baseline
    DocImprovement,
    /// Documented symbol without a baseline yet
    New,
    /// Signature changed, doc did not
    SignatureDrift,
    /// Signature and doc both changed
    CoEvolution,
    /// Baseline entry whose symbol is gone from code and sidecar
    Stale,
    /// Nothing to report (undocumented private symbol, attribute, ...)
    Untouched,
}

impl Outcome {
    /// Outcomes that need a decision from the interaction handler
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            Outcome::DanglingDoc | Outcome::SignatureDrift | Outcome::CoEvolution
        )
    }
}

/// Classify a state into exactly one outcome
pub fn classify(state: &SymbolState) -> Outcome {
    if !state.exists_in_code {
        return if state.exists_in_yaml {
            Outcome::DanglingDoc
        } else if state.has_baseline() {
            Outcome::Stale
        } else {
            Outcome::Untouched
        };
    }

    match (&state.source_doc, &state.yaml_doc) {
        (Some(_), None) => return Outcome::Pending,
        (None, None) => {
            return if state.can_be_missing && state.is_public {
                Outcome::Missing
            } else {
                Outcome::Untouched
            };
        }
        (Some(code), Some(yaml)) => {
            return if same_doc(code, yaml) {
                Outcome::Redundant
            } else {
                Outcome::Conflict
            };
        }
        (None, Some(_)) => {}
    }

    if !state.has_baseline() {
        return Outcome::New;
    }

    let signature_same = state.signature_hash == state.baseline_signature_hash;
    let doc_same = state.yaml_content_hash.is_some()
        && state.yaml_content_hash == state.baseline_yaml_content_hash;

    match (signature_same, doc_same) {
        (true, true) => Outcome::Synchronized,
        (true, false) => Outcome::DocImprovement,
        (false, true) => Outcome::SignatureDrift,
        (false, false) => Outcome::CoEvolution,
    }
}
