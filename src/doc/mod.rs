//! Document manager: sidecars, code doc strings and the hydrate merge
//!
//! Code doc strings are flattened into a fragment-keyed map of IR values,
//! sidecars are loaded as raw YAML values (so unknown keys survive a save),
//! and [`DocumentManager::hydrate_module`] moves code docs into the sidecar.

pub mod sidecar;

pub use sidecar::{
    is_sidecar_path, load_sidecar, parse_sidecar, render_sidecar, save_sidecar, sidecar_path_for,
    SidecarDoc, SIDECAR_SUFFIX,
};

use crate::docstring::{from_sidecar_value, to_sidecar_value, value_content_hash, DocstringIR, DocstringStyle};
use crate::error::Result;
use crate::lang::{is_public_fragment, ModuleDef};
use crate::suri::MODULE_DOC_FRAGMENT;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::debug;

/// How a hydrate conflict was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrateChoice {
    /// Code doc replaces the sidecar entry (sidecar addons kept)
    Overwrite,
    /// Sidecar entry stays
    KeepExisting,
    /// Leave the conflict unresolved
    Skip,
}

/// Switches for [`DocumentManager::hydrate_module`]
#[derive(Debug, Clone, Default)]
pub struct HydrateOptions {
    /// Code wins every conflict
    pub force: bool,
    /// Sidecar wins every conflict
    pub reconcile: bool,
    /// Per-fragment decisions, consulted before the flags
    pub resolutions: BTreeMap<String, HydrateChoice>,
    /// Compute the result without writing the sidecar
    pub dry_run: bool,
}

/// Outcome of hydrating one module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydrateResult {
    /// False when unresolved conflicts remain
    pub success: bool,
    /// Fragments added to or overwritten in the sidecar
    pub updated: Vec<String>,
    /// Fragments whose code and sidecar docs disagree and were left alone
    pub conflicts: Vec<String>,
    /// Fragments where the sidecar was kept over a differing code doc
    pub reconciled: Vec<String>,
    /// Sidecar content after the merge
    pub sidecar: SidecarDoc,
}

/// Doc-level comparison of code and sidecar for one module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleDocCheck {
    /// Public definitions with no doc anywhere
    pub missing: Vec<String>,
    /// Sidecar entries whose symbol is gone from code
    pub extra: Vec<String>,
    /// Doc in code, nothing in the sidecar
    pub pending: Vec<String>,
    /// Same doc in code and sidecar
    pub redundant: Vec<String>,
    /// Different docs in code and sidecar
    pub conflict: Vec<String>,
}

impl ModuleDocCheck {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.extra.is_empty()
            && self.pending.is_empty()
            && self.redundant.is_empty()
            && self.conflict.is_empty()
    }
}

/// Fragments of a module, with whether an absent doc counts as missing
///
/// Attributes take part in every comparison but are never reported missing.
pub fn code_fragments(module: &ModuleDef) -> Vec<(String, bool)> {
    let mut out = Vec::new();
    if module.docstring.is_some() {
        out.push((MODULE_DOC_FRAGMENT.to_string(), false));
    }
    for attr in &module.attributes {
        out.push((attr.name.clone(), false));
    }
    for func in &module.functions {
        out.push((func.name.clone(), true));
    }
    for class in &module.classes {
        out.push((class.name.clone(), true));
        for attr in &class.attributes {
            out.push((format!("{}.{}", class.name, attr.name), false));
        }
        for method in &class.methods {
            out.push((format!("{}.{}", class.name, method.name), true));
        }
    }
    out
}

/// Same documentation, ignoring addons
pub fn same_doc(a: &DocstringIR, b: &DocstringIR) -> bool {
    a.summary == b.summary && a.extended == b.extended && a.sections == b.sections
}

/// Loads, saves and merges sidecar documentation
pub struct DocumentManager {
    root: PathBuf,
    style: DocstringStyle,
}

impl DocumentManager {
    pub fn new(root: impl Into<PathBuf>, style: DocstringStyle) -> Self {
        Self {
            root: root.into(),
            style,
        }
    }

    pub fn style(&self) -> DocstringStyle {
        self.style
    }

    /// Every code doc string of a module as IR, keyed by fragment
    pub fn flatten_module_docs(&self, module: &ModuleDef) -> BTreeMap<String, DocstringIR> {
        let mut docs = BTreeMap::new();
        let mut add = |fragment: String, doc: Option<&String>| {
            if let Some(doc) = doc {
                docs.insert(fragment, DocstringIR::parse(doc, self.style));
            }
        };

        add(MODULE_DOC_FRAGMENT.to_string(), module.docstring.as_ref());
        for attr in &module.attributes {
            add(attr.name.clone(), attr.docstring.as_ref());
        }
        for func in &module.functions {
            add(func.name.clone(), func.docstring.as_ref());
        }
        for class in &module.classes {
            add(class.name.clone(), class.docstring.as_ref());
            for attr in &class.attributes {
                add(format!("{}.{}", class.name, attr.name), attr.docstring.as_ref());
            }
            for method in &class.methods {
                add(format!("{}.{}", class.name, method.name), method.docstring.as_ref());
            }
        }
        docs
    }

    /// Workspace-relative sidecar path of a source file
    pub fn sidecar_path(&self, source_path: &str) -> String {
        sidecar_path_for(source_path)
    }

    /// Raw sidecar document of a source file
    pub fn load_sidecar(&self, source_path: &str) -> Result<SidecarDoc> {
        load_sidecar(&self.root.join(sidecar_path_for(source_path)))
    }

    pub fn save_sidecar(&self, source_path: &str, doc: &SidecarDoc) -> Result<()> {
        save_sidecar(&self.root.join(sidecar_path_for(source_path)), doc)
    }

    /// Sidecar docs of a source file as IR
    pub fn load_docs_for_module(&self, source_path: &str) -> Result<BTreeMap<String, DocstringIR>> {
        Ok(self.sidecar_irs(&self.load_sidecar(source_path)?))
    }

    /// Write IR docs for a module, keeping sidecar keys not in `docs`
    pub fn save_docs_for_module(
        &self,
        source_path: &str,
        docs: &BTreeMap<String, DocstringIR>,
    ) -> Result<()> {
        let mut sidecar = self.load_sidecar(source_path)?;
        for (fragment, ir) in docs {
            sidecar.insert(fragment.clone(), to_sidecar_value(ir, self.style));
        }
        self.save_sidecar(source_path, &sidecar)
    }

    pub fn sidecar_irs(&self, sidecar: &SidecarDoc) -> BTreeMap<String, DocstringIR> {
        sidecar
            .iter()
            .map(|(k, v)| (k.clone(), from_sidecar_value(v, self.style)))
            .collect()
    }

    /// Content hash of every sidecar entry
    pub fn compute_yaml_content_hashes(&self, sidecar: &SidecarDoc) -> BTreeMap<String, String> {
        sidecar
            .iter()
            .map(|(k, v)| (k.clone(), value_content_hash(v)))
            .collect()
    }

    /// Compare code docs of a module against its sidecar
    pub fn check_module(&self, module: &ModuleDef, sidecar: &SidecarDoc) -> ModuleDocCheck {
        let code_docs = self.flatten_module_docs(module);
        let sidecar_docs = self.sidecar_irs(sidecar);
        let fragments = code_fragments(module);
        let in_code: BTreeSet<&str> = fragments.iter().map(|(f, _)| f.as_str()).collect();

        let mut result = ModuleDocCheck::default();
        for (fragment, can_be_missing) in &fragments {
            match (code_docs.get(fragment), sidecar_docs.get(fragment)) {
                (Some(_), None) => result.pending.push(fragment.clone()),
                (None, None) => {
                    if *can_be_missing && is_public_fragment(fragment) {
                        result.missing.push(fragment.clone());
                    }
                }
                (Some(code), Some(side)) => {
                    if same_doc(code, side) {
                        result.redundant.push(fragment.clone());
                    } else {
                        result.conflict.push(fragment.clone());
                    }
                }
                (None, Some(_)) => {}
            }
        }

        for fragment in sidecar.keys() {
            if fragment == MODULE_DOC_FRAGMENT || in_code.contains(fragment.as_str()) {
                continue;
            }
            result.extra.push(fragment.clone());
        }

        for list in [
            &mut result.missing,
            &mut result.extra,
            &mut result.pending,
            &mut result.redundant,
            &mut result.conflict,
        ] {
            list.sort();
        }
        result
    }

    /// Move code doc strings into the sidecar
    ///
    /// New entries are added. Entries that differ are conflicts unless a
    /// resolution, `force` (code wins, sidecar addons kept) or `reconcile`
    /// (sidecar wins) settles them.
    pub fn hydrate_module(&self, module: &ModuleDef, options: &HydrateOptions) -> Result<HydrateResult> {
        let source_path = module.file_path.as_str();
        let mut sidecar = self.load_sidecar(source_path)?;
        let existing = self.sidecar_irs(&sidecar);
        let mut result = HydrateResult {
            success: true,
            ..HydrateResult::default()
        };
        let mut written: BTreeMap<String, DocstringIR> = BTreeMap::new();

        for (fragment, code_ir) in self.flatten_module_docs(module) {
            let Some(side_ir) = existing.get(&fragment) else {
                written.insert(fragment.clone(), code_ir);
                result.updated.push(fragment);
                continue;
            };
            if same_doc(&code_ir, side_ir) {
                continue;
            }

            let choice = match options.resolutions.get(&fragment) {
                Some(choice) => *choice,
                None if options.force => HydrateChoice::Overwrite,
                None if options.reconcile => HydrateChoice::KeepExisting,
                None => HydrateChoice::Skip,
            };
            match choice {
                HydrateChoice::Overwrite => {
                    written.insert(fragment.clone(), code_ir.with_addons_from(side_ir));
                    result.updated.push(fragment);
                }
                HydrateChoice::KeepExisting => result.reconciled.push(fragment),
                HydrateChoice::Skip => result.conflicts.push(fragment),
            }
        }

        result.success = result.conflicts.is_empty();
        if !options.dry_run && !written.is_empty() {
            debug!("hydrated {} fragments into {}", written.len(), sidecar_path_for(source_path));
            self.save_docs_for_module(source_path, &written)?;
        }
        for (fragment, ir) in &written {
            sidecar.insert(fragment.clone(), to_sidecar_value(ir, self.style));
        }
        result.sidecar = sidecar;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::python::parser::parse_module;
    use serde_yaml::Value;
    use std::fs;
    use tempfile::TempDir;

    const SOURCE: &str = "\"\"\"Mod.\"\"\"\n\nLIMIT = 3\n\n\ndef documented():\n    \"\"\"Code doc.\"\"\"\n\n\ndef bare():\n    pass\n\n\ndef _private():\n    pass\n\n\nclass Bus:\n    def send(self):\n        \"\"\"Send.\"\"\"\n";

    fn setup(sidecar: Option<&str>) -> (TempDir, DocumentManager, ModuleDef) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m.py"), SOURCE).unwrap();
        if let Some(content) = sidecar {
            fs::write(dir.path().join("m.stitcher.yaml"), content).unwrap();
        }
        let docs = DocumentManager::new(dir.path(), DocstringStyle::Raw);
        let module = parse_module("m.py", SOURCE).unwrap();
        (dir, docs, module)
    }

    #[test]
    fn test_flatten_module_docs() {
        let (_dir, docs, module) = setup(None);
        let flat = docs.flatten_module_docs(&module);
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Bus.send", "__doc__", "documented"]);
        assert_eq!(flat["documented"].summary.as_deref(), Some("Code doc."));
    }

    #[test]
    fn test_check_module_classifies() {
        let (_dir, docs, module) = setup(Some("Bus.send: Send.\ndocumented: Other.\ngone: Old.\n"));
        let sidecar = docs.load_sidecar("m.py").unwrap();
        let check = docs.check_module(&module, &sidecar);

        assert_eq!(check.missing, vec!["Bus", "bare"]);
        assert_eq!(check.extra, vec!["gone"]);
        assert_eq!(check.pending, vec!["__doc__"]);
        assert_eq!(check.redundant, vec!["Bus.send"]);
        assert_eq!(check.conflict, vec!["documented"]);
    }

    #[test]
    fn test_hydrate_adds_and_reports_conflicts() {
        let (dir, docs, module) = setup(Some("documented: Other.\n"));
        let result = docs.hydrate_module(&module, &HydrateOptions::default()).unwrap();

        assert!(!result.success);
        assert_eq!(result.conflicts, vec!["documented"]);
        assert_eq!(result.updated, vec!["Bus.send", "__doc__"]);

        let saved = load_sidecar(&dir.path().join("m.stitcher.yaml")).unwrap();
        assert_eq!(saved["documented"], Value::String("Other.".to_string()));
        assert_eq!(saved["__doc__"], Value::String("Mod.".to_string()));
    }

    #[test]
    fn test_save_docs_for_module_keeps_other_keys() {
        let (dir, docs, _module) = setup(Some("bare: Kept.\ndocumented: Old.\n"));
        let mut update = BTreeMap::new();
        update.insert("documented".to_string(), DocstringIR::from_text("New."));
        docs.save_docs_for_module("m.py", &update).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("m.stitcher.yaml")).unwrap(),
            "bare: Kept.\ndocumented: New.\n"
        );
    }

    #[test]
    fn test_hydrate_force_keeps_addons() {
        let (_dir, docs, module) = setup(Some(
            "documented:\n  Raw: Other.\n  Addon.Test: keep me\n",
        ));
        let options = HydrateOptions {
            force: true,
            dry_run: true,
            ..HydrateOptions::default()
        };
        let result = docs.hydrate_module(&module, &options).unwrap();
        assert!(result.success);

        let irs = docs.sidecar_irs(&result.sidecar);
        assert_eq!(irs["documented"].summary.as_deref(), Some("Code doc."));
        assert!(irs["documented"].addons.contains_key("Addon.Test"));
    }

    #[test]
    fn test_hydrate_resolution_map_wins_over_flags() {
        let (_dir, docs, module) = setup(Some("documented: Other.\n"));
        let mut options = HydrateOptions {
            force: true,
            dry_run: true,
            ..HydrateOptions::default()
        };
        options
            .resolutions
            .insert("documented".to_string(), HydrateChoice::KeepExisting);

        let result = docs.hydrate_module(&module, &options).unwrap();
        assert!(result.success);
        assert_eq!(result.reconciled, vec!["documented"]);
        assert_eq!(
            result.sidecar["documented"],
            Value::String("Other.".to_string())
        );
    }

    #[test]
    fn test_yaml_hashes() {
        let (_dir, docs, _module) = setup(Some("f: Better D.\n"));
        let sidecar = docs.load_sidecar("m.py").unwrap();
        let hashes = docs.compute_yaml_content_hashes(&sidecar);
        assert_eq!(hashes["f"], crate::fingerprint::sha256_hex("Better D."));
    }
}
