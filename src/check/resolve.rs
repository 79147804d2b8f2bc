//! Applying resolution actions to baselines and sidecars

use super::state::SymbolState;
use super::violation::ViolationKind;
use super::FileCheck;
use crate::doc::HydrateChoice;
use crate::feedback::{msg, Message};
use crate::interaction::ResolutionAction;
use crate::lock::LockManager;

/// Apply one decision; returns the feedback line when it resolved the violation
pub(super) fn apply_resolution(
    file: &mut FileCheck,
    state: &SymbolState,
    kind: ViolationKind,
    action: ResolutionAction,
    locks: &mut LockManager,
) -> Option<Message> {
    use ResolutionAction::*;
    use ViolationKind::*;

    let id = match (kind, action) {
        (SignatureDrift | CoEvolution, Relink) => {
            locks.set(&file.package_root, &state.suri, &state.relinked_baseline());
            msg::check::STATE_RELINKED
        }
        (SignatureDrift | CoEvolution, Reconcile) => {
            locks.set(&file.package_root, &state.suri, &state.accepted_baseline());
            msg::check::STATE_RECONCILED
        }
        (DanglingDoc, PurgeDoc) => {
            file.sidecar.remove(&state.fragment);
            file.sidecar_changed = true;
            locks.remove(&file.package_root, &state.suri);
            msg::check::STATE_PURGED
        }
        _ => return None,
    };

    Some(Message::success(id).with("key", &state.fragment).with("path", &file.path))
}

/// Hydrate choice for a pump conflict decision
pub fn hydrate_choice(action: ResolutionAction) -> HydrateChoice {
    match action {
        ResolutionAction::HydrateOverwrite => HydrateChoice::Overwrite,
        ResolutionAction::HydrateKeepExisting => HydrateChoice::KeepExisting,
        _ => HydrateChoice::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::state::{classify, Outcome};
    use crate::doc::SidecarDoc;
    use crate::docstring::DocstringIR;
    use crate::fingerprint::{BASELINE_CODE_STRUCTURE_HASH, BASELINE_YAML_CONTENT_HASH};
    use crate::workspace::Workspace;
    use serde_yaml::Value;
    use tempfile::TempDir;

    fn drifted() -> SymbolState {
        SymbolState {
            fragment: "func".to_string(),
            suri: "py://m.py#func".to_string(),
            is_public: true,
            can_be_missing: true,
            exists_in_code: true,
            signature_hash: Some("new".to_string()),
            exists_in_yaml: true,
            yaml_doc: Some(DocstringIR::from_text("D.")),
            yaml_content_hash: Some("doc".to_string()),
            baseline_signature_hash: Some("old".to_string()),
            baseline_yaml_content_hash: Some("doc".to_string()),
            ..SymbolState::default()
        }
    }

    fn file_check(dir: &TempDir) -> FileCheck {
        let mut sidecar = SidecarDoc::new();
        sidecar.insert("func".to_string(), Value::String("D.".to_string()));
        sidecar.insert("gone".to_string(), Value::String("G.".to_string()));
        FileCheck {
            path: "m.py".to_string(),
            package_root: dir.path().to_path_buf(),
            untracked: false,
            public_count: 1,
            states: Vec::new(),
            sidecar,
            sidecar_changed: false,
        }
    }

    #[test]
    fn test_relink_updates_structure_only() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let mut locks = LockManager::new(&ws);
        let mut file = file_check(&dir);
        let state = drifted();
        assert_eq!(classify(&state), Outcome::SignatureDrift);

        let message = apply_resolution(
            &mut file,
            &state,
            ViolationKind::SignatureDrift,
            ResolutionAction::Relink,
            &mut locks,
        )
        .unwrap();
        assert_eq!(message.id, msg::check::STATE_RELINKED);

        let fp = locks.get(dir.path(), "py://m.py#func").unwrap();
        assert_eq!(fp.get(BASELINE_CODE_STRUCTURE_HASH), Some("new"));
        assert_eq!(fp.get(BASELINE_YAML_CONTENT_HASH), Some("doc"));
    }

    #[test]
    fn test_purge_removes_sidecar_key() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let mut locks = LockManager::new(&ws);
        let mut file = file_check(&dir);
        let state = SymbolState {
            fragment: "gone".to_string(),
            suri: "py://m.py#gone".to_string(),
            exists_in_yaml: true,
            ..SymbolState::default()
        };

        let message = apply_resolution(
            &mut file,
            &state,
            ViolationKind::DanglingDoc,
            ResolutionAction::PurgeDoc,
            &mut locks,
        );
        assert!(message.is_some());
        assert!(file.sidecar_changed);
        assert!(!file.sidecar.contains_key("gone"));
        assert!(file.sidecar.contains_key("func"));
    }

    #[test]
    fn test_skip_and_mismatched_actions_do_nothing() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let mut locks = LockManager::new(&ws);
        let mut file = file_check(&dir);
        let state = drifted();

        for action in [ResolutionAction::Skip, ResolutionAction::PurgeDoc] {
            let result =
                apply_resolution(&mut file, &state, ViolationKind::SignatureDrift, action, &mut locks);
            assert!(result.is_none());
        }
        assert!(locks.dirty_packages().is_empty());
        assert!(!file.sidecar_changed);
    }

    #[test]
    fn test_hydrate_choice() {
        assert_eq!(hydrate_choice(ResolutionAction::HydrateOverwrite), HydrateChoice::Overwrite);
        assert_eq!(hydrate_choice(ResolutionAction::HydrateKeepExisting), HydrateChoice::KeepExisting);
        assert_eq!(hydrate_choice(ResolutionAction::Skip), HydrateChoice::Skip);
    }
}
