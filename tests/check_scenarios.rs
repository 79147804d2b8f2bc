mod common;

use common::TestWorkspace;
use stitcher::check::{CheckOptions, ViolationKind};
use stitcher::feedback::{msg, MemoryFeedback};
use stitcher::fingerprint::{sha256_hex, BASELINE_CODE_STRUCTURE_HASH, BASELINE_YAML_CONTENT_HASH};
use stitcher::interaction::{ResolutionAction, ScriptedInteractionHandler};

const SOURCE: &str = "def func(a: int):\n    \"\"\"D.\"\"\"\n    return a\n";
const SURI: &str = "py://src/m.py#func";
const LOCK: &str = "stitcher.lock";

/// S1 setup: sidecar `func: D.`, baselines recorded, doc string stripped from code
fn synchronized() -> TestWorkspace {
    let ws = TestWorkspace::new().with_file("src/m.py", SOURCE);
    let feedback = MemoryFeedback::new();
    let app = ws.app(&feedback);
    app.init().unwrap();
    app.strip().unwrap();
    ws
}

fn check(ws: &TestWorkspace, options: CheckOptions) -> (bool, MemoryFeedback) {
    let feedback = MemoryFeedback::new();
    let report = ws.app(&feedback).check(&options, true).unwrap();
    (report.success(), feedback)
}

#[test]
fn synchronized_check_reports_only_success() {
    let ws = synchronized();
    assert_eq!(ws.read("src/m.stitcher.yaml"), "func: D.\n");
    assert_eq!(
        ws.baseline(LOCK, SURI, BASELINE_CODE_STRUCTURE_HASH).unwrap(),
        sha256_hex("name:func|async:false|static:false|class:false|ret:|a:POSITIONAL_OR_KEYWORD:int:")
    );

    let (success, feedback) = check(&ws, CheckOptions::default());
    assert!(success);
    assert_eq!(feedback.ids(), vec![msg::check::RUN_SUCCESS]);
}

#[test]
fn doc_left_in_code_is_redundant_warning() {
    let ws = TestWorkspace::new().with_file("src/m.py", SOURCE);
    ws.app(&MemoryFeedback::new()).init().unwrap();
    assert_eq!(ws.read("src/m.stitcher.yaml"), "func: D.\n");

    let (success, feedback) = check(&ws, CheckOptions::default());
    assert!(success);
    let redundant = feedback.find(msg::check::ISSUE_REDUNDANT);
    assert_eq!(redundant.len(), 1);
    assert_eq!(redundant[0].param("key"), Some("func"));
    assert!(!feedback.has(msg::check::RUN_SUCCESS));
}

#[test]
fn doc_improvement_updates_yaml_baseline() {
    let ws = synchronized();
    let structure = ws.baseline(LOCK, SURI, BASELINE_CODE_STRUCTURE_HASH);
    ws.write("src/m.stitcher.yaml", "func: Better D.\n");

    let (success, feedback) = check(&ws, CheckOptions::default());
    assert!(success);
    let updated = feedback.find(msg::check::STATE_DOC_UPDATED);
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].param("key"), Some("func"));

    assert_eq!(
        ws.baseline(LOCK, SURI, BASELINE_YAML_CONTENT_HASH).unwrap(),
        sha256_hex("Better D.")
    );
    assert_eq!(ws.baseline(LOCK, SURI, BASELINE_CODE_STRUCTURE_HASH), structure);

    // Accepted: a second run is clean
    let (success, feedback) = check(&ws, CheckOptions::default());
    assert!(success);
    assert_eq!(feedback.ids(), vec![msg::check::RUN_SUCCESS]);
}

#[test]
fn signature_drift_fails_until_relinked() {
    let ws = synchronized();
    let yaml_hash = ws.baseline(LOCK, SURI, BASELINE_YAML_CONTENT_HASH);
    ws.write("src/m.py", "def func(a: str):\n    return a\n");

    let (success, feedback) = check(&ws, CheckOptions::default());
    assert!(!success);
    let drift = feedback.find(msg::check::STATE_SIGNATURE_DRIFT);
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].param("key"), Some("func"));
    assert!(feedback.has(msg::check::RUN_FAIL));

    let (success, feedback) = check(
        &ws,
        CheckOptions {
            force_relink: true,
            ..CheckOptions::default()
        },
    );
    assert!(success);
    assert!(feedback.has(msg::check::STATE_RELINKED));
    assert_eq!(
        ws.baseline(LOCK, SURI, BASELINE_CODE_STRUCTURE_HASH).unwrap(),
        sha256_hex("name:func|async:false|static:false|class:false|ret:|a:POSITIONAL_OR_KEYWORD:str:")
    );
    assert_eq!(ws.baseline(LOCK, SURI, BASELINE_YAML_CONTENT_HASH), yaml_hash);
}

#[test]
fn co_evolution_needs_reconcile() {
    let ws = synchronized();
    ws.write("src/m.py", "def func(a: str):\n    return a\n");
    ws.write("src/m.stitcher.yaml", "func: New.\n");

    let (success, feedback) = check(&ws, CheckOptions::default());
    assert!(!success);
    assert!(feedback.has(msg::check::STATE_CO_EVOLUTION));

    // Relinking alone does not settle a co-evolution
    let (success, _) = check(
        &ws,
        CheckOptions {
            force_relink: true,
            ..CheckOptions::default()
        },
    );
    assert!(!success);
    assert_eq!(
        ws.baseline(LOCK, SURI, BASELINE_YAML_CONTENT_HASH).unwrap(),
        sha256_hex("D.")
    );
}

#[test]
fn co_evolution_reconcile_accepts_both() {
    let ws = synchronized();
    ws.write("src/m.py", "def func(a: str):\n    return a\n");
    ws.write("src/m.stitcher.yaml", "func: New.\n");

    let (success, feedback) = check(
        &ws,
        CheckOptions {
            reconcile: true,
            ..CheckOptions::default()
        },
    );
    assert!(success);
    assert!(feedback.has(msg::check::STATE_RECONCILED));
    assert_eq!(
        ws.baseline(LOCK, SURI, BASELINE_YAML_CONTENT_HASH).unwrap(),
        sha256_hex("New.")
    );
    assert_eq!(
        ws.baseline(LOCK, SURI, BASELINE_CODE_STRUCTURE_HASH).unwrap(),
        sha256_hex("name:func|async:false|static:false|class:false|ret:|a:POSITIONAL_OR_KEYWORD:str:")
    );
}

#[test]
fn dangling_doc_purged_on_request() {
    let ws = TestWorkspace::new()
        .with_file("src/m.py", "def func_a():\n    pass\n")
        .with_file("src/m.stitcher.yaml", "dangling: Gone.\nfunc_a: A.\n");

    let feedback = MemoryFeedback::new();
    let mut handler = ScriptedInteractionHandler::new(ResolutionAction::Skip)
        .on_kind(ViolationKind::DanglingDoc, ResolutionAction::PurgeDoc);
    let report = ws
        .app(&feedback)
        .check_with(&CheckOptions::default(), &mut handler)
        .unwrap();

    assert!(report.success());
    assert_eq!(handler.seen().len(), 1);
    assert_eq!(handler.seen()[0].fragment, "dangling");
    assert!(feedback.has(msg::check::STATE_PURGED));
    assert_eq!(ws.read("src/m.stitcher.yaml"), "func_a: A.\n");
}

#[test]
fn purging_last_entry_deletes_sidecar() {
    let ws = TestWorkspace::new()
        .with_file("src/m.py", "def _helper():\n    pass\n")
        .with_file("src/m.stitcher.yaml", "dangling: Gone.\n");

    let feedback = MemoryFeedback::new();
    let mut handler = ScriptedInteractionHandler::new(ResolutionAction::PurgeDoc);
    let report = ws
        .app(&feedback)
        .check_with(&CheckOptions::default(), &mut handler)
        .unwrap();

    assert!(report.success());
    assert!(feedback.has(msg::check::STATE_SIDECAR_DELETED));
    assert!(!ws.exists("src/m.stitcher.yaml"));
}

#[test]
fn skipped_dangling_doc_fails_non_interactive() {
    let ws = TestWorkspace::new()
        .with_file("src/m.py", "def func_a():\n    pass\n")
        .with_file("src/m.stitcher.yaml", "dangling: Gone.\nfunc_a: A.\n");

    let (success, feedback) = check(&ws, CheckOptions::default());
    assert!(!success);
    assert!(feedback.has(msg::check::STATE_DANGLING_DOC));
    assert_eq!(ws.read("src/m.stitcher.yaml"), "dangling: Gone.\nfunc_a: A.\n");
}

#[test]
fn legacy_signatures_are_migrated_once() {
    let ws = synchronized();
    let lock = ws.read(LOCK);
    std::fs::remove_file(ws.path(LOCK)).unwrap();

    let fingerprints = serde_json::from_str::<serde_json::Value>(&lock).unwrap()["fingerprints"][SURI].clone();
    ws.write(
        ".stitcher/signatures/src/m.json",
        &serde_json::json!({ "func": fingerprints }).to_string(),
    );

    let (success, feedback) = check(&ws, CheckOptions::default());
    assert!(success);
    assert!(feedback.has(msg::lock::LEGACY_MIGRATED));
    assert!(!ws.exists(".stitcher/signatures"));
    assert!(ws.exists(LOCK));

    let (_, feedback) = check(&ws, CheckOptions::default());
    assert!(!feedback.has(msg::lock::LEGACY_MIGRATED));
}
