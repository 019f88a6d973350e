use std::fs;
use std::path::Path;

use relocator::relocate::{ApplyOptions, apply_plan, read_audit, write_rollback_plan};
use relocator::{DriveMap, NativeGateway};
use serde_json::{Value, json};
use tempfile::tempdir;

fn write_plan(path: &Path, rows: &[Value]) {
    let text: String = rows.iter().map(|r| format!("{r}\n")).collect();
    fs::write(path, text).unwrap();
}

#[test]
fn rollback_plan_restores_the_original_layout() {
    let drive = tempdir().unwrap();
    let ops = tempdir().unwrap();
    fs::create_dir_all(drive.path().join("in")).unwrap();
    fs::write(drive.path().join("in").join("a.mp4"), b"a").unwrap();
    fs::write(drive.path().join("in").join("b.mp4"), b"b").unwrap();
    let gw = NativeGateway::new(DriveMap::new().with('X', drive.path()));

    let plan = ops.path().join("plan.jsonl");
    write_plan(
        &plan,
        &[
            json!({"path_id": 1, "src": r"X:\in\a.mp4", "dst": r"X:\lib\a.mp4"}),
            json!({"path_id": 2, "src": r"X:\in\missing.mp4", "dst": r"X:\lib\m.mp4"}),
            json!({"path_id": 3, "src": r"X:\in\b.mp4", "dst": r"X:\lib\b.mp4"}),
        ],
    );
    let applied = apply_plan(&gw, &plan, &ApplyOptions::new(ops.path())).unwrap();
    assert_eq!(applied.summary.ok, 2);

    let rb = write_rollback_plan(&applied.out_jsonl, None).unwrap();
    assert_eq!(rb.entries, 2);
    assert!(rb.source_complete);
    assert_eq!(rb.run_id, applied.run_id);
    assert_eq!(
        rb.out_jsonl,
        applied
            .out_jsonl
            .parent()
            .unwrap()
            .join(format!("rollback_plan_{}.jsonl", applied.run_id))
    );

    let rows: Vec<Value> = fs::read_to_string(&rb.out_jsonl)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows[0]["_meta"]["kind"], json!("rollback_plan"));
    // Newest move first, with src/dst swapped.
    assert_eq!(rows[1]["path_id"], json!("3"));
    assert_eq!(rows[1]["src"], json!(r"X:\lib\b.mp4"));
    assert_eq!(rows[1]["dst"], json!(r"X:\in\b.mp4"));
    assert_eq!(rows[2]["path_id"], json!("1"));

    let undone = apply_plan(&gw, &rb.out_jsonl, &ApplyOptions::new(ops.path())).unwrap();
    assert_eq!(undone.summary.ok, 2);
    assert_eq!(undone.summary.malformed, 0);
    assert_eq!(fs::read(drive.path().join("in").join("a.mp4")).unwrap(), b"a");
    assert_eq!(fs::read(drive.path().join("in").join("b.mp4")).unwrap(), b"b");
    assert!(!drive.path().join("lib").join("a.mp4").exists());
}

#[test]
fn dry_run_results_are_not_rolled_back() {
    let drive = tempdir().unwrap();
    let ops = tempdir().unwrap();
    fs::write(drive.path().join("a.mp4"), b"a").unwrap();
    let gw = NativeGateway::new(DriveMap::new().with('X', drive.path()));
    let plan = ops.path().join("plan.jsonl");
    write_plan(&plan, &[json!({"src": r"X:\a.mp4", "dst": r"X:\b.mp4"})]);
    let mut opts = ApplyOptions::new(ops.path());
    opts.dry_run = true;

    let applied = apply_plan(&gw, &plan, &opts).unwrap();
    let rb = write_rollback_plan(&applied.out_jsonl, Some(&ops.path().join("rb.jsonl"))).unwrap();
    assert_eq!(rb.entries, 0);
    assert_eq!(rb.out_jsonl, ops.path().join("rb.jsonl"));
}

#[test]
fn torn_audit_still_yields_a_partial_rollback() {
    let ops = tempdir().unwrap();
    let audit = ops.path().join("move_apply_x.jsonl");
    let text = [
        json!({"_meta": {"kind": "move_apply", "run_id": "r42"}}).to_string(),
        json!({"op": "move", "ts": "t", "path_id": null, "src": r"C:\a", "dst": r"C:\b", "ok": true})
            .to_string(),
        json!({"op": "move", "ts": "t", "path_id": null, "src": r"C:\c", "dst": r"C:\d", "ok": false, "error": "dst_exists"})
            .to_string(),
        r#"{"op": "move", "ts": "t", "src": "C:\\e"#.to_string(),
    ]
    .join("\n");
    fs::write(&audit, text).unwrap();

    let log = read_audit(&audit).unwrap();
    assert!(!log.complete);
    assert_eq!(log.run_id(), Some("r42"));
    assert_eq!(log.results.len(), 2);

    let rb = write_rollback_plan(&audit, None).unwrap();
    assert!(!rb.source_complete);
    assert_eq!(rb.entries, 1);
    assert_eq!(rb.out_jsonl, ops.path().join("rollback_plan_r42.jsonl"));
}
