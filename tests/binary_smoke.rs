use std::fs;
use std::process::Command;

use serde_json::{Value, json};
use tempfile::tempdir;

fn stdout_json(out: &std::process::Output) -> Value {
    let text = String::from_utf8_lossy(&out.stdout);
    let line = text.lines().last().expect("one JSON line on stdout");
    serde_json::from_str(line).expect("stdout is JSON")
}

#[test]
fn binary_print_config_reports_config_source() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("relocator.xml");
    fs::write(&cfg, "<config><on_dst_exists>rename_suffix</on_dst_exists></config>").unwrap();

    let me = assert_cmd::cargo::cargo_bin!("relocator");
    let out = Command::new(me)
        .env("RELOCATOR_CONFIG", &cfg)
        .arg("print-config")
        .output()
        .expect("spawn binary");
    assert!(out.status.success(), "print-config should succeed");
    let v = stdout_json(&out);
    assert_eq!(v["on_dst_exists"], json!("rename_suffix"));
    assert_eq!(v["loaded_from"], json!(cfg.display().to_string()));
}

#[test]
fn binary_apply_moves_and_prints_summary() {
    let drive = tempdir().unwrap();
    let ops = tempdir().unwrap();
    fs::write(drive.path().join("a.mp4"), b"a").unwrap();
    let plan = ops.path().join("plan.jsonl");
    fs::write(
        &plan,
        format!("{}\n", json!({"src": r"X:\a.mp4", "dst": r"X:\sorted\a.mp4"})),
    )
    .unwrap();

    let me = assert_cmd::cargo::cargo_bin!("relocator");
    let out = Command::new(me)
        .env("RELOCATOR_CONFIG", ops.path().join("no-such-config.xml"))
        .arg("--ops-root")
        .arg(ops.path())
        .arg("--drive")
        .arg(format!("X={}", drive.path().display()))
        .arg("apply")
        .arg(&plan)
        .output()
        .expect("spawn binary");
    assert!(
        out.status.success(),
        "apply failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v = stdout_json(&out);
    assert_eq!(v["entries"], json!(1));
    assert_eq!(v["ok"], json!(1));
    assert!(drive.path().join("sorted").join("a.mp4").exists());
}

#[test]
fn binary_missing_plan_fails() {
    let ops = tempdir().unwrap();
    let me = assert_cmd::cargo::cargo_bin!("relocator");
    let out = Command::new(me)
        .env("RELOCATOR_CONFIG", ops.path().join("no-such-config.xml"))
        .arg("--ops-root")
        .arg(ops.path())
        .arg("apply")
        .arg(ops.path().join("missing.jsonl"))
        .output()
        .expect("spawn binary");
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}
