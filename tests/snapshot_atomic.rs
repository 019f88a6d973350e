use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use relocator::jsonl::RunMeta;
use relocator::platform::temp::is_tmp_sibling;
use relocator::scan::CorruptionProbe;
use relocator::snapshot::{AtomicSnapshotWriter, SnapshotOptions, write_snapshot};
use relocator::{DriveMap, NativeGateway};
use serde_json::{Value, json};
use tempfile::tempdir;

fn lines(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn leftovers(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| is_tmp_sibling(n))
        .collect()
}

fn publish(target: &Path, generation: u64, records: u64) {
    let mut w = AtomicSnapshotWriter::create(target).unwrap();
    for i in 0..records {
        w.write_record(&json!({"kind": "file", "gen": generation, "i": i}))
            .unwrap();
    }
    let meta = RunMeta::new("snapshot", &format!("gen{generation}"));
    w.publish(&meta, &json!({"files": records})).unwrap();
}

#[test]
fn concurrent_reader_never_sees_a_partial_artifact() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("snapshot.jsonl");
    publish(&target, 0, 50);

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let done = Arc::clone(&done);
        let target = target.clone();
        thread::spawn(move || {
            let mut reads = 0u64;
            while !done.load(Ordering::SeqCst) {
                let Ok(text) = fs::read_to_string(&target) else {
                    // Windows may briefly refuse the open while the rename is in flight.
                    continue;
                };
                let parsed: Vec<Value> = text
                    .lines()
                    .map(|l| serde_json::from_str(l).expect("every line is whole JSON"))
                    .collect();
                assert!(parsed.first().unwrap().get("_meta").is_some());
                assert!(parsed.last().unwrap().get("_meta_end").is_some());
                let expected = parsed.last().unwrap()["_meta_end"]["files"].as_u64().unwrap();
                assert_eq!(parsed.len() as u64, expected + 2);
                reads += 1;
            }
            reads
        })
    };

    for generation in 1..=20 {
        publish(&target, generation, 50 + generation * 10);
    }
    done.store(true, Ordering::SeqCst);
    let reads = reader.join().expect("reader saw a torn artifact");
    assert!(reads > 0);

    let last = lines(&target);
    assert_eq!(last[0]["_meta"]["run_id"], json!("gen20"));
    assert!(leftovers(dir.path()).is_empty());
}

#[test]
fn abandoned_writer_leaves_previous_artifact_and_no_temps() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("inv.jsonl");
    publish(&target, 1, 3);
    {
        let mut w = AtomicSnapshotWriter::create(&target).unwrap();
        w.write_record(&json!({"kind": "file", "gen": 2})).unwrap();
        assert_eq!(leftovers(dir.path()).len(), 1);
    }
    assert!(leftovers(dir.path()).is_empty());
    assert_eq!(lines(&target)[0]["_meta"]["run_id"], json!("gen1"));
}

fn media_tree() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path().join("media");
    fs::create_dir_all(root.join("s1")).unwrap();
    fs::write(root.join("s1").join("e1.mkv"), b"abc").unwrap();
    fs::write(root.join("s1").join("e2.mkv"), b"").unwrap();
    fs::write(root.join("cover.jpg"), b"jpg").unwrap();
    dir
}

#[test]
fn snapshot_records_every_file_with_hash_and_probe() {
    let drive = media_tree();
    let ops = tempdir().unwrap();
    let gw = NativeGateway::new(DriveMap::new().with('M', drive.path()));
    let mut opts = SnapshotOptions::new(r"M:\media", ops.path());
    opts.hash = true;
    opts.probe = Some(CorruptionProbe::default());

    let report = write_snapshot(&gw, &opts).unwrap();
    assert_eq!(report.files, 3);
    assert_eq!(report.warnings, 0);
    assert!(!report.truncated);
    assert_eq!(
        report.out_jsonl,
        ops.path()
            .join("snapshot")
            .join(format!("snapshot_{}.jsonl", report.run_id))
    );

    let all = lines(&report.out_jsonl);
    assert_eq!(all[0]["_meta"]["kind"], json!("snapshot"));
    assert_eq!(all[0]["_meta"]["root"], json!(r"M:\media"));
    assert_eq!(all[0]["_meta"]["files"], json!(3));
    let e1 = all.iter().find(|v| v["name"] == json!("e1.mkv")).unwrap();
    assert_eq!(e1["kind"], json!("file"));
    assert_eq!(e1["path"], json!(r"M:\media\s1\e1.mkv"));
    assert_eq!(e1["dir"], json!(r"M:\media\s1"));
    assert_eq!(e1["size"], json!(3));
    assert_eq!(
        e1["sha256"],
        json!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );
    let e2 = all.iter().find(|v| v["name"] == json!("e2.mkv")).unwrap();
    assert_eq!(e2["corruptCandidate"], json!(true));
    assert_eq!(e2["corruptReason"], json!("size_zero"));
    assert!(leftovers(&ops.path().join("snapshot")).is_empty());
}

#[test]
fn limit_truncates_and_is_reported() {
    let drive = media_tree();
    let ops = tempdir().unwrap();
    let gw = NativeGateway::new(DriveMap::new().with('M', drive.path()));
    let mut opts = SnapshotOptions::new(r"M:\media", ops.path());
    opts.limit = Some(1);
    opts.out = Some(ops.path().join("custom.jsonl"));

    let report = write_snapshot(&gw, &opts).unwrap();
    assert_eq!(report.files, 1);
    assert!(report.truncated);
    let all = lines(&ops.path().join("custom.jsonl"));
    assert_eq!(all.len(), 3);
    assert_eq!(all[2]["_meta_end"]["truncated"], json!(true));
}

#[test]
fn missing_root_fails_without_an_artifact() {
    let drive = tempdir().unwrap();
    let ops = tempdir().unwrap();
    let gw = NativeGateway::new(DriveMap::new().with('M', drive.path()));
    let opts = SnapshotOptions::new(r"M:\nowhere", ops.path());
    let err = write_snapshot(&gw, &opts).unwrap_err();
    let re = err.downcast_ref::<relocator::RelocateError>().unwrap();
    assert_eq!(re.code(), "root_not_found");
    assert!(!ops.path().join("snapshot").exists());
}
