//! Audit JSONL: writer used by the executor, tolerant reader, rollback plan builder.
//!
//! The audit is append-only and flushed line by line, so after a crash it still holds
//! every result written before the failure. A file without `_meta_end` is inconclusive
//! for its trailing entries.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::plan::PlanRow;
use crate::errors::RelocateError;
use crate::jsonl::{self, Line, RunMeta};
use crate::snapshot::AtomicSnapshotWriter;

pub const MALFORMED_ENTRY: &str = "malformed_entry";

fn move_op() -> String {
    "move".to_string()
}

/// Outcome of one plan entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    #[serde(default = "move_op")]
    pub op: String,
    pub ts: String,
    pub path_id: Option<String>,
    pub src: String,
    /// Destination actually used, after suffix resolution.
    pub dst: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl MoveResult {
    pub fn success(path_id: Option<String>, src: String, dst: String, dry_run: bool) -> Self {
        Self {
            op: move_op(),
            ts: jsonl::now_iso(),
            path_id,
            src,
            dst,
            ok: true,
            error: None,
            dry_run: dry_run.then_some(true),
        }
    }

    pub fn failure(path_id: Option<String>, src: String, dst: String, error: impl Into<String>) -> Self {
        Self {
            op: move_op(),
            ts: jsonl::now_iso(),
            path_id,
            src,
            dst,
            ok: false,
            error: Some(error.into()),
            dry_run: None,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.ok && self.dry_run != Some(true)
    }
}

/// Counts closing an apply run (`_meta_end`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub entries: u64,
    pub ok: u64,
    pub failed: u64,
    pub malformed: u64,
    pub interrupted: bool,
}

/// Line-flushed audit writer.
pub struct AuditWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl AuditWriter {
    /// Create the audit file and its parent directory. An existing file is an error:
    /// one audit holds exactly one run.
    pub fn create(path: &Path) -> Result<Self, RelocateError> {
        let output_err = |source| RelocateError::OutputCreate {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(output_err)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(output_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.out
            .write_all(line.as_bytes())
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush())
            .with_context(|| format!("append to audit {}", self.path.display()))
    }

    pub fn write_meta(&mut self, meta: &RunMeta) -> Result<()> {
        self.write_line(&meta.to_line())
    }

    pub fn write_result(&mut self, result: &MoveResult) -> Result<()> {
        let line = serde_json::to_string(result).context("serialize move result")?;
        self.write_line(&line)
    }

    pub fn write_malformed(&mut self, line: usize, message: &str) -> Result<()> {
        let rec = json!({
            "kind": "warning",
            "code": MALFORMED_ENTRY,
            "line": line,
            "message": message,
            "ts": jsonl::now_iso(),
        });
        self.write_line(&rec.to_string())
    }

    /// Write `_meta_end` and sync the file to disk.
    pub fn finish(mut self, summary: &ApplySummary) -> Result<PathBuf> {
        let line = jsonl::meta_end_line(summary).context("serialize audit summary")?;
        self.write_line(&line)?;
        let file = self
            .out
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("flush audit {}", self.path.display()))?;
        file.sync_all()
            .with_context(|| format!("sync audit {}", self.path.display()))?;
        Ok(self.path)
    }
}

/// Everything recoverable from an audit file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLog {
    pub meta: Option<Map<String, Value>>,
    pub results: Vec<MoveResult>,
    pub malformed: u64,
    pub summary: Option<ApplySummary>,
    /// `_meta_end` was present.
    pub complete: bool,
}

impl AuditLog {
    pub fn run_id(&self) -> Option<&str> {
        self.meta.as_ref()?.get("run_id")?.as_str()
    }
}

/// Read an audit, skipping lines that do not parse (e.g. a torn trailing line).
pub fn read_audit(path: &Path) -> Result<AuditLog> {
    let file = File::open(path).with_context(|| format!("open audit {}", path.display()))?;
    let mut log = AuditLog::default();
    for (idx, raw) in BufReader::new(file).split(b'\n').enumerate() {
        let raw = raw.with_context(|| format!("read audit {}", path.display()))?;
        let Ok(text) = std::str::from_utf8(&raw) else {
            warn!(line = idx + 1, "audit line is not UTF-8; skipped");
            continue;
        };
        let parsed = match jsonl::parse_line(text) {
            None => continue,
            Some(Ok(l)) => l,
            Some(Err(e)) => {
                warn!(line = idx + 1, error = %e, "unreadable audit line skipped");
                continue;
            }
        };
        match parsed {
            Line::Meta(m) => log.meta = Some(m),
            Line::MetaEnd(m) => {
                log.summary = serde_json::from_value(Value::Object(m)).ok();
                log.complete = true;
            }
            Line::Record(obj) => {
                let op = obj.get("op").and_then(Value::as_str);
                let code = obj.get("code").and_then(Value::as_str);
                if op == Some("move") {
                    match serde_json::from_value::<MoveResult>(Value::Object(obj)) {
                        Ok(r) => log.results.push(r),
                        Err(e) => warn!(line = idx + 1, error = %e, "move record skipped"),
                    }
                } else if code == Some(MALFORMED_ENTRY) {
                    log.malformed += 1;
                }
            }
        }
    }
    Ok(log)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub run_id: String,
    pub out_jsonl: PathBuf,
    pub entries: u64,
    pub source_complete: bool,
}

#[derive(Serialize)]
struct RollbackSummary {
    entries: u64,
}

/// Invert every applied move of `audit` (newest first) into a plan that undoes the run.
pub fn write_rollback_plan(audit: &Path, out: Option<&Path>) -> Result<RollbackReport> {
    let log = read_audit(audit)?;
    let run_id = log
        .run_id()
        .map(str::to_string)
        .unwrap_or_else(jsonl::new_run_id);
    if !log.complete {
        warn!(audit = %audit.display(), "audit has no _meta_end; rollback covers the entries present");
    }
    let target = match out {
        Some(p) => p.to_path_buf(),
        None => audit
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("rollback_plan_{run_id}.jsonl")),
    };

    let mut writer = AtomicSnapshotWriter::create(&target)?;
    let mut entries = 0u64;
    for r in log.results.iter().rev().filter(|r| r.is_applied()) {
        writer.write_record(&PlanRow {
            path_id: r.path_id.clone(),
            src: r.dst.clone(),
            dst: r.src.clone(),
        })?;
        entries += 1;
    }
    let header = RunMeta::new("rollback_plan", &run_id)
        .with("source_audit", audit.display().to_string())
        .with("source_complete", log.complete)
        .with("entries", entries);
    let out_jsonl = writer.publish(&header, &RollbackSummary { entries })?;
    info!(run_id = %run_id, entries, out = %out_jsonl.display(), "rollback plan written");
    Ok(RollbackReport {
        run_id,
        out_jsonl,
        entries,
        source_complete: log.complete,
    })
}
