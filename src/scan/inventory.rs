//! Multi-root inventory run: walk each root with an extension filter and publish one
//! JSONL artifact holding every matched file and every warning.

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use tracing::{info, warn};

use super::probe::CorruptionProbe;
use super::record::{WalkEvent, Warning, WarningCode};
use super::walker::{TreeWalker, WalkOptions, normalize_extensions};
use crate::errors::RelocateError;
use crate::gateway::FileSystemGateway;
use crate::jsonl::{self, RunMeta};
use crate::path_codec;
use crate::shutdown;
use crate::snapshot::AtomicSnapshotWriter;

#[derive(Debug, Clone)]
pub struct InventoryOptions {
    pub roots: Vec<String>,
    /// Normalized with [`normalize_extensions`]; empty means `.mp4`.
    pub extensions: BTreeSet<String>,
    pub detect_corruption: bool,
    pub read_bytes: usize,
    pub retry_count: u32,
    pub ops_root: PathBuf,
    /// Defaults to `<ops_root>/move/inventory_<run_id>.jsonl`.
    pub out: Option<PathBuf>,
}

impl InventoryOptions {
    pub fn new(roots: Vec<String>, ops_root: impl Into<PathBuf>) -> Self {
        Self {
            roots,
            extensions: normalize_extensions([".mp4"]),
            detect_corruption: false,
            read_bytes: super::probe::DEFAULT_READ_BYTES,
            retry_count: 1,
            ops_root: ops_root.into(),
            out: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryReport {
    pub run_id: String,
    pub out_jsonl: PathBuf,
    pub files: u64,
    pub warnings: u64,
    pub roots_failed: u64,
}

#[derive(Serialize)]
struct InventorySummary {
    files: u64,
    warnings: u64,
    roots_failed: u64,
}

fn root_key(root: &str) -> String {
    let normal = path_codec::to_long_literal(root)
        .map(|lit| lit.to_normal())
        .unwrap_or_else(|_| path_codec::normalize_separators(root));
    normal.trim_end_matches('\\').to_lowercase()
}

/// True when two roots are equal or one lies under the other.
fn roots_overlap(roots: &[String]) -> bool {
    let keys: Vec<String> = roots.iter().map(|r| root_key(r)).collect();
    keys.iter().enumerate().any(|(i, a)| {
        keys[i + 1..].iter().any(|b| {
            a == b || a.starts_with(&format!("{b}\\")) || b.starts_with(&format!("{a}\\"))
        })
    })
}

pub fn run_inventory<G>(gw: &G, opts: &InventoryOptions) -> Result<InventoryReport>
where
    G: FileSystemGateway + ?Sized,
{
    let run_id = jsonl::new_run_id();
    let target = opts.out.clone().unwrap_or_else(|| {
        opts.ops_root
            .join("move")
            .join(format!("inventory_{run_id}.jsonl"))
    });
    let extensions = if opts.extensions.is_empty() {
        normalize_extensions([".mp4"])
    } else {
        normalize_extensions(&opts.extensions)
    };
    let mut writer = AtomicSnapshotWriter::create(&target)?;
    info!(run_id = %run_id, roots = opts.roots.len(), out = %target.display(), "inventory started");

    let mut report = InventoryReport {
        run_id: run_id.clone(),
        ..InventoryReport::default()
    };
    // Only overlapping roots can reach the same file twice.
    let mut seen: Option<HashSet<String>> = roots_overlap(&opts.roots).then(HashSet::new);

    for root in &opts.roots {
        let walk_opts = WalkOptions {
            extensions: Some(extensions.clone()),
            probe: opts
                .detect_corruption
                .then(|| CorruptionProbe::new(opts.read_bytes)),
            hash: false,
            retry_count: opts.retry_count,
        };
        let walker = match TreeWalker::new(gw, root, walk_opts) {
            Ok(w) => w,
            Err(e) => {
                warn!(root = %root, code = e.code(), error = %e, "root skipped");
                report.roots_failed += 1;
                report.warnings += 1;
                let mut w = Warning::new(WarningCode::EnumerateRootFailed, root.clone(), e.to_string());
                w.root = Some(root.clone());
                writer.write_record(&WalkEvent::Warning(w))?;
                continue;
            }
        };
        let root_normal = walker.root().to_normal();
        for ev in walker {
            if shutdown::is_requested() {
                return Err(RelocateError::Interrupted.into());
            }
            let ev = match ev {
                WalkEvent::File(f) => {
                    if let Some(seen) = seen.as_mut() {
                        if !seen.insert(f.full_path.to_lowercase()) {
                            continue;
                        }
                    }
                    report.files += 1;
                    WalkEvent::File(f)
                }
                WalkEvent::Warning(mut w) => {
                    report.warnings += 1;
                    w.root = Some(root_normal.clone());
                    WalkEvent::Warning(w)
                }
            };
            writer.write_record(&ev)?;
        }
    }

    let header = RunMeta::new("inventory", &run_id)
        .with("roots", &opts.roots)
        .with("extensions", &extensions)
        .with("detect_corruption", opts.detect_corruption)
        .with("corruption_read_bytes", opts.read_bytes)
        .with("scan_retry_count", opts.retry_count);
    report.out_jsonl = writer.publish(
        &header,
        &InventorySummary {
            files: report.files,
            warnings: report.warnings,
            roots_failed: report.roots_failed,
        },
    )?;
    info!(
        run_id = %run_id,
        files = report.files,
        warnings = report.warnings,
        roots_failed = report.roots_failed,
        "inventory published"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn disjoint_roots_do_not_overlap() {
        assert!(!roots_overlap(&roots(&[r"X:\lib", r"X:\library", r"Y:\lib"])));
        assert!(!roots_overlap(&roots(&[r"X:\lib"])));
    }

    #[test]
    fn nested_or_repeated_roots_overlap() {
        assert!(roots_overlap(&roots(&[r"X:\lib", r"x:/LIB/shows"])));
        assert!(roots_overlap(&roots(&[r"X:\lib", r"X:\lib"])));
        assert!(roots_overlap(&roots(&[r"\\?\X:\lib\a", r"X:\lib"])));
    }
}
