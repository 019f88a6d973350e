//! Retention for the `move/` artifact directory.
//!
//! Keeps the newest `keep_batches` audits and rollback plans plus the newest inventory;
//! every other `*.jsonl` is moved into `archive/` and gzipped. Archived `*.gz` older than
//! the TTL are deleted.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::gateway::io_error_with_help;

pub const ARCHIVE_DIR: &str = "archive";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotateOptions {
    pub keep_batches: usize,
    pub ttl_days: u64,
}

impl Default for RotateOptions {
    fn default() -> Self {
        Self {
            keep_batches: 5,
            ttl_days: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RotateReport {
    pub kept: u64,
    pub archived: u64,
    pub purged: u64,
}

/// Plain files directly inside `dir` whose names satisfy `pred`, newest first.
fn newest_first(dir: &Path, pred: impl Fn(&str) -> bool) -> Vec<(PathBuf, String)> {
    let mut files: Vec<(SystemTime, PathBuf, String)> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            if !pred(&name) {
                return None;
            }
            let mtime = e.metadata().ok()?.modified().ok()?;
            Some((mtime, e.into_path(), name))
        })
        .collect();
    files.sort_by(|a, b| (b.0, &b.2).cmp(&(a.0, &a.2)));
    files.into_iter().map(|(_, p, n)| (p, n)).collect()
}

fn is_artifact(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix) && name.ends_with(".jsonl")
}

/// `<file>.gz` next to `src`, then remove `src`. An existing `.gz` is left alone and
/// `src` is kept.
fn gzip_file(src: &Path) -> io::Result<PathBuf> {
    let mut name = src.as_os_str().to_os_string();
    name.push(".gz");
    let dst = PathBuf::from(name);
    if dst.exists() {
        return Ok(dst);
    }
    let mut input = BufReader::new(File::open(src)?);
    let mut enc = GzEncoder::new(BufWriter::new(File::create(&dst)?), Compression::best());
    io::copy(&mut input, &mut enc)?;
    let out = enc.finish()?;
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    fs::remove_file(src)?;
    Ok(dst)
}

pub fn rotate_move_dir(move_dir: &Path, opts: &RotateOptions) -> Result<RotateReport> {
    let mut report = RotateReport::default();
    if !move_dir.is_dir() {
        debug!(dir = %move_dir.display(), "nothing to rotate");
        return Ok(report);
    }
    let archive = move_dir.join(ARCHIVE_DIR);

    let mut keep: HashSet<String> = HashSet::new();
    for prefix in ["move_apply_", "rollback_plan_"] {
        keep.extend(
            newest_first(move_dir, |n| is_artifact(n, prefix))
                .into_iter()
                .take(opts.keep_batches)
                .map(|(_, n)| n),
        );
    }
    keep.extend(
        newest_first(move_dir, |n| is_artifact(n, "inventory_"))
            .into_iter()
            .take(1)
            .map(|(_, n)| n),
    );

    for (path, name) in newest_first(move_dir, |n| n.ends_with(".jsonl")) {
        if keep.contains(&name) {
            report.kept += 1;
            continue;
        }
        fs::create_dir_all(&archive)
            .with_context(|| format!("create archive dir {}", archive.display()))?;
        let dest = archive.join(&name);
        if !dest.exists() {
            fs::rename(&path, &dest).map_err(io_error_with_help("archive", &path))?;
        }
        match gzip_file(&dest) {
            Ok(gz) => debug!(file = %gz.display(), "archived"),
            Err(e) => warn!(file = %dest.display(), error = %e, "gzip failed; left uncompressed"),
        }
        report.archived += 1;
    }

    if archive.is_dir() {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(opts.ttl_days.saturating_mul(86_400)))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        for (path, _) in newest_first(&archive, |n| n.ends_with(".gz")) {
            let expired = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(|t| t < cutoff)
                .unwrap_or(false);
            if expired {
                fs::remove_file(&path).map_err(io_error_with_help("purge", &path))?;
                report.purged += 1;
            }
        }
    }

    info!(
        dir = %move_dir.display(),
        kept = report.kept,
        archived = report.archived,
        purged = report.purged,
        "rotation finished"
    );
    Ok(report)
}
