//! Atomic publication of JSONL artifacts, and the tree snapshot run built on it.
//!
//! Records stream into a private body temp file next to the target. `publish` writes the
//! `_meta` header into a second temp file, appends the body and the `_meta_end` line,
//! syncs, and renames over the target. A reader of the target therefore sees either the
//! previous complete artifact or the new one, never a partial file. Both temp files are
//! removed on every exit path.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::RelocateError;
use crate::gateway::FileSystemGateway;
use crate::jsonl::{self, RunMeta};
use crate::platform::{self, temp::tmp_sibling_name};
use crate::scan::{CorruptionProbe, TreeWalker, WalkEvent, WalkOptions};
use crate::shutdown;

pub struct AtomicSnapshotWriter {
    target: PathBuf,
    body_path: PathBuf,
    body: Option<BufWriter<File>>,
    final_path: Option<PathBuf>,
    records: u64,
}

impl AtomicSnapshotWriter {
    /// Create the body temp file next to `target` (creating the parent directory).
    pub fn create(target: &Path) -> Result<Self, RelocateError> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RelocateError::OutputCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let body_path = tmp_sibling_name(target, "body");
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&body_path)
            .map_err(|source| RelocateError::TempFile {
                path: body_path.clone(),
                source,
            })?;
        debug!(target = %target.display(), tmp = %body_path.display(), "snapshot body opened");
        Ok(Self {
            target: target.to_path_buf(),
            body_path,
            body: Some(BufWriter::new(file)),
            final_path: None,
            records: 0,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Append one record as a JSON line.
    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let body = self
            .body
            .as_mut()
            .context("snapshot writer already published")?;
        serde_json::to_writer(&mut *body, record)
            .with_context(|| format!("write record to {}", self.body_path.display()))?;
        body.write_all(b"\n")
            .with_context(|| format!("write record to {}", self.body_path.display()))?;
        self.records += 1;
        Ok(())
    }

    /// Header + body + summary into the final temp file, then rename over the target.
    pub fn publish(mut self, header: &RunMeta, summary: &impl Serialize) -> Result<PathBuf> {
        let body = self
            .body
            .take()
            .context("snapshot writer already published")?;
        body.into_inner()
            .map_err(|e| e.into_error())
            .and_then(|f| f.sync_all())
            .with_context(|| format!("flush {}", self.body_path.display()))?;

        let final_path = tmp_sibling_name(&self.target, "final");
        self.final_path = Some(final_path.clone());
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&final_path)
            .map_err(|source| RelocateError::TempFile {
                path: final_path.clone(),
                source,
            })?;
        let mut out = BufWriter::new(file);
        let compose = (|| -> io::Result<File> {
            writeln!(out, "{}", header.to_line())?;
            let mut body = BufReader::new(File::open(&self.body_path)?);
            io::copy(&mut body, &mut out)?;
            let end = jsonl::meta_end_line(summary).map_err(io::Error::other)?;
            writeln!(out, "{end}")?;
            let file = out.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(file)
        })();
        drop(compose.with_context(|| format!("compose {}", final_path.display()))?);

        fs::rename(&final_path, &self.target).with_context(|| {
            format!(
                "publish '{}' -> '{}'",
                final_path.display(),
                self.target.display()
            )
        })?;
        self.final_path = None;
        if let Some(parent) = self.target.parent() {
            let _ = platform::fsync_dir(parent);
        }
        info!(target = %self.target.display(), records = self.records, "artifact published");
        Ok(self.target.clone())
    }
}

impl Drop for AtomicSnapshotWriter {
    fn drop(&mut self) {
        self.body.take();
        let _ = fs::remove_file(&self.body_path);
        if let Some(p) = self.final_path.take() {
            let _ = fs::remove_file(p);
        }
    }
}

/// Parameters of a snapshot run.
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// Drive-rooted root to walk.
    pub root: String,
    pub ops_root: PathBuf,
    /// Defaults to `<ops_root>/snapshot/snapshot_<run_id>.jsonl`.
    pub out: Option<PathBuf>,
    pub hash: bool,
    /// Stop after this many file records.
    pub limit: Option<u64>,
    pub probe: Option<CorruptionProbe>,
    pub retry_count: u32,
}

impl SnapshotOptions {
    pub fn new(root: impl Into<String>, ops_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ops_root: ops_root.into(),
            out: None,
            hash: false,
            limit: None,
            probe: None,
            retry_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    pub run_id: String,
    pub out_jsonl: PathBuf,
    pub files: u64,
    pub warnings: u64,
    pub truncated: bool,
}

#[derive(Serialize)]
struct SnapshotSummary {
    files: u64,
    warnings: u64,
    truncated: bool,
}

/// Walk one root and atomically publish every record.
pub fn write_snapshot<G>(gw: &G, opts: &SnapshotOptions) -> Result<SnapshotReport>
where
    G: FileSystemGateway + ?Sized,
{
    let run_id = jsonl::new_run_id();
    let target = opts.out.clone().unwrap_or_else(|| {
        opts.ops_root
            .join("snapshot")
            .join(format!("snapshot_{run_id}.jsonl"))
    });
    let walk_opts = WalkOptions {
        extensions: None,
        probe: opts.probe,
        hash: opts.hash,
        retry_count: opts.retry_count,
    };
    let walker = TreeWalker::new(gw, &opts.root, walk_opts)?;
    let root_normal = walker.root().to_normal();
    let mut writer = AtomicSnapshotWriter::create(&target)?;
    info!(run_id = %run_id, root = %root_normal, out = %target.display(), "snapshot started");

    let (mut files, mut warnings, mut truncated) = (0u64, 0u64, false);
    for ev in walker {
        if shutdown::is_requested() {
            return Err(RelocateError::Interrupted.into());
        }
        if opts.limit.is_some_and(|limit| files >= limit) {
            truncated = true;
            break;
        }
        match &ev {
            WalkEvent::File(_) => files += 1,
            WalkEvent::Warning(_) => warnings += 1,
        }
        writer.write_record(&ev)?;
    }

    let header = RunMeta::new("snapshot", &run_id)
        .with("root", &root_normal)
        .with("hash", opts.hash)
        .with("limit", opts.limit)
        .with("files", files)
        .with("warnings", warnings)
        .with("truncated", truncated);
    let out_jsonl = writer.publish(
        &header,
        &SnapshotSummary {
            files,
            warnings,
            truncated,
        },
    )?;
    Ok(SnapshotReport {
        run_id,
        out_jsonl,
        files,
        warnings,
        truncated,
    })
}
