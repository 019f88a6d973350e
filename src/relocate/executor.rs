//! Sequential plan executor.
//!
//! Entries run strictly in plan order and one failure never stops the run. Each entry
//! goes through validation, existence checks, collision handling and the move itself;
//! the first failing step decides its `error` code. Re-applying a finished plan is safe:
//! every already-moved entry fails with `src_not_found` and nothing is touched.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::audit::{ApplySummary, AuditWriter, MoveResult};
use super::lease::RunLease;
use super::plan::{MoveEntry, PlanItem, open_plan};
use super::unique::{UniqueNameError, resolve_unique_destination};
use crate::gateway::FileSystemGateway;
use crate::jsonl::{self, RunMeta};
use crate::path_codec::{self, PathValidationError};
use crate::shutdown;

/// What to do when the destination already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDstExists {
    #[default]
    Error,
    RenameSuffix,
}

impl OnDstExists {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnDstExists::Error => "error",
            OnDstExists::RenameSuffix => "rename_suffix",
        }
    }
}

impl fmt::Display for OnDstExists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnDstExists {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "error" => Ok(OnDstExists::Error),
            "rename_suffix" => Ok(OnDstExists::RenameSuffix),
            other => Err(format!("unknown on_dst_exists policy '{other}' (error|rename_suffix)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub ops_root: PathBuf,
    pub dry_run: bool,
    pub on_dst_exists: OnDstExists,
    /// Defaults to `<ops_root>/move/move_apply_<run_id>.jsonl`.
    pub out: Option<PathBuf>,
    pub lease: bool,
}

impl ApplyOptions {
    pub fn new(ops_root: impl Into<PathBuf>) -> Self {
        Self {
            ops_root: ops_root.into(),
            dry_run: false,
            on_dst_exists: OnDstExists::Error,
            out: None,
            lease: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub run_id: String,
    pub out_jsonl: PathBuf,
    #[serde(flatten)]
    pub summary: ApplySummary,
}

/// Applies plan entries against one gateway.
pub struct PlanExecutor<'g, G: FileSystemGateway + ?Sized> {
    gw: &'g G,
    dry_run: bool,
    on_dst_exists: OnDstExists,
}

/// Audit error code for a pair of paths; the embedded-drive check wins over the rest.
fn validation_code(src: &str, dst: &str) -> Option<&'static str> {
    let errs: Vec<PathValidationError> = [src, dst]
        .into_iter()
        .filter_map(|p| path_codec::validate_drive_rooted(p).err())
        .collect();
    if errs
        .iter()
        .any(|e| matches!(e, PathValidationError::EmbeddedDrive(_)))
    {
        return Some("invalid_path_embedded_drive");
    }
    errs.first().map(PathValidationError::audit_code)
}

impl<'g, G: FileSystemGateway + ?Sized> PlanExecutor<'g, G> {
    pub fn new(gw: &'g G, dry_run: bool, on_dst_exists: OnDstExists) -> Self {
        Self {
            gw,
            dry_run,
            on_dst_exists,
        }
    }

    /// Run one entry to a result. Never fails: every problem becomes `ok:false`.
    pub fn apply_entry(&self, entry: &MoveEntry) -> MoveResult {
        let path_id = entry.path_id.clone();
        let (src, dst) = match (&entry.src, &entry.dst) {
            (Some(s), Some(d)) => (
                path_codec::normalize_separators(s),
                path_codec::normalize_separators(d),
            ),
            (s, d) => {
                let src = s.as_deref().map(path_codec::normalize_separators).unwrap_or_default();
                let dst = d.as_deref().map(path_codec::normalize_separators).unwrap_or_default();
                return MoveResult::failure(path_id, src, dst, "missing_src_or_dst");
            }
        };
        if let Some(code) = validation_code(&src, &dst) {
            return MoveResult::failure(path_id, src, dst, code);
        }
        let (src_lit, dst_lit) = match (
            path_codec::to_long_literal(&src),
            path_codec::to_long_literal(&dst),
        ) {
            (Ok(s), Ok(d)) => (s, d),
            (Err(e), _) | (_, Err(e)) => return MoveResult::failure(path_id, src, dst, e.audit_code()),
        };

        match self.gw.exists(&src_lit) {
            Ok(true) => {}
            Ok(false) => return MoveResult::failure(path_id, src, dst, "src_not_found"),
            Err(e) => return MoveResult::failure(path_id, src, dst, format!("stat_failed:{e}")),
        }

        let (dst, dst_lit) = match self.gw.exists(&dst_lit) {
            Ok(false) => (dst, dst_lit),
            Err(e) => return MoveResult::failure(path_id, src, dst, format!("stat_failed:{e}")),
            Ok(true) => match self.on_dst_exists {
                OnDstExists::Error => return MoveResult::failure(path_id, src, dst, "dst_exists"),
                OnDstExists::RenameSuffix => match resolve_unique_destination(self.gw, &dst) {
                    Ok(unique) => match path_codec::to_long_literal(&unique) {
                        Ok(lit) => {
                            debug!(requested = %dst, resolved = %unique, "destination taken; using suffix");
                            (unique, lit)
                        }
                        Err(e) => return MoveResult::failure(path_id, src, unique, e.audit_code()),
                    },
                    Err(UniqueNameError::Probe { source, .. }) => {
                        return MoveResult::failure(path_id, src, dst, format!("stat_failed:{source}"));
                    }
                    Err(e) => {
                        debug!(dst = %dst, error = %e, "suffix resolution failed");
                        return MoveResult::failure(path_id, src, dst, "dst_suffix_resolve_failed");
                    }
                },
            },
        };

        if self.dry_run {
            return MoveResult::success(path_id, src, dst, true);
        }

        if let Some(parent) = path_codec::parent(&dst) {
            let created = path_codec::to_long_literal(&parent)
                .map_err(|e| e.to_string())
                .and_then(|lit| self.gw.ensure_dir(&lit).map_err(|e| e.to_string()));
            if let Err(msg) = created {
                warn!(dir = %parent, error = %msg, "could not create destination directory");
                return MoveResult::failure(path_id, src, dst, "mkdir_failed");
            }
        }

        match self.gw.move_file(&src_lit, &dst_lit) {
            Ok(()) => MoveResult::success(path_id, src, dst, false),
            Err(e) => MoveResult::failure(path_id, src, dst, e.to_string()),
        }
    }
}

/// Apply every entry of `plan` and write the audit. Fatal only for an unreadable plan,
/// an uncreatable audit, or a held lease.
pub fn apply_plan<G>(gw: &G, plan: &Path, opts: &ApplyOptions) -> Result<ApplyReport>
where
    G: FileSystemGateway + ?Sized,
{
    let reader = open_plan(plan)?;
    let _lease = if opts.lease {
        Some(RunLease::acquire(&opts.ops_root)?)
    } else {
        None
    };
    let run_id = jsonl::new_run_id();
    let out = opts.out.clone().unwrap_or_else(|| {
        opts.ops_root
            .join("move")
            .join(format!("move_apply_{run_id}.jsonl"))
    });
    let mut audit = AuditWriter::create(&out)?;
    audit.write_meta(
        &RunMeta::new("move_apply", &run_id)
            .with("plan", plan.display().to_string())
            .with("dry_run", opts.dry_run)
            .with("on_dst_exists", opts.on_dst_exists.as_str()),
    )?;
    info!(
        run_id = %run_id,
        plan = %plan.display(),
        dry_run = opts.dry_run,
        on_dst_exists = %opts.on_dst_exists,
        "apply started"
    );

    let executor = PlanExecutor::new(gw, opts.dry_run, opts.on_dst_exists);
    let mut summary = ApplySummary::default();
    for item in reader {
        if shutdown::is_requested() {
            warn!(run_id = %run_id, "shutdown requested; stopping before next entry");
            summary.interrupted = true;
            break;
        }
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                warn!(plan = %plan.display(), error = %e, "plan read failed; stopping");
                audit.write_malformed(0, &format!("plan read failed: {e}"))?;
                summary.malformed += 1;
                break;
            }
        };
        match item {
            PlanItem::Malformed { line, message } => {
                warn!(line, error = %message, "malformed plan line");
                audit.write_malformed(line, &message)?;
                summary.malformed += 1;
            }
            PlanItem::Entry(entry) => {
                let result = executor.apply_entry(&entry);
                summary.entries += 1;
                if result.ok {
                    summary.ok += 1;
                    debug!(line = entry.line, src = %result.src, dst = %result.dst, "entry ok");
                } else {
                    summary.failed += 1;
                    debug!(
                        line = entry.line,
                        src = %result.src,
                        error = result.error.as_deref().unwrap_or(""),
                        "entry failed"
                    );
                }
                audit.write_result(&result)?;
            }
        }
    }

    let out_jsonl = audit.finish(&summary)?;
    info!(
        run_id = %run_id,
        entries = summary.entries,
        ok = summary.ok,
        failed = summary.failed,
        malformed = summary.malformed,
        interrupted = summary.interrupted,
        "apply finished"
    );
    Ok(ApplyReport {
        run_id,
        out_jsonl,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parsing() {
        assert_eq!("error".parse::<OnDstExists>().unwrap(), OnDstExists::Error);
        assert_eq!(
            "Rename-Suffix".parse::<OnDstExists>().unwrap(),
            OnDstExists::RenameSuffix
        );
        assert!("skip".parse::<OnDstExists>().is_err());
    }

    #[test]
    fn embedded_drive_outranks_other_path_errors() {
        assert_eq!(
            validation_code("relative\\x", r"D:\lib\D:\lib\x.mp4"),
            Some("invalid_path_embedded_drive")
        );
        assert_eq!(
            validation_code(r"\\srv\share\x", r"D:\x"),
            Some("invalid_path_not_drive_rooted")
        );
        assert_eq!(validation_code(r"C:\a", r"D:\b"), None);
    }
}
