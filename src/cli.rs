//! CLI definition and parsing.
//!
//! Notes:
//! - Global flags override config values (which are loaded from XML if present).
//! - --debug is a shorthand for --log-level debug.
//! - Every subcommand prints exactly one JSON result line on stdout; logs go to stderr.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::config::types::{Backend, Config, LogLevel};
use crate::gateway::DriveMap;
use crate::relocate::OnDstExists;
use crate::scan::normalize_extensions;

fn parse_drive(s: &str) -> Result<(char, PathBuf), String> {
    DriveMap::parse_spec(s)
}

/// Journaled bulk file relocation.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Scan long-path trees, publish atomic snapshots and apply audited move plans"
)]
pub struct Args {
    /// Config file (default: $RELOCATOR_CONFIG or the platform config dir).
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Set log level: quiet, normal, info, debug.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs in structured JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Also append logs to this file.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Operations root holding move/ and snapshot/ artifacts.
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub ops_root: Option<PathBuf>,

    /// Filesystem backend: native or pwsh.
    #[arg(long, global = true)]
    pub backend: Option<Backend>,

    /// PowerShell 7 executable for the pwsh backend.
    #[arg(long, global = true)]
    pub pwsh_exe: Option<String>,

    /// Map a drive letter to a local directory, e.g. `D=/mnt/media` (repeatable).
    #[arg(long = "drive", global = true, value_name = "X=PATH", value_parser = parse_drive)]
    pub drives: Vec<(char, PathBuf)>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Enumerate roots and publish an inventory JSONL.
    Inventory(InventoryArgs),
    /// Walk one root and atomically publish a snapshot JSONL.
    Snapshot(SnapshotArgs),
    /// Apply a move plan and write an audit JSONL.
    Apply(ApplyArgs),
    /// Build a plan that undoes the applied moves of an audit.
    RollbackPlan(RollbackArgs),
    /// Archive and gzip old artifacts in <ops_root>/move.
    Rotate(RotateArgs),
    /// Print the config location and effective settings, then exit.
    PrintConfig,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct InventoryArgs {
    /// Drive-rooted roots, e.g. `D:\Media`.
    #[arg(required = true)]
    pub roots: Vec<String>,
    /// Extensions to include (comma separated), e.g. `.mp4,.mkv`.
    #[arg(long, value_delimiter = ',')]
    pub ext: Vec<String>,
    /// Flag zero-length and unreadable files.
    #[arg(long)]
    pub detect_corruption: bool,
    #[arg(long)]
    pub read_bytes: Option<usize>,
    #[arg(long)]
    pub retry_count: Option<u32>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SnapshotArgs {
    pub root: String,
    /// Record the SHA-256 of every file.
    #[arg(long)]
    pub hash: bool,
    /// Flag zero-length and unreadable files.
    #[arg(long)]
    pub detect_corruption: bool,
    /// Stop after this many file records.
    #[arg(long)]
    pub limit: Option<u64>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ApplyArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    pub plan: PathBuf,
    /// Validate and resolve every entry without touching the filesystem.
    #[arg(long)]
    pub dry_run: bool,
    /// Collision policy: error or rename_suffix.
    #[arg(long)]
    pub on_dst_exists: Option<OnDstExists>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
    /// Hold an advisory lease on the operations root for the run.
    #[arg(long)]
    pub lease: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RollbackArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    pub audit: PathBuf,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RotateArgs {
    #[arg(long, default_value_t = 5)]
    pub keep_batches: usize,
    #[arg(long, default_value_t = 30)]
    pub ttl_days: u64,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(p) = &self.log_file {
            cfg.log_file = Some(p.clone());
        }
        if let Some(p) = &self.ops_root {
            cfg.ops_root = p.clone();
        }
        if let Some(b) = self.backend {
            cfg.backend = b;
        }
        if let Some(exe) = &self.pwsh_exe {
            cfg.pwsh_exe = Some(exe.clone());
        }
        for (letter, root) in &self.drives {
            cfg.drives.insert(*letter, root.clone());
        }
        match &self.command {
            Command::Apply(a) => {
                if let Some(policy) = a.on_dst_exists {
                    cfg.on_dst_exists = policy;
                }
            }
            Command::Inventory(a) => {
                if let Some(n) = a.read_bytes {
                    cfg.corruption_read_bytes = n.max(1);
                }
                if let Some(n) = a.retry_count {
                    cfg.scan_retry_count = n;
                }
                let exts = normalize_extensions(&a.ext);
                if !exts.is_empty() {
                    cfg.extensions = exts;
                }
            }
            _ => {}
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
