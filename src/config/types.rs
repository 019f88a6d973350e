//! Core configuration types.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::paths;
use super::{DEFAULT_EXTENSIONS, DEFAULT_SCAN_RETRY_COUNT};
use crate::gateway::DriveMap;
use crate::relocate::OnDstExists;
use crate::scan::{DEFAULT_READ_BYTES, normalize_extensions};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Warnings and run summaries (default)
    #[default]
    Normal,
    /// Adds per-entry decisions (`debug` events)
    Info,
    /// Everything, including `trace` detail
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" | "warn" => Some(LogLevel::Normal),
            "info" | "verbose" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// How the target filesystem is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Native,
    Pwsh,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Native => "native",
            Backend::Pwsh => "pwsh",
        })
    }
}

impl FromStr for Backend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Backend::Native),
            "pwsh" | "powershell" => Ok(Backend::Pwsh),
            other => Err(format!("invalid backend: '{other}' (native|pwsh)")),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where audits, inventories and snapshots are written
    pub ops_root: PathBuf,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    pub backend: Backend,
    /// Explicit PowerShell executable; discovery is used when unset
    pub pwsh_exe: Option<String>,
    pub on_dst_exists: OnDstExists,
    pub corruption_read_bytes: usize,
    pub scan_retry_count: u32,
    /// Normalized (`.mp4`), used by inventory runs
    pub extensions: BTreeSet<String>,
    pub drives: DriveMap,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ops_root: paths::default_ops_root(),
            log_level: LogLevel::Normal,
            log_file: None,
            backend: Backend::Native,
            pwsh_exe: None,
            on_dst_exists: OnDstExists::Error,
            corruption_read_bytes: DEFAULT_READ_BYTES,
            scan_retry_count: DEFAULT_SCAN_RETRY_COUNT,
            extensions: normalize_extensions(DEFAULT_EXTENSIONS),
            drives: DriveMap::new(),
        }
    }
}
