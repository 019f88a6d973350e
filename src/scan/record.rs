//! Records emitted by a walk, serialized one per JSONL line with a `kind` tag.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One regular file. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "path")]
    pub full_path: String,
    #[serde(rename = "dir")]
    pub parent_dir: String,
    pub name: String,
    /// Extension with its dot, original case.
    #[serde(rename = "ext")]
    pub extension: Option<String>,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "mtimeUtc")]
    pub modified_at_utc: Option<String>,
    #[serde(rename = "corruptCandidate")]
    pub corrupt_candidate: bool,
    #[serde(rename = "corruptReason")]
    pub corrupt_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// `2024-05-01T12:00:00Z`
pub fn format_utc(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    EnumerateDirFailed,
    EnumerateEntryFailed,
    EnumerateRootFailed,
    HashFailed,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::EnumerateDirFailed => "enumerate_dir_failed",
            WarningCode::EnumerateEntryFailed => "enumerate_entry_failed",
            WarningCode::EnumerateRootFailed => "enumerate_root_failed",
            WarningCode::HashFailed => "hash_failed",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal fault met during a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: WarningCode,
    pub path: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl Warning {
    pub fn new(code: WarningCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            root: None,
        }
    }
}

/// Item yielded by the walker and written as one artifact line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WalkEvent {
    File(FileRecord),
    Warning(Warning),
}

impl WalkEvent {
    pub fn as_file(&self) -> Option<&FileRecord> {
        match self {
            WalkEvent::File(f) => Some(f),
            WalkEvent::Warning(_) => None,
        }
    }

    pub fn as_warning(&self) -> Option<&Warning> {
        match self {
            WalkEvent::Warning(w) => Some(w),
            WalkEvent::File(_) => None,
        }
    }
}
