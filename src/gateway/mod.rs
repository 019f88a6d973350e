//! Filesystem gateway: the only way the scanner and executor touch the target filesystem.
//!
//! The walker and plan executor are written once against [`FileSystemGateway`]; each
//! adapter decides how a long-path literal reaches the real filesystem:
//! - [`NativeGateway`]: std::fs, with an optional drive-letter -> local mount map.
//! - [`PwshGateway`]: a PowerShell 7 subprocess per call.
//!
//! All methods take long-literal paths produced by `path_codec::to_long_literal`.

mod helpers;
pub mod native;
pub mod pwsh;

pub use helpers::{io_error_with_help, io_error_with_help_io};
pub use native::{DriveMap, NativeGateway};
pub use pwsh::PwshGateway;

use chrono::{DateTime, Utc};
use std::io;

use crate::path_codec::PathLiteral;

/// Kind of a directory entry as reported by a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Devices, sockets, symlinked directories: listed but never traversed or recorded.
    Other,
}

/// One successfully listed directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub kind: EntryKind,
}

/// A directory entry that was seen but could not be described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFault {
    /// Best-effort (possibly lossy) name of the entry.
    pub name: String,
    pub message: String,
}

/// Size/time/kind of a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl FileStat {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Narrow set of filesystem primitives the relocation core needs.
pub trait FileSystemGateway {
    /// List one directory level. The outer error means the directory itself could not be
    /// read; inner errors isolate single entries.
    fn list_dir(&self, dir: &PathLiteral) -> io::Result<Vec<Result<DirEntryInfo, EntryFault>>>;

    /// Stat a path (follows symlinks).
    fn stat(&self, path: &PathLiteral) -> io::Result<FileStat>;

    /// Whether anything (file or directory) exists at `path`.
    fn exists(&self, path: &PathLiteral) -> io::Result<bool>;

    /// Open with shared access and read up to `budget` bytes; returns bytes read.
    fn read_head(&self, path: &PathLiteral, budget: usize) -> io::Result<usize>;

    /// Lower-case hex SHA-256 of the whole file.
    fn sha256(&self, path: &PathLiteral) -> io::Result<String>;

    /// Create `dir` and any missing ancestors.
    fn ensure_dir(&self, dir: &PathLiteral) -> io::Result<()>;

    /// Move `src` to `dst`, replacing an existing file at `dst`.
    fn move_file(&self, src: &PathLiteral, dst: &PathLiteral) -> io::Result<()>;
}
