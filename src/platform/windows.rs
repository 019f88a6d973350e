//! Windows implementations of platform helpers.
//!
//! Notes:
//! - Probe/hash opens use full share modes so a scan never produces sharing violations
//!   for a concurrent writer or mover of the same file.
//! - Directory fsync is not available through std on Windows; it is a no-op.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::windows::fs::OpenOptionsExt;
use std::path::Path;

use windows_sys::Win32::Storage::FileSystem::{FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE};

/// Open for reading with FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE.
pub fn open_shared_read(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE)
        .open(path)
}

/// Open log file for appending (no ACL management).
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path)
}

pub fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
