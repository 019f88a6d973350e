//! io::Error enrichment for gateway failures.
//!
//! Audit records and warnings carry the message verbatim, so the text names the
//! operation, the path and, where one is known, an operator hint for the OS error.
//!
//! Usage:
//!   fs::create_dir_all(&local).map_err(io_error_with_help_io("create directory", &local))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

/// Hint for a raw OS error code, if we know a useful one.
fn os_hint(code: i32) -> Option<&'static str> {
    #[cfg(unix)]
    {
        match code {
            libc::EACCES | libc::EPERM => Some("permission denied; check ownership of the tree"),
            libc::EXDEV => Some("cross-device; rename cannot span mounts"),
            libc::EBUSY => Some("resource busy; another process holds it"),
            libc::ENOENT => Some("path not found"),
            libc::EEXIST => Some("already exists"),
            libc::ENOTEMPTY => Some("destination directory is not empty"),
            libc::ENOSPC => Some("insufficient space on device"),
            libc::EROFS => Some("read-only filesystem"),
            libc::EIO => Some("I/O error; the medium may be failing"),
            libc::ENAMETOOLONG => Some("name or path too long"),
            libc::EMFILE | libc::ENFILE => Some("too many open files"),
            _ => None,
        }
    }
    #[cfg(windows)]
    {
        match code {
            2 | 3 => Some("path not found"),                    // FILE/PATH_NOT_FOUND
            5 => Some("access denied"),                          // ERROR_ACCESS_DENIED
            17 => Some("not same device; cross-volume move"),   // ERROR_NOT_SAME_DEVICE
            23 => Some("data error (CRC); the medium may be failing"), // ERROR_CRC
            32 => Some("sharing violation; file is in use"),    // ERROR_SHARING_VIOLATION
            80 | 183 => Some("already exists"),                  // FILE_EXISTS / ALREADY_EXISTS
            112 => Some("insufficient disk space"),              // ERROR_DISK_FULL
            206 => Some("path too long; long-path literal required"), // FILENAME_EXCED_RANGE
            _ => None,
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = code;
        None
    }
}

fn kind_hint(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::PermissionDenied => Some("permission denied"),
        io::ErrorKind::NotFound => Some("path not found"),
        io::ErrorKind::AlreadyExists => Some("already exists"),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Some("busy or timed out"),
        _ => None,
    }
}

fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);
    match e.raw_os_error() {
        Some(code) => {
            if let Some(h) = os_hint(code) {
                msg.push_str(" (");
                msg.push_str(h);
                msg.push(')');
            }
            msg.push_str(&format!(" [os code: {code}]"));
        }
        None => {
            if let Some(h) = kind_hint(e.kind()) {
                msg.push_str(" (");
                msg.push_str(h);
                msg.push(')');
            }
        }
    }
    msg
}

/// `.map_err` adapter for anyhow code paths.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}

/// `.map_err` adapter that keeps the original ErrorKind.
pub fn io_error_with_help_io<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), build_message(op, path, &e))
}
