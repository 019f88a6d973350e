//! Opt-in advisory lease so two apply runs against one operations root do not interleave.
//!
//! The lease is an exclusive non-blocking lock (fs2) on `<ops_root>/move/.relocator.lease`.
//! It is released when the guard drops; the lock file itself is left in place so a
//! waiting run never races on its creation.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::RelocateError;

pub const LEASE_FILE: &str = ".relocator.lease";

pub fn lease_path(ops_root: &Path) -> PathBuf {
    ops_root.join("move").join(LEASE_FILE)
}

#[derive(Debug)]
pub struct RunLease {
    file: File,
    path: PathBuf,
}

impl RunLease {
    /// Take the lease or fail with `LeaseHeld` if another run has it.
    pub fn acquire(ops_root: &Path) -> Result<Self, RelocateError> {
        let path = lease_path(ops_root);
        let output_err = |source| RelocateError::OutputCreate {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(output_err)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(output_err)?;
        if file.try_lock_exclusive().is_err() {
            return Err(RelocateError::LeaseHeld(path));
        }
        // Holder pid, for operators inspecting a stuck lease.
        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());
        debug!(lease = %path.display(), "lease acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(lease = %self.path.display(), "lease released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = tempdir().unwrap();
        let first = RunLease::acquire(dir.path()).unwrap();
        match RunLease::acquire(dir.path()) {
            Err(RelocateError::LeaseHeld(p)) => assert_eq!(p, lease_path(dir.path())),
            other => panic!("expected LeaseHeld, got {other:?}"),
        }
        drop(first);
        RunLease::acquire(dir.path()).unwrap();
    }
}
