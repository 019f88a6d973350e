//! Platform-specific helpers.
//! Hides Unix/Windows differences in how files are opened, synced and logged to, so the
//! gateway and the snapshot writer stay platform-agnostic.

pub mod temp;
#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{fsync_dir, open_log_file_secure_append, open_shared_read};

#[cfg(not(unix))]
pub use windows::{fsync_dir, open_log_file_secure_append, open_shared_read};
