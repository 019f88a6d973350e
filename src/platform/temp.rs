//! Unique sibling temp names for atomically published artifacts.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling of `target` in the same directory, so a rename onto `target` never
/// crosses a filesystem boundary.
/// Pattern: .relocator.<tag>.<pid>.<nanos>.<seq>.tmp
pub fn tmp_sibling_name(target: &Path, tag: &str) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = format!(".relocator.{tag}.{pid}.{nanos}.{seq}.tmp");
    target.parent().unwrap_or_else(|| Path::new(".")).join(name)
}

/// True for names produced by [`tmp_sibling_name`].
pub fn is_tmp_sibling(name: &str) -> bool {
    name.starts_with(".relocator.") && name.ends_with(".tmp")
}
