//! Default locations and the symlink-ancestor check used before opening log files.

use dirs::{config_dir, data_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RELOCATOR_CONFIG";

/// `<config dir>/relocator/config.xml`.
pub fn default_config_path() -> Option<PathBuf> {
    match config_dir() {
        Some(base) => Some(base.join("relocator").join("config.xml")),
        None => env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config").join("relocator").join("config.xml")),
    }
}

/// `<data dir>/relocator/ops`, or `./ops` when no data dir is known.
pub fn default_ops_root() -> PathBuf {
    data_dir()
        .map(|d| d.join("relocator").join("ops"))
        .unwrap_or_else(|| PathBuf::from("ops"))
}

/// Config file in use: explicit path, then `$RELOCATOR_CONFIG`, then the default.
/// The flag says whether the location was chosen explicitly.
pub fn config_location(explicit: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(p) = explicit {
        return Some((p.to_path_buf(), true));
    }
    if let Some(p) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some((PathBuf::from(p), false));
    }
    default_config_path().map(|p| (p, false))
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() && fs::symlink_metadata(anc)?.file_type().is_symlink() {
            return Ok(true);
        }
        p = anc.parent();
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_location_wins() {
        let (p, explicit) = config_location(Some(Path::new("/tmp/x.xml"))).unwrap();
        assert_eq!(p, PathBuf::from("/tmp/x.xml"));
        assert!(explicit);
    }

    #[cfg(unix)]
    #[test]
    fn detects_symlinked_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        assert!(path_has_symlink_ancestor(&link.join("app.log")).unwrap());
        assert!(!path_has_symlink_ancestor(&real.join("app.log")).unwrap());
    }
}
