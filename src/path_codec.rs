//! Long-path literal encoding for drive-rooted Windows paths.
//!
//! Paths are carried as strings in Windows form (`C:\dir\file`) because the control
//! process may not be running on the filesystem's own OS. A path that may exceed the
//! legacy length limit is escaped with the `\\?\` marker before it reaches a gateway.
//!
//! Rules:
//! - Only drive-rooted absolute paths encode to a long literal.
//! - UNC paths are rejected on encode but `\\?\UNC\server\share` still decodes back.
//! - Decoding tolerates paths that are already in normal form.

use std::fmt;
use thiserror::Error;

/// Marker prefix of a long-path literal.
pub const LONG_PREFIX: &str = r"\\?\";
/// Marker prefix of an escaped UNC long-path literal.
pub const LONG_UNC_PREFIX: &str = r"\\?\UNC\";

/// Representation a [`PathLiteral`] is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathRepr {
    Normal,
    LongLiteral,
}

/// A Windows path string tagged with its representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathLiteral {
    repr: PathRepr,
    value: String,
}

impl PathLiteral {
    /// Wrap a path already in normal form without validating it.
    pub fn normal(value: impl Into<String>) -> Self {
        Self {
            repr: PathRepr::Normal,
            value: value.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn repr(&self) -> PathRepr {
        self.repr
    }

    pub fn is_long(&self) -> bool {
        self.repr == PathRepr::LongLiteral
    }

    /// Normal (`C:\...` or `\\server\share\...`) form of this path.
    pub fn to_normal(&self) -> String {
        from_long_literal(&self.value)
    }

    /// Child path `self\name`, keeping the representation.
    pub fn join(&self, name: &str) -> PathLiteral {
        let mut value = self.value.clone();
        if !value.ends_with('\\') {
            value.push('\\');
        }
        value.push_str(name);
        PathLiteral {
            repr: self.repr,
            value,
        }
    }
}

impl fmt::Display for PathLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// The closed set of reasons a path is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathValidationError {
    #[error("path is empty")]
    Empty,
    #[error("UNC paths are not supported: {0}")]
    UncUnsupported(String),
    #[error("path contains an embedded drive root: {0}")]
    EmbeddedDrive(String),
    #[error("path is not drive-rooted (expected <letter>:\\...): {0}")]
    NotDriveRooted(String),
}

impl PathValidationError {
    /// Audit error code a move entry is failed with for this reason.
    pub fn audit_code(&self) -> &'static str {
        match self {
            PathValidationError::EmbeddedDrive(_) => "invalid_path_embedded_drive",
            PathValidationError::Empty
            | PathValidationError::UncUnsupported(_)
            | PathValidationError::NotDriveRooted(_) => "invalid_path_not_drive_rooted",
        }
    }
}

/// Replace forward slashes with backslashes.
pub fn normalize_separators(path: &str) -> String {
    path.replace('/', "\\")
}

/// True for `<letter>:\...`.
pub fn is_drive_rooted(path: &str) -> bool {
    let b = path.as_bytes();
    b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && b[2] == b'\\'
}

/// True when a separator followed by `<letter>:\` appears after the first component.
///
/// Catches plans where a full destination was accidentally nested inside another path,
/// e.g. `D:\Library\D:\Library\show.mp4`.
pub fn has_embedded_drive(path: &str) -> bool {
    let b = path.as_bytes();
    (1..b.len()).any(|i| {
        (b[i] == b'\\' || b[i] == b'/')
            && i + 3 < b.len()
            && b[i + 1].is_ascii_alphabetic()
            && b[i + 2] == b':'
            && (b[i + 3] == b'\\' || b[i + 3] == b'/')
    })
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Validate that `path` is a usable drive-rooted absolute path.
///
/// Checks in order: empty, embedded drive, UNC, drive root.
pub fn validate_drive_rooted(path: &str) -> Result<(), PathValidationError> {
    let p = normalize_separators(path.trim());
    if p.is_empty() {
        return Err(PathValidationError::Empty);
    }
    if has_embedded_drive(&p) {
        return Err(PathValidationError::EmbeddedDrive(path.to_string()));
    }
    if p.starts_with(r"\\") {
        return Err(PathValidationError::UncUnsupported(path.to_string()));
    }
    if !is_drive_rooted(&p) {
        return Err(PathValidationError::NotDriveRooted(path.to_string()));
    }
    Ok(())
}

/// Encode a drive-rooted path as a long-path literal.
pub fn to_long_literal(path: &str) -> Result<PathLiteral, PathValidationError> {
    let p = normalize_separators(path);
    if p.trim().is_empty() {
        return Err(PathValidationError::Empty);
    }
    if strip_prefix_ignore_case(&p, LONG_UNC_PREFIX).is_some() {
        return Err(PathValidationError::UncUnsupported(path.to_string()));
    }
    if let Some(rest) = p.strip_prefix(LONG_PREFIX) {
        if is_drive_rooted(rest) {
            return Ok(PathLiteral {
                repr: PathRepr::LongLiteral,
                value: p,
            });
        }
        return Err(PathValidationError::NotDriveRooted(path.to_string()));
    }
    if p.starts_with(r"\\") {
        return Err(PathValidationError::UncUnsupported(path.to_string()));
    }
    if !is_drive_rooted(&p) {
        return Err(PathValidationError::NotDriveRooted(path.to_string()));
    }
    Ok(PathLiteral {
        repr: PathRepr::LongLiteral,
        value: format!("{LONG_PREFIX}{p}"),
    })
}

/// Decode a long-path literal back to normal form. Other input is returned unchanged.
pub fn from_long_literal(path: &str) -> String {
    if let Some(rest) = strip_prefix_ignore_case(path, LONG_UNC_PREFIX) {
        return format!(r"\\{rest}");
    }
    if let Some(rest) = path.strip_prefix(LONG_PREFIX) {
        return rest.to_string();
    }
    path.to_string()
}

/// Parent directory of a normal Windows path (`C:\a\b` -> `C:\a`, `C:\a` -> `C:\`).
pub fn parent(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('\\');
    let idx = trimmed.rfind('\\')?;
    if idx == 2 && is_drive_rooted(trimmed) {
        return Some(trimmed[..3].to_string());
    }
    if idx == 0 {
        return None;
    }
    Some(trimmed[..idx].to_string())
}

/// Final component of a normal Windows path.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('\\');
    match trimmed.rfind('\\') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Split a file name into stem and extension (extension keeps its leading dot).
///
/// Follows pure Windows path suffix rules: `.env` and `name.` have no extension,
/// `archive.tar.gz` splits into `archive.tar` + `.gz`.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx..])),
        _ => (name, None),
    }
}

/// `C:\a\b` -> `/mnt/c/a/b`. Non drive-rooted input is returned unchanged.
pub fn windows_to_wsl(path: &str) -> String {
    let b = path.as_bytes();
    if b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':' {
        let drive = (b[0] as char).to_ascii_lowercase();
        if b.len() == 2 {
            return format!("/mnt/{drive}");
        }
        if b[2] == b'\\' || b[2] == b'/' {
            let rest = path[3..].replace('\\', "/");
            if rest.is_empty() {
                return format!("/mnt/{drive}");
            }
            return format!("/mnt/{drive}/{rest}");
        }
    }
    path.to_string()
}

fn wsl_mount_split(path: &str) -> Option<(char, &str)> {
    let b = path.as_bytes();
    if path.starts_with("/mnt/") && b.len() > 6 && b[5].is_ascii_alphabetic() && b[6] == b'/' {
        Some(((b[5] as char).to_ascii_uppercase(), &path[7..]))
    } else {
        None
    }
}

/// `/mnt/c/a/b` -> `C:\a\b`; anything else is canonicalized as a Windows path.
pub fn wsl_to_windows(path: &str) -> String {
    match wsl_mount_split(path) {
        Some((drive, rest)) => format!("{drive}:\\{}", rest.replace('/', "\\")),
        None => canonicalize_windows(path),
    }
}

/// WSL mount paths converted, separators normalized, drive letter upper-cased.
pub fn canonicalize_windows(path: &str) -> String {
    let mut p = match wsl_mount_split(path) {
        Some((drive, rest)) => format!("{drive}:\\{}", rest.replace('/', "\\")),
        None => normalize_separators(path),
    };
    let b = p.as_bytes();
    if b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':' {
        let upper = (b[0] as char).to_ascii_uppercase();
        p.replace_range(0..1, &upper.to_string());
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_does_not_double_separators() {
        let root = to_long_literal(r"C:\").unwrap();
        assert_eq!(root.join("a").as_str(), r"\\?\C:\a");
        let sub = to_long_literal(r"C:\media").unwrap();
        assert_eq!(sub.join("b.mp4").as_str(), r"\\?\C:\media\b.mp4");
    }

    #[test]
    fn parent_of_drive_child_is_drive_root() {
        assert_eq!(parent(r"C:\a").as_deref(), Some(r"C:\"));
        assert_eq!(parent(r"C:\a\b.mp4").as_deref(), Some(r"C:\a"));
        assert_eq!(parent(r"C:\"), None);
    }

    #[test]
    fn extension_rules() {
        assert_eq!(split_extension("show.mp4"), ("show", Some(".mp4")));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", Some(".gz")));
        assert_eq!(split_extension(".env"), (".env", None));
        assert_eq!(split_extension("trailing."), ("trailing.", None));
        assert_eq!(split_extension("plain"), ("plain", None));
    }

    #[test]
    fn embedded_drive_requires_full_root() {
        assert!(has_embedded_drive(r"D:\Library\D:\Library\x.mp4"));
        assert!(has_embedded_drive(r"C:\D:\x"));
        assert!(!has_embedded_drive(r"D:\Library\D-series\x.mp4"));
        assert!(!has_embedded_drive(r"D:\Library\x:y"));
    }
}
