//! std::fs adapter for [`FileSystemGateway`].
//!
//! A long literal `\\?\X:\a\b` is resolved to a local path:
//! - letter `X` mapped in the [`DriveMap`] -> `<mapped root>/a/b`;
//! - otherwise on Windows the literal itself (the OS honours `\\?\`);
//! - otherwise `/mnt/x/a/b` (WSL mount convention).
//!
//! Moves try a rename first; across devices they fall back to copy into a temp sibling,
//! rename over the destination, then remove the source.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::helpers::io_error_with_help_io;
use super::{DirEntryInfo, EntryFault, EntryKind, FileStat, FileSystemGateway};
use crate::path_codec::{PathLiteral, is_drive_rooted};
use crate::platform::{self, temp::tmp_sibling_name};

const COPY_BUF: usize = 1024 * 1024;

/// Drive letter -> local directory standing in for that drive's root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveMap {
    roots: BTreeMap<char, PathBuf>,
}

impl DriveMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `letter:` (case-insensitive) to `root`.
    pub fn with(mut self, letter: char, root: impl Into<PathBuf>) -> Self {
        self.insert(letter, root);
        self
    }

    pub fn insert(&mut self, letter: char, root: impl Into<PathBuf>) {
        self.roots.insert(letter.to_ascii_uppercase(), root.into());
    }

    pub fn get(&self, letter: char) -> Option<&Path> {
        self.roots.get(&letter.to_ascii_uppercase()).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, &Path)> {
        self.roots.iter().map(|(k, v)| (*k, v.as_path()))
    }

    /// Parse `X=/local/root`.
    pub fn parse_spec(spec: &str) -> Result<(char, PathBuf), String> {
        let (letter, root) = spec
            .split_once('=')
            .ok_or_else(|| format!("expected X=/path, got '{spec}'"))?;
        let letter = letter.trim().trim_end_matches(':');
        let mut chars = letter.chars();
        let drive = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => c,
            _ => return Err(format!("invalid drive letter '{letter}'")),
        };
        let root = root.trim();
        if root.is_empty() {
            return Err(format!("empty root for drive '{letter}'"));
        }
        Ok((drive, PathBuf::from(root)))
    }
}

/// Gateway over the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct NativeGateway {
    drives: DriveMap,
}

impl NativeGateway {
    pub fn new(drives: DriveMap) -> Self {
        Self { drives }
    }

    pub fn drives(&self) -> &DriveMap {
        &self.drives
    }

    /// Local path a literal refers to.
    pub fn resolve(&self, path: &PathLiteral) -> io::Result<PathBuf> {
        let normal = path.to_normal();
        if !is_drive_rooted(&normal) && !(normal.len() == 2 && normal.ends_with(':')) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a drive-rooted path: {path}"),
            ));
        }
        let letter = normal.as_bytes()[0] as char;
        let parts: Vec<&str> = normal
            .get(3..)
            .unwrap_or("")
            .split('\\')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.iter().any(|p| *p == "." || *p == "..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("relative segment in path: {path}"),
            ));
        }

        if let Some(root) = self.drives.get(letter) {
            let mut local = root.to_path_buf();
            local.extend(parts);
            return Ok(local);
        }

        #[cfg(windows)]
        {
            Ok(PathBuf::from(path.as_str()))
        }
        #[cfg(not(windows))]
        {
            let mut local = PathBuf::from(format!("/mnt/{}", letter.to_ascii_lowercase()));
            local.extend(parts);
            Ok(local)
        }
    }
}

fn kind_of(ft: fs::FileType) -> EntryKind {
    if ft.is_file() {
        EntryKind::File
    } else if ft.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::Other
    }
}

fn is_cross_device(e: &io::Error) -> bool {
    match e.raw_os_error() {
        #[cfg(unix)]
        Some(code) => code == libc::EXDEV,
        #[cfg(windows)]
        Some(code) => code == 17, // ERROR_NOT_SAME_DEVICE
        #[cfg(not(any(unix, windows)))]
        Some(_) => false,
        None => false,
    }
}

fn copy_then_replace(src: &Path, dst: &Path) -> io::Result<()> {
    let tmp = tmp_sibling_name(dst, "move");
    let res = (|| {
        let mut reader = BufReader::with_capacity(COPY_BUF, platform::open_shared_read(src)?);
        let out = fs::OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        let mut writer = BufWriter::with_capacity(COPY_BUF, out);
        io::copy(&mut reader, &mut writer)?;
        let out = writer.into_inner().map_err(|e| e.into_error())?;
        out.sync_all()?;
        drop(out);
        fs::rename(&tmp, dst)
    })();
    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res?;
    fs::remove_file(src)
}

impl FileSystemGateway for NativeGateway {
    fn list_dir(&self, dir: &PathLiteral) -> io::Result<Vec<Result<DirEntryInfo, EntryFault>>> {
        let local = self.resolve(dir)?;
        let mut out = Vec::new();
        for entry in fs::read_dir(&local)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    out.push(Err(EntryFault {
                        name: String::new(),
                        message: e.to_string(),
                    }));
                    continue;
                }
            };
            let raw = entry.file_name();
            let name = match raw.to_str() {
                Some(n) => n.to_string(),
                None => {
                    out.push(Err(EntryFault {
                        name: raw.to_string_lossy().into_owned(),
                        message: "entry name is not valid Unicode".to_string(),
                    }));
                    continue;
                }
            };
            // file_type() does not follow symlinks: a symlinked directory is Other.
            match entry.file_type() {
                Ok(ft) if ft.is_symlink() => {
                    let kind = match fs::metadata(entry.path()) {
                        Ok(m) if m.is_file() => EntryKind::File,
                        _ => EntryKind::Other,
                    };
                    out.push(Ok(DirEntryInfo { name, kind }));
                }
                Ok(ft) => out.push(Ok(DirEntryInfo {
                    name,
                    kind: kind_of(ft),
                })),
                Err(e) => out.push(Err(EntryFault {
                    name,
                    message: e.to_string(),
                })),
            }
        }
        Ok(out)
    }

    fn stat(&self, path: &PathLiteral) -> io::Result<FileStat> {
        let md = fs::metadata(self.resolve(path)?)?;
        Ok(FileStat {
            kind: kind_of(md.file_type()),
            size: md.len(),
            modified: md.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn exists(&self, path: &PathLiteral) -> io::Result<bool> {
        let local = self.resolve(path)?;
        match fs::symlink_metadata(&local) {
            Ok(_) => Ok(true),
            // A path under a regular file does not exist either.
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn read_head(&self, path: &PathLiteral, budget: usize) -> io::Result<usize> {
        let mut f = platform::open_shared_read(&self.resolve(path)?)?;
        let mut buf = vec![0u8; budget.clamp(1, 64 * 1024)];
        let mut total = 0usize;
        while total < budget {
            let want = (budget - total).min(buf.len());
            match f.read(&mut buf[..want]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn sha256(&self, path: &PathLiteral) -> io::Result<String> {
        let mut reader =
            BufReader::with_capacity(COPY_BUF, platform::open_shared_read(&self.resolve(path)?)?);
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; COPY_BUF];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let digest = hasher.finalize();
        Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    fn ensure_dir(&self, dir: &PathLiteral) -> io::Result<()> {
        let local = self.resolve(dir)?;
        fs::create_dir_all(&local).map_err(io_error_with_help_io("create directory", &local))
    }

    fn move_file(&self, src: &PathLiteral, dst: &PathLiteral) -> io::Result<()> {
        let from = self.resolve(src)?;
        let to = self.resolve(dst)?;

        match fs::rename(&from, &to) {
            Ok(()) => {}
            Err(e) if is_cross_device(&e) => {
                warn!(src = %from.display(), dst = %to.display(), "cross-device move; copying");
                copy_then_replace(&from, &to).map_err(io_error_with_help_io("copy across devices", &from))?;
            }
            Err(e) => return Err(io_error_with_help_io("move", &from)(e)),
        }
        if let Some(parent) = to.parent() {
            let _ = platform::fsync_dir(parent);
        }
        debug!(src = %from.display(), dst = %to.display(), "moved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_codec::to_long_literal;
    use tempfile::tempdir;

    #[test]
    fn mapped_drive_resolves_under_root() {
        let gw = NativeGateway::new(DriveMap::new().with('x', "/srv/x"));
        let lit = to_long_literal(r"X:\media\a.mp4").unwrap();
        assert_eq!(gw.resolve(&lit).unwrap(), PathBuf::from("/srv/x/media/a.mp4"));
        let root = to_long_literal(r"x:\").unwrap();
        assert_eq!(gw.resolve(&root).unwrap(), PathBuf::from("/srv/x"));
    }

    #[cfg(not(windows))]
    #[test]
    fn unmapped_drive_uses_wsl_mount() {
        let gw = NativeGateway::default();
        let lit = to_long_literal(r"D:\a\b").unwrap();
        assert_eq!(gw.resolve(&lit).unwrap(), PathBuf::from("/mnt/d/a/b"));
    }

    #[test]
    fn dot_segments_are_refused() {
        let gw = NativeGateway::new(DriveMap::new().with('X', "/srv/x"));
        let lit = to_long_literal(r"X:\a\..\..\etc").unwrap();
        let err = gw.resolve(&lit).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn sha256_of_known_content() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("abc.txt"), b"abc").unwrap();
        let gw = NativeGateway::new(DriveMap::new().with('X', dir.path()));
        let lit = to_long_literal(r"X:\abc.txt").unwrap();
        assert_eq!(
            gw.sha256(&lit).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn read_head_is_bounded_by_budget() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.bin"), vec![7u8; 10_000]).unwrap();
        let gw = NativeGateway::new(DriveMap::new().with('X', dir.path()));
        let lit = to_long_literal(r"X:\big.bin").unwrap();
        assert_eq!(gw.read_head(&lit, 4096).unwrap(), 4096);
        assert_eq!(gw.read_head(&lit, 1).unwrap(), 1);
    }

    #[test]
    fn move_replaces_existing_destination() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"new").unwrap();
        fs::write(dir.path().join("b.txt"), b"old").unwrap();
        let gw = NativeGateway::new(DriveMap::new().with('X', dir.path()));
        gw.move_file(
            &to_long_literal(r"X:\a.txt").unwrap(),
            &to_long_literal(r"X:\b.txt").unwrap(),
        )
        .unwrap();
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(fs::read(dir.path().join("b.txt")).unwrap(), b"new");
    }

    #[test]
    fn parse_drive_spec() {
        assert_eq!(
            DriveMap::parse_spec("x=/srv/x").unwrap(),
            ('x', PathBuf::from("/srv/x"))
        );
        assert_eq!(
            DriveMap::parse_spec("D:=/mnt/d").unwrap(),
            ('D', PathBuf::from("/mnt/d"))
        );
        assert!(DriveMap::parse_spec("xy=/a").is_err());
        assert!(DriveMap::parse_spec("x").is_err());
        assert!(DriveMap::parse_spec("x=").is_err());
    }
}
