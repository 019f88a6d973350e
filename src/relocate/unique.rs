//! Collision-free destination names: `dir\stem__dupN.ext`.
//!
//! Only decides a name from the current state of the destination directory; nothing
//! reserves it, so a concurrent writer can still take it before the move.

use std::io;
use thiserror::Error;
use tracing::trace;

use crate::gateway::FileSystemGateway;
use crate::path_codec::{self, PathLiteral};

pub const MAX_DUP_SUFFIX: u32 = 10_000;
/// Longest file name (in characters) a generated candidate may have.
pub const MAX_NAME_CHARS: usize = 255;

#[derive(Debug, Error)]
pub enum UniqueNameError {
    #[error("no free name after {MAX_DUP_SUFFIX} suffixes for {0}")]
    Exhausted(String),
    #[error("cannot encode candidate {path}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("existence check failed for {path}: {source}")]
    Probe {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// `stem + suffix + ext`, with the stem cut (by characters) so the whole name fits in
/// [`MAX_NAME_CHARS`]. The stem keeps at least one character.
pub fn build_name_with_suffix(stem: &str, ext: Option<&str>, suffix: &str) -> String {
    let overhead = suffix.chars().count() + ext.map_or(0, |e| e.chars().count());
    let budget = MAX_NAME_CHARS.saturating_sub(overhead).max(1);
    let mut name: String = stem.chars().take(budget).collect();
    if name.is_empty() {
        name.push('f');
    }
    name.push_str(suffix);
    if let Some(e) = ext {
        name.push_str(e);
    }
    name
}

fn taken<G>(gw: &G, path: &str) -> Result<bool, UniqueNameError>
where
    G: FileSystemGateway + ?Sized,
{
    let literal: PathLiteral =
        path_codec::to_long_literal(path).map_err(|e| UniqueNameError::InvalidPath {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    gw.exists(&literal).map_err(|source| UniqueNameError::Probe {
        path: path.to_string(),
        source,
    })
}

/// `path` if nothing exists there, else the first free `stem__dupN.ext` (N = 1..=10000).
pub fn resolve_unique_destination<G>(gw: &G, path: &str) -> Result<String, UniqueNameError>
where
    G: FileSystemGateway + ?Sized,
{
    if !taken(gw, path)? {
        return Ok(path.to_string());
    }
    let dir = path_codec::parent(path).unwrap_or_default();
    let (stem, ext) = path_codec::split_extension(path_codec::file_name(path));
    for n in 1..=MAX_DUP_SUFFIX {
        let name = build_name_with_suffix(stem, ext, &format!("__dup{n}"));
        let candidate = if dir.ends_with('\\') {
            format!("{dir}{name}")
        } else {
            format!("{dir}\\{name}")
        };
        if !taken(gw, &candidate)? {
            return Ok(candidate);
        }
        if n == 3 {
            trace!(path, "several suffix collisions; still searching");
        }
    }
    Err(UniqueNameError::Exhausted(path.to_string()))
}
