//! Fault-isolating tree walker.
//!
//! The walk is driven by an owned work-queue of directory literals, never by recursion,
//! so depth is bounded only by memory. A directory whose listing fails is deferred until
//! the main queue drains and retried `retry_count` times; only the final failure emits a
//! warning. Entry-level faults become warnings and the walk continues.

use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, trace, warn};

use super::probe::CorruptionProbe;
use super::record::{FileRecord, WalkEvent, Warning, WarningCode, format_utc};
use crate::errors::RelocateError;
use crate::gateway::{EntryKind, FileSystemGateway};
use crate::path_codec::{self, PathLiteral};

/// `mp4`, `.MP4`, ` .mp4 ` -> `.mp4`; empties dropped; sorted and deduped.
pub fn normalize_extensions<I, S>(exts: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    exts.into_iter()
        .filter_map(|e| {
            let e = e.as_ref().trim().trim_start_matches('.').to_lowercase();
            if e.is_empty() { None } else { Some(format!(".{e}")) }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Normalized extensions (see [`normalize_extensions`]); `None` matches every file.
    pub extensions: Option<BTreeSet<String>>,
    pub probe: Option<CorruptionProbe>,
    pub hash: bool,
    /// Extra listing attempts per directory after the first failure.
    pub retry_count: u32,
}

impl WalkOptions {
    pub fn with_retries(retry_count: u32) -> Self {
        Self {
            retry_count,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub dirs_listed: u64,
    pub dirs_failed: u64,
    pub dirs_retried: u64,
    pub files: u64,
    pub warnings: u64,
}

#[derive(Debug)]
struct PendingDir {
    path: PathLiteral,
    attempt: u32,
}

/// Iterator over the files and warnings of one root.
pub struct TreeWalker<'g, G: FileSystemGateway + ?Sized> {
    gw: &'g G,
    root: PathLiteral,
    options: WalkOptions,
    queue: VecDeque<PendingDir>,
    deferred: VecDeque<PendingDir>,
    ready: VecDeque<WalkEvent>,
    stats: WalkStats,
}

impl<'g, G: FileSystemGateway + ?Sized> TreeWalker<'g, G> {
    /// Validate and open `root`. Fails only for an unusable root; everything after this
    /// point is reported as warnings.
    pub fn new(gw: &'g G, root: &str, options: WalkOptions) -> Result<Self, RelocateError> {
        let normal = path_codec::normalize_separators(root.trim());
        let literal =
            path_codec::to_long_literal(&normal).map_err(|source| RelocateError::InvalidRoot {
                root: root.to_string(),
                source,
            })?;
        match gw.stat(&literal) {
            Ok(st) if st.is_dir() => {}
            Ok(_) => return Err(RelocateError::RootNotDirectory(literal.to_normal())),
            Err(e) => {
                debug!(root = %literal, error = %e, "root stat failed");
                return Err(RelocateError::RootNotFound(literal.to_normal()));
            }
        }
        let mut queue = VecDeque::new();
        queue.push_back(PendingDir {
            path: literal.clone(),
            attempt: 0,
        });
        Ok(Self {
            gw,
            root: literal,
            options,
            queue,
            deferred: VecDeque::new(),
            ready: VecDeque::new(),
            stats: WalkStats::default(),
        })
    }

    pub fn root(&self) -> &PathLiteral {
        &self.root
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    fn emit_warning(&mut self, code: WarningCode, path: String, message: String) {
        warn!(code = %code, path = %path, "{message}");
        self.stats.warnings += 1;
        self.ready
            .push_back(WalkEvent::Warning(Warning::new(code, path, message)));
    }

    fn next_dir(&mut self) -> Option<PendingDir> {
        if let Some(d) = self.queue.pop_front() {
            return Some(d);
        }
        // Main queue drained: start the deferred retries.
        self.deferred.pop_front()
    }

    fn matches_filter(&self, name: &str) -> bool {
        match &self.options.extensions {
            None => true,
            Some(exts) => match path_codec::split_extension(name).1 {
                Some(ext) => exts.contains(&ext.to_lowercase()),
                None => false,
            },
        }
    }

    fn visit(&mut self, dir: PendingDir) {
        let entries = match self.gw.list_dir(&dir.path) {
            Ok(entries) => entries,
            Err(e) => {
                if dir.attempt < self.options.retry_count {
                    debug!(dir = %dir.path, attempt = dir.attempt + 1, error = %e, "listing failed; deferring");
                    self.stats.dirs_retried += 1;
                    self.deferred.push_back(PendingDir {
                        path: dir.path,
                        attempt: dir.attempt + 1,
                    });
                } else {
                    self.stats.dirs_failed += 1;
                    self.emit_warning(
                        WarningCode::EnumerateDirFailed,
                        dir.path.to_normal(),
                        e.to_string(),
                    );
                }
                return;
            }
        };
        self.stats.dirs_listed += 1;
        let parent_normal = dir.path.to_normal();

        for entry in entries {
            let info = match entry {
                Ok(info) => info,
                Err(fault) => {
                    let path = dir.path.join(&fault.name).to_normal();
                    self.emit_warning(WarningCode::EnumerateEntryFailed, path, fault.message);
                    continue;
                }
            };
            let child = dir.path.join(&info.name);
            match info.kind {
                EntryKind::Dir => self.queue.push_back(PendingDir {
                    path: child,
                    attempt: 0,
                }),
                EntryKind::Other => trace!(path = %child, "skipping non-regular entry"),
                EntryKind::File => {
                    if self.matches_filter(&info.name) {
                        self.visit_file(child, &parent_normal, info.name);
                    }
                }
            }
        }
    }

    fn visit_file(&mut self, path: PathLiteral, parent_normal: &str, name: String) {
        let st = match self.gw.stat(&path) {
            Ok(st) => st,
            Err(e) => {
                self.emit_warning(WarningCode::EnumerateEntryFailed, path.to_normal(), e.to_string());
                return;
            }
        };
        let (corrupt_candidate, corrupt_reason) = match &self.options.probe {
            Some(probe) => {
                let out = probe.probe(self.gw, &path, st.size);
                (out.corrupt, out.reason)
            }
            None => (false, None),
        };
        let sha256 = if self.options.hash {
            match self.gw.sha256(&path) {
                Ok(h) => Some(h),
                Err(e) => {
                    self.emit_warning(WarningCode::HashFailed, path.to_normal(), e.to_string());
                    None
                }
            }
        } else {
            None
        };
        let extension = path_codec::split_extension(&name).1.map(str::to_string);
        self.stats.files += 1;
        self.ready.push_back(WalkEvent::File(FileRecord {
            full_path: path.to_normal(),
            parent_dir: parent_normal.to_string(),
            name,
            extension,
            size_bytes: st.size,
            modified_at_utc: st.modified.as_ref().map(format_utc),
            corrupt_candidate,
            corrupt_reason,
            sha256,
        }));
    }
}

impl<G: FileSystemGateway + ?Sized> Iterator for TreeWalker<'_, G> {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        loop {
            if let Some(ev) = self.ready.pop_front() {
                return Some(ev);
            }
            let dir = self.next_dir()?;
            self.visit(dir);
        }
    }
}
