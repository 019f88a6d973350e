//! Cheap liveness check for a file: is it empty, and can its head be read?

use tracing::debug;

use crate::gateway::FileSystemGateway;
use crate::path_codec::PathLiteral;

pub const DEFAULT_READ_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProbeOutcome {
    pub corrupt: bool,
    pub reason: Option<String>,
}

impl ProbeOutcome {
    fn healthy() -> Self {
        Self::default()
    }

    fn corrupt(reason: impl Into<String>) -> Self {
        Self {
            corrupt: true,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorruptionProbe {
    read_bytes: usize,
}

impl Default for CorruptionProbe {
    fn default() -> Self {
        Self::new(DEFAULT_READ_BYTES)
    }
}

impl CorruptionProbe {
    /// `read_bytes` is clamped to at least 1.
    pub fn new(read_bytes: usize) -> Self {
        Self {
            read_bytes: read_bytes.max(1),
        }
    }

    pub fn read_bytes(&self) -> usize {
        self.read_bytes
    }

    /// Size 0 is flagged without I/O; otherwise a failed head read flags the file.
    pub fn probe<G>(&self, gw: &G, path: &PathLiteral, size: u64) -> ProbeOutcome
    where
        G: FileSystemGateway + ?Sized,
    {
        if size == 0 {
            return ProbeOutcome::corrupt("size_zero");
        }
        match gw.read_head(path, self.read_bytes) {
            Ok(_) => ProbeOutcome::healthy(),
            Err(e) => {
                debug!(path = %path, error = %e, "head read failed");
                ProbeOutcome::corrupt(format!("read_failed:{e}"))
            }
        }
    }
}
