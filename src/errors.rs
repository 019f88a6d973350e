//! Typed error definitions for relocator.
//! Fatal failure modes of a whole run; per-item failures are recorded in the
//! audit/warning streams instead and never surface here.

use std::path::PathBuf;
use thiserror::Error;

use crate::path_codec::PathValidationError;

#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("Move plan not found: {0}")]
    PlanNotFound(PathBuf),

    #[error("Invalid enumeration root '{root}': {source}")]
    InvalidRoot {
        root: String,
        #[source]
        source: PathValidationError,
    },

    #[error("Enumeration root does not exist: {0}")]
    RootNotFound(String),

    #[error("Enumeration root is not a directory: {0}")]
    RootNotDirectory(String),

    #[error("Cannot create temporary file {path}: {source}")]
    TempFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create output {path}: {source}")]
    OutputCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Another relocation run holds the lease at {0}")]
    LeaseHeld(PathBuf),

    #[error("PowerShell bridge unavailable: {0}")]
    Bridge(String),

    #[error("Operation interrupted by user")]
    Interrupted,
}

impl RelocateError {
    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            RelocateError::PlanNotFound(_) => "plan_not_found",
            RelocateError::InvalidRoot { .. } => "invalid_root",
            RelocateError::RootNotFound(_) => "root_not_found",
            RelocateError::RootNotDirectory(_) => "root_not_directory",
            RelocateError::TempFile { .. } => "temp_file_failed",
            RelocateError::OutputCreate { .. } => "output_create_failed",
            RelocateError::LeaseHeld(_) => "lease_held",
            RelocateError::Bridge(_) => "bridge_unavailable",
            RelocateError::Interrupted => "interrupted",
        }
    }
}
