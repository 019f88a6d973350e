//! Core library for `relocator`.
//!
//! Journaled bulk file relocation over drive-rooted (Windows) paths:
//! - `scan`: fault-isolating tree walks, corruption probing, inventory runs;
//! - `snapshot`: atomic JSONL publication and tree snapshots;
//! - `relocate`: plan execution with an append-only audit, rollback plans, run lease;
//! - `gateway`: the filesystem boundary (native std::fs or a PowerShell 7 bridge).

pub mod cli;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod jsonl;
pub mod output;
pub mod path_codec;
pub mod platform;
pub mod relocate;
pub mod rotate;
pub mod scan;
pub mod shutdown;
pub mod snapshot;

pub use config::{Backend, Config, LogLevel, default_config_path, path_has_symlink_ancestor};
pub use errors::RelocateError;
pub use gateway::{DriveMap, FileSystemGateway, NativeGateway, PwshGateway};
pub use path_codec::{PathLiteral, PathValidationError, from_long_literal, to_long_literal};
pub use relocate::{ApplyOptions, ApplyReport, OnDstExists, apply_plan, write_rollback_plan};
pub use rotate::{RotateOptions, rotate_move_dir};
pub use scan::{InventoryOptions, TreeWalker, WalkEvent, WalkOptions, run_inventory};
pub use snapshot::{AtomicSnapshotWriter, SnapshotOptions, write_snapshot};

/// Build the gateway selected by `cfg.backend`.
pub fn gateway_from_config(cfg: &Config) -> Result<Box<dyn FileSystemGateway>, RelocateError> {
    match cfg.backend {
        Backend::Native => Ok(Box::new(NativeGateway::new(cfg.drives.clone()))),
        Backend::Pwsh => Ok(Box::new(PwshGateway::discover(cfg.pwsh_exe.as_deref())?)),
    }
}
