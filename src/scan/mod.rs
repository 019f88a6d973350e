//! Tree enumeration: walker, corruption probe, record types and the inventory run.

pub mod inventory;
pub mod probe;
pub mod record;
pub mod walker;

pub use inventory::{InventoryOptions, InventoryReport, run_inventory};
pub use probe::{CorruptionProbe, DEFAULT_READ_BYTES, ProbeOutcome};
pub use record::{FileRecord, WalkEvent, Warning, WarningCode};
pub use walker::{TreeWalker, WalkOptions, WalkStats, normalize_extensions};
