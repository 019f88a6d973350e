//! Plan-driven relocation: plan parsing, per-entry execution, audit, rollback, lease.

pub mod audit;
pub mod executor;
pub mod lease;
pub mod plan;
pub mod unique;

pub use audit::{
    ApplySummary, AuditLog, MoveResult, RollbackReport, read_audit, write_rollback_plan,
};
pub use executor::{ApplyOptions, ApplyReport, OnDstExists, PlanExecutor, apply_plan};
pub use lease::RunLease;
pub use plan::{MoveEntry, PlanItem, open_plan};
pub use unique::{UniqueNameError, resolve_unique_destination};
