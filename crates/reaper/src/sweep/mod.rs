//! Worker cleanup sweep
//!
//! This module provides:
//! - [`ReconcilerSweep`] - One pass over the pool, run once per scheduler tick
//! - [`SweepReport`] - Counters describing what a pass did
//!
//! # Per-worker flow
//!
//! ```text
//!   classify ──skip──▶ Skipped
//!      │
//!   candidate
//!      │
//!   vm_exists? ──error──▶ ExistenceCheckFailed
//!      │    └──no──▶ remove_worker ──▶ RecordRemoved / RecordRemovalFailed
//!     yes
//!      │
//!   RetryExecutor(deprovision) ──▶ Deprovisioned / DeprovisionFailed
//! ```
//!
//! Nothing is carried between sweeps: every tick re-evaluates each worker
//! from the inventory's current view.

mod reconciler;
mod report;

pub use reconciler::{classify, Eligibility, ReconcilerSweep, SweepConfig};
pub use report::{SkipReason, SweepReport, WorkerAction};
