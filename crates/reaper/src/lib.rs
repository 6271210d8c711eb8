//! # Fleet Reaper
//!
//! Periodic garbage collection for cloud-backed workers of an elastic pool.
//!
//! ## Features
//!
//! - **Retry-protected remote calls**: Fixed backoff, attempt budget and an overall timeout ceiling
//! - **Failure isolation**: One worker's errors or panics never stop the rest of a sweep
//! - **Bounded concurrency**: Workers are reconciled in parallel up to a configured limit
//! - **Cooperative cancellation**: Shutdown interrupts backoff sleeps and in-flight calls
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Scheduler loop                         │
//! │        (fixed interval, skips missed ticks, cancellable)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ tick
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ReconcilerSweep                         │
//! │   (lists workers, classifies, removes or deprovisions)      │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//! ┌──────────────────────┐          ┌──────────────────────────┐
//! │   WorkerInventory    │          │  RetryExecutor           │
//! │ (list, remove record)│          │   └─▶ CloudProvider      │
//! └──────────────────────┘          │  (vm_exists, deprovision)│
//!                                   └──────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use fleetsweep_reaper::prelude::*;
//!
//! let fleet = Arc::new(InMemoryFleet::from_snapshot(snapshot));
//! let sweep = Arc::new(ReconcilerSweep::new(fleet.clone(), fleet, SweepConfig::default()));
//!
//! let cancel = CancellationToken::new();
//! let handle = spawn_sweep_task(sweep, SchedulerConfig::default(), cancel.clone());
//!
//! // ... later
//! cancel.cancel();
//! handle.await?;
//! ```

pub mod inventory;
pub mod reliability;
pub mod scheduler;
pub mod sweep;
pub mod telemetry;

/// Prelude for common imports
pub mod prelude {
    pub use crate::inventory::{
        CloudError, CloudProvider, FleetSnapshot, InMemoryFleet, InventoryError, VmRef, Worker,
        WorkerInventory, WorkerStatus,
    };
    pub use crate::reliability::{Cancelled, Outcome, RetryExecutor, RetryPolicy};
    pub use crate::scheduler::{spawn_sweep_task, SchedulerConfig};
    pub use crate::sweep::{ReconcilerSweep, SweepConfig, SweepReport, WorkerAction};
    pub use tokio_util::sync::CancellationToken;
}

// Re-export key types at crate root
pub use inventory::{
    CloudError, CloudProvider, InMemoryFleet, InventoryError, VmRef, Worker, WorkerInventory,
    WorkerStatus,
};
pub use reliability::{Cancelled, Outcome, RetryExecutor, RetryFailure, RetryPolicy};
pub use scheduler::{spawn_sweep_task, SchedulerConfig};
pub use sweep::{ReconcilerSweep, SkipReason, SweepConfig, SweepReport, WorkerAction};
