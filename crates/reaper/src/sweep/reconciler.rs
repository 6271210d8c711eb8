//! Reconciliation sweep over pool workers
//!
//! Each sweep lists every worker, picks the ones that are offline and
//! flagged for deletion, and either drops their record (VM already gone)
//! or asks the cloud to deprovision them under a retry policy.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn, Span};
use uuid::Uuid;

use super::report::{SkipReason, SweepReport, WorkerAction};
use crate::inventory::{CloudProvider, VmRef, Worker, WorkerInventory};
use crate::reliability::{Cancelled, Outcome, RetryExecutor, RetryPolicy};

/// Sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepConfig {
    /// Policy for the deprovision call
    pub deprovision_policy: RetryPolicy,

    /// Workers reconciled at the same time
    pub max_concurrency: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            deprovision_policy: RetryPolicy::deprovision(),
            max_concurrency: 4,
        }
    }
}

impl SweepConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deprovision retry policy
    pub fn with_deprovision_policy(mut self, policy: RetryPolicy) -> Self {
        self.deprovision_policy = policy;
        self
    }

    /// Set maximum concurrency
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }
}

/// Whether a worker is up for cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility<'a> {
    Skip(SkipReason),
    /// Offline, flagged for deletion, backed by this VM
    Candidate(&'a VmRef),
}

/// Decide whether the sweep should act on a worker
pub fn classify(worker: &Worker) -> Eligibility<'_> {
    let Some(vm) = worker.vm.as_ref() else {
        return Eligibility::Skip(SkipReason::NotCloudBacked);
    };

    if !worker.is_offline() {
        Eligibility::Skip(SkipReason::Online)
    } else if !worker.is_delete_requested() {
        Eligibility::Skip(SkipReason::NotFlagged)
    } else {
        Eligibility::Candidate(vm)
    }
}

/// Garbage-collects offline workers flagged for deletion
///
/// # Example
///
/// ```ignore
/// use fleetsweep_reaper::{ReconcilerSweep, SweepConfig};
///
/// let sweep = ReconcilerSweep::new(inventory, cloud, SweepConfig::default());
/// let report = sweep.run(&cancel).await;
/// ```
pub struct ReconcilerSweep {
    inventory: Arc<dyn WorkerInventory>,
    cloud: Arc<dyn CloudProvider>,
    executor: RetryExecutor,
    config: SweepConfig,
}

impl ReconcilerSweep {
    /// Create a sweep over the given collaborators
    pub fn new(
        inventory: Arc<dyn WorkerInventory>,
        cloud: Arc<dyn CloudProvider>,
        config: SweepConfig,
    ) -> Self {
        Self {
            inventory,
            cloud,
            executor: RetryExecutor::new(config.deprovision_policy.clone()),
            config,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run one sweep over every known worker
    ///
    /// Never fails: per-worker problems are logged and counted in the
    /// returned report. When `cancel` fires, no further worker is started,
    /// in-flight calls are abandoned and the report is marked interrupted.
    #[instrument(skip_all, fields(sweep_id = tracing::field::Empty))]
    pub async fn run(&self, cancel: &CancellationToken) -> SweepReport {
        let mut report = SweepReport::new(Uuid::now_v7());
        Span::current().record("sweep_id", tracing::field::display(report.sweep_id));

        let workers = match cancellable(cancel, self.inventory.list_workers()).await {
            Ok(Ok(workers)) => workers,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to list workers, skipping sweep");
                report.inventory_unavailable = true;
                return conclude(report);
            }
            Err(Cancelled) => {
                info!("Sweep cancelled before listing workers");
                report.interrupted = true;
                return conclude(report);
            }
        };

        debug!(workers = workers.len(), "Listed workers");

        let mut results = futures::stream::iter(workers)
            .map(|worker| self.reconcile_isolated(worker, cancel))
            .buffer_unordered(self.config.max_concurrency.max(1));

        while let Some(result) = results.next().await {
            match result {
                Ok(action) => report.record(action),
                Err(Cancelled) => report.interrupted = true,
            }
        }

        conclude(report)
    }

    /// Reconcile one worker
    ///
    /// Returns [`Cancelled`] only when `cancel` fires; every other failure
    /// is logged and folded into the returned action.
    pub async fn reconcile(
        &self,
        worker: &Worker,
        cancel: &CancellationToken,
    ) -> Result<WorkerAction, Cancelled> {
        let vm = match classify(worker) {
            Eligibility::Skip(reason) => {
                trace!(worker = %worker.name, ?reason, "Skipping worker");
                return Ok(WorkerAction::Skipped { reason });
            }
            Eligibility::Candidate(vm) => vm,
        };

        let exists = match cancellable(cancel, self.cloud.vm_exists(vm)).await? {
            Ok(exists) => exists,
            Err(e) => {
                warn!(
                    worker = %worker.name,
                    vm = %vm,
                    error = %e,
                    "VM existence check failed, skipping worker this sweep"
                );
                return Ok(WorkerAction::ExistenceCheckFailed);
            }
        };

        if !exists {
            let action = match cancellable(cancel, self.inventory.remove_worker(worker)).await? {
                Ok(()) => {
                    info!(worker = %worker.name, vm = %vm, "Backing VM is gone, removed worker record");
                    WorkerAction::RecordRemoved
                }
                Err(e) => {
                    warn!(worker = %worker.name, error = %e, "Failed to remove worker record");
                    WorkerAction::RecordRemovalFailed
                }
            };
            return Ok(action);
        }

        let cloud = &self.cloud;
        let outcome = self
            .executor
            .execute(|| cloud.deprovision(worker), cancel)
            .await?;

        let action = match outcome {
            Outcome::Success { attempts, .. } => {
                info!(worker = %worker.name, vm = %vm, attempts, "Deprovision triggered");
                WorkerAction::Deprovisioned { attempts }
            }
            Outcome::Failure(failure) => {
                warn!(
                    worker = %worker.name,
                    vm = %vm,
                    attempts = failure.attempts,
                    error = %failure.cause,
                    "Failed to deprovision worker"
                );
                WorkerAction::DeprovisionFailed {
                    attempts: failure.attempts,
                }
            }
        };

        Ok(action)
    }

    /// Reconcile one worker, containing panics to that worker
    async fn reconcile_isolated(
        &self,
        worker: Worker,
        cancel: &CancellationToken,
    ) -> Result<WorkerAction, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        match AssertUnwindSafe(self.reconcile(&worker, cancel))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                error!(
                    worker = %worker.name,
                    panic = %panic_message(payload.as_ref()),
                    "Worker reconciliation panicked"
                );
                Ok(WorkerAction::Panicked)
            }
        }
    }
}

/// Race a future against the cancellation token
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, Cancelled> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        output = future => Ok(output),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Stamp the report and emit the one summary line every sweep ends with
fn conclude(mut report: SweepReport) -> SweepReport {
    report.finish();
    info!(
        examined = report.examined(),
        skipped = report.skipped,
        records_removed = report.records_removed,
        deprovisioned = report.deprovisioned,
        failures = report.failures(),
        interrupted = report.interrupted,
        duration_ms = report.duration_ms().unwrap_or_default(),
        inventory_unavailable = report.inventory_unavailable,
        "Sweep completed"
    );
    report
}
