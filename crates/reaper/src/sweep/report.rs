//! Per-sweep outcome accounting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a worker was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Worker has no backing VM
    NotCloudBacked,
    /// Worker is still online
    Online,
    /// Nobody asked for the worker to be deleted
    NotFlagged,
}

/// What the sweep did with one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkerAction {
    Skipped { reason: SkipReason },
    RecordRemoved,
    RecordRemovalFailed,
    Deprovisioned { attempts: u32 },
    DeprovisionFailed { attempts: u32 },
    ExistenceCheckFailed,
    Panicked,
}

/// Summary of one sweep
///
/// The host never sees per-worker errors; this report, logged at the end
/// of each sweep, is the only aggregate view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    pub skipped: usize,
    pub records_removed: usize,
    pub record_removal_failures: usize,
    pub deprovisioned: usize,
    pub deprovision_failures: usize,
    pub existence_check_failures: usize,
    pub panicked: usize,

    /// Cancellation stopped the sweep before every worker was handled
    pub interrupted: bool,

    /// The worker list could not be fetched
    pub inventory_unavailable: bool,
}

impl SweepReport {
    /// Start a report for a new sweep
    pub fn new(sweep_id: Uuid) -> Self {
        Self {
            sweep_id,
            started_at: Utc::now(),
            finished_at: None,
            skipped: 0,
            records_removed: 0,
            record_removal_failures: 0,
            deprovisioned: 0,
            deprovision_failures: 0,
            existence_check_failures: 0,
            panicked: 0,
            interrupted: false,
            inventory_unavailable: false,
        }
    }

    /// Count a worker's action
    pub fn record(&mut self, action: WorkerAction) {
        match action {
            WorkerAction::Skipped { .. } => self.skipped += 1,
            WorkerAction::RecordRemoved => self.records_removed += 1,
            WorkerAction::RecordRemovalFailed => self.record_removal_failures += 1,
            WorkerAction::Deprovisioned { .. } => self.deprovisioned += 1,
            WorkerAction::DeprovisionFailed { .. } => self.deprovision_failures += 1,
            WorkerAction::ExistenceCheckFailed => self.existence_check_failures += 1,
            WorkerAction::Panicked => self.panicked += 1,
        }
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Workers that reached a terminal action this sweep
    pub fn examined(&self) -> usize {
        self.skipped + self.acted_on()
    }

    /// Workers that were eligible for cleanup
    pub fn acted_on(&self) -> usize {
        self.records_removed
            + self.record_removal_failures
            + self.deprovisioned
            + self.deprovision_failures
            + self.existence_check_failures
            + self.panicked
    }

    /// Workers whose cleanup did not go through
    pub fn failures(&self) -> usize {
        self.record_removal_failures
            + self.deprovision_failures
            + self.existence_check_failures
            + self.panicked
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts() {
        let mut report = SweepReport::new(Uuid::now_v7());
        report.record(WorkerAction::Skipped {
            reason: SkipReason::Online,
        });
        report.record(WorkerAction::RecordRemoved);
        report.record(WorkerAction::DeprovisionFailed { attempts: 3 });
        report.record(WorkerAction::Panicked);

        assert_eq!(report.examined(), 4);
        assert_eq!(report.acted_on(), 3);
        assert_eq!(report.failures(), 2);
        assert!(report.duration_ms().is_none());

        report.finish();
        assert!(report.duration_ms().unwrap() >= 0);
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_value(WorkerAction::Deprovisioned { attempts: 2 }).unwrap();
        assert_eq!(json["action"], "deprovisioned");
        assert_eq!(json["attempts"], 2);

        let json = serde_json::to_value(WorkerAction::Skipped {
            reason: SkipReason::NotCloudBacked,
        })
        .unwrap();
        assert_eq!(json["reason"], "not_cloud_backed");
    }
}
