//! Periodic trigger for the cleanup sweep
//!
//! The sweep owns no timing logic; this loop fires it on a fixed interval.
//! Each sweep is awaited inside the loop, so ticks never overlap, and
//! ticks missed while a long sweep runs are skipped rather than queued.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::reliability::duration_millis;
use crate::sweep::ReconcilerSweep;

/// Longest interval or initial delay the loop honours (about 30 years)
const MAX_SCHEDULE_SPAN: Duration = Duration::from_secs(86400 * 365 * 30);

/// Configuration for the sweep schedule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval between sweeps (default: 15 minutes)
    #[serde(with = "duration_millis")]
    pub interval: Duration,

    /// Delay before the first sweep (default: none)
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            initial_delay: Duration::ZERO,
        }
    }
}

impl SchedulerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

/// Spawn the sweep loop
///
/// The loop stops once `cancel` fires; a sweep in progress is interrupted.
pub fn spawn_sweep_task(
    sweep: Arc<ReconcilerSweep>,
    config: SchedulerConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_sweep_loop(sweep, config, cancel).await;
    })
}

/// Main sweep loop
pub async fn run_sweep_loop(
    sweep: Arc<ReconcilerSweep>,
    config: SchedulerConfig,
    cancel: CancellationToken,
) {
    // tokio panics on a zero period or an instant past its range
    let period = config
        .interval
        .clamp(Duration::from_millis(1), MAX_SCHEDULE_SPAN);
    let initial_delay = config.initial_delay.min(MAX_SCHEDULE_SPAN);
    let mut ticker = interval_at(Instant::now() + initial_delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_secs = period.as_secs(),
        initial_delay_secs = initial_delay.as_secs(),
        max_concurrency = sweep.config().max_concurrency,
        "Worker sweep task started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Worker sweep task shutting down");
                break;
            }
            _ = ticker.tick() => {
                let report = sweep.run(&cancel).await;
                debug!(sweep_id = %report.sweep_id, "Sweep tick finished");
            }
        }
    }
}
