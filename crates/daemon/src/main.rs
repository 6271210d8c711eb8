mod config;
mod snapshot;

use std::sync::Arc;

use anyhow::{Context, Result};
use fleetsweep_reaper::prelude::*;
use fleetsweep_reaper::telemetry::{init_telemetry, TelemetryConfig};

use crate::config::DaemonConfig;
use crate::snapshot::load_snapshot;

#[tokio::main]
async fn main() -> Result<()> {
    // OTEL_SERVICE_NAME, OTEL_EXPORTER_OTLP_ENDPOINT and RUST_LOG / LOG_LEVEL
    // override the defaults; keep the guard alive until exit
    let _telemetry_guard = init_telemetry(&TelemetryConfig::from_env("fleetsweep-daemon"));

    tracing::info!("fleetsweep starting...");

    let config = DaemonConfig::from_env().context("Invalid daemon configuration")?;
    let snapshot = load_snapshot(&config.snapshot_path)
        .await
        .context("Failed to load fleet snapshot")?;

    tracing::info!(
        snapshot = %config.snapshot_path.display(),
        workers = snapshot.workers.len(),
        live_vms = snapshot.live_vms.len(),
        interval_secs = config.scheduler.interval.as_secs(),
        max_concurrency = config.sweep.max_concurrency,
        once = config.once,
        "Loaded fleet"
    );

    let fleet = Arc::new(InMemoryFleet::from_snapshot(snapshot));
    let sweep = Arc::new(ReconcilerSweep::new(
        fleet.clone(),
        fleet.clone(),
        config.sweep.clone(),
    ));
    let cancel = CancellationToken::new();

    if config.once {
        let report = tokio::select! {
            report = sweep.run(&cancel) => report,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                cancel.cancel();
                return Ok(());
            }
        };

        let output = serde_json::json!({
            "report": report,
            "fleet": fleet.snapshot(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to render sweep report")?
        );
        return Ok(());
    }

    let handle = spawn_sweep_task(sweep, config.scheduler.clone(), cancel.clone());

    // Blocks until shutdown
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Received shutdown signal");

    cancel.cancel();
    handle.await.context("Sweep task failed")?;

    tracing::info!(remaining_workers = fleet.worker_count(), "Shutdown complete");
    Ok(())
}
