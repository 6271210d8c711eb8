// Daemon configuration
//
// Everything comes from the environment; values that fail to parse fall
// back to their defaults.

use std::path::PathBuf;
use std::time::Duration;

use fleetsweep_reaper::{RetryPolicy, SchedulerConfig, SweepConfig};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

/// Settings for one daemon process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub sweep: SweepConfig,
    pub scheduler: SchedulerConfig,
    /// JSON fleet snapshot to sweep
    pub snapshot_path: PathBuf,
    /// Run a single sweep and exit
    pub once: bool,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SWEEP_INTERVAL_SECS`: Seconds between sweeps (default: 900)
    /// - `SWEEP_INITIAL_DELAY_SECS`: Seconds before the first sweep (default: 0)
    /// - `SWEEP_MAX_CONCURRENCY`: Workers reconciled in parallel (default: 4)
    /// - `DEPROVISION_MAX_ATTEMPTS`: Deprovision attempts per worker (default: 3)
    /// - `DEPROVISION_BACKOFF_SECS`: Pause between attempts (default: 10)
    /// - `DEPROVISION_TIMEOUT_SECS`: Ceiling across all attempts (default: 1800)
    /// - `FLEET_SNAPSHOT_PATH`: Fleet snapshot file (required)
    /// - `SWEEP_ONCE`: `true` or `1` to run one sweep and exit
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secs = |key: &str, default: u64| {
            Duration::from_secs(
                lookup(key)
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(default),
            )
        };

        let defaults = RetryPolicy::deprovision();
        let max_attempts = lookup("DEPROVISION_MAX_ATTEMPTS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_attempts);
        let policy = defaults
            .with_max_attempts(max_attempts)
            .with_backoff(secs("DEPROVISION_BACKOFF_SECS", 10))
            .with_timeout(secs("DEPROVISION_TIMEOUT_SECS", 1800));

        let max_concurrency = lookup("SWEEP_MAX_CONCURRENCY")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(4);

        let sweep = SweepConfig::new()
            .with_deprovision_policy(policy)
            .with_max_concurrency(max_concurrency);

        let scheduler = SchedulerConfig::default()
            .with_interval(secs("SWEEP_INTERVAL_SECS", 900))
            .with_initial_delay(secs("SWEEP_INITIAL_DELAY_SECS", 0));

        let snapshot_path = lookup("FLEET_SNAPSHOT_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("FLEET_SNAPSHOT_PATH"))?;

        let once = lookup("SWEEP_ONCE")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            sweep,
            scheduler,
            snapshot_path,
            once,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<DaemonConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("FLEET_SNAPSHOT_PATH", "/var/lib/fleet.json")]).unwrap();

        assert_eq!(config.scheduler.interval, Duration::from_secs(900));
        assert_eq!(config.scheduler.initial_delay, Duration::ZERO);
        assert_eq!(config.sweep.max_concurrency, 4);
        assert_eq!(config.sweep.deprovision_policy, RetryPolicy::deprovision());
        assert_eq!(config.snapshot_path, PathBuf::from("/var/lib/fleet.json"));
        assert!(!config.once);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("FLEET_SNAPSHOT_PATH", "fleet.json"),
            ("SWEEP_INTERVAL_SECS", "60"),
            ("SWEEP_INITIAL_DELAY_SECS", "5"),
            ("SWEEP_MAX_CONCURRENCY", "8"),
            ("DEPROVISION_MAX_ATTEMPTS", "5"),
            ("DEPROVISION_BACKOFF_SECS", "2"),
            ("DEPROVISION_TIMEOUT_SECS", "120"),
            ("SWEEP_ONCE", "true"),
        ])
        .unwrap();

        assert_eq!(config.scheduler.interval, Duration::from_secs(60));
        assert_eq!(config.scheduler.initial_delay, Duration::from_secs(5));
        assert_eq!(config.sweep.max_concurrency, 8);

        let policy = &config.sweep.deprovision_policy;
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff, Duration::from_secs(2));
        assert_eq!(policy.timeout, Duration::from_secs(120));
        assert!(config.once);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = load(&[
            ("FLEET_SNAPSHOT_PATH", "fleet.json"),
            ("SWEEP_INTERVAL_SECS", "fifteen minutes"),
            ("DEPROVISION_MAX_ATTEMPTS", "-1"),
            ("SWEEP_ONCE", "maybe"),
        ])
        .unwrap();

        assert_eq!(config.scheduler.interval, Duration::from_secs(900));
        assert_eq!(config.sweep.deprovision_policy.max_attempts, 3);
        assert!(!config.once);
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let config = load(&[
            ("FLEET_SNAPSHOT_PATH", "fleet.json"),
            ("SWEEP_MAX_CONCURRENCY", "0"),
        ])
        .unwrap();
        assert_eq!(config.sweep.max_concurrency, 1);
    }

    #[test]
    fn test_snapshot_path_required() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::Missing("FLEET_SNAPSHOT_PATH")
        );
        assert_eq!(
            load(&[("FLEET_SNAPSHOT_PATH", "  ")]).unwrap_err(),
            ConfigError::Missing("FLEET_SNAPSHOT_PATH")
        );
    }
}
