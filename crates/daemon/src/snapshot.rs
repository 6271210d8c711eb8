// Fleet snapshot loading

use std::path::{Path, PathBuf};

use fleetsweep_reaper::inventory::FleetSnapshot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read a `{ "workers": [...], "live_vms": [...] }` document
pub async fn load_snapshot(path: &Path) -> Result<FleetSnapshot, SnapshotError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&raw).map_err(|source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsweep_reaper::{VmRef, WorkerStatus};

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "fleetsweep-{}-{name}.json",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_snapshot() {
        let path = scratch_file(
            "valid",
            r#"{
                "workers": [
                    {
                        "name": "agent-1",
                        "status": "offline",
                        "delete_requested": true,
                        "vm": { "cloud": "pool-east", "instance": "vm-1" }
                    },
                    { "name": "static-1", "status": "online" }
                ],
                "live_vms": [ { "cloud": "pool-east", "instance": "vm-1" } ]
            }"#,
        );

        let snapshot = load_snapshot(&path).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(snapshot.workers.len(), 2);
        assert_eq!(snapshot.workers[0].status, WorkerStatus::Offline);
        assert!(snapshot.workers[0].delete_requested);
        assert!(!snapshot.workers[1].delete_requested);
        assert!(snapshot.workers[1].vm.is_none());
        assert_eq!(snapshot.live_vms, vec![VmRef::new("pool-east", "vm-1")]);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = load_snapshot(Path::new("/nonexistent/fleetsweep/fleet.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }

    #[tokio::test]
    async fn test_malformed_snapshot() {
        let path = scratch_file("malformed", r#"{ "workers": [ { "status": "offline" } ] }"#);

        let err = load_snapshot(&path).await.unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, SnapshotError::Parse { .. }));
        assert!(err.to_string().contains("invalid snapshot"));
    }
}
