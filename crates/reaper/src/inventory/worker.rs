//! Pool worker model

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection status of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Online,
    Offline,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Reference to the virtual machine backing a worker
///
/// The cloud owns the VM's lifecycle; this is only its identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VmRef {
    /// Cloud (or pool) the VM was provisioned in
    pub cloud: String,
    /// Instance name within that cloud
    pub instance: String,
}

impl VmRef {
    pub fn new(cloud: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            cloud: cloud.into(),
            instance: instance.into(),
        }
    }
}

impl fmt::Display for VmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cloud, self.instance)
    }
}

/// A compute node known to the pool inventory
///
/// `delete_requested` is set by whatever decides a worker is disposable;
/// the sweep only reads it. A worker without `vm` is not cloud-backed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Display name, unique within the inventory
    pub name: String,

    pub status: WorkerStatus,

    #[serde(default)]
    pub delete_requested: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm: Option<VmRef>,
}

impl Worker {
    /// Create an online, cloud-backed worker
    pub fn new(name: impl Into<String>, vm: VmRef) -> Self {
        Self {
            name: name.into(),
            status: WorkerStatus::Online,
            delete_requested: false,
            vm: Some(vm),
        }
    }

    /// Create an online worker with no backing VM
    pub fn unmanaged(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: WorkerStatus::Online,
            delete_requested: false,
            vm: None,
        }
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn offline(self) -> Self {
        self.with_status(WorkerStatus::Offline)
    }

    pub fn with_delete_requested(mut self, requested: bool) -> Self {
        self.delete_requested = requested;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.status == WorkerStatus::Offline
    }

    pub fn is_delete_requested(&self) -> bool {
        self.delete_requested
    }
}
