//! Collaborator traits for the pool inventory and the cloud API

use async_trait::async_trait;

use super::worker::{VmRef, Worker};

/// Error type for inventory operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// Worker is not tracked by the inventory
    #[error("worker not found: {0}")]
    NotFound(String),

    /// Inventory backend failed
    #[error("inventory backend error: {0}")]
    Backend(String),
}

/// Error type for cloud API calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloudError {
    /// Request never got a usable response
    #[error("transport error: {0}")]
    Transport(String),

    /// Cloud API refused the request
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Worker has no backing VM to act on
    #[error("worker {0} has no backing vm")]
    MissingVm(String),
}

/// Source of truth for which workers belong to the pool
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait WorkerInventory: Send + Sync {
    /// All workers currently tracked, in no particular order
    async fn list_workers(&self) -> Result<Vec<Worker>, InventoryError>;

    /// Remove a worker's bookkeeping record
    async fn remove_worker(&self, worker: &Worker) -> Result<(), InventoryError>;
}

/// Cloud API operations on the VMs backing workers
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Whether the VM still exists in the cloud
    async fn vm_exists(&self, vm: &VmRef) -> Result<bool, CloudError>;

    /// Trigger the worker's idle-timeout / shutdown action
    async fn deprovision(&self, worker: &Worker) -> Result<(), CloudError>;
}
