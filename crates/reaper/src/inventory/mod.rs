//! Worker model and the collaborators the sweep talks to
//!
//! The sweep never reaches for ambient state: the pool inventory and the
//! cloud API are handed to it as [`WorkerInventory`] and [`CloudProvider`]
//! trait objects.

mod memory;
mod store;
mod worker;

pub use memory::{FleetCall, FleetSnapshot, InMemoryFleet};
pub use store::{CloudError, CloudProvider, InventoryError, WorkerInventory};
pub use worker::{VmRef, Worker, WorkerStatus};
