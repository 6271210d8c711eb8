//! In-memory fleet implementing both collaborator traits
//!
//! Used by the test-suite and by the daemon's snapshot mode. Deprovisioning
//! a worker makes its VM disappear, so the following sweep removes the
//! record, mirroring an idle-timeout in a real cloud.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::store::{CloudError, CloudProvider, InventoryError, WorkerInventory};
use super::worker::{VmRef, Worker};

/// A collaborator call observed by [`InMemoryFleet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetCall {
    ListWorkers,
    VmExists(VmRef),
    RemoveWorker(String),
    Deprovision(String),
}

impl FleetCall {
    /// Whether this call was made on behalf of `worker`
    pub fn concerns(&self, worker: &Worker) -> bool {
        match self {
            Self::ListWorkers => false,
            Self::VmExists(vm) => worker.vm.as_ref() == Some(vm),
            Self::RemoveWorker(name) | Self::Deprovision(name) => *name == worker.name,
        }
    }
}

/// Serializable view of a fleet: tracked workers plus the VMs still alive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    #[serde(default)]
    pub workers: Vec<Worker>,

    #[serde(default)]
    pub live_vms: Vec<VmRef>,
}

#[derive(Default)]
struct FleetState {
    workers: BTreeMap<String, Worker>,
    live_vms: HashSet<VmRef>,
}

#[derive(Default)]
struct FaultPlan {
    listing: bool,
    existence: HashSet<VmRef>,
    removals: HashSet<String>,
    deprovisions: HashMap<String, u32>,
}

/// In-memory implementation of [`WorkerInventory`] and [`CloudProvider`]
///
/// # Example
///
/// ```
/// use fleetsweep_reaper::inventory::{InMemoryFleet, VmRef, Worker};
///
/// let vm = VmRef::new("pool-east", "vm-1");
/// let fleet = InMemoryFleet::new();
/// fleet.add_worker(Worker::new("agent-1", vm.clone()));
/// fleet.add_live_vm(vm);
///
/// assert_eq!(fleet.worker_count(), 1);
/// ```
pub struct InMemoryFleet {
    state: RwLock<FleetState>,
    faults: RwLock<FaultPlan>,
    calls: Mutex<Vec<FleetCall>>,
}

impl InMemoryFleet {
    /// Create an empty fleet
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FleetState::default()),
            faults: RwLock::new(FaultPlan::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a fleet seeded from a snapshot
    pub fn from_snapshot(snapshot: FleetSnapshot) -> Self {
        let fleet = Self::new();
        {
            let mut state = fleet.state.write();
            for worker in snapshot.workers {
                state.workers.insert(worker.name.clone(), worker);
            }
            state.live_vms.extend(snapshot.live_vms);
        }
        fleet
    }

    /// Capture the current fleet contents
    pub fn snapshot(&self) -> FleetSnapshot {
        let state = self.state.read();
        FleetSnapshot {
            workers: state.workers.values().cloned().collect(),
            live_vms: state.live_vms.iter().cloned().collect(),
        }
    }

    /// Track a worker, replacing any worker with the same name
    pub fn add_worker(&self, worker: Worker) {
        self.state
            .write()
            .workers
            .insert(worker.name.clone(), worker);
    }

    /// Mark a VM as existing in the cloud
    pub fn add_live_vm(&self, vm: VmRef) {
        self.state.write().live_vms.insert(vm);
    }

    /// Look up a tracked worker
    pub fn worker(&self, name: &str) -> Option<Worker> {
        self.state.read().workers.get(name).cloned()
    }

    /// Number of tracked workers
    pub fn worker_count(&self) -> usize {
        self.state.read().workers.len()
    }

    /// Whether the VM currently exists
    pub fn is_vm_live(&self, vm: &VmRef) -> bool {
        self.state.read().live_vms.contains(vm)
    }

    /// Make every `list_workers` call fail
    pub fn fail_listing(&self) {
        self.faults.write().listing = true;
    }

    /// Make existence checks for the named worker's VM fail
    pub fn fail_existence_check(&self, name: &str) {
        if let Some(vm) = self.worker(name).and_then(|w| w.vm) {
            self.faults.write().existence.insert(vm);
        }
    }

    /// Make record removal for the named worker fail
    pub fn fail_removal(&self, name: &str) {
        self.faults.write().removals.insert(name.to_string());
    }

    /// Make the next `times` deprovision calls for the named worker fail
    ///
    /// Use `u32::MAX` for a worker that never deprovisions.
    pub fn fail_deprovision(&self, name: &str, times: u32) {
        self.faults
            .write()
            .deprovisions
            .insert(name.to_string(), times);
    }

    /// Every collaborator call made so far, in order
    pub fn calls(&self) -> Vec<FleetCall> {
        self.calls.lock().clone()
    }

    /// Calls made on behalf of `worker`
    pub fn calls_for(&self, worker: &Worker) -> Vec<FleetCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.concerns(worker))
            .cloned()
            .collect()
    }

    /// Number of calls matching a predicate
    pub fn count_calls(&self, predicate: impl Fn(&FleetCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(*call)).count()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: FleetCall) {
        self.calls.lock().push(call);
    }
}

impl Default for InMemoryFleet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerInventory for InMemoryFleet {
    async fn list_workers(&self) -> Result<Vec<Worker>, InventoryError> {
        self.record(FleetCall::ListWorkers);

        if self.faults.read().listing {
            return Err(InventoryError::Backend("injected listing failure".into()));
        }

        Ok(self.state.read().workers.values().cloned().collect())
    }

    async fn remove_worker(&self, worker: &Worker) -> Result<(), InventoryError> {
        self.record(FleetCall::RemoveWorker(worker.name.clone()));

        if self.faults.read().removals.contains(&worker.name) {
            return Err(InventoryError::Backend(format!(
                "injected removal failure for {}",
                worker.name
            )));
        }

        self.state
            .write()
            .workers
            .remove(&worker.name)
            .map(|_| ())
            .ok_or_else(|| InventoryError::NotFound(worker.name.clone()))
    }
}

#[async_trait]
impl CloudProvider for InMemoryFleet {
    async fn vm_exists(&self, vm: &VmRef) -> Result<bool, CloudError> {
        self.record(FleetCall::VmExists(vm.clone()));

        if self.faults.read().existence.contains(vm) {
            return Err(CloudError::Transport(format!(
                "injected existence check failure for {vm}"
            )));
        }

        Ok(self.state.read().live_vms.contains(vm))
    }

    async fn deprovision(&self, worker: &Worker) -> Result<(), CloudError> {
        self.record(FleetCall::Deprovision(worker.name.clone()));

        {
            let mut faults = self.faults.write();
            if let Some(remaining) = faults.deprovisions.get_mut(&worker.name) {
                if *remaining > 0 {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    return Err(CloudError::Transport(format!(
                        "injected deprovision failure for {}",
                        worker.name
                    )));
                }
            }
        }

        let vm = worker
            .vm
            .as_ref()
            .ok_or_else(|| CloudError::MissingVm(worker.name.clone()))?;

        self.state.write().live_vms.remove(vm);
        Ok(())
    }
}
