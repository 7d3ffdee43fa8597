//! In-memory hypervisor that records every call.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::errors::HypervisorError;
use crate::hypervisor::{DiskResize, Hypervisor, NetworkInterface, Storage, VmDefinition, VmStatus};

/// Hypervisor operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HypervisorOp {
    /// `create_vm`.
    Create,
    /// `update_vm`.
    Update,
    /// `resize_disk`.
    Resize,
    /// `start_vm`.
    Start,
    /// `shutdown_vm`.
    Shutdown,
    /// `stop_vm`.
    Stop,
    /// `current_status`.
    Status,
    /// `delete_vm`.
    Delete,
}

/// A call seen by [`FakeHypervisor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HypervisorCall {
    /// VM created.
    Create(VmDefinition),
    /// VM updated.
    Update(VmDefinition),
    /// Disk resized.
    Resize(DiskResize),
    /// VM started.
    Start(u32),
    /// Shutdown requested.
    Shutdown(u32),
    /// VM stopped.
    Stop(u32),
    /// Status polled.
    Status(u32),
    /// VM deleted.
    Delete(u32),
}

impl HypervisorCall {
    /// VM id the call targeted.
    #[must_use]
    pub fn vmid(&self) -> u32 {
        match self {
            Self::Create(d) | Self::Update(d) => d.vmid,
            Self::Resize(r) => r.vmid,
            Self::Start(id)
            | Self::Shutdown(id)
            | Self::Stop(id)
            | Self::Status(id)
            | Self::Delete(id) => *id,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<HypervisorCall>,
    failures: HashMap<(HypervisorOp, u32), HypervisorError>,
    used_ids: BTreeSet<u32>,
    power: HashMap<u32, VmStatus>,
    ignores_shutdown: HashSet<u32>,
}

/// A [`Hypervisor`] tracking power state in memory.
///
/// Created VMs start stopped. `start_vm` marks a VM running, `shutdown_vm`
/// and `stop_vm` mark it stopped, except that VMs registered with
/// [`ignore_shutdown`](Self::ignore_shutdown) keep running until stopped.
#[derive(Debug)]
pub struct FakeHypervisor {
    node: String,
    storage: Vec<Storage>,
    bridges: Vec<NetworkInterface>,
    state: Mutex<State>,
}

impl FakeHypervisor {
    /// Creates a hypervisor for node `node`.
    #[must_use]
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            storage: Vec::new(),
            bridges: Vec::new(),
            state: Mutex::new(State::default()),
        }
    }

    /// Marks `ids` as already taken.
    #[must_use]
    pub fn with_used_ids(self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.state.lock().used_ids.extend(ids);
        self
    }

    /// Registers an existing VM in the given power state.
    pub fn add_vm(&self, vmid: u32, status: VmStatus) {
        let mut state = self.state.lock();
        state.used_ids.insert(vmid);
        state.power.insert(vmid, status);
    }

    /// Sets the storage inventory.
    #[must_use]
    pub fn with_storage(mut self, storage: Vec<Storage>) -> Self {
        self.storage = storage;
        self
    }

    /// Sets the bridge inventory.
    #[must_use]
    pub fn with_bridges(mut self, bridges: Vec<NetworkInterface>) -> Self {
        self.bridges = bridges;
        self
    }

    /// Marks `vmid` as taken by a VM outside the test.
    pub fn reserve_id(&self, vmid: u32) {
        self.state.lock().used_ids.insert(vmid);
    }

    /// Fails the next `op` on `vmid` with `error`.
    pub fn fail(&self, op: HypervisorOp, vmid: u32, error: HypervisorError) {
        self.state.lock().failures.insert((op, vmid), error);
    }

    /// Makes `vmid` ignore ACPI shutdown requests.
    pub fn ignore_shutdown(&self, vmid: u32) {
        self.state.lock().ignores_shutdown.insert(vmid);
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<HypervisorCall> {
        self.state.lock().calls.clone()
    }

    /// Calls targeting `vmid`, in order.
    #[must_use]
    pub fn calls_for(&self, vmid: u32) -> Vec<HypervisorCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.vmid() == vmid)
            .cloned()
            .collect()
    }

    /// Power state of `vmid`, if it exists.
    #[must_use]
    pub fn status_of(&self, vmid: u32) -> Option<VmStatus> {
        self.state.lock().power.get(&vmid).copied()
    }

    fn record(&self, op: HypervisorOp, vmid: u32, call: HypervisorCall) -> Result<(), HypervisorError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.failures.remove(&(op, vmid)) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn set_power(&self, vmid: u32, status: VmStatus) {
        self.state.lock().power.insert(vmid, status);
    }
}

#[async_trait]
impl Hypervisor for FakeHypervisor {
    fn node_name(&self) -> &str {
        &self.node
    }

    async fn create_vm(&self, definition: &VmDefinition) -> Result<(), HypervisorError> {
        self.record(HypervisorOp::Create, definition.vmid, HypervisorCall::Create(definition.clone()))?;
        let mut state = self.state.lock();
        state.used_ids.insert(definition.vmid);
        state.power.insert(definition.vmid, VmStatus::Stopped);
        Ok(())
    }

    async fn update_vm(&self, definition: &VmDefinition) -> Result<(), HypervisorError> {
        self.record(HypervisorOp::Update, definition.vmid, HypervisorCall::Update(definition.clone()))
    }

    async fn resize_disk(&self, resize: &DiskResize) -> Result<(), HypervisorError> {
        self.record(HypervisorOp::Resize, resize.vmid, HypervisorCall::Resize(resize.clone()))
    }

    async fn start_vm(&self, vmid: u32) -> Result<(), HypervisorError> {
        self.record(HypervisorOp::Start, vmid, HypervisorCall::Start(vmid))?;
        self.set_power(vmid, VmStatus::Running);
        Ok(())
    }

    async fn shutdown_vm(&self, vmid: u32) -> Result<(), HypervisorError> {
        self.record(HypervisorOp::Shutdown, vmid, HypervisorCall::Shutdown(vmid))?;
        if !self.state.lock().ignores_shutdown.contains(&vmid) {
            self.set_power(vmid, VmStatus::Stopped);
        }
        Ok(())
    }

    async fn stop_vm(&self, vmid: u32) -> Result<(), HypervisorError> {
        self.record(HypervisorOp::Stop, vmid, HypervisorCall::Stop(vmid))?;
        self.set_power(vmid, VmStatus::Stopped);
        Ok(())
    }

    async fn delete_vm(&self, vmid: u32) -> Result<(), HypervisorError> {
        self.record(HypervisorOp::Delete, vmid, HypervisorCall::Delete(vmid))?;
        let mut state = self.state.lock();
        if state.power.get(&vmid) == Some(&VmStatus::Running) {
            return Err(HypervisorError::Status {
                status: 500,
                body: format!("VM {vmid} is running - destroy failed"),
            });
        }
        state.used_ids.remove(&vmid);
        state.power.remove(&vmid);
        Ok(())
    }

    async fn current_status(&self, vmid: u32) -> Result<VmStatus, HypervisorError> {
        self.record(HypervisorOp::Status, vmid, HypervisorCall::Status(vmid))?;
        self.status_of(vmid)
            .ok_or_else(|| HypervisorError::Status {
                status: 500,
                body: format!("Configuration file for VM {vmid} does not exist"),
            })
    }

    async fn list_used_ids(&self) -> Result<BTreeSet<u32>, HypervisorError> {
        Ok(self.state.lock().used_ids.clone())
    }

    async fn list_storage(&self) -> Result<Vec<Storage>, HypervisorError> {
        Ok(self.storage.clone())
    }

    async fn list_network_bridges(&self, node: &str) -> Result<Vec<NetworkInterface>, HypervisorError> {
        if node != self.node {
            return Err(HypervisorError::Status {
                status: 500,
                body: format!("hostname lookup '{node}' failed"),
            });
        }
        Ok(self.bridges.clone())
    }
}
