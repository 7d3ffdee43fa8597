//! Hypervisor API contract.
//!
//! The orchestrator drives VM lifecycle through the [`Hypervisor`] trait.
//! Every method returns an error on transport failure or a non-2xx answer;
//! callers treat those as fatal unless they wrap the call in a retry.

mod definition;
#[cfg(feature = "proxmox")]
mod proxmox;

pub use definition::{DiskResize, VmDefinition, VmDefinitionBuilder, MAX_VMID, MIN_VMID};
#[cfg(feature = "proxmox")]
pub use proxmox::{ApiToken, ProxmoxClient};

use crate::errors::HypervisorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Power state reported by the hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    /// The guest is running.
    Running,
    /// The guest is powered off.
    Stopped,
}

/// Storage pool of the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    /// Pool name.
    #[serde(rename = "storage")]
    pub name: String,
    /// Comma-separated content types, e.g. `images,rootdir`.
    #[serde(default)]
    pub content: String,
}

impl Storage {
    /// Returns true if the pool can hold VM disk images.
    #[must_use]
    pub fn holds_images(&self) -> bool {
        self.content.split(',').any(|c| c.trim() == "images")
    }
}

/// Network interface of a hypervisor node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Interface name, e.g. `vmbr0`.
    pub iface: String,
    /// IPv4 address.
    #[serde(default)]
    pub address: Option<String>,
    /// Gateway.
    #[serde(default)]
    pub gateway: Option<String>,
    /// Address in CIDR notation.
    #[serde(default)]
    pub cidr: Option<String>,
}

impl NetworkInterface {
    /// Prefix length parsed from `cidr`.
    #[must_use]
    pub fn subnet_mask_bits(&self) -> Option<u8> {
        self.cidr
            .as_deref()
            .and_then(|cidr| cidr.split_once('/'))
            .and_then(|(_, bits)| bits.parse().ok())
    }
}

/// Operations the provisioning engine needs from the hypervisor.
#[async_trait]
pub trait Hypervisor: Send + Sync {
    /// Name of the hypervisor node VMs are created on.
    fn node_name(&self) -> &str;

    /// Creates a VM.
    async fn create_vm(&self, definition: &VmDefinition) -> Result<(), HypervisorError>;

    /// Updates the configuration of an existing VM.
    async fn update_vm(&self, definition: &VmDefinition) -> Result<(), HypervisorError>;

    /// Grows a VM disk.
    async fn resize_disk(&self, resize: &DiskResize) -> Result<(), HypervisorError>;

    /// Powers a VM on.
    async fn start_vm(&self, vmid: u32) -> Result<(), HypervisorError>;

    /// Requests an ACPI shutdown.
    async fn shutdown_vm(&self, vmid: u32) -> Result<(), HypervisorError>;

    /// Powers a VM off immediately.
    async fn stop_vm(&self, vmid: u32) -> Result<(), HypervisorError>;

    /// Destroys a stopped VM and its disks.
    async fn delete_vm(&self, vmid: u32) -> Result<(), HypervisorError>;

    /// Current power state.
    async fn current_status(&self, vmid: u32) -> Result<VmStatus, HypervisorError>;

    /// Ids of every VM and container on the node.
    async fn list_used_ids(&self) -> Result<BTreeSet<u32>, HypervisorError>;

    /// Storage pools.
    async fn list_storage(&self) -> Result<Vec<Storage>, HypervisorError>;

    /// Bridge interfaces of `node`.
    async fn list_network_bridges(&self, node: &str) -> Result<Vec<NetworkInterface>, HypervisorError>;
}
