//! Typed VM configuration sent to the hypervisor.

use crate::errors::HypervisorError;
use crate::utils::{is_dns_label, path_escape};
use serde::{Deserialize, Serialize};

/// Lowest VM id accepted by Proxmox VE.
pub const MIN_VMID: u32 = 100;
/// Highest VM id accepted by Proxmox VE.
pub const MAX_VMID: u32 = 999_999_999;

/// VM configuration for create and update calls.
///
/// Only the fields that are set are serialized, so the same type describes
/// a full creation and a partial update. Build it through
/// [`VmDefinition::builder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmDefinition {
    /// VM id.
    pub vmid: u32,
    /// VM name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// CPU cores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u16>,
    /// Memory in MiB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    /// Guest OS type, `l26` for Linux 2.6+.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ostype: Option<String>,
    /// First network device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net0: Option<String>,
    /// SCSI controller model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scsihw: Option<String>,
    /// First SCSI disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scsi0: Option<String>,
    /// IDE slot 2, used for the cloud-init drive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ide2: Option<String>,
    /// Boot order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<String>,
    /// Boot disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootdisk: Option<String>,
    /// First serial device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial0: Option<String>,
    /// Display device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vga: Option<String>,
    /// Cloud-init IP configuration of `net0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipconfig0: Option<String>,
    /// Cloud-init DNS server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameserver: Option<String>,
    /// Cloud-init user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciuser: Option<String>,
    /// Cloud-init password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipassword: Option<String>,
    /// Cloud-init public keys, percent-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sshkeys: Option<String>,
}

impl VmDefinition {
    /// Starts a definition for `vmid`.
    #[must_use]
    pub fn builder(vmid: u32) -> VmDefinitionBuilder {
        VmDefinitionBuilder {
            definition: Self {
                vmid,
                ..Self::default()
            },
        }
    }

    fn has_settings(&self) -> bool {
        *self
            != Self {
                vmid: self.vmid,
                ..Self::default()
            }
    }
}

/// Builder for [`VmDefinition`].
#[derive(Debug, Clone)]
pub struct VmDefinitionBuilder {
    definition: VmDefinition,
}

impl VmDefinitionBuilder {
    /// Sets the VM name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.definition.name = Some(name.into());
        self
    }

    /// Sets CPU cores and memory.
    #[must_use]
    pub fn resources(mut self, cores: u16, memory_mb: u32) -> Self {
        self.definition.cores = Some(cores);
        self.definition.memory = Some(memory_mb);
        self
    }

    /// Sets the guest OS type.
    #[must_use]
    pub fn os_type(mut self, os_type: impl Into<String>) -> Self {
        self.definition.ostype = Some(os_type.into());
        self
    }

    /// Attaches a virtio NIC to `bridge`.
    #[must_use]
    pub fn virtio_network(mut self, bridge: &str) -> Self {
        self.definition.net0 = Some(format!("model=virtio,bridge={bridge}"));
        self
    }

    /// Sets the SCSI controller and first disk.
    #[must_use]
    pub fn scsi_disk(mut self, controller: impl Into<String>, disk: impl Into<String>) -> Self {
        self.definition.scsihw = Some(controller.into());
        self.definition.scsi0 = Some(disk.into());
        self
    }

    /// Attaches the cloud-init drive from `storage_pool`.
    #[must_use]
    pub fn cloud_init_drive(mut self, storage_pool: &str) -> Self {
        self.definition.ide2 = Some(format!("{storage_pool}:cloudinit"));
        self
    }

    /// Sets boot order and boot disk.
    #[must_use]
    pub fn boot(mut self, order: impl Into<String>, disk: impl Into<String>) -> Self {
        self.definition.boot = Some(order.into());
        self.definition.bootdisk = Some(disk.into());
        self
    }

    /// Routes the display to a serial socket.
    #[must_use]
    pub fn serial_console(mut self) -> Self {
        self.definition.serial0 = Some("socket".to_string());
        self.definition.vga = Some("serial0".to_string());
        self
    }

    /// Sets a static IPv4 configuration.
    #[must_use]
    pub fn ip_config(mut self, ip: &str, mask_bits: u8, gateway: &str) -> Self {
        self.definition.ipconfig0 = Some(format!("ip={ip}/{mask_bits},gw={gateway}"));
        self
    }

    /// Sets the DNS server.
    #[must_use]
    pub fn nameserver(mut self, server: impl Into<String>) -> Self {
        self.definition.nameserver = Some(server.into());
        self
    }

    /// Sets the cloud-init user and password.
    #[must_use]
    pub fn cloud_init_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.definition.ciuser = Some(user.into());
        self.definition.cipassword = Some(password.into());
        self
    }

    /// Sets the authorized public key.
    #[must_use]
    pub fn ssh_public_key(mut self, key: &str) -> Self {
        self.definition.sshkeys = Some(path_escape(key));
        self
    }

    /// Validates and returns the definition.
    pub fn build(self) -> Result<VmDefinition, HypervisorError> {
        let d = self.definition;
        let invalid = |msg: String| Err(HypervisorError::InvalidDefinition(msg));

        if !(MIN_VMID..=MAX_VMID).contains(&d.vmid) {
            return invalid(format!(
                "vmid {} outside {MIN_VMID}..={MAX_VMID}",
                d.vmid
            ));
        }
        if let Some(name) = &d.name {
            if !is_dns_label(name) {
                return invalid(format!("[{name}] is not a valid DNS name"));
            }
        }
        if d.cores == Some(0) {
            return invalid("cores must be greater than zero".to_string());
        }
        if d.memory == Some(0) {
            return invalid("memory must be greater than zero".to_string());
        }
        if !d.has_settings() {
            return invalid(format!("definition for VM [{}] changes nothing", d.vmid));
        }
        Ok(d)
    }
}

/// Disk resize request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskResize {
    /// VM id, carried in the request path.
    #[serde(skip)]
    pub vmid: u32,
    /// Disk slot, e.g. `scsi0`.
    pub disk: String,
    /// New size, e.g. `32G`.
    pub size: String,
}

impl DiskResize {
    /// Resizes `disk` of `vmid` to `size_gb` GiB.
    #[must_use]
    pub fn gigabytes(vmid: u32, disk: impl Into<String>, size_gb: u32) -> Self {
        Self {
            vmid,
            disk: disk.into(),
            size: format!("{size_gb}G"),
        }
    }
}
