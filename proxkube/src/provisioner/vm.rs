//! VM lifecycle stages.

use super::Provisioner;
use crate::errors::{ProvisionError, Result};
use crate::hypervisor::{DiskResize, VmDefinition, VmDefinitionBuilder, VmStatus};
use crate::model::{Cluster, KubernetesNode};
use crate::remote::ExecuteOptions;

pub(super) const OS_UPGRADE: &str = "sudo apt-get update \
    && sudo DEBIAN_FRONTEND=noninteractive apt-get upgrade -y \
    && sudo DEBIAN_FRONTEND=noninteractive apt-get autoremove -y";

pub(super) fn vm_details(vmid: u32) -> String {
    format!("VM ID: {vmid}")
}

impl Provisioner {
    pub(super) async fn create_virtual_machines(&self, cluster: &Cluster) -> Result<()> {
        self.observe("Check availability of VM ids".to_string(), self.check_vmids_free(cluster))
            .await?;
        self.for_each_node(cluster, |p, cluster, node| async move {
            p.create_vm(&cluster, &node).await
        })
        .await
    }

    async fn check_vmids_free(&self, cluster: &Cluster) -> Result<()> {
        let used = self.hypervisor.list_used_ids().await?;
        match cluster.nodes.iter().find(|n| used.contains(&n.vmid)) {
            Some(node) => Err(ProvisionError::VmIdInUse(node.vmid)),
            None => Ok(()),
        }
    }

    async fn create_vm(&self, cluster: &Cluster, node: &KubernetesNode) -> Result<()> {
        let id = node.vmid;
        self.observe(format!("[VM{id}] Create Virtual Machine"), self.create_vm_shell(cluster, node))
            .await?;
        self.observe(format!("[VM{id}] Import disk"), self.import_disk(node))
            .await?;
        self.observe(
            format!("[VM{id}] Setup scsi controller and attach to disk"),
            self.attach_disk(node),
        )
        .await?;
        self.observe(
            format!("[VM{id}] Resize disk to desired size"),
            self.resize_disk(cluster, node),
        )
        .await?;
        self.observe(
            format!("[VM{id}] Setup cloud init drive"),
            self.update_vm(VmDefinition::builder(id).cloud_init_drive(&node.storage_pool)),
        )
        .await?;
        self.observe(
            format!("[VM{id}] Setup boot disk"),
            self.update_vm(VmDefinition::builder(id).boot("c", "scsi0")),
        )
        .await?;
        self.observe(
            format!("[VM{id}] Setup serial console"),
            self.update_vm(VmDefinition::builder(id).serial_console()),
        )
        .await?;
        self.observe(format!("[VM{id}] Setup cloud init"), self.configure_cloud_init(cluster, node))
            .await
    }

    async fn create_vm_shell(&self, cluster: &Cluster, node: &KubernetesNode) -> Result<()> {
        let definition = VmDefinition::builder(node.vmid)
            .name(node.vm_name(&cluster.cluster_name))
            .resources(node.cores, node.memory_mb)
            .os_type("l26")
            .virtio_network(&cluster.network.bridge_interface)
            .build()?;
        self.hypervisor.create_vm(&definition).await?;
        Ok(())
    }

    async fn import_disk(&self, node: &KubernetesNode) -> Result<()> {
        let command = format!(
            "qm importdisk {} {} {}",
            node.vmid,
            self.config.image_path(),
            node.storage_pool
        );
        self.host.run(&command).await?;
        Ok(())
    }

    async fn attach_disk(&self, node: &KubernetesNode) -> Result<()> {
        let disk = format!("{}:vm-{}-disk-0", node.storage_pool, node.vmid);
        self.update_vm(VmDefinition::builder(node.vmid).scsi_disk("virtio-scsi-pci", disk))
            .await
    }

    async fn resize_disk(&self, cluster: &Cluster, node: &KubernetesNode) -> Result<()> {
        let resize = DiskResize::gigabytes(node.vmid, "scsi0", cluster.node_disk_size_gb);
        self.hypervisor.resize_disk(&resize).await?;
        Ok(())
    }

    async fn configure_cloud_init(&self, cluster: &Cluster, node: &KubernetesNode) -> Result<()> {
        let network = &cluster.network;
        let update = VmDefinition::builder(node.vmid)
            .ip_config(&node.ip_address, network.subnet_mask_bits, &network.gateway)
            .nameserver(network.dns_server.clone())
            .cloud_init_user(cluster.node_username.clone(), cluster.node_password.clone())
            .ssh_public_key(&cluster.ssh_key.public_key);
        self.update_vm(update).await
    }

    async fn update_vm(&self, update: VmDefinitionBuilder) -> Result<()> {
        let definition = update.build()?;
        self.hypervisor.update_vm(&definition).await?;
        Ok(())
    }

    pub(super) async fn start_virtual_machines(&self, cluster: &Cluster) -> Result<()> {
        self.for_each_node(cluster, |p, cluster, node| async move {
            let session = p.events.start_with_details("Start virtual machine", vm_details(node.vmid));
            let started = p.start_vm(&cluster, &node).await;
            session.finish(started)
        })
        .await
    }

    async fn start_vm(&self, cluster: &Cluster, node: &KubernetesNode) -> Result<()> {
        self.hypervisor.start_vm(node.vmid).await?;

        let executor = self.node_executor(cluster, node).await?;
        let reachable = ExecuteOptions::new("uptime").with_policy(self.config.vm_boot_retry);
        executor.run_with_options(&reachable).await?;
        tracing::debug!(vmid = node.vmid, "VM reachable over SSH");
        Ok(())
    }

    pub(super) async fn update_vms_os(&self, cluster: &Cluster) -> Result<()> {
        self.for_each_node(cluster, |p, cluster, node| async move {
            let session = p.events.start_with_details("Update virtual machine OS", vm_details(node.vmid));
            let updated = p.update_os(&cluster, &node).await;
            session.finish(updated)
        })
        .await
    }

    async fn update_os(&self, cluster: &Cluster, node: &KubernetesNode) -> Result<()> {
        let executor = self.node_executor(cluster, node).await?;
        let upgrade = ExecuteOptions::new(OS_UPGRADE).with_policy(self.config.os_update_retry);
        executor.run_with_options(&upgrade).await?;
        Ok(())
    }

    pub(super) async fn shutdown_virtual_machines(&self, cluster: &Cluster) -> Result<()> {
        self.for_each_node(cluster, |p, _cluster, node| async move {
            let session = p.events.start_with_details("Shutdown virtual machine", vm_details(node.vmid));
            let stopped = p.shutdown_vm(node.vmid).await;
            session.finish(stopped)
        })
        .await
    }

    async fn shutdown_vm(&self, vmid: u32) -> Result<()> {
        self.hypervisor.shutdown_vm(vmid).await?;

        match self.wait_until_stopped(vmid).await {
            Err(ProvisionError::VmStillRunning(_)) => {
                tracing::warn!(vmid, "VM ignored shutdown request, stopping it");
                self.hypervisor.stop_vm(vmid).await?;
                self.wait_until_stopped(vmid).await
            }
            other => other,
        }
    }

    async fn wait_until_stopped(&self, vmid: u32) -> Result<()> {
        self.config
            .vm_shutdown_retry
            .run(|attempt| {
                tracing::debug!(vmid, attempt, "Waiting for VM to stop");
                self.check_stopped(vmid)
            })
            .await
    }

    async fn check_stopped(&self, vmid: u32) -> Result<()> {
        match self.hypervisor.current_status(vmid).await? {
            VmStatus::Stopped => Ok(()),
            VmStatus::Running => Err(ProvisionError::VmStillRunning(vmid)),
        }
    }

    pub(super) async fn setup_virtual_machines(&self, cluster: &Cluster) -> Result<()> {
        self.for_each_node(cluster, |p, cluster, node| async move {
            let session = p.events.start_with_details("Setup virtual machine OS", vm_details(node.vmid));
            match p.enable_iscsid(&cluster, &node).await {
                Ok(()) => {
                    session.done_with_details("[iscsid] service enabled");
                    Ok(())
                }
                Err(e) => {
                    session.report_error(&e);
                    Err(e)
                }
            }
        })
        .await
    }

    async fn enable_iscsid(&self, cluster: &Cluster, node: &KubernetesNode) -> Result<()> {
        self.run_on(cluster, node, "sudo systemctl enable iscsid")
            .await
            .map(drop)
    }
}
