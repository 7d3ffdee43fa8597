//! Cluster definition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Role of a node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Control-plane node.
    Master,
    /// Worker node.
    Worker,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Worker => f.write_str("worker"),
        }
    }
}

/// One virtual machine of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesNode {
    /// Appended to the cluster name to form the VM name.
    pub name_suffix: String,
    /// Hypervisor VM id, unique per hypervisor.
    pub vmid: u32,
    /// Virtual CPU cores.
    pub cores: u16,
    /// Memory in MiB.
    #[serde(rename = "memory")]
    pub memory_mb: u32,
    /// Static IPv4 address.
    pub ip_address: String,
    /// Hypervisor storage pool holding the VM disk.
    pub storage_pool: String,
    /// Role of the node.
    pub node_type: NodeType,
}

impl KubernetesNode {
    /// Creates a node description.
    #[must_use]
    pub fn new(vmid: u32, name_suffix: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name_suffix: name_suffix.into(),
            vmid,
            cores: 2,
            memory_mb: 4096,
            ip_address: String::new(),
            storage_pool: "local-lvm".to_string(),
            node_type,
        }
    }

    /// Sets the IP address.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self
    }

    /// Sets cores and memory.
    #[must_use]
    pub fn with_resources(mut self, cores: u16, memory_mb: u32) -> Self {
        self.cores = cores;
        self.memory_mb = memory_mb;
        self
    }

    /// Sets the storage pool.
    #[must_use]
    pub fn with_storage_pool(mut self, pool: impl Into<String>) -> Self {
        self.storage_pool = pool.into();
        self
    }

    /// VM name for this node within `cluster_name`.
    #[must_use]
    pub fn vm_name(&self, cluster_name: &str) -> String {
        format!("{cluster_name}-{}", self.name_suffix)
    }

    /// Returns true for master nodes.
    #[must_use]
    pub fn is_master(&self) -> bool {
        self.node_type == NodeType::Master
    }
}

/// Network settings shared by all nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    /// Default gateway.
    pub gateway: String,
    /// Prefix length of the node subnet.
    pub subnet_mask_bits: u8,
    /// DNS server handed to cloud-init.
    pub dns_server: String,
    /// Hypervisor bridge the VM NICs attach to.
    pub bridge_interface: String,
}

/// SSH key pair used to reach the nodes.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    /// OpenSSH public key line.
    pub public_key: String,
    /// PEM/OpenSSH private key.
    pub private_key: String,
}

impl KeyPair {
    /// Creates a key pair.
    #[must_use]
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }

    /// Returns true when either half is missing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.public_key.trim().is_empty() || self.private_key.trim().is_empty()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// MicroK8s add-on enabled on the first master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    /// Add-on name, e.g. `dns`.
    pub name: String,
    /// Extra arguments appended to `microk8s enable`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    /// Raw manifests applied after the add-on is enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<String>,
}

impl Addon {
    /// Creates an add-on without arguments or manifests.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
            manifests: Vec::new(),
        }
    }

    /// Sets extra arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    /// Adds a manifest.
    #[must_use]
    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifests.push(manifest.into());
        self
    }
}

fn default_addons() -> Vec<Addon> {
    vec![Addon::new("dns"), Addon::new("helm3")]
}

/// Helm chart installed on the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmApp {
    /// Identifier in the project.
    #[serde(default)]
    pub id: String,
    /// Chart name, also used as the repository alias.
    pub chart_name: String,
    /// Chart version, latest when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Chart repository URL.
    pub repository: String,
    /// Helm release name.
    pub release_name: String,
    /// Target namespace.
    pub namespace: String,
    /// Inline values file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_file_content: Option<String>,
    /// Passes `--wait` to helm.
    #[serde(default)]
    pub wait: bool,
    /// Passed as `--set key=value`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

/// Raw Kubernetes manifest applied to the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sResource {
    /// Identifier in the project.
    #[serde(default)]
    pub id: String,
    /// Display name, also used for the temporary file name.
    pub name: String,
    /// Manifest YAML.
    pub content: String,
}

/// Everything needed to provision one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Cluster name, prefix of every VM name.
    pub cluster_name: String,
    /// Cloud-init user created on every node.
    pub node_username: String,
    /// Cloud-init password of that user.
    pub node_password: String,
    /// SSH key pair installed on every node.
    #[serde(default)]
    pub ssh_key: KeyPair,
    /// Size of the system disk, in GiB.
    pub node_disk_size_gb: u32,
    /// Cluster nodes.
    #[serde(default)]
    pub nodes: Vec<KubernetesNode>,
    /// Network settings.
    #[serde(default)]
    pub network: Network,
    /// Add-ons to enable.
    #[serde(default = "default_addons")]
    pub addons: Vec<Addon>,
    /// Helm charts to install.
    #[serde(default)]
    pub helm_apps: Vec<HelmApp>,
    /// Raw manifests to apply.
    #[serde(default)]
    pub k8s_resources: Vec<K8sResource>,
    /// Kubeconfig retrieved after the join.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config: Option<String>,
}

impl Cluster {
    /// Creates a cluster with default add-ons and no nodes.
    #[must_use]
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            node_username: "ubuntu".to_string(),
            node_password: String::new(),
            ssh_key: KeyPair::default(),
            node_disk_size_gb: 32,
            nodes: Vec::new(),
            network: Network::default(),
            addons: default_addons(),
            helm_apps: Vec::new(),
            k8s_resources: Vec::new(),
            kube_config: None,
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: KubernetesNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Sets the network.
    #[must_use]
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Sets the SSH key pair.
    #[must_use]
    pub fn with_ssh_key(mut self, key: KeyPair) -> Self {
        self.ssh_key = key;
        self
    }

    /// Sets the node credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.node_username = username.into();
        self.node_password = password.into();
        self
    }

    /// Looks up a node by VM id.
    #[must_use]
    pub fn node(&self, vmid: u32) -> Option<&KubernetesNode> {
        self.nodes.iter().find(|n| n.vmid == vmid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_vm_name() {
        let node = KubernetesNode::new(101, "master-1", NodeType::Master);
        assert_eq!(node.vm_name("demo"), "demo-master-1");
        assert!(node.is_master());
    }

    #[test]
    fn test_cluster_defaults_addons_when_missing() {
        let json = r#"{
            "clusterName": "demo",
            "nodeUsername": "ubuntu",
            "nodePassword": "secret",
            "nodeDiskSizeGb": 20,
            "nodes": [{
                "nameSuffix": "master-1",
                "vmid": 101,
                "cores": 2,
                "memory": 4096,
                "ipAddress": "10.0.0.11",
                "storagePool": "local-lvm",
                "nodeType": "master"
            }]
        }"#;

        let cluster: Cluster = serde_json::from_str(json).unwrap();

        assert_eq!(cluster.addons, vec![Addon::new("dns"), Addon::new("helm3")]);
        assert_eq!(cluster.nodes[0].memory_mb, 4096);
        assert!(cluster.ssh_key.is_empty());
        assert!(cluster.kube_config.is_none());
        assert_eq!(cluster.node(101).map(|n| n.ip_address.as_str()), Some("10.0.0.11"));
    }

    #[test]
    fn test_key_pair_debug_redacts_private_key() {
        let key = KeyPair::new("ssh-rsa AAAA", "-----BEGIN-----");
        let debug = format!("{key:?}");
        assert!(debug.contains("ssh-rsa AAAA"));
        assert!(!debug.contains("BEGIN"));
        assert!(!key.is_empty());
    }
}
