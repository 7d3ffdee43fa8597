//! Provisioner configuration.

use crate::errors::ProvisionError;
use crate::pipeline::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings of the provisioning engine.
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Directory on the hypervisor host holding the base OS image.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Cloud image downloaded into `data_dir`.
    #[serde(default = "default_os_image_url")]
    pub os_image_url: String,
    /// Snap channel for MicroK8s, e.g. `1.28/stable`.
    #[serde(default)]
    pub kubernetes_channel: Option<String>,
    /// Wait for a started VM to accept SSH.
    #[serde(default = "default_vm_poll_retry")]
    pub vm_boot_retry: RetryPolicy,
    /// Wait for a VM to power off.
    #[serde(default = "default_vm_poll_retry")]
    pub vm_shutdown_retry: RetryPolicy,
    /// Attempts of the package upgrade.
    #[serde(default = "default_vm_poll_retry")]
    pub os_update_retry: RetryPolicy,
    /// Attempts of `microk8s enable`.
    #[serde(default = "default_addon_retry")]
    pub addon_retry: RetryPolicy,
    /// Helm binary on the nodes.
    #[serde(default = "default_helm_command")]
    pub helm_command: String,
    /// kubectl binary on the nodes.
    #[serde(default = "default_kubectl_command")]
    pub kubectl_command: String,
    /// SSH port of the nodes.
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    /// SSH connection timeout in seconds.
    #[serde(default = "default_ssh_connect_timeout")]
    pub ssh_connect_timeout_secs: u64,
}

fn default_data_dir() -> String {
    "/var/k4p".to_string()
}

fn default_os_image_url() -> String {
    "https://cloud-images.ubuntu.com/jammy/current/jammy-server-cloudimg-amd64.img".to_string()
}

fn default_vm_poll_retry() -> RetryPolicy {
    RetryPolicy::new(30, Duration::from_secs(10))
}

fn default_addon_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_secs(5))
}

fn default_helm_command() -> String {
    "microk8s.helm3".to_string()
}

fn default_kubectl_command() -> String {
    "microk8s.kubectl".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_connect_timeout() -> u64 {
    10
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            os_image_url: default_os_image_url(),
            kubernetes_channel: None,
            vm_boot_retry: default_vm_poll_retry(),
            vm_shutdown_retry: default_vm_poll_retry(),
            os_update_retry: default_vm_poll_retry(),
            addon_retry: default_addon_retry(),
            helm_command: default_helm_command(),
            kubectl_command: default_kubectl_command(),
            ssh_port: default_ssh_port(),
            ssh_connect_timeout_secs: default_ssh_connect_timeout(),
        }
    }
}

impl ProvisionerConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ProvisionError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ProvisionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.data_dir.trim().is_empty() {
            return Err(ProvisionError::Config("data_dir must not be empty".into()));
        }
        if self.image_file_name().is_empty() {
            return Err(ProvisionError::Config(format!(
                "os_image_url [{}] has no file name",
                self.os_image_url
            )));
        }
        Ok(())
    }

    /// Sets the Kubernetes channel.
    #[must_use]
    pub fn with_kubernetes_channel(mut self, channel: impl Into<String>) -> Self {
        self.kubernetes_channel = Some(channel.into());
        self
    }

    /// Uses `policy` for every VM wait and the OS upgrade.
    #[must_use]
    pub fn with_vm_retry(mut self, policy: RetryPolicy) -> Self {
        self.vm_boot_retry = policy;
        self.vm_shutdown_retry = policy;
        self.os_update_retry = policy;
        self
    }

    /// Sets the add-on retry policy.
    #[must_use]
    pub fn with_addon_retry(mut self, policy: RetryPolicy) -> Self {
        self.addon_retry = policy;
        self
    }

    /// File name of the OS image, the last segment of its URL.
    #[must_use]
    pub fn image_file_name(&self) -> &str {
        self.os_image_url
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Full path of the OS image on the hypervisor host.
    #[must_use]
    pub fn image_path(&self) -> String {
        format!("{}/{}", self.data_dir.trim_end_matches('/'), self.image_file_name())
    }

    /// SSH connection timeout.
    #[must_use]
    pub fn ssh_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_connect_timeout_secs)
    }
}
