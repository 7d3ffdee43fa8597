//! Proxmox VE REST client.

use super::{DiskResize, Hypervisor, NetworkInterface, Storage, VmDefinition, VmStatus};
use crate::errors::HypervisorError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Proxmox API token (`USER@REALM!TOKENID` plus secret).
#[derive(Clone)]
pub struct ApiToken {
    token_id: String,
    secret: String,
}

impl ApiToken {
    /// Creates a token.
    #[must_use]
    pub fn new(token_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            secret: secret.into(),
        }
    }

    fn header_value(&self) -> String {
        format!("PVEAPIToken={}={}", self.token_id, self.secret)
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiToken")
            .field("token_id", &self.token_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct Response<T> {
    data: T,
}

#[derive(Deserialize)]
struct StatusData {
    status: VmStatus,
}

#[derive(Deserialize)]
struct GuestId {
    // Proxmox reports qemu ids as numbers and lxc ids as strings.
    vmid: serde_json::Value,
}

impl GuestId {
    fn parse(&self) -> Result<u32, HypervisorError> {
        let id = match &self.vmid {
            serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        };
        id.ok_or_else(|| HypervisorError::Protocol(format!("invalid vmid {}", self.vmid)))
    }
}

/// [`Hypervisor`] implementation over the Proxmox VE API.
#[derive(Debug, Clone)]
pub struct ProxmoxClient {
    http: reqwest::Client,
    base_url: String,
    node: String,
    token: ApiToken,
}

impl ProxmoxClient {
    /// Creates a client for `https://{host}:{port}/api2/json` managing `node`.
    pub fn new(
        host: &str,
        port: u16,
        node: impl Into<String>,
        token: ApiToken,
        accept_invalid_certs: bool,
    ) -> Result<Self, HypervisorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| HypervisorError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: format!("https://{host}:{port}/api2/json"),
            node: node.into(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HypervisorError> {
        let response = self
            .http
            .get(self.url(path))
            .header("Authorization", self.token.header_value())
            .send()
            .await
            .map_err(|e| HypervisorError::Transport(e.to_string()))?;
        let response = check_status(response).await?;
        let body: Response<T> = response
            .json()
            .await
            .map_err(|e| HypervisorError::Protocol(e.to_string()))?;
        Ok(body.data)
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<(), HypervisorError> {
        tracing::debug!(method = %method, path, "Proxmox request");
        let response = self
            .http
            .request(method, self.url(path))
            .header("Authorization", self.token.header_value())
            .json(body)
            .send()
            .await
            .map_err(|e| HypervisorError::Transport(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), HypervisorError> {
        tracing::debug!(path, "Proxmox delete");
        let response = self
            .http
            .delete(self.url(path))
            .header("Authorization", self.token.header_value())
            .send()
            .await
            .map_err(|e| HypervisorError::Transport(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn power(&self, vmid: u32, action: &str) -> Result<(), HypervisorError> {
        // The API rejects power requests without a body.
        self.send(
            reqwest::Method::POST,
            &format!("/nodes/{}/qemu/{vmid}/status/{action}", self.node),
            &serde_json::json!({}),
        )
        .await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, HypervisorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), body = %body, "Proxmox request failed");
    Err(HypervisorError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Hypervisor for ProxmoxClient {
    fn node_name(&self) -> &str {
        &self.node
    }

    async fn create_vm(&self, definition: &VmDefinition) -> Result<(), HypervisorError> {
        self.send(
            reqwest::Method::POST,
            &format!("/nodes/{}/qemu", self.node),
            definition,
        )
        .await
    }

    async fn update_vm(&self, definition: &VmDefinition) -> Result<(), HypervisorError> {
        self.send(
            reqwest::Method::PUT,
            &format!("/nodes/{}/qemu/{}/config", self.node, definition.vmid),
            definition,
        )
        .await
    }

    async fn resize_disk(&self, resize: &DiskResize) -> Result<(), HypervisorError> {
        self.send(
            reqwest::Method::PUT,
            &format!("/nodes/{}/qemu/{}/resize", self.node, resize.vmid),
            resize,
        )
        .await
    }

    async fn start_vm(&self, vmid: u32) -> Result<(), HypervisorError> {
        self.power(vmid, "start").await
    }

    async fn shutdown_vm(&self, vmid: u32) -> Result<(), HypervisorError> {
        self.power(vmid, "shutdown").await
    }

    async fn stop_vm(&self, vmid: u32) -> Result<(), HypervisorError> {
        self.power(vmid, "stop").await
    }

    async fn delete_vm(&self, vmid: u32) -> Result<(), HypervisorError> {
        self.delete(&format!("/nodes/{}/qemu/{vmid}?purge=1", self.node))
            .await
    }

    async fn current_status(&self, vmid: u32) -> Result<VmStatus, HypervisorError> {
        let data: StatusData = self
            .get(&format!("/nodes/{}/qemu/{vmid}/status/current", self.node))
            .await?;
        Ok(data.status)
    }

    async fn list_used_ids(&self) -> Result<BTreeSet<u32>, HypervisorError> {
        let mut ids = BTreeSet::new();
        for kind in ["qemu", "lxc"] {
            let guests: Vec<GuestId> = self.get(&format!("/nodes/{}/{kind}", self.node)).await?;
            for guest in &guests {
                ids.insert(guest.parse()?);
            }
        }
        Ok(ids)
    }

    async fn list_storage(&self) -> Result<Vec<Storage>, HypervisorError> {
        self.get("/storage").await
    }

    async fn list_network_bridges(&self, node: &str) -> Result<Vec<NetworkInterface>, HypervisorError> {
        self.get(&format!("/nodes/{node}/network?type=bridge")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_header() {
        let token = ApiToken::new("root@pam!proxkube", "0000-1111");
        assert_eq!(token.header_value(), "PVEAPIToken=root@pam!proxkube=0000-1111");
        assert!(!format!("{token:?}").contains("0000-1111"));
    }

    #[test]
    fn test_guest_id_parsing() {
        let guests: Vec<GuestId> =
            serde_json::from_str(r#"[{"vmid": 101}, {"vmid": "202"}]"#).unwrap();
        let ids: Vec<u32> = guests.iter().map(|g| g.parse().unwrap()).collect();
        assert_eq!(ids, vec![101, 202]);

        let bad: GuestId = serde_json::from_str(r#"{"vmid": true}"#).unwrap();
        assert!(matches!(bad.parse(), Err(HypervisorError::Protocol(_))));
    }

    #[test]
    fn test_client_urls() {
        let client = ProxmoxClient::new("pve.local", 8006, "pve", ApiToken::new("a", "b"), true).unwrap();
        assert_eq!(client.node_name(), "pve");
        assert_eq!(client.url("/storage"), "https://pve.local:8006/api2/json/storage");
    }
}
