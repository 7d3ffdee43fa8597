//! Cluster-wide workloads: add-ons, Helm charts and raw manifests.
//!
//! All of them run sequentially against the first master. Manifests and
//! values files are streamed to a temporary file over stdin, used, then
//! removed.

use super::{output, values_file_path, Helm, Provisioner};
use crate::errors::Result;
use crate::model::{Addon, Cluster, HelmApp, K8sResource, KubernetesNode};
use crate::remote::{ExecuteOptions, RemoteExecutor};

impl Provisioner {
    pub(super) async fn install_addons(&self, cluster: &Cluster) -> Result<()> {
        if cluster.addons.is_empty() {
            return Ok(());
        }
        let master = self.first_master(cluster)?;

        for addon in &cluster.addons {
            self.observe(
                format!("Enable addon [{}]", addon.name),
                self.enable_addon(cluster, master, addon),
            )
            .await?;
        }
        Ok(())
    }

    async fn enable_addon(&self, cluster: &Cluster, node: &KubernetesNode, addon: &Addon) -> Result<()> {
        let executor = self.node_executor(cluster, node).await?;
        let master = executor.as_ref();
        let mut command = format!("sudo microk8s enable {}", addon.name);
        if let Some(args) = addon.args.as_deref().filter(|a| !a.trim().is_empty()) {
            command.push(' ');
            command.push_str(args);
        }
        let enable = ExecuteOptions::new(command).with_policy(self.config.addon_retry);
        master.run_with_options(&enable).await?;

        for (idx, manifest) in addon.manifests.iter().enumerate() {
            let path = format!("/tmp/{}-{idx}.yaml", file_stem(&addon.name));
            self.apply_manifest(master, &path, manifest).await?;
        }
        Ok(())
    }

    pub(super) async fn install_helm_apps(&self, cluster: &Cluster) -> Result<()> {
        if cluster.helm_apps.is_empty() {
            return Ok(());
        }
        let master = self.first_master(cluster)?;

        for app in &cluster.helm_apps {
            self.observe(
                format!("Install Helm app [{}]", app.chart_name),
                self.install_helm_app(cluster, master, app),
            )
            .await?;
        }
        Ok(())
    }

    async fn install_helm_app(&self, cluster: &Cluster, node: &KubernetesNode, app: &HelmApp) -> Result<()> {
        let executor = self.node_executor(cluster, node).await?;
        let master = executor.as_ref();
        let helm = Helm::new(&self.config.helm_command);
        output(master, &helm.repo_add(app)).await?;
        output(master, &helm.repo_update()).await?;

        let values = app.value_file_content.as_deref().filter(|v| !v.trim().is_empty());
        let Some(values) = values else {
            return output(master, &helm.upgrade_install(app).to_string()).await.map(drop);
        };

        let path = values_file_path(app);
        write_file(master, &path, values).await?;
        output(master, &helm.upgrade_install(app).with_values_file(path.as_str()).to_string()).await?;
        remove_file(master, &path).await
    }

    pub(super) async fn install_k8s_resources(&self, cluster: &Cluster) -> Result<()> {
        if cluster.k8s_resources.is_empty() {
            return Ok(());
        }
        let master = self.first_master(cluster)?;

        for resource in &cluster.k8s_resources {
            self.observe(
                format!("Apply K8s resource [{}]", resource.name),
                self.apply_resource(cluster, master, resource),
            )
            .await?;
        }
        Ok(())
    }

    async fn apply_resource(&self, cluster: &Cluster, node: &KubernetesNode, resource: &K8sResource) -> Result<()> {
        let executor = self.node_executor(cluster, node).await?;
        let path = format!("/tmp/{}_k8s_resource.yaml", file_stem(&resource.name));
        self.apply_manifest(executor.as_ref(), &path, &resource.content).await
    }

    /// Writes `content` to `path`, applies it with kubectl and deletes it.
    ///
    /// Blank manifests are skipped.
    async fn apply_manifest(&self, master: &dyn RemoteExecutor, path: &str, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Ok(());
        }
        write_file(master, path, content).await?;
        output(master, &format!("sudo {} apply -f {path}", self.config.kubectl_command)).await?;
        remove_file(master, path).await
    }
}

async fn write_file(master: &dyn RemoteExecutor, path: &str, content: &str) -> Result<()> {
    let tee = ExecuteOptions::new(format!("tee {path} > /dev/null")).with_stdin(content);
    master.run_with_options(&tee).await?;
    Ok(())
}

async fn remove_file(master: &dyn RemoteExecutor, path: &str) -> Result<()> {
    output(master, &format!("sudo rm -f {path}")).await.map(drop)
}

fn file_stem(name: &str) -> String {
    name.replace(' ', "_")
}
