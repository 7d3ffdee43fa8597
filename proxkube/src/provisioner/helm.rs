//! Helm command lines.

use crate::model::HelmApp;
use std::fmt;

/// Renders Helm invocations for one Helm binary.
#[derive(Debug, Clone, Copy)]
pub struct Helm<'a> {
    program: &'a str,
}

impl<'a> Helm<'a> {
    /// Uses `program`, e.g. `microk8s.helm3`.
    #[must_use]
    pub fn new(program: &'a str) -> Self {
        Self { program }
    }

    /// `repo add` for the chart repository of `app`.
    #[must_use]
    pub fn repo_add(&self, app: &HelmApp) -> String {
        format!("sudo {} repo add {} {}", self.program, app.chart_name, app.repository)
    }

    /// `repo update`.
    #[must_use]
    pub fn repo_update(&self) -> String {
        format!("sudo {} repo update", self.program)
    }

    /// `upgrade --install` for `app`.
    #[must_use]
    pub fn upgrade_install(&self, app: &'a HelmApp) -> UpgradeInstall<'a> {
        UpgradeInstall {
            program: self.program,
            app,
            values_file: None,
        }
    }
}

/// An `upgrade --install` invocation.
#[derive(Debug, Clone)]
pub struct UpgradeInstall<'a> {
    program: &'a str,
    app: &'a HelmApp,
    values_file: Option<String>,
}

impl UpgradeInstall<'_> {
    /// Passes a values file with `-f`.
    #[must_use]
    pub fn with_values_file(mut self, path: impl Into<String>) -> Self {
        self.values_file = Some(path.into());
        self
    }
}

impl fmt::Display for UpgradeInstall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let app = self.app;
        write!(
            f,
            "sudo {} upgrade --install {} {}/{} --namespace {} --create-namespace",
            self.program, app.release_name, app.chart_name, app.chart_name, app.namespace
        )?;
        if let Some(path) = &self.values_file {
            write!(f, " -f {path}")?;
        }
        for (key, value) in &app.parameters {
            write!(f, " --set {key}={value}")?;
        }
        if let Some(version) = &app.version {
            write!(f, " --version {version}")?;
        }
        if app.wait {
            f.write_str(" --wait")?;
        }
        Ok(())
    }
}

/// Temporary values file of `app` on the first master.
#[must_use]
pub fn values_file_path(app: &HelmApp) -> String {
    format!("/tmp/{}.yaml", app.release_name.replace(' ', "_"))
}
