use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use argocd_bootstrap_common::telemetry::debug;

use crate::cluster::InstallRequest;
use crate::error::{InstallerError, Result};

/// Release as reported by `helm upgrade --install --output json`
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct HelmRelease {
    pub name: String,
    pub namespace: String,
    pub version: u32,
}

/// Thin wrapper around the helm CLI
#[derive(Debug, Clone)]
pub struct HelmClient {
    binary: String,
    kube_context: Option<String>,
}

impl HelmClient {
    pub fn new(binary: &str, kube_context: Option<&str>) -> Self {
        Self {
            binary: binary.to_string(),
            kube_context: kube_context.map(ToString::to_string),
        }
    }

    /// Build the arguments for an idempotent install of the request. Values are
    /// read from stdin.
    pub fn upgrade_install_args(&self, request: &InstallRequest) -> Vec<String> {
        vec![
            "upgrade".to_string(),
            "--install".to_string(),
            request.release.clone(),
            request.chart.clone(),
            "--repo".to_string(),
            request.repository.clone(),
            "--version".to_string(),
            request.version.clone(),
            "--namespace".to_string(),
            request.namespace.clone(),
            "--create-namespace".to_string(),
            "--values".to_string(),
            "-".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ]
        .into_iter()
        .chain(
            self.kube_context
                .as_ref()
                .map(|context| vec!["--kube-context".to_string(), context.clone()])
                .into_iter()
                .flatten()
        )
        .collect()
    }

    /// Install or upgrade the chart release described by the request
    ///
    /// # Arguments
    /// * `request` - The chart install request
    ///
    /// # Returns
    /// The installed release
    pub async fn upgrade_install(&self, request: &InstallRequest) -> Result<HelmRelease> {
        let values = serde_norway::to_string(&request.values)?;
        let args = self.upgrade_install_args(request);

        debug!(
            event = "RunningHelm",
            binary = self.binary.as_str(),
            args = args.join(" ").as_str(),
        );

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(values.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(InstallerError::ChartInstallError {
                release: request.release.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice::<HelmRelease>(&output.stdout).map_err(|e| {
            InstallerError::ChartInstallError {
                release: request.release.clone(),
                message: format!("unexpected helm output: {}", e),
            }
        })
    }
}
