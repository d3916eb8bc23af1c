// SPDX-FileCopyrightText: 2025 Timothy Pogue
//
// SPDX-License-Identifier: ISC

use std::sync::Arc;

use argocd_bootstrap_common::config::{BootstrapConfig, RepoConfig, SecretsAccessPolicy, Team};
use argocd_bootstrap_common::telemetry::{debug, error, info};

use crate::cluster::{utils::to_dynamic, Cluster, ControllerHandle, ManifestRequest, SecretsGrant};
use crate::error::{InstallerError, Result};
use crate::manifest::{
    application::bootstrap_application,
    chart::install_request,
    repository::{repository_secret, RepoCredential},
    APPLICATION_MANIFEST_ID, MANAGED_SECRETS_POLICY_ARN, SECRET_MANIFEST_ID, SERVER_SERVICE_ACCOUNT,
};
use crate::secrets::{SecretPayload, SecretsService};

/// Installs ArgoCD into a cluster and bootstraps the app of apps
pub struct BootstrapInstaller {
    secrets: Arc<dyn SecretsService>,
    controller: Option<ControllerHandle>,
}

impl BootstrapInstaller {
    pub fn new(secrets: Arc<dyn SecretsService>) -> Self {
        Self { secrets, controller: None }
    }

    /// Handle of the release submitted by the last `install`
    pub fn controller_handle(&self) -> Option<&ControllerHandle> {
        self.controller.as_ref()
    }

    /// Run the install phase followed by the post-install phase
    pub async fn run(&mut self, cluster: &dyn Cluster, config: &BootstrapConfig, teams: &[Team]) -> Result<ControllerHandle> {
        let controller = self.install(cluster, config).await?;
        self.post_install(cluster, config, &controller, teams).await?;

        Ok(controller)
    }

    /// Submit the ArgoCD chart install
    ///
    /// # Arguments
    /// * `cluster` - The cluster to install into
    /// * `config` - The bootstrap configuration
    ///
    /// # Returns
    /// The handle of the submitted release
    pub async fn install(&mut self, cluster: &dyn Cluster, config: &BootstrapConfig) -> Result<ControllerHandle> {
        let request = install_request(config)?;

        info!(
            event = "InstallingChart",
            chart = request.chart.as_str(),
            version = request.version.as_str(),
            release = request.release.as_str(),
            namespace = request.namespace.as_str(),
        );

        let controller = cluster.install_chart(request).await?;
        self.controller = Some(controller.clone());

        Ok(controller)
    }

    /// Materialize the repository credentials and submit the bootstrap Application
    ///
    /// Does nothing when no bootstrap repository is configured. Nothing submitted
    /// before a failure is rolled back.
    ///
    /// # Arguments
    /// * `cluster` - The cluster ArgoCD was installed into
    /// * `config` - The bootstrap configuration
    /// * `controller` - The handle returned by `install`
    /// * `teams` - The teams of the cluster
    pub async fn post_install(
        &self,
        cluster: &dyn Cluster,
        config: &BootstrapConfig,
        controller: &ControllerHandle,
        teams: &[Team],
    ) -> Result<()> {
        debug!(event = "PostInstall", teams = teams.len());

        let Some(repo) = config.bootstrap_repo.as_ref() else {
            info!(event = "NoBootstrapRepo");
            return Ok(());
        };

        if let Some(secret_name) = repo.credentials_secret_name.as_deref() {
            self.materialize_repo_secret(cluster, config, repo, secret_name, controller).await?;
        }

        let application = bootstrap_application(repo, &config.namespace);

        info!(
            event = "ApplyingApplication",
            application = application.metadata.name.as_deref().unwrap_or_default(),
            repo = repo.repo_url.as_str(),
        );

        let request = ManifestRequest::new(APPLICATION_MANIFEST_ID, vec![to_dynamic(&application)?])
            .overwrite(true)
            .depends_on(controller);

        cluster.apply_manifest(request).await
    }

    /// Copy the repository credentials from the secrets service into a cluster Secret
    ///
    /// The ArgoCD server identity is created and granted secrets access first.
    ///
    /// # Arguments
    /// * `cluster` - The cluster ArgoCD was installed into
    /// * `config` - The bootstrap configuration
    /// * `repo` - The bootstrap repository
    /// * `secret_name` - The name of the secret holding the credentials
    /// * `controller` - The handle returned by `install`
    pub async fn materialize_repo_secret(
        &self,
        cluster: &dyn Cluster,
        config: &BootstrapConfig,
        repo: &RepoConfig,
        secret_name: &str,
        controller: &ControllerHandle,
    ) -> Result<()> {
        let identity = cluster.create_workload_identity(SERVER_SERVICE_ACCOUNT, &config.namespace).await?;

        let grant = match config.secrets_policy {
            SecretsAccessPolicy::ManagedReadWrite => SecretsGrant::Managed {
                policy_arn: MANAGED_SECRETS_POLICY_ARN.to_string(),
            },
            SecretsAccessPolicy::ScopedReadOnly => SecretsGrant::ScopedReadOnly {
                secret_name: secret_name.to_string(),
                region: cluster.region().to_string(),
            },
        };
        cluster.grant_secrets_access(&identity, &grant).await?;

        info!(
            event = "FetchingRepoSecret",
            secret = secret_name,
            region = cluster.region(),
        );

        let payload = self.secrets
            .get_secret_value(secret_name, cluster.region())
            .await
            .inspect_err(|e| error!(event = "SecretLookupFailed", secret = secret_name, error = %e))?;

        let value = match payload {
            SecretPayload::Text(value) => value,
            SecretPayload::Binary(_) => {
                error!(event = "UnsupportedSecretFormat", secret = secret_name);
                return Err(InstallerError::UnsupportedSecretFormat(secret_name.to_string()));
            },
        };

        let credential = RepoCredential::from_secret(secret_name, repo.credentials_type, &value)?;
        let secret = repository_secret(&config.namespace, &repo.repo_url, &credential);

        info!(
            event = "ApplyingRepoSecret",
            secret = secret.metadata.name.as_deref().unwrap_or_default(),
            namespace = config.namespace.as_str(),
        );

        let request = ManifestRequest::new(SECRET_MANIFEST_ID, vec![to_dynamic(&secret)?])
            .overwrite(true)
            .prune(true)
            .skip_validation(true)
            .depends_on(controller);

        cluster.apply_manifest(request).await
    }
}
