use serde::{Deserialize, Serialize};

use argocd_bootstrap_common::config::{BootstrapConfig, RepoConfig};

use crate::cluster::InstallRequest;
use crate::error::Result;
use crate::manifest::{REPO_SECRET_NAME, SSH_PRIVATE_KEY_FIELD};

/// Values passed to the ArgoCD chart
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartValues {
    pub server: ServerValues,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerValues {
    pub service_account: ServiceAccountValues,
    pub config: ServerConfigValues,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ServiceAccountValues {
    pub create: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ServerConfigValues {
    /// `repositories` entry of `argocd-cm`, which the chart takes as a YAML string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repositories: Option<String>,
}

/// A repository as declared in `argocd-cm`
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDeclaration {
    pub url: String,
    pub ssh_private_key_secret: SecretKeyRef,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

impl RepositoryDeclaration {
    /// The key reference always names the SSH key of the repository Secret,
    /// whatever credentials type the repository uses
    pub fn from_repo(repo: &RepoConfig) -> Self {
        RepositoryDeclaration {
            url: repo.repo_url.clone(),
            ssh_private_key_secret: SecretKeyRef {
                name: REPO_SECRET_NAME.to_string(),
                key: SSH_PRIVATE_KEY_FIELD.to_string(),
            },
        }
    }
}

impl ChartValues {
    /// Build the chart values for the configuration
    ///
    /// The service account is always created by the installer rather than the chart.
    /// When a bootstrap repository is configured, it is declared to ArgoCD through
    /// the `repositories` setting.
    pub fn from_config(config: &BootstrapConfig) -> Result<Self> {
        let repositories = config
            .bootstrap_repo
            .as_ref()
            .map(|repo| serde_norway::to_string(&vec![RepositoryDeclaration::from_repo(repo)]))
            .transpose()?;

        Ok(ChartValues {
            server: ServerValues {
                service_account: ServiceAccountValues { create: false },
                config: ServerConfigValues { repositories },
            },
        })
    }
}

/// Build the chart install request for the configuration
///
/// # Arguments
/// * `config` - The bootstrap configuration
///
/// # Returns
/// The install request
pub fn install_request(config: &BootstrapConfig) -> Result<InstallRequest> {
    let values = ChartValues::from_config(config)?;

    Ok(InstallRequest {
        chart: config.chart.name.clone(),
        repository: config.chart.repository.clone(),
        version: config.chart.version.clone(),
        release: config.chart.release.clone(),
        namespace: config.namespace.clone(),
        values: serde_json::to_value(values)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use argocd_bootstrap_common::config::CredentialsType;
    use serde_json::json;

    fn repo(credentials_type: Option<CredentialsType>) -> RepoConfig {
        RepoConfig {
            repo_url: "git@example.com/apps".to_string(),
            path: None,
            name: None,
            credentials_secret_name: Some("my-secret".to_string()),
            credentials_type,
        }
    }

    #[test]
    fn values_without_bootstrap_repo() {
        let request = install_request(&BootstrapConfig::default()).unwrap();

        assert_eq!(request.chart, "argo-cd");
        assert_eq!(request.repository, "https://argoproj.github.io/argo-helm");
        assert_eq!(request.version, "3.17.5");
        assert_eq!(request.release, "ssp-addon");
        assert_eq!(request.namespace, "argocd");
        assert_eq!(request.values, json!({
            "server": {
                "serviceAccount": { "create": false },
                "config": {},
            }
        }));
    }

    #[test]
    fn repositories_are_embedded_as_yaml_string() {
        let config = BootstrapConfig {
            namespace: "gitops".to_string(),
            bootstrap_repo: Some(repo(Some(CredentialsType::Ssh))),
            ..Default::default()
        };
        let request = install_request(&config).unwrap();

        assert_eq!(request.namespace, "gitops");

        let repositories = request.values["server"]["config"]["repositories"]
            .as_str()
            .expect("repositories is a string");
        let declared: Vec<RepositoryDeclaration> = serde_norway::from_str(repositories).unwrap();

        assert_eq!(declared, vec![RepositoryDeclaration {
            url: "git@example.com/apps".to_string(),
            ssh_private_key_secret: SecretKeyRef {
                name: "bootstrap-repo-secret1".to_string(),
                key: "sshPrivateKey".to_string(),
            },
        }]);
        assert!(repositories.contains("sshPrivateKeySecret:"));
    }

    #[test]
    fn repository_reference_ignores_credentials_type() {
        let ssh = ChartValues::from_config(&BootstrapConfig {
            bootstrap_repo: Some(repo(Some(CredentialsType::Ssh))),
            ..Default::default()
        }).unwrap();
        let token = ChartValues::from_config(&BootstrapConfig {
            bootstrap_repo: Some(repo(Some(CredentialsType::Token))),
            ..Default::default()
        }).unwrap();

        assert_eq!(ssh, token);
    }
}
