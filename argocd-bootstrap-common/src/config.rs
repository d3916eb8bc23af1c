// SPDX-FileCopyrightText: 2025 Timothy Pogue
//
// SPDX-License-Identifier: ISC

use std::path::Path;
use serde::{Serialize, Deserialize};
use figment::{Figment, Error, providers::{Format, Json, Toml, Yaml, Env, Serialized}};

use crate::constant::{
    ENV_PREFIX, DEFAULT_NAMESPACE, DEFAULT_CHART_NAME, DEFAULT_CHART_REPOSITORY,
    DEFAULT_CHART_VERSION, DEFAULT_RELEASE_NAME, DEFAULT_HELM_BINARY,
    DEFAULT_DEPENDENCY_TIMEOUT_SECS,
};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[allow(unused)]
pub struct AppConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub argocd: BootstrapConfig,
    #[serde(default)]
    pub teams: Vec<Team>,
}

/// Where the add-on is being deployed to
#[derive(Debug, Deserialize, Serialize, Clone)]
#[allow(unused)]
pub struct ClusterConfig {
    #[serde(default)]
    pub name: String,
    /// Region of the cluster, also used for secret lookups
    #[serde(default)]
    pub region: String,
    /// ARN of the cluster's IAM OIDC provider, required to create workload identities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_provider_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_context: Option<String>,
    #[serde(default)]
    pub helm_binary: String,
    /// Upper bound for waiting on the chart release before applying dependent manifests
    #[serde(default)]
    pub dependency_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            name: String::new(),
            region: String::new(),
            oidc_provider_arn: None,
            kube_context: None,
            helm_binary: DEFAULT_HELM_BINARY.to_string(),
            dependency_timeout_secs: DEFAULT_DEPENDENCY_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[allow(unused)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_repo: Option<RepoConfig>,
    #[serde(default)]
    pub secrets_policy: SecretsAccessPolicy,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        BootstrapConfig {
            namespace: DEFAULT_NAMESPACE.to_string(),
            chart: ChartConfig::default(),
            bootstrap_repo: None,
            secrets_policy: SecretsAccessPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[allow(unused)]
pub struct ChartConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub release: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            name: DEFAULT_CHART_NAME.to_string(),
            repository: DEFAULT_CHART_REPOSITORY.to_string(),
            version: DEFAULT_CHART_VERSION.to_string(),
            release: DEFAULT_RELEASE_NAME.to_string(),
        }
    }
}

/// A Git repository holding the bootstrap applications and how to authenticate to it
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[allow(unused)]
pub struct RepoConfig {
    pub repo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name of the Secrets Manager secret holding the credentials. When unset
    /// the repository is accessed anonymously.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_name: Option<String>,
    /// Only meaningful together with `credentials_secret_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_type: Option<CredentialsType>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CredentialsType {
    Username,
    Token,
    Ssh,
}

impl CredentialsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialsType::Username => "USERNAME",
            CredentialsType::Token => "TOKEN",
            CredentialsType::Ssh => "SSH",
        }
    }
}

impl std::str::FromStr for CredentialsType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USERNAME" => Ok(CredentialsType::Username),
            "TOKEN" => Ok(CredentialsType::Token),
            "SSH" => Ok(CredentialsType::Ssh),
            other => Err(format!("unknown credentials type `{}`", other)),
        }
    }
}

/// Permission granted to the ArgoCD server identity for reading repository credentials
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SecretsAccessPolicy {
    /// The AWS managed `SecretsManagerReadWrite` policy, covering every secret
    #[default]
    ManagedReadWrite,
    /// Read-only access to the single configured secret
    ScopedReadOnly,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[allow(unused)]
pub struct Team {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

pub struct AppConfigBuilder {
    figment: Figment,
    error: Option<Error>,
}

impl AppConfigBuilder {
    pub fn with_file(&mut self, path: &str) -> &mut Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        // A file the user named must exist and be understood
        self.figment = match extension {
            "json" => self.figment.clone().merge(Json::file(path).required(true)),
            "yaml" | "yml" => self.figment.clone().merge(Yaml::file(path).required(true)),
            "toml" => self.figment.clone().merge(Toml::file(path).required(true)),
            _ => {
                self.error = Some(Error::from(format!("unsupported configuration file format: {}", path)));
                self.figment.clone()
            },
        };
        self
    }

    pub fn with_env(&mut self) -> &mut Self {
        self.figment = self.figment.clone().merge(Env::prefixed(&format!("{}__", ENV_PREFIX)).split("__"));
        self
    }

    pub fn with_override_option(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.figment = self.figment.clone().merge(Serialized::default(key, value));
        }
        self
    }

    pub fn build(&self) -> Result<AppConfig, Error> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        self.figment.extract()
    }
}

impl Default for AppConfigBuilder {
    fn default() -> Self {
        AppConfigBuilder {
            figment: Figment::from(Serialized::defaults(AppConfig::default())),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_sources() {
        let config = AppConfigBuilder::default().build().unwrap();

        assert_eq!(config.argocd.namespace, "argocd");
        assert_eq!(config.argocd.chart.name, "argo-cd");
        assert_eq!(config.argocd.chart.release, "ssp-addon");
        assert_eq!(config.argocd.secrets_policy, SecretsAccessPolicy::ManagedReadWrite);
        assert!(config.argocd.bootstrap_repo.is_none());
        assert_eq!(config.cluster.helm_binary, "helm");
        assert!(config.teams.is_empty());
    }

    #[test]
    fn file_then_env_then_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file("bootstrap.yaml", r#"
cluster:
  name: prod
  region: eu-west-1
argocd:
  namespace: gitops
  bootstrap_repo:
    repo_url: git@example.com/apps
    credentials_secret_name: my-secret
    credentials_type: TOKEN
teams:
  - name: platform
"#)?;
            jail.set_env("ARGOCD_BOOTSTRAP__CLUSTER__REGION", "us-east-2");

            let config = AppConfigBuilder::default()
                .with_file("bootstrap.yaml")
                .with_env()
                .with_override_option("argocd.namespace", Some("argo"))
                .with_override_option("argocd.chart.version", None)
                .build()?;

            assert_eq!(config.cluster.name, "prod");
            assert_eq!(config.cluster.region, "us-east-2");
            assert_eq!(config.argocd.namespace, "argo");
            assert_eq!(config.argocd.chart.version, "3.17.5");

            let repo = config.argocd.bootstrap_repo.expect("bootstrap repo");
            assert_eq!(repo.repo_url, "git@example.com/apps");
            assert_eq!(repo.credentials_type, Some(CredentialsType::Token));
            assert_eq!(repo.path, None);
            assert_eq!(config.teams.len(), 1);
            Ok(())
        });
    }

    #[test]
    fn bootstrap_repo_requires_url() {
        Jail::expect_with(|jail| {
            jail.create_file("bootstrap.json", r#"{"argocd": {"bootstrap_repo": {"path": "apps"}}}"#)?;

            let result = AppConfigBuilder::default()
                .with_file("bootstrap.json")
                .build();

            assert!(result.is_err());
            Ok(())
        });
    }

    #[test]
    fn toml_files_are_loaded() {
        Jail::expect_with(|jail| {
            jail.create_file("bootstrap.toml", r#"
[argocd]
namespace = "gitops"

[argocd.bootstrap_repo]
repo_url = "https://example.com/apps.git"
"#)?;

            let config = AppConfigBuilder::default()
                .with_file("bootstrap.toml")
                .build()?;

            assert_eq!(config.argocd.namespace, "gitops");
            assert_eq!(
                config.argocd.bootstrap_repo.map(|repo| repo.repo_url),
                Some("https://example.com/apps.git".to_string())
            );
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        Jail::expect_with(|_| {
            let result = AppConfigBuilder::default()
                .with_file("does-not-exist.yaml")
                .build();

            assert!(result.is_err());
            Ok(())
        });
    }

    #[test]
    fn unknown_file_format_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("bootstrap.ini", "namespace = gitops")?;

            let result = AppConfigBuilder::default()
                .with_file("bootstrap.ini")
                .with_env()
                .build();

            let message = result.expect_err("unsupported format").to_string();
            assert!(message.contains("bootstrap.ini"));
            Ok(())
        });
    }

    #[test]
    fn credentials_type_from_str() {
        assert_eq!("ssh".parse::<CredentialsType>(), Ok(CredentialsType::Ssh));
        assert_eq!("USERNAME".parse::<CredentialsType>(), Ok(CredentialsType::Username));
        assert!("kerberos".parse::<CredentialsType>().is_err());

        for credentials_type in [CredentialsType::Username, CredentialsType::Token, CredentialsType::Ssh] {
            assert_eq!(credentials_type.as_str().parse::<CredentialsType>(), Ok(credentials_type));
        }
    }
}
