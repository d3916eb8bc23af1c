pub mod application;
pub mod chart;
pub mod repository;

/// Secret referenced by the repository declaration in the chart values. The
/// materialized repository Secret carries the same name.
pub static REPO_SECRET_NAME: &str = "bootstrap-repo-secret1";
pub static SSH_PRIVATE_KEY_FIELD: &str = "sshPrivateKey";
pub static URL_FIELD: &str = "url";

/// Label ArgoCD uses to discover repository credentials
pub static SECRET_TYPE_LABEL: &str = "argocd.argoproj.io/secret-type";
pub static SECRET_TYPE_REPOSITORY: &str = "repository";

/// Service account of the ArgoCD server, created outside of the chart
pub static SERVER_SERVICE_ACCOUNT: &str = "argocd-server";

pub static DEFAULT_APPLICATION_NAME: &str = "bootstrap-apps";
pub static APPLICATION_PROJECT: &str = "default";
pub static APPLICATION_DESTINATION_NAMESPACE: &str = "default";
pub static IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";
pub static TARGET_REVISION: &str = "HEAD";

pub static MANAGED_SECRETS_POLICY_ARN: &str = "arn:aws:iam::aws:policy/SecretsManagerReadWrite";

/// Ids of the manifest requests submitted by the installer
pub static SECRET_MANIFEST_ID: &str = "argocd-bootstrap-secret";
pub static APPLICATION_MANIFEST_ID: &str = "argocd-bootstrap-app";
