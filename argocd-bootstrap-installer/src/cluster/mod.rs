pub mod dry_run;
pub mod helm;
pub mod identity;
pub mod kubernetes;
pub mod traits;
pub mod utils;

use kube::core::DynamicObject;
use serde_json::Value;

pub use traits::Cluster;

/// A chart installation to submit to the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRequest {
    pub chart: String,
    pub repository: String,
    pub version: String,
    pub release: String,
    pub namespace: String,
    pub values: Value,
}

/// Handle to a submitted chart release. It carries no behaviour of its own and
/// is only used to order later manifest submissions after the release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerHandle {
    release: String,
    namespace: String,
    revision: Option<u32>,
}

impl ControllerHandle {
    pub fn new(release: &str, namespace: &str, revision: Option<u32>) -> Self {
        Self {
            release: release.to_string(),
            namespace: namespace.to_string(),
            revision,
        }
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn revision(&self) -> Option<u32> {
        self.revision
    }
}

/// A Kubernetes service account bound to a cloud identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadIdentity {
    pub name: String,
    pub namespace: String,
    pub role_name: String,
    pub role_arn: Option<String>,
}

/// Secrets Manager permissions to attach to a workload identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretsGrant {
    /// Attach an existing managed policy
    Managed { policy_arn: String },
    /// Read-only access to a single secret
    ScopedReadOnly { secret_name: String, region: String },
}

/// A set of documents to apply declaratively
#[derive(Debug, Clone)]
pub struct ManifestRequest {
    pub id: String,
    pub documents: Vec<DynamicObject>,
    /// Take ownership of fields managed by someone else
    pub overwrite: bool,
    /// Delete objects previously applied under the same id that are no longer part of the request
    pub prune: bool,
    pub skip_validation: bool,
    pub depends_on: Option<ControllerHandle>,
}

impl ManifestRequest {
    pub fn new(id: &str, documents: Vec<DynamicObject>) -> Self {
        Self {
            id: id.to_string(),
            documents,
            overwrite: false,
            prune: false,
            skip_validation: false,
            depends_on: None,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn skip_validation(mut self, skip_validation: bool) -> Self {
        self.skip_validation = skip_validation;
        self
    }

    pub fn depends_on(mut self, handle: &ControllerHandle) -> Self {
        self.depends_on = Some(handle.clone());
        self
    }
}
