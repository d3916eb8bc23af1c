use async_trait::async_trait;

use crate::cluster::{ControllerHandle, InstallRequest, ManifestRequest, SecretsGrant, WorkloadIdentity};
use crate::error::Result;

// Operations the installer needs from the cluster it is deploying to
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Region the cluster is deployed in
    fn region(&self) -> &str;

    async fn install_chart(&self, request: InstallRequest) -> Result<ControllerHandle>;

    /// Create the service account `name` in `namespace` bound to a cloud identity,
    /// reusing the identity if it already exists
    async fn create_workload_identity(&self, name: &str, namespace: &str) -> Result<WorkloadIdentity>;

    async fn grant_secrets_access(&self, identity: &WorkloadIdentity, grant: &SecretsGrant) -> Result<()>;

    async fn apply_manifest(&self, request: ManifestRequest) -> Result<()>;
}
