use async_trait::async_trait;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Mutex;

use crate::cluster::{traits::Cluster, ControllerHandle, InstallRequest, ManifestRequest, SecretsGrant, WorkloadIdentity};
use crate::error::Result;

static REDACTED: &str = "<redacted>";

/// A cluster that renders every request as YAML instead of submitting it
pub struct DryRunCluster<W: Write + Send> {
    region: String,
    out: Mutex<W>,
}

impl DryRunCluster<std::io::Stdout> {
    pub fn stdout(region: &str) -> Self {
        Self::new(region, std::io::stdout())
    }
}

impl<W: Write + Send> DryRunCluster<W> {
    pub fn new(region: &str, out: W) -> Self {
        Self {
            region: region.to_string(),
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, comment: &str, document: &serde_json::Value) -> Result<()> {
        let rendered = serde_norway::to_string(document)?;
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        writeln!(out, "---")?;
        writeln!(out, "# {}", comment)?;
        write!(out, "{}", rendered)?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> Cluster for DryRunCluster<W> {
    fn region(&self) -> &str {
        &self.region
    }

    async fn install_chart(&self, request: InstallRequest) -> Result<ControllerHandle> {
        self.emit(
            &format!(
                "chart {} {} from {} as release {} in {}",
                request.chart, request.version, request.repository, request.release, request.namespace
            ),
            &request.values,
        )?;

        Ok(ControllerHandle::new(&request.release, &request.namespace, None))
    }

    async fn create_workload_identity(&self, name: &str, namespace: &str) -> Result<WorkloadIdentity> {
        self.emit("workload identity", &json!({ "serviceAccount": name, "namespace": namespace }))?;

        Ok(WorkloadIdentity {
            name: name.to_string(),
            namespace: namespace.to_string(),
            role_name: name.to_string(),
            role_arn: None,
        })
    }

    async fn grant_secrets_access(&self, identity: &WorkloadIdentity, grant: &SecretsGrant) -> Result<()> {
        let grant = match grant {
            SecretsGrant::Managed { policy_arn } => json!({ "managedPolicy": policy_arn }),
            SecretsGrant::ScopedReadOnly { secret_name, region } => json!({ "readOnlySecret": secret_name, "region": region }),
        };

        self.emit(&format!("secrets access for {}", identity.name), &grant)
    }

    async fn apply_manifest(&self, request: ManifestRequest) -> Result<()> {
        let comment = match &request.depends_on {
            Some(handle) => format!("manifest {} (after release {})", request.id, handle.release()),
            None => format!("manifest {}", request.id),
        };

        for document in &request.documents {
            let mut rendered = serde_json::to_value(document)?;
            redact_secret_values(&mut rendered);
            self.emit(&comment, &rendered)?;
        }

        Ok(())
    }
}

/// Replace the values of a Secret document, keeping its keys
fn redact_secret_values(document: &mut Value) {
    if document.get("kind").and_then(Value::as_str) != Some("Secret") {
        return;
    }

    for field in ["data", "stringData"] {
        if let Some(Value::Object(values)) = document.get_mut(field) {
            for value in values.values_mut() {
                *value = json!(REDACTED);
            }
        }
    }
}
