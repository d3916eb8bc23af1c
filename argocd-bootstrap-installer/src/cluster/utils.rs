use kube::{
    api::{Api, DeleteParams, Patch, PatchParams},
    config::{Config, KubeConfigOptions},
    core::{DynamicObject, GroupVersionKind},
    runtime::wait::Condition,
    Client, Resource,
};
use k8s_openapi::api::apps::v1::Deployment;
use std::fmt::Debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{InstallerError, Result};

pub static FIELD_MANAGER: &str = "bootstrap.argoproj.io";

/// Label carrying the id of the manifest request an object was applied by
pub static MANIFEST_LABEL: &str = "bootstrap.argoproj.io/manifest";


/// Create a new kube client, either from the named kubeconfig context or by
/// inferring the configuration from the environment or the default service account
///
/// # Arguments
/// * `context`: The kubeconfig context to use, if any
///
/// # Returns
/// A Result containing the kube Client or an error
pub async fn create_k8s_client(context: Option<&str>) -> Result<Client> {
    match context {
        Some(context) => {
            let options = KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            };
            let config = Config::from_kubeconfig(&options)
                .await
                .map_err(|e| InstallerError::KubeConfigError(e.to_string()))?;

            Client::try_from(config).map_err(InstallerError::from)
        },
        None => Client::try_default().await.map_err(InstallerError::from),
    }
}

/// Apply a Resource to the cluster
///
/// # Arguments
/// * `api`: The API client for the resource type
/// * `obj`: The object to apply
/// * `name`: The name of the object
///
/// # Returns
/// A Result containing the applied object or an error
pub async fn apply<T>(api: &Api<T>, obj: T, name: &str) -> Result<T>
where
    T: Clone + Debug + Serialize + DeserializeOwned + Resource<DynamicType = ()>,
{
    api.patch(
        name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Apply(obj),
    ).await.map_err(InstallerError::from)
}

/// Apply a dynamic object with the given patch parameters
///
/// # Arguments
/// * `api`: The API client for the object's resource type
/// * `obj`: The object to apply
/// * `params`: The server-side apply parameters
///
/// # Returns
/// A Result containing the applied object or an error
pub async fn apply_dynamic(api: &Api<DynamicObject>, obj: &DynamicObject, params: &PatchParams) -> Result<DynamicObject> {
    let name = object_name(obj)?;

    api.patch(name, params, &Patch::Apply(obj)).await.map_err(InstallerError::from)
}

/// Delete a dynamic object
pub async fn delete_dynamic(api: &Api<DynamicObject>, name: &str) -> Result<()> {
    api.delete(name, &DeleteParams::default()).await?;

    Ok(())
}

/// Convert any serializable Kubernetes object into a DynamicObject
///
/// # Arguments
/// * `obj`: The object to convert, which must carry `apiVersion` and `kind`
///
/// # Returns
/// A Result containing the DynamicObject or an error
pub fn to_dynamic<T: Serialize>(obj: &T) -> Result<DynamicObject> {
    let value = serde_json::to_value(obj)?;
    let dynamic: DynamicObject = serde_json::from_value(value)?;

    if dynamic.types.is_none() {
        return Err(InstallerError::InvalidManifestError(
            "document is missing apiVersion or kind".to_string()
        ));
    }

    Ok(dynamic)
}

/// Get the group, version and kind of a dynamic object
pub fn object_gvk(obj: &DynamicObject) -> Result<GroupVersionKind> {
    let types = obj.types.as_ref().ok_or_else(|| {
        InstallerError::InvalidManifestError("document is missing apiVersion or kind".to_string())
    })?;

    // Core resources have no group, e.g. `v1`
    let (group, version) = types.api_version
        .split_once('/')
        .unwrap_or(("", types.api_version.as_str()));

    if version.is_empty() || types.kind.is_empty() {
        return Err(InstallerError::InvalidManifestError(
            format!("invalid apiVersion `{}` or kind `{}`", types.api_version, types.kind)
        ));
    }

    Ok(GroupVersionKind::gvk(group, version, &types.kind))
}

pub fn object_name(obj: &DynamicObject) -> Result<&str> {
    obj.metadata.name.as_deref().ok_or_else(|| {
        InstallerError::InvalidManifestError("document is missing metadata.name".to_string())
    })
}

/// Condition that holds once a Deployment reports `Available=True`
pub fn is_deployment_available() -> impl Condition<Deployment> {
    |obj: Option<&Deployment>| {
        obj.and_then(|deployment| deployment.status.as_ref())
            .and_then(|status| status.conditions.as_ref())
            .is_some_and(|conditions| {
                conditions.iter().any(|c| c.type_ == "Available" && c.status == "True")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};
    use k8s_openapi::api::core::v1::Secret;
    use kube::api::ObjectMeta;

    fn deployment_with(type_: &str, status: &str) -> Deployment {
        Deployment {
            status: Some(DeploymentStatus {
                conditions: Some(vec![DeploymentCondition {
                    type_: type_.to_string(),
                    status: status.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn deployment_availability() {
        let condition = is_deployment_available();

        assert!(condition.matches_object(Some(&deployment_with("Available", "True"))));
        assert!(!condition.matches_object(Some(&deployment_with("Available", "False"))));
        assert!(!condition.matches_object(Some(&deployment_with("Progressing", "True"))));
        assert!(!condition.matches_object(Some(&Deployment::default())));
        assert!(!condition.matches_object(None));
    }

    #[test]
    fn typed_objects_convert_to_dynamic() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("repo".to_string()),
                namespace: Some("argocd".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let dynamic = to_dynamic(&secret).unwrap();
        let gvk = object_gvk(&dynamic).unwrap();

        assert_eq!(gvk.group, "");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "Secret");
        assert_eq!(object_name(&dynamic).unwrap(), "repo");
    }

    #[test]
    fn grouped_api_versions_are_split() {
        let dynamic = to_dynamic(&serde_json::json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": { "name": "bootstrap-apps" },
        })).unwrap();
        let gvk = object_gvk(&dynamic).unwrap();

        assert_eq!(gvk, GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Application"));
    }

    #[test]
    fn untyped_documents_are_rejected() {
        let result = to_dynamic(&serde_json::json!({ "metadata": { "name": "orphan" } }));

        assert!(result.is_err());
    }
}
