use async_trait::async_trait;
use aws_types::SdkConfig;
use futures::future::try_join_all;
use kube::{
    api::{Api, ListParams, ObjectMeta, PatchParams},
    core::DynamicObject,
    discovery::{pinned_kind, ApiResource, Scope},
    runtime::wait::{await_condition, conditions},
    Client, CustomResourceExt,
};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use tokio::time::{timeout, Duration};

use argocd_bootstrap_common::config::ClusterConfig;
use argocd_bootstrap_common::telemetry::{debug, info};

use crate::aws::shared_region;
use crate::cluster::{
    helm::HelmClient,
    identity::{IamRoles, ROLE_ARN_ANNOTATION},
    traits::Cluster,
    utils::{apply, apply_dynamic, create_k8s_client, delete_dynamic, is_deployment_available, object_gvk, object_name, FIELD_MANAGER, MANIFEST_LABEL},
    ControllerHandle, InstallRequest, ManifestRequest, SecretsGrant, WorkloadIdentity,
};
use crate::crd::application::Application;
use crate::error::{InstallerError, Result};

/// Label the ArgoCD chart puts on every workload of a release
static RELEASE_INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
static RELEASE_COMPONENT_LABEL: &str = "app.kubernetes.io/component";

/// The chart's server runs under a service account it does not create, which
/// only exists once a workload identity was requested for it
static SERVER_COMPONENT: &str = "server";

/// An EKS cluster reached through the Kubernetes API, helm and IAM
pub struct KubeCluster {
    client: Client,
    helm: HelmClient,
    roles: Option<IamRoles>,
    region: String,
    dependency_timeout: Duration,
}

impl KubeCluster {
    /// Connect to the cluster described by the configuration
    ///
    /// # Arguments
    /// * `config` - The cluster configuration
    /// * `shared_config` - The shared AWS configuration, see `aws::load_shared_config`
    ///
    /// # Returns
    /// The connected cluster
    pub async fn connect(config: &ClusterConfig, shared_config: &SdkConfig) -> Result<Self> {
        let client = create_k8s_client(config.kube_context.as_deref()).await?;

        let region = shared_region(shared_config)
            .ok_or(InstallerError::MissingConfigError("cluster.region"))?;

        let roles = config.oidc_provider_arn.as_deref().map(|arn| {
            IamRoles::new(aws_sdk_iam::Client::new(shared_config), &config.name, arn)
        });

        Ok(Self {
            client,
            helm: HelmClient::new(&config.helm_binary, config.kube_context.as_deref()),
            roles,
            region,
            dependency_timeout: Duration::from_secs(config.dependency_timeout_secs),
        })
    }

    fn roles(&self) -> Result<&IamRoles> {
        self.roles
            .as_ref()
            .ok_or(InstallerError::MissingConfigError("cluster.oidc_provider_arn"))
    }

    /// Wait until the release can serve dependent manifests: the `Application`
    /// CRD is established and the release's Deployments are available
    async fn await_release(&self, handle: &ControllerHandle) -> Result<()> {
        let crds = Api::<CustomResourceDefinition>::all(self.client.clone());
        let deployments = Api::<Deployment>::namespaced(self.client.clone(), handle.namespace());
        let selector = format!("{}={}", RELEASE_INSTANCE_LABEL, handle.release());
        let listed = deployments.list(&ListParams::default().labels(&selector)).await?;
        let names = release_dependencies(&listed.items);

        info!(
            event = "AwaitingRelease",
            release = handle.release(),
            deployments = names.len(),
        );

        let wait_error = |e: kube::runtime::wait::Error| InstallerError::ReleaseWaitError {
            release: handle.release().to_string(),
            message: e.to_string(),
        };

        let crd_name = Application::crd_name();
        let crd_ready = async {
            await_condition(crds, crd_name, conditions::is_crd_established())
                .await
                .map(|_| ())
                .map_err(wait_error)
        };

        let deployments_ready = try_join_all(names.into_iter().map(|name| {
            let api = deployments.clone();
            async move {
                await_condition(api, &name, is_deployment_available())
                    .await
                    .map(|_| ())
                    .map_err(wait_error)
            }
        }));

        bounded_wait(handle.release(), self.dependency_timeout, async {
            futures::try_join!(crd_ready, deployments_ready).map(|_| ())
        }).await
    }

    fn dynamic_api(&self, resource: &ApiResource, namespaced: bool, namespace: Option<&str>) -> Api<DynamicObject> {
        match (namespaced, namespace) {
            (true, Some(namespace)) => Api::namespaced_with(self.client.clone(), namespace, resource),
            (true, None) => Api::default_namespaced_with(self.client.clone(), resource),
            (false, _) => Api::all_with(self.client.clone(), resource),
        }
    }

    /// Delete objects labeled with the request id that were not part of the request
    async fn prune(&self, request_id: &str, applied: AppliedSet) -> Result<()> {
        let selector = format!("{}={}", MANIFEST_LABEL, request_id);

        for (namespace, group) in applied.into_groups() {
            let api = self.dynamic_api(&group.resource, group.namespaced, namespace.as_deref());
            let existing = api.list(&ListParams::default().labels(&selector)).await?;

            for name in prune_candidates(request_id, &group, &existing.items) {
                info!(
                    event = "PruningObject",
                    manifest = request_id,
                    kind = group.resource.kind.as_str(),
                    name = name.as_str(),
                );
                delete_dynamic(&api, &name).await?;
            }
        }

        Ok(())
    }
}

/// Deployments of a release that dependent manifests wait for
fn release_dependencies(deployments: &[Deployment]) -> Vec<String> {
    deployments
        .iter()
        .filter(|deployment| {
            deployment.metadata.labels
                .as_ref()
                .and_then(|labels| labels.get(RELEASE_COMPONENT_LABEL))
                .is_none_or(|component| component != SERVER_COMPONENT)
        })
        .filter_map(|deployment| deployment.metadata.name.clone())
        .collect()
}

/// Run `wait`, failing with `DependencyTimeoutError` once `limit` elapses
async fn bounded_wait<F>(release: &str, limit: Duration, wait: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    timeout(limit, wait)
        .await
        .map_err(|_| InstallerError::DependencyTimeoutError {
            release: release.to_string(),
            seconds: limit.as_secs(),
        })?
}

/// Tag a document with the request id when the request prunes
fn prepare_document(mut document: DynamicObject, request_id: &str, prune: bool) -> DynamicObject {
    if prune {
        document
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(MANIFEST_LABEL.to_string(), request_id.to_string());
    }
    document
}

/// Labeled objects of a group that the request no longer contains
fn prune_candidates(request_id: &str, group: &AppliedGroup, existing: &[DynamicObject]) -> Vec<String> {
    existing
        .iter()
        .filter(|obj| {
            obj.metadata.labels
                .as_ref()
                .and_then(|labels| labels.get(MANIFEST_LABEL))
                .is_some_and(|id| id == request_id)
        })
        .filter_map(|obj| obj.metadata.name.clone())
        .filter(|name| !group.names.contains(name))
        .collect()
}

struct AppliedGroup {
    resource: ApiResource,
    namespaced: bool,
    names: BTreeSet<String>,
}

/// Names applied by a request, grouped by kind and namespace
#[derive(Default)]
struct AppliedSet {
    groups: BTreeMap<(String, Option<String>), AppliedGroup>,
}

impl AppliedSet {
    fn record(&mut self, resource: &ApiResource, namespaced: bool, namespace: Option<String>, name: String) {
        let kind = format!("{}/{}", resource.api_version, resource.kind);

        self.groups
            .entry((kind, namespace))
            .or_insert_with(|| AppliedGroup {
                resource: resource.clone(),
                namespaced,
                names: BTreeSet::new(),
            })
            .names
            .insert(name);
    }

    fn into_groups(self) -> impl Iterator<Item = (Option<String>, AppliedGroup)> {
        self.groups.into_iter().map(|((_, namespace), group)| (namespace, group))
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    fn region(&self) -> &str {
        &self.region
    }

    async fn install_chart(&self, request: InstallRequest) -> Result<ControllerHandle> {
        let release = self.helm.upgrade_install(&request).await?;

        info!(
            event = "ChartInstalled",
            release = release.name.as_str(),
            namespace = release.namespace.as_str(),
            revision = release.version,
        );

        Ok(ControllerHandle::new(&release.name, &release.namespace, Some(release.version)))
    }

    async fn create_workload_identity(&self, name: &str, namespace: &str) -> Result<WorkloadIdentity> {
        let roles = self.roles()?;
        let role_arn = roles.ensure_role(name, namespace).await?;

        let api = Api::<ServiceAccount>::namespaced(self.client.clone(), namespace);
        let service_account = ServiceAccount {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                annotations: Some(BTreeMap::from([
                    (ROLE_ARN_ANNOTATION.to_string(), role_arn.clone()),
                ])),
                labels: Some(BTreeMap::from([
                    ("app.kubernetes.io/managed-by".to_string(), "argocd-bootstrap".to_string()),
                ])),
                ..Default::default()
            },
            ..Default::default()
        };
        apply(&api, service_account, name).await?;

        info!(
            event = "WorkloadIdentityReady",
            service_account = name,
            namespace = namespace,
            role = role_arn.as_str(),
        );

        Ok(WorkloadIdentity {
            name: name.to_string(),
            namespace: namespace.to_string(),
            role_name: roles.role_name(name, namespace),
            role_arn: Some(role_arn),
        })
    }

    async fn grant_secrets_access(&self, identity: &WorkloadIdentity, grant: &SecretsGrant) -> Result<()> {
        self.roles()?.grant(&identity.role_name, grant).await
    }

    async fn apply_manifest(&self, request: ManifestRequest) -> Result<()> {
        if let Some(handle) = &request.depends_on {
            self.await_release(handle).await?;
        }

        let mut params = PatchParams::apply(FIELD_MANAGER);
        if request.overwrite {
            params = params.force();
        }
        if request.skip_validation {
            params = params.validation_ignore();
        }

        let mut applied = AppliedSet::default();

        for document in request.documents {
            let document = prepare_document(document, &request.id, request.prune);
            let gvk = object_gvk(&document)?;
            let name = object_name(&document)?.to_string();
            let (resource, capabilities) = pinned_kind(&self.client, &gvk).await?;
            let namespaced = capabilities.scope == Scope::Namespaced;
            let namespace = document.metadata.namespace.clone().filter(|_| namespaced);

            let api = self.dynamic_api(&resource, namespaced, namespace.as_deref());
            apply_dynamic(&api, &document, &params).await?;

            debug!(
                event = "AppliedDocument",
                manifest = request.id.as_str(),
                kind = gvk.kind.as_str(),
                name = name.as_str(),
            );

            applied.record(&resource, namespaced, namespace, name);
        }

        if request.prune {
            self.prune(&request.id, applied).await?;
        }

        info!(event = "ManifestApplied", manifest = request.id.as_str());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::GroupVersionKind;

    fn deployment(name: &str, component: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([
                    (RELEASE_INSTANCE_LABEL.to_string(), "ssp-addon".to_string()),
                    (RELEASE_COMPONENT_LABEL.to_string(), component.to_string()),
                ])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn secret_resource() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Secret"))
    }

    fn object(name: &str, manifest: Option<&str>) -> DynamicObject {
        let mut obj = DynamicObject::new(name, &secret_resource()).within("argocd");
        if let Some(manifest) = manifest {
            obj.metadata.labels = Some(BTreeMap::from([
                (MANIFEST_LABEL.to_string(), manifest.to_string()),
            ]));
        }
        obj
    }

    #[test]
    fn server_is_not_a_dependency() {
        let deployments = vec![
            deployment("ssp-addon-argocd-server", "server"),
            deployment("ssp-addon-argocd-repo-server", "repo-server"),
            deployment("ssp-addon-argocd-redis", "redis"),
            Deployment {
                metadata: ObjectMeta { name: Some("unlabeled".to_string()), ..Default::default() },
                ..Default::default()
            },
        ];

        assert_eq!(
            release_dependencies(&deployments),
            vec!["ssp-addon-argocd-repo-server", "ssp-addon-argocd-redis", "unlabeled"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_release_times_out() {
        let result = bounded_wait(
            "ssp-addon",
            Duration::from_secs(600),
            std::future::pending::<Result<()>>(),
        ).await;

        assert!(matches!(
            result,
            Err(InstallerError::DependencyTimeoutError { ref release, seconds: 600 }) if release == "ssp-addon"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_release_passes_through() {
        assert!(bounded_wait("ssp-addon", Duration::from_secs(1), async { Ok(()) }).await.is_ok());

        let failed = bounded_wait("ssp-addon", Duration::from_secs(1), async {
            Err(InstallerError::ReleaseWaitError { release: "ssp-addon".to_string(), message: "gone".to_string() })
        }).await;
        assert!(matches!(failed, Err(InstallerError::ReleaseWaitError { .. })));
    }

    #[test]
    fn documents_are_labeled_only_when_pruning() {
        let untouched = prepare_document(object("repo", None), "argocd-bootstrap-secret", false);
        assert!(untouched.metadata.labels.is_none());

        let labeled = prepare_document(object("repo", None), "argocd-bootstrap-secret", true);
        assert_eq!(
            labeled.metadata.labels.unwrap().get(MANIFEST_LABEL).map(String::as_str),
            Some("argocd-bootstrap-secret")
        );
    }

    #[test]
    fn applied_names_are_grouped_by_kind_and_namespace() {
        let secrets = secret_resource();
        let config_maps = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"));

        let mut applied = AppliedSet::default();
        applied.record(&secrets, true, Some("argocd".to_string()), "a".to_string());
        applied.record(&secrets, true, Some("argocd".to_string()), "b".to_string());
        applied.record(&secrets, true, Some("other".to_string()), "c".to_string());
        applied.record(&config_maps, true, Some("argocd".to_string()), "d".to_string());

        let groups: Vec<_> = applied
            .into_groups()
            .map(|(namespace, group)| (group.resource.kind.clone(), namespace, group.names.into_iter().collect::<Vec<_>>()))
            .collect();

        assert_eq!(groups, vec![
            ("ConfigMap".to_string(), Some("argocd".to_string()), vec!["d".to_string()]),
            ("Secret".to_string(), Some("argocd".to_string()), vec!["a".to_string(), "b".to_string()]),
            ("Secret".to_string(), Some("other".to_string()), vec!["c".to_string()]),
        ]);
    }

    #[test]
    fn only_stale_objects_of_the_request_are_pruned() {
        let mut applied = AppliedSet::default();
        applied.record(&secret_resource(), true, Some("argocd".to_string()), "bootstrap-repo-secret1".to_string());
        let (_, group) = applied.into_groups().next().unwrap();

        let existing = vec![
            object("bootstrap-repo-secret1", Some("argocd-bootstrap-secret")),
            object("stale", Some("argocd-bootstrap-secret")),
            object("foreign", Some("another-manifest")),
            object("unlabeled", None),
        ];

        assert_eq!(prune_candidates("argocd-bootstrap-secret", &group, &existing), vec!["stale".to_string()]);
    }
}
