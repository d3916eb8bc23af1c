use argocd_bootstrap_common::config::RepoConfig;

use crate::crd::application::{
    Application, ApplicationDestination, ApplicationSource, ApplicationSpec, AutomatedSyncPolicy, SyncPolicy,
};
use crate::manifest::{
    APPLICATION_DESTINATION_NAMESPACE, APPLICATION_PROJECT, DEFAULT_APPLICATION_NAME, IN_CLUSTER_SERVER,
    TARGET_REVISION,
};

/// Build the app of apps Application for the bootstrap repository
///
/// The Application always tracks the tip of the repository's default branch and
/// deploys into the cluster ArgoCD runs in.
///
/// # Arguments
/// * `repo` - The bootstrap repository
/// * `namespace` - The ArgoCD namespace
///
/// # Returns
/// The Application resource
pub fn bootstrap_application(repo: &RepoConfig, namespace: &str) -> Application {
    let name = repo.name.as_deref().unwrap_or(DEFAULT_APPLICATION_NAME);

    let mut application = Application::new(name, ApplicationSpec {
        destination: ApplicationDestination {
            namespace: APPLICATION_DESTINATION_NAMESPACE.to_string(),
            server: IN_CLUSTER_SERVER.to_string(),
        },
        project: APPLICATION_PROJECT.to_string(),
        source: ApplicationSource {
            repo_url: repo.repo_url.clone(),
            path: repo.path.clone(),
            target_revision: TARGET_REVISION.to_string(),
        },
        sync_policy: Some(SyncPolicy {
            automated: Some(AutomatedSyncPolicy::default()),
        }),
    });
    application.metadata.namespace = Some(namespace.to_string());

    application
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn application_document_shape() {
        let repo = RepoConfig {
            repo_url: "git@example.com/apps".to_string(),
            path: Some("envs/prod".to_string()),
            name: Some("platform".to_string()),
            credentials_secret_name: None,
            credentials_type: None,
        };

        let document = serde_json::to_value(bootstrap_application(&repo, "argocd")).unwrap();

        assert_eq!(document, json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": { "name": "platform", "namespace": "argocd" },
            "spec": {
                "destination": { "namespace": "default", "server": "https://kubernetes.default.svc" },
                "project": "default",
                "source": {
                    "repoURL": "git@example.com/apps",
                    "path": "envs/prod",
                    "targetRevision": "HEAD",
                },
                "syncPolicy": { "automated": {} },
            }
        }));
    }

    #[test]
    fn name_defaults_and_path_is_optional() {
        let repo = RepoConfig {
            repo_url: "https://example.com/apps.git".to_string(),
            path: None,
            name: None,
            credentials_secret_name: None,
            credentials_type: None,
        };

        let application = bootstrap_application(&repo, "gitops");

        assert_eq!(application.metadata.name.as_deref(), Some("bootstrap-apps"));
        assert_eq!(application.metadata.namespace.as_deref(), Some("gitops"));
        assert_eq!(application.spec.source.path, None);
        assert_eq!(application.spec.source.target_revision, "HEAD");
    }
}
