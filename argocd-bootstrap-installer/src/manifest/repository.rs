use kube::api::ObjectMeta;
use k8s_openapi::api::core::v1::Secret;
use serde_json::Value;
use std::collections::BTreeMap;

use argocd_bootstrap_common::config::CredentialsType;

use crate::error::{InstallerError, Result};
use crate::manifest::{
    REPO_SECRET_NAME, SECRET_TYPE_LABEL, SECRET_TYPE_REPOSITORY, SSH_PRIVATE_KEY_FIELD, URL_FIELD,
};

/// How ArgoCD authenticates to the bootstrap repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoCredential {
    Ssh { private_key: String },
    /// Fields such as `username` and `password`, taken from a JSON object
    UserPass(BTreeMap<String, String>),
    None,
}

impl RepoCredential {
    /// Interpret a stored secret value according to the credentials type
    ///
    /// # Arguments
    /// * `secret_name` - The name of the secret the value was read from
    /// * `credentials_type` - The configured credentials type, if any
    /// * `value` - The secret value
    ///
    /// # Returns
    /// The credential, or `MalformedCredentials` when a username or token secret
    /// does not hold a JSON object
    pub fn from_secret(secret_name: &str, credentials_type: Option<CredentialsType>, value: &str) -> Result<Self> {
        match credentials_type {
            Some(CredentialsType::Ssh) => Ok(RepoCredential::Ssh { private_key: value.to_string() }),
            Some(CredentialsType::Username) | Some(CredentialsType::Token) => {
                let parsed: Value = serde_json::from_str(value).map_err(|e| {
                    InstallerError::MalformedCredentials {
                        secret: secret_name.to_string(),
                        reason: e.to_string(),
                    }
                })?;

                let Value::Object(fields) = parsed else {
                    return Err(InstallerError::MalformedCredentials {
                        secret: secret_name.to_string(),
                        reason: "expected a JSON object".to_string(),
                    });
                };

                Ok(RepoCredential::UserPass(
                    fields
                        .into_iter()
                        .map(|(key, value)| match value {
                            Value::String(value) => (key, value),
                            other => (key, other.to_string()),
                        })
                        .collect()
                ))
            },
            None => Ok(RepoCredential::None),
        }
    }

    /// The `stringData` of the repository Secret. Credential fields take precedence
    /// over the url.
    pub fn string_data(&self, url: &str) -> BTreeMap<String, String> {
        let base = BTreeMap::from([(URL_FIELD.to_string(), url.to_string())]);

        match self {
            RepoCredential::Ssh { private_key } => base
                .into_iter()
                .chain([(SSH_PRIVATE_KEY_FIELD.to_string(), private_key.clone())])
                .collect(),
            RepoCredential::UserPass(fields) => base
                .into_iter()
                .chain(fields.clone())
                .collect(),
            RepoCredential::None => base,
        }
    }
}

/// Build the repository Secret discovered by ArgoCD through its secret-type label
///
/// # Arguments
/// * `namespace` - The ArgoCD namespace
/// * `url` - The repository url
/// * `credential` - The repository credential
///
/// # Returns
/// The Secret resource
pub fn repository_secret(namespace: &str, url: &str, credential: &RepoCredential) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(REPO_SECRET_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([
                (SECRET_TYPE_LABEL.to_string(), SECRET_TYPE_REPOSITORY.to_string()),
            ])),
            ..Default::default()
        },
        string_data: Some(credential.string_data(url)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "git@example.com/apps";

    #[test]
    fn ssh_secret_holds_only_url_and_key() {
        let credential = RepoCredential::from_secret("my-secret", Some(CredentialsType::Ssh), "-----BEGIN KEY-----").unwrap();
        let data = credential.string_data(URL);

        assert_eq!(data, BTreeMap::from([
            ("url".to_string(), URL.to_string()),
            ("sshPrivateKey".to_string(), "-----BEGIN KEY-----".to_string()),
        ]));
    }

    #[test]
    fn ssh_value_is_not_parsed() {
        let credential = RepoCredential::from_secret("my-secret", Some(CredentialsType::Ssh), r#"{"username":"bot"}"#).unwrap();

        assert_eq!(credential, RepoCredential::Ssh { private_key: r#"{"username":"bot"}"#.to_string() });
    }

    #[test]
    fn token_fields_are_merged_with_url() {
        for credentials_type in [CredentialsType::Username, CredentialsType::Token] {
            let credential = RepoCredential::from_secret("my-secret", Some(credentials_type), r#"{"k":"v"}"#).unwrap();

            assert_eq!(credential.string_data(URL), BTreeMap::from([
                ("url".to_string(), URL.to_string()),
                ("k".to_string(), "v".to_string()),
            ]));
        }
    }

    #[test]
    fn stored_url_overrides_configured_url() {
        let credential = RepoCredential::from_secret(
            "my-secret",
            Some(CredentialsType::Token),
            r#"{"url":"https://mirror.example.com/apps","password":"tok123"}"#,
        ).unwrap();

        assert_eq!(credential.string_data(URL)["url"], "https://mirror.example.com/apps");
    }

    #[test]
    fn non_string_fields_are_rendered() {
        let credential = RepoCredential::from_secret("my-secret", Some(CredentialsType::Username), r#"{"insecure":true,"port":22}"#).unwrap();
        let data = credential.string_data(URL);

        assert_eq!(data["insecure"], "true");
        assert_eq!(data["port"], "22");
    }

    #[test]
    fn malformed_credentials_are_rejected() {
        let not_json = RepoCredential::from_secret("my-secret", Some(CredentialsType::Token), "tok123");
        let not_object = RepoCredential::from_secret("my-secret", Some(CredentialsType::Username), r#"["bot"]"#);

        assert!(matches!(not_json, Err(InstallerError::MalformedCredentials { ref secret, .. }) if secret == "my-secret"));
        assert!(matches!(not_object, Err(InstallerError::MalformedCredentials { .. })));
    }

    #[test]
    fn missing_type_attaches_no_credentials() {
        let credential = RepoCredential::from_secret("my-secret", None, "anything").unwrap();

        assert_eq!(credential, RepoCredential::None);
        assert_eq!(credential.string_data(URL), BTreeMap::from([("url".to_string(), URL.to_string())]));
    }

    #[test]
    fn secret_is_labeled_for_discovery() {
        let secret = repository_secret("argocd", URL, &RepoCredential::None);

        assert_eq!(secret.metadata.name.as_deref(), Some("bootstrap-repo-secret1"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("argocd"));
        assert_eq!(
            secret.metadata.labels.unwrap().get("argocd.argoproj.io/secret-type").map(String::as_str),
            Some("repository")
        );
    }
}
