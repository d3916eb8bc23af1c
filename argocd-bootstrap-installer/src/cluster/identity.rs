use aws_sdk_iam::Client as IamClient;
use serde_json::{json, Map, Value};

use argocd_bootstrap_common::telemetry::info;

use crate::cluster::SecretsGrant;
use crate::error::{InstallerError, Result};

pub static ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

static SCOPED_POLICY_NAME: &str = "argocd-repository-secret-read";
static MAX_ROLE_NAME_LENGTH: usize = 64;
static DEFAULT_PARTITION: &str = "aws";

/// IAM roles for service accounts, trusted through the cluster's OIDC provider
#[derive(Clone, Debug)]
pub struct IamRoles {
    client: IamClient,
    cluster_name: String,
    oidc_provider_arn: String,
}

impl IamRoles {
    pub fn new(client: IamClient, cluster_name: &str, oidc_provider_arn: &str) -> Self {
        Self {
            client,
            cluster_name: cluster_name.to_string(),
            oidc_provider_arn: oidc_provider_arn.to_string(),
        }
    }

    pub fn role_name(&self, service_account: &str, namespace: &str) -> String {
        role_name(&self.cluster_name, service_account, namespace)
    }

    fn partition(&self) -> &str {
        provider_arn_parts(&self.oidc_provider_arn)
            .map(|(partition, _)| partition)
            .unwrap_or(DEFAULT_PARTITION)
    }

    /// Create the role for a service account unless it exists already
    ///
    /// # Arguments
    /// * `service_account` - The name of the service account assuming the role
    /// * `namespace` - The namespace of the service account
    ///
    /// # Returns
    /// The ARN of the role
    pub async fn ensure_role(&self, service_account: &str, namespace: &str) -> Result<String> {
        let role_name = self.role_name(service_account, namespace);
        let trust_policy = trust_policy(&self.oidc_provider_arn, service_account, namespace);

        let created = self.client
            .create_role()
            .role_name(&role_name)
            .assume_role_policy_document(trust_policy.to_string())
            .description(format!("ArgoCD {} service account in {}", service_account, namespace))
            .send()
            .await;

        match created {
            Ok(_) => info!(event = "CreatedRole", role = role_name.as_str()),
            Err(err) => {
                let exists = err
                    .as_service_error()
                    .is_some_and(|e| e.is_entity_already_exists_exception());

                if !exists {
                    return Err(identity_error(&role_name, err));
                }
                info!(event = "ReusingRole", role = role_name.as_str());
            },
        }

        role_arn(&self.oidc_provider_arn, &role_name)
            .ok_or_else(|| identity_error(&role_name, "malformed OIDC provider ARN"))
    }

    /// Grant Secrets Manager access to a role
    pub async fn grant(&self, role_name: &str, grant: &SecretsGrant) -> Result<()> {
        match grant {
            SecretsGrant::Managed { policy_arn } => {
                self.client
                    .attach_role_policy()
                    .role_name(role_name)
                    .policy_arn(policy_arn)
                    .send()
                    .await
                    .map_err(|e| identity_error(role_name, e))?;
            },
            SecretsGrant::ScopedReadOnly { secret_name, region } => {
                self.client
                    .put_role_policy()
                    .role_name(role_name)
                    .policy_name(SCOPED_POLICY_NAME)
                    .policy_document(scoped_read_policy(self.partition(), secret_name, region).to_string())
                    .send()
                    .await
                    .map_err(|e| identity_error(role_name, e))?;
            },
        }

        Ok(())
    }
}

fn identity_error<E>(role_name: &str, source: E) -> InstallerError
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    InstallerError::IdentityError {
        identity: role_name.to_string(),
        source: source.into(),
    }
}

/// Name of the role for a service account, truncated to the IAM limit
pub fn role_name(cluster_name: &str, service_account: &str, namespace: &str) -> String {
    let name = [cluster_name, namespace, service_account]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-");

    name.chars().take(MAX_ROLE_NAME_LENGTH).collect()
}

/// Partition and account of an OIDC provider ARN
fn provider_arn_parts(oidc_provider_arn: &str) -> Option<(&str, &str)> {
    // arn:<partition>:iam::<account>:oidc-provider/<issuer>
    let mut parts = oidc_provider_arn.splitn(6, ':');
    match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("arn"), Some(partition), Some("iam"), Some(""), Some(account))
            if !partition.is_empty() && !account.is_empty() => Some((partition, account)),
        _ => None,
    }
}

/// ARN of a role at the root path, in the partition and account of the OIDC provider
pub fn role_arn(oidc_provider_arn: &str, role_name: &str) -> Option<String> {
    let (partition, account) = provider_arn_parts(oidc_provider_arn)?;

    Some(format!("arn:{}:iam::{}:role/{}", partition, account, role_name))
}

/// Trust policy allowing the service account to assume the role through web identity
pub fn trust_policy(oidc_provider_arn: &str, service_account: &str, namespace: &str) -> Value {
    // arn:aws:iam::<account>:oidc-provider/<issuer>
    let issuer = oidc_provider_arn
        .split_once("oidc-provider/")
        .map(|(_, issuer)| issuer)
        .unwrap_or(oidc_provider_arn);

    let string_equals: Map<String, Value> = [
        (format!("{}:sub", issuer), json!(format!("system:serviceaccount:{}:{}", namespace, service_account))),
        (format!("{}:aud", issuer), json!("sts.amazonaws.com")),
    ]
    .into_iter()
    .collect();

    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Federated": oidc_provider_arn },
            "Action": "sts:AssumeRoleWithWebIdentity",
            "Condition": { "StringEquals": string_equals }
        }]
    })
}

/// Inline policy allowing a single secret to be read
pub fn scoped_read_policy(partition: &str, secret_name: &str, region: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": ["secretsmanager:GetSecretValue", "secretsmanager:DescribeSecret"],
            // Secrets Manager appends a random six character suffix to secret ARNs
            "Resource": format!("arn:{}:secretsmanager:{}:*:secret:{}-??????", partition, region, secret_name),
        }]
    })
}
