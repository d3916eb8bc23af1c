// SPDX-FileCopyrightText: 2025 Timothy Pogue
//
// SPDX-License-Identifier: ISC

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use aws_types::{region::Region, SdkConfig};

use crate::error::{InstallerError, Result};

/// Raw value of a secret as stored by the secrets service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretPayload {
    Text(String),
    Binary(Vec<u8>),
}

#[async_trait]
pub trait SecretsService: Send + Sync {
    /// Fetch the current value of the secret `name` in `region`
    async fn get_secret_value(&self, name: &str, region: &str) -> Result<SecretPayload>;
}

/// AWS Secrets Manager, with one client per looked up region
#[derive(Clone, Debug)]
pub struct AwsSecretsManager {
    shared_config: SdkConfig,
    endpoint: Option<String>,
}

impl AwsSecretsManager {
    pub fn new(shared_config: SdkConfig) -> Self {
        Self { shared_config, endpoint: None }
    }

    /// Send requests to a custom endpoint, e.g. a local emulator
    pub fn with_endpoint(mut self, endpoint: Option<&str>) -> Self {
        self.endpoint = endpoint.filter(|e| !e.trim().is_empty()).map(ToString::to_string);
        self
    }

    /// Client for `region`, or for the shared configuration's region when empty
    fn client(&self, region: &str) -> SecretsManagerClient {
        let mut builder = aws_sdk_secretsmanager::config::Builder::from(&self.shared_config);
        if !region.is_empty() {
            builder = builder.region(Region::new(region.to_string()));
        }
        if let Some(endpoint) = self.endpoint.as_deref() {
            builder = builder.endpoint_url(endpoint);
        }
        SecretsManagerClient::from_conf(builder.build())
    }
}

#[async_trait]
impl SecretsService for AwsSecretsManager {
    async fn get_secret_value(&self, name: &str, region: &str) -> Result<SecretPayload> {
        let output = self.client(region)
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| InstallerError::SecretsServiceError {
                secret: name.to_string(),
                source: Box::new(e),
            })?;

        match (output.secret_string(), output.secret_binary()) {
            (Some(value), _) => Ok(SecretPayload::Text(value.to_string())),
            (None, Some(blob)) => Ok(SecretPayload::Binary(blob.as_ref().to_vec())),
            (None, None) => Err(InstallerError::SecretsServiceError {
                secret: name.to_string(),
                source: "secret has no value".into(),
            }),
        }
    }
}
