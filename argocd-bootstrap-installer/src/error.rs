// SPDX-FileCopyrightText: 2025 Timothy Pogue
//
// SPDX-License-Identifier: ISC

use std::result;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("kubernetes api error: {0}")]
    KubeError(#[from] kube::Error),
    #[error("secret `{0}` is stored as binary, only string secrets are supported")]
    UnsupportedSecretFormat(String),
    #[error("secret `{secret}` does not hold a JSON object of credentials: {reason}")]
    MalformedCredentials { secret: String, reason: String },
    #[error("secrets service request for `{secret}` failed: {source}")]
    SecretsServiceError {
        secret: String,
        #[source]
        source: BoxError,
    },
    #[error("chart install of release `{release}` failed: {message}")]
    ChartInstallError { release: String, message: String },
    #[error("workload identity `{identity}` error: {source}")]
    IdentityError {
        identity: String,
        #[source]
        source: BoxError,
    },
    #[error("invalid manifest document: {0}")]
    InvalidManifestError(String),
    #[error("timed out after {seconds}s waiting for release `{release}`")]
    DependencyTimeoutError { release: String, seconds: u64 },
    #[error("kubeconfig error: {0}")]
    KubeConfigError(String),
    #[error("waiting for release `{release}` failed: {message}")]
    ReleaseWaitError { release: String, message: String },
    #[error("missing configuration: {0}")]
    MissingConfigError(&'static str),
    #[error("serialization error: {0}")]
    SerializationError(String),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for InstallerError {
    fn from(error: serde_json::Error) -> Self {
        InstallerError::SerializationError(error.to_string())
    }
}

impl From<serde_norway::Error> for InstallerError {
    fn from(error: serde_norway::Error) -> Self {
        InstallerError::SerializationError(error.to_string())
    }
}

pub type Result<T> = result::Result<T, InstallerError>;
