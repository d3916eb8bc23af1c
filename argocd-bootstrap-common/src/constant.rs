// SPDX-FileCopyrightText: 2025 Timothy Pogue
//
// SPDX-License-Identifier: ISC

/// Prefix for configuration environment variables, e.g.
/// `ARGOCD_BOOTSTRAP__ARGOCD__NAMESPACE`
pub const ENV_PREFIX: &str = "ARGOCD_BOOTSTRAP";

/// Environment variable holding the log filter
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

pub const DEFAULT_NAMESPACE: &str = "argocd";
pub const DEFAULT_CHART_NAME: &str = "argo-cd";
pub const DEFAULT_CHART_REPOSITORY: &str = "https://argoproj.github.io/argo-helm";
pub const DEFAULT_CHART_VERSION: &str = "3.17.5";
pub const DEFAULT_RELEASE_NAME: &str = "ssp-addon";
pub const DEFAULT_HELM_BINARY: &str = "helm";
pub const DEFAULT_DEPENDENCY_TIMEOUT_SECS: u64 = 600;
