// SPDX-FileCopyrightText: 2025 Timothy Pogue
//
// SPDX-License-Identifier: ISC

use clap::{Args, Parser, Subcommand};

use argocd_bootstrap_common::config::CredentialsType;

#[derive(Parser, Debug)]
#[
    clap(
        name = "argocd-bootstrap",
        version,
        author,
        about = "Install ArgoCD into an EKS cluster and bootstrap an app of apps"
    )
]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[
        clap(
            name = "install",
            about = "Install ArgoCD and bootstrap the configured repository"
        )
    ]
    Install(ConfigArgs),
    #[
        clap(
            name = "render",
            about = "Print the requests an install would submit without applying them"
        )
    ]
    Render(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (JSON, YAML or TOML)
    #[clap(long, short = 'c', env = "ARGOCD_BOOTSTRAP_CONFIG")]
    pub config: Option<String>,
    /// Namespace to install ArgoCD into
    #[clap(long)]
    pub namespace: Option<String>,
    /// Git repository holding the bootstrap applications
    #[clap(long)]
    pub repo_url: Option<String>,
    /// Path of the applications within the repository
    #[clap(long)]
    pub repo_path: Option<String>,
    /// Secrets Manager secret holding the repository credentials
    #[clap(long)]
    pub credentials_secret: Option<String>,
    /// Type of the repository credentials: USERNAME, TOKEN or SSH
    #[clap(long, value_parser = clap::value_parser!(CredentialsType))]
    pub credentials_type: Option<CredentialsType>,
    /// Region of the cluster
    #[clap(long)]
    pub region: Option<String>,
    /// Kubeconfig context to use
    #[clap(long)]
    pub kube_context: Option<String>,
}
