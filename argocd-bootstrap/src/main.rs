// SPDX-FileCopyrightText: 2025 Timothy Pogue
//
// SPDX-License-Identifier: ISC

mod cli;

use std::sync::Arc;
use std::process;
use clap::Parser;
use clap::CommandFactory;
use rustls::crypto::aws_lc_rs;

use argocd_bootstrap_common::config::{AppConfig, AppConfigBuilder};
use argocd_bootstrap_common::telemetry::{error, info, setup_logging};
use argocd_bootstrap_installer::aws::{load_shared_config, shared_region};
use argocd_bootstrap_installer::cluster::{dry_run::DryRunCluster, kubernetes::KubeCluster, Cluster};
use argocd_bootstrap_installer::error::Result;
use argocd_bootstrap_installer::installer::BootstrapInstaller;
use argocd_bootstrap_installer::secrets::AwsSecretsManager;

use crate::cli::{CliArgs, Commands, ConfigArgs};

#[tokio::main]
async fn main() {
    // Install the default aws_lc_rs crypto provider
    let _ = aws_lc_rs::default_provider().install_default();

    let args = CliArgs::parse();

    setup_logging();

    match &args.cmd {
        Some(Commands::Install(config_args)) => {
            info!(
                event = "Starting",
                version = env!("CARGO_PKG_VERSION"),
            );

            let config = load_config(config_args);
            let shared_config = load_shared_config(&config.cluster.region).await;
            let cluster = KubeCluster::connect(&config.cluster, &shared_config).await.unwrap_or_else(|e| {
                error!(
                    event = "Error",
                    error = %e,
                );
                process::exit(1);
            });

            let secrets = AwsSecretsManager::new(shared_config);

            run(&cluster, secrets, &config).await.unwrap_or_else(|e| {
                error!(
                    event = "Error",
                    error = %e,
                );
                process::exit(1);
            });
        },
        Some(Commands::Render(config_args)) => {
            let config = load_config(config_args);
            let shared_config = load_shared_config(&config.cluster.region).await;
            let cluster = DryRunCluster::stdout(&shared_region(&shared_config).unwrap_or_default());
            let secrets = AwsSecretsManager::new(shared_config);

            run(&cluster, secrets, &config).await.unwrap_or_else(|e| {
                error!(
                    event = "Error",
                    error = %e,
                );
                process::exit(1);
            });
        },
        None => {
            let mut cmd = CliArgs::command();
            let _ = cmd.print_help();
            process::exit(1);
        },
    }
}

/// Load the configuration from defaults, the optional file, the environment
/// and the command line, in increasing precedence
fn load_config(args: &ConfigArgs) -> AppConfig {
    let mut builder = AppConfigBuilder::default();

    if let Some(path) = args.config.as_deref() {
        builder.with_file(path);
    }

    builder
        .with_env()
        .with_override_option("argocd.namespace", args.namespace.as_deref())
        .with_override_option("argocd.bootstrap_repo.repo_url", args.repo_url.as_deref())
        .with_override_option("argocd.bootstrap_repo.path", args.repo_path.as_deref())
        .with_override_option("argocd.bootstrap_repo.credentials_secret_name", args.credentials_secret.as_deref())
        .with_override_option("argocd.bootstrap_repo.credentials_type", args.credentials_type.map(|t| t.as_str()))
        .with_override_option("cluster.region", args.region.as_deref())
        .with_override_option("cluster.kube_context", args.kube_context.as_deref())
        .build()
        .unwrap_or_else(|e| {
            error!(
                event = "Error",
                error = %e,
            );
            process::exit(1);
        })
}

async fn run(cluster: &dyn Cluster, secrets: AwsSecretsManager, config: &AppConfig) -> Result<()> {
    let mut installer = BootstrapInstaller::new(Arc::new(secrets));

    let controller = installer.run(cluster, &config.argocd, &config.teams).await?;

    info!(
        event = "Completed",
        release = controller.release(),
        namespace = controller.namespace(),
    );

    Ok(())
}
