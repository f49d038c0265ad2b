//! Subcommand handlers.
//!
//! [`run`] builds the backends a subcommand needs from the configuration and
//! dispatches. Handlers are generic over the cluster client and scan backend
//! so the in-memory implementations can drive them in tests.

pub mod annotations;
pub mod config;
pub mod project;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use perceptor_cluster::{ClusterClientConfig, ClusterMode, KubeClusterClient, MockClusterClient};
use perceptor_core::config::PerceptorConfig;
use perceptor_scanner::{BackendMode, CommandScanBackend, MockScanBackend, ScanBackendConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Dispatch a parsed command line, writing the report to `out`.
pub async fn run(cli: Cli, out: &mut dyn Write) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Config(args) => config::execute(args, &cli.config, &writer, out).await,
        Commands::Annotations(args) => {
            let cluster_config = load_cluster_config(&cli.config).await?;
            match cluster_config.mode {
                ClusterMode::Kube => {
                    let cluster = KubeClusterClient::connect(&cluster_config).await?;
                    annotations::execute(args, &cluster, &writer, out).await
                }
                // 프로세스 안에서만 존재하는 클러스터이므로 빈 상태에서 시작합니다.
                ClusterMode::Mock => {
                    let cluster = Arc::new(MockClusterClient::new());
                    annotations::execute(args, &cluster, &writer, out).await
                }
            }
        }
        Commands::Project(args) => {
            let backend_config = load_backend_config(&cli.config).await?;
            match backend_config.mode {
                BackendMode::Command => {
                    let backend = CommandScanBackend::new(backend_config)?;
                    project::execute(args, &backend, &writer, out).await
                }
                BackendMode::Mock => {
                    let backend = MockScanBackend::new(backend_config.mock);
                    project::execute(args, &backend, &writer, out).await
                }
            }
        }
    }
}

async fn load_cluster_config(path: &Path) -> Result<ClusterClientConfig, CliError> {
    let config = PerceptorConfig::load(path).await?;
    let cluster = ClusterClientConfig::from_core(&config.cluster);
    cluster
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(cluster)
}

async fn load_backend_config(path: &Path) -> Result<ScanBackendConfig, CliError> {
    let config = PerceptorConfig::load(path).await?;
    let backend = ScanBackendConfig::from_core(&config.scanner);
    backend
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(backend)
}
