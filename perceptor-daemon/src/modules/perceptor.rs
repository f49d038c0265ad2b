//! Perceptor engine module initialization.
//!
//! Builds the cluster client, the scan backend and the orchestrator from
//! `PerceptorConfig`, and wires the pod event channels between them.
//!
//! # Modes
//!
//! | `[cluster].mode` | `[scanner].mode` | Modules registered |
//! |------------------|------------------|--------------------|
//! | `kube`           | `command`/`mock` | `pod-watcher`, `perceptor` |
//! | `mock`           | `command`/`mock` | `perceptor` |
//!
//! In mock cluster mode nothing watches a real cluster: the in-memory
//! client and the event senders are handed back in [`MockHarness`] so a
//! caller can feed pods in.

use std::sync::Arc;

use anyhow::Result;

use perceptor_cluster::{
    ClusterClient, ClusterClientConfig, ClusterMode, KubeClusterClient, MockClusterClient,
    PodEventSenders, PodEventStreams, pod_event_channels,
};
use perceptor_core::config::PerceptorConfig;
use perceptor_engine::{OrchestratorConfig, PerceptorBuilder};
use perceptor_scanner::{
    BackendMode, CommandScanBackend, MockScanBackend, ScanBackend, ScanBackendConfig,
};

use super::ModuleHandle;
use super::event_source::EventSourceModule;

/// In-memory components created in mock modes.
#[derive(Default)]
pub struct MockHarness {
    /// Set when `[cluster].mode = "mock"`.
    pub cluster: Option<Arc<MockClusterClient>>,
    /// Event senders feeding the engine in mock cluster mode.
    pub events: Option<PodEventSenders>,
    /// Set when `[scanner].mode = "mock"`.
    pub backend: Option<Arc<MockScanBackend>>,
}

/// Modules built from the configuration, in start order.
pub struct PerceptorModules {
    pub handles: Vec<ModuleHandle>,
    pub harness: MockHarness,
}

/// Initialize the event source and engine modules.
///
/// # Errors
///
/// - Invalid cluster or scanner section
/// - Kubernetes API unreachable (kube mode)
/// - Docker socket unreachable (`pull_images = true`)
pub async fn init(config: &PerceptorConfig) -> Result<PerceptorModules> {
    let engine_config = OrchestratorConfig::from_core(config);
    let cluster_config = ClusterClientConfig::from_core(&config.cluster);
    cluster_config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid cluster configuration: {}", e))?;
    let scanner_config = ScanBackendConfig::from_core(&config.scanner);
    scanner_config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid scanner configuration: {}", e))?;

    tracing::info!(
        cluster_mode = %cluster_config.mode,
        scanner_mode = %scanner_config.mode,
        "initializing perceptor"
    );

    let (senders, streams) = pod_event_channels(cluster_config.event_channel_capacity);
    let mut harness = MockHarness::default();
    let mut handles = Vec::with_capacity(2);

    match cluster_config.mode {
        ClusterMode::Kube => {
            let client = KubeClusterClient::connect(&cluster_config)
                .await
                .map_err(|e| anyhow::anyhow!("failed to connect to cluster: {}", e))?;
            let watcher = client.pod_watcher(senders);
            handles.push(ModuleHandle::new(
                "pod-watcher",
                true,
                Box::new(EventSourceModule::kube(watcher)),
            ));
            let engine = with_backend(
                engine_config,
                Arc::new(client),
                scanner_config,
                streams,
                &mut harness,
            )?;
            handles.push(engine);
        }
        ClusterMode::Mock => {
            let client = Arc::new(MockClusterClient::new());
            harness.cluster = Some(Arc::clone(&client));
            harness.events = Some(senders);
            let engine =
                with_backend(engine_config, client, scanner_config, streams, &mut harness)?;
            handles.push(engine);
        }
    }

    Ok(PerceptorModules { handles, harness })
}

fn with_backend<C: ClusterClient>(
    config: OrchestratorConfig,
    cluster: Arc<C>,
    scanner: ScanBackendConfig,
    events: PodEventStreams,
    harness: &mut MockHarness,
) -> Result<ModuleHandle> {
    match scanner.mode {
        BackendMode::Command => {
            let backend = CommandScanBackend::new(scanner)
                .map_err(|e| anyhow::anyhow!("failed to build scan backend: {}", e))?;
            build_engine(config, cluster, Arc::new(backend), events)
        }
        BackendMode::Mock => {
            let backend = Arc::new(MockScanBackend::new(scanner.mock));
            harness.backend = Some(Arc::clone(&backend));
            build_engine(config, cluster, backend, events)
        }
    }
}

fn build_engine<C: ClusterClient, S: ScanBackend>(
    config: OrchestratorConfig,
    cluster: Arc<C>,
    backend: Arc<S>,
    events: PodEventStreams,
) -> Result<ModuleHandle> {
    let (perceptor, _) = PerceptorBuilder::new()
        .config(config)
        .cluster(cluster)
        .backend(backend)
        .events(events)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build perceptor: {}", e))?;
    Ok(ModuleHandle::new("perceptor", true, Box::new(perceptor)))
}
