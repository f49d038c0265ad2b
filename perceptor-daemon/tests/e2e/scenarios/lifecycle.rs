//! Configuration file -> orchestrator -> health check -> shutdown.

use crate::helpers::config::*;

use perceptor_core::pipeline::HealthStatus;
use perceptor_daemon::orchestrator::Orchestrator;
use tempfile::TempDir;

/// perceptor.toml on disk -> build -> start -> Healthy -> shutdown.
#[tokio::test]
async fn test_e2e_config_file_to_healthy_daemon() {
    // Given
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("perceptor.toml");
    std::fs::write(&path, to_toml(&TestConfigBuilder::new().build())).unwrap();

    // When
    let mut orchestrator = Orchestrator::build(&path).await.expect("should build");
    orchestrator.start().await.expect("should start");
    let health = orchestrator.health().await;

    // Then
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.modules.len(), 1);
    assert_eq!(health.modules[0].name, "perceptor");

    orchestrator.shutdown().await.unwrap();
    let health = orchestrator.health().await;
    assert!(health.status.is_unhealthy());
    assert!(
        health.status.to_string().contains("perceptor"),
        "reason should name the module: {}",
        health.status
    );
}

/// The PID file exists while running and is removed on shutdown.
#[tokio::test]
async fn test_e2e_pid_file_follows_lifecycle() {
    let dir = TempDir::new().unwrap();
    let pid_path = dir.path().join("run").join("perceptor.pid");
    let config = TestConfigBuilder::new()
        .pid_file(pid_path.to_string_lossy())
        .build();
    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();

    orchestrator.start().await.unwrap();
    assert!(pid_path.exists());

    orchestrator.shutdown().await.unwrap();
    assert!(!pid_path.exists());
}

/// A second daemon on the same PID file refuses to start and leaves the
/// first one's PID file alone.
#[tokio::test]
async fn test_e2e_second_instance_is_refused() {
    let dir = TempDir::new().unwrap();
    let pid_path = dir.path().join("perceptor.pid");
    let config = TestConfigBuilder::new()
        .pid_file(pid_path.to_string_lossy())
        .build();

    let mut first = Orchestrator::build_from_config(config.clone()).await.unwrap();
    first.start().await.unwrap();
    let mut second = Orchestrator::build_from_config(config).await.unwrap();

    let err = second.start().await.expect_err("second start must fail");

    assert!(err.to_string().contains("already exists"), "got: {err}");
    assert!(!second.is_running());
    assert!(pid_path.exists());
    first.shutdown().await.unwrap();
}
