//! Orchestrator build/start/stop tests in mock modes.

use perceptor_core::config::PerceptorConfig;
use perceptor_core::pipeline::HealthStatus;
use perceptor_daemon::orchestrator::Orchestrator;

fn mock_config() -> PerceptorConfig {
    let mut config = PerceptorConfig::default();
    config.cluster.mode = "mock".to_owned();
    config.scanner.mode = "mock".to_owned();
    config
}

#[tokio::test]
async fn test_orchestrator_build_mock_modes() {
    let orchestrator = Orchestrator::build_from_config(mock_config())
        .await
        .expect("mock config should build");

    assert_eq!(orchestrator.module_names(), ["perceptor"]);
    assert!(!orchestrator.is_running());
    let harness = orchestrator.harness();
    assert!(harness.cluster.is_some());
    assert!(harness.events.is_some());
    assert!(harness.backend.is_some());
}

#[tokio::test]
async fn test_orchestrator_health_before_start_is_unhealthy() {
    let orchestrator = Orchestrator::build_from_config(mock_config()).await.unwrap();

    let health = orchestrator.health().await;

    assert_eq!(
        health.status,
        HealthStatus::Unhealthy("perceptor: not started".to_owned())
    );
}

#[tokio::test]
async fn test_orchestrator_start_then_shutdown() {
    // Given
    let mut orchestrator = Orchestrator::build_from_config(mock_config()).await.unwrap();

    // When
    orchestrator.start().await.expect("should start");

    // Then
    assert!(orchestrator.is_running());
    assert!(orchestrator.health().await.status.is_healthy());
    orchestrator.shutdown().await.expect("should stop cleanly");
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn test_orchestrator_rejects_invalid_config() {
    let mut config = mock_config();
    config.general.log_level = "verbose".to_owned();

    let result = Orchestrator::build_from_config(config).await;

    let err = result.err().expect("invalid log level should fail");
    assert!(err.to_string().contains("general.log_level"), "got: {err}");
}

#[tokio::test]
async fn test_orchestrator_shutdown_without_start_fails() {
    let mut orchestrator = Orchestrator::build_from_config(mock_config()).await.unwrap();

    assert!(orchestrator.shutdown().await.is_err());
}
