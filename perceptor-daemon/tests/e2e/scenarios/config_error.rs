//! Invalid configuration never produces a running daemon.

use crate::helpers::config::TestConfigBuilder;

use perceptor_daemon::orchestrator::Orchestrator;
use tempfile::TempDir;

#[tokio::test]
async fn test_e2e_validation_error_names_field() {
    let mut config = TestConfigBuilder::new().build();
    config.engine.scan_concurrency = 8;

    let err = Orchestrator::build_from_config(config)
        .await
        .err()
        .expect("build should fail");

    let message = err.to_string();
    assert!(message.contains("validation"), "got: {message}");
    assert!(message.contains("scan_concurrency"), "got: {message}");
}

#[tokio::test]
async fn test_e2e_malformed_toml_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("perceptor.toml");
    std::fs::write(&path, "[engine\nqueue_capacity = ").unwrap();

    let result = Orchestrator::build(&path).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_e2e_missing_file_is_rejected() {
    let dir = TempDir::new().unwrap();

    let result = Orchestrator::build(&dir.path().join("absent.toml")).await;

    let err = result.err().expect("missing file should fail");
    assert!(err.to_string().contains("failed to load config"), "got: {err}");
}

#[tokio::test]
async fn test_e2e_command_mode_without_commands_is_rejected() {
    let mut config = TestConfigBuilder::new().build();
    config.scanner.mode = "command".to_owned();
    config.scanner.scan_command = String::new();

    assert!(Orchestrator::build_from_config(config).await.is_err());
}
