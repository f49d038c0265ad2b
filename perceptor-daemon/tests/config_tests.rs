//! Configuration loading as the daemon sees it: file, environment
//! overrides, validation.

use std::env;

use perceptor_core::config::PerceptorConfig;
use perceptor_daemon::orchestrator::Orchestrator;
use serial_test::serial;
use tempfile::TempDir;

const MOCK_TOML: &str = r#"
[general]
log_level = "debug"
log_format = "pretty"

[cluster]
mode = "mock"
namespace = "apps"

[scanner]
mode = "mock"
mock_polls_to_complete = 3
mock_vulnerabilities = 4

[engine]
queue_capacity = 50
overflow_policy = "drop_oldest"
scan_concurrency = 3
poll_interval_secs = 5
"#;

fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("perceptor.toml");
    std::fs::write(&path, content).expect("should write config");
    (dir, path)
}

#[tokio::test]
#[serial]
async fn test_load_mock_config_from_file() {
    // Given
    let (_dir, path) = write_config(MOCK_TOML);

    // When
    let config = PerceptorConfig::load(&path).await.expect("should load");

    // Then
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.cluster.namespace, "apps");
    assert_eq!(config.scanner.mock_polls_to_complete, 3);
    assert_eq!(config.engine.overflow_policy, "drop_oldest");
    assert_eq!(config.engine.scan_concurrency, 3);
    // 지정하지 않은 값은 기본값
    assert_eq!(config.engine.max_result_errors, 5);
    assert!(!config.metrics.enabled);
}

#[tokio::test]
#[serial]
async fn test_orchestrator_builds_from_file() {
    let (_dir, path) = write_config(MOCK_TOML);

    let orchestrator = Orchestrator::build(&path).await.expect("should build");

    assert_eq!(orchestrator.module_names(), ["perceptor"]);
    assert_eq!(orchestrator.config().engine.queue_capacity, 50);
    assert!(orchestrator.harness().cluster.is_some());
}

#[tokio::test]
#[serial]
async fn test_env_override_switches_scanner_mode() {
    // Given: file asks for the command backend without commands
    let (_dir, path) = write_config(
        r#"
[cluster]
mode = "mock"

[scanner]
mode = "command"
scan_command = ""
"#,
    );
    // SAFETY: serial test, variable removed below
    unsafe {
        env::set_var("PERCEPTOR_SCANNER_MODE", "mock");
    }

    // When
    let result = Orchestrator::build(&path).await;

    // SAFETY: serial test cleanup
    unsafe {
        env::remove_var("PERCEPTOR_SCANNER_MODE");
    }

    // Then
    let orchestrator = result.expect("env override should make config valid");
    assert_eq!(orchestrator.config().scanner.mode, "mock");
    assert!(orchestrator.harness().backend.is_some());
}

#[tokio::test]
#[serial]
async fn test_invalid_env_number_keeps_file_value() {
    let (_dir, path) = write_config(MOCK_TOML);
    // SAFETY: serial test, variable removed below
    unsafe {
        env::set_var("PERCEPTOR_ENGINE_QUEUE_CAPACITY", "lots");
    }

    let config = PerceptorConfig::load(&path).await;

    // SAFETY: serial test cleanup
    unsafe {
        env::remove_var("PERCEPTOR_ENGINE_QUEUE_CAPACITY");
    }
    assert_eq!(config.expect("should load").engine.queue_capacity, 50);
}

#[tokio::test]
#[serial]
async fn test_unknown_cluster_mode_fails_validation() {
    let (_dir, path) = write_config("[cluster]\nmode = \"nomad\"\n");

    let err = PerceptorConfig::load(&path).await.unwrap_err();

    assert!(err.to_string().contains("cluster.mode"), "got: {err}");
}
