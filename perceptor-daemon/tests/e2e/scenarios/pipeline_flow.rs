//! Pod added -> image scanned -> pod annotated, through the whole daemon.

use crate::helpers::cluster::*;
use crate::helpers::config::TestConfigBuilder;

use perceptor_daemon::orchestrator::Orchestrator;

/// A single pod with one container ends up with the exact annotation blob,
/// and the backend sees the generated project name.
#[tokio::test(start_paused = true)]
async fn test_e2e_pod_is_scanned_and_annotated() {
    // Given
    let config = TestConfigBuilder::new().mock_counts(2, 5).build();
    let mut orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("mock config should build");
    orchestrator.start().await.expect("daemon should start");

    // When
    add_pod(&orchestrator, pod("p1", &["img:1.0"])).await;
    let blob = wait_for_blob(&orchestrator, "p1", &["img:1.0"]).await;

    // Then
    assert_eq!(
        blob,
        r#"{"ImageAnnotations":{"img:1.0":{"PolicyViolationCount":2,"VulnerabilityCount":5}}}"#
    );
    let backend = orchestrator.harness().backend.as_ref().expect("mock backend");
    let submitted = backend.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].project_name, "my-img:1.0-project-0");

    orchestrator.shutdown().await.expect("daemon should stop");
}

/// Two pods sharing an image trigger one scan and both get annotated.
#[tokio::test(start_paused = true)]
async fn test_e2e_shared_image_is_scanned_once() {
    let config = TestConfigBuilder::new()
        .mock_counts(0, 3)
        .polls_to_complete(3)
        .scan_concurrency(2)
        .build();
    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    orchestrator.start().await.unwrap();

    add_pod(&orchestrator, pod("p1", &["shared:1", "own:1"])).await;
    add_pod(&orchestrator, pod("p2", &["shared:1"])).await;
    wait_for_blob(&orchestrator, "p1", &["shared:1", "own:1"]).await;
    let p2 = wait_for_blob(&orchestrator, "p2", &["shared:1"]).await;

    assert!(!p2.contains("own:1"));
    let backend = orchestrator.harness().backend.as_ref().unwrap();
    let mut images: Vec<String> = backend
        .submitted()
        .iter()
        .map(|job| job.image.to_string())
        .collect();
    images.sort();
    assert_eq!(images, ["own:1", "shared:1"]);

    orchestrator.shutdown().await.unwrap();
}
