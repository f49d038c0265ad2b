//! Integration tests for `perceptor annotations` against the in-memory cluster.

use std::collections::BTreeMap;

use perceptor_cli::cli::{AnnotationsAction, AnnotationsArgs, OutputFormat};
use perceptor_cli::commands::annotations;
use perceptor_cli::error::CliError;
use perceptor_cli::output::OutputWriter;
use perceptor_cluster::{ClusterClient, MockClusterClient};
use perceptor_core::annotations::{ANNOTATION_KEY, ImageAnnotation};
use perceptor_core::types::{Container, ImageRef, Pod, PodKey};

fn cluster_with_pod() -> MockClusterClient {
    MockClusterClient::new().with_pods([Pod {
        namespace: "apps".to_owned(),
        name: "web".to_owned(),
        uid: "uid-web".to_owned(),
        containers: vec![Container::new("web", "nginx:1.25")],
    }])
}

fn web() -> PodKey {
    PodKey::new("apps", "web")
}

#[tokio::test]
async fn test_get_without_annotation_is_empty() {
    // Given
    let cluster = cluster_with_pod();

    // When
    let report = annotations::get(&cluster, &web()).await.unwrap();

    // Then
    assert_eq!(report.pod, "apps/web");
    assert!(report.images.is_empty());
}

#[tokio::test]
async fn test_set_merges_without_touching_other_entries() {
    // Given: 다른 이미지 결과와 무관한 키가 이미 있는 파드
    let cluster = cluster_with_pod();
    let existing = BTreeMap::from([
        (
            ANNOTATION_KEY.to_owned(),
            r#"{"ImageAnnotations":{"redis:7":{"PolicyViolationCount":1,"VulnerabilityCount":1}}}"#
                .to_owned(),
        ),
        ("team".to_owned(), "payments".to_owned()),
    ]);
    cluster.set_annotations(&web(), existing).await.unwrap();

    // When
    let report = annotations::set(
        &cluster,
        &web(),
        &ImageRef::from("nginx:1.25"),
        ImageAnnotation {
            policy_violation_count: 0,
            vulnerability_count: 4,
        },
    )
    .await
    .unwrap();

    // Then
    assert_eq!(report.images.len(), 2);
    let stored = cluster.annotations(&web()).unwrap();
    assert_eq!(stored["team"], "payments");
    assert_eq!(
        stored[ANNOTATION_KEY],
        r#"{"ImageAnnotations":{"nginx:1.25":{"PolicyViolationCount":0,"VulnerabilityCount":4},"redis:7":{"PolicyViolationCount":1,"VulnerabilityCount":1}}}"#
    );
}

#[tokio::test]
async fn test_set_replaces_malformed_blob() {
    let cluster = cluster_with_pod();
    let broken = BTreeMap::from([(ANNOTATION_KEY.to_owned(), "{not json".to_owned())]);
    cluster.set_annotations(&web(), broken).await.unwrap();

    annotations::set(
        &cluster,
        &web(),
        &ImageRef::from("nginx:1.25"),
        ImageAnnotation::default(),
    )
    .await
    .unwrap();

    let report = annotations::get(&cluster, &web()).await.unwrap();
    assert_eq!(report.images.len(), 1);
    assert_eq!(report.images[0].image, "nginx:1.25");
}

#[tokio::test]
async fn test_clear_removes_only_reserved_key() {
    // Given
    let cluster = cluster_with_pod();
    let existing = BTreeMap::from([
        (ANNOTATION_KEY.to_owned(), r#"{"ImageAnnotations":{}}"#.to_owned()),
        ("team".to_owned(), "payments".to_owned()),
    ]);
    cluster.set_annotations(&web(), existing).await.unwrap();

    // When
    let report = annotations::clear(&cluster, &web()).await.unwrap();

    // Then
    assert!(report.cleared);
    let stored = cluster.annotations(&web()).unwrap();
    assert!(!stored.contains_key(ANNOTATION_KEY));
    assert_eq!(stored["team"], "payments");
}

#[tokio::test]
async fn test_missing_pod_is_cluster_error() {
    let cluster = MockClusterClient::new();

    let err = annotations::get(&cluster, &web()).await.unwrap_err();

    assert!(matches!(err, CliError::Cluster(_)));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_execute_get_renders_json() {
    // Given
    let cluster = cluster_with_pod();
    annotations::set(
        &cluster,
        &web(),
        &ImageRef::from("nginx:1.25"),
        ImageAnnotation {
            policy_violation_count: 2,
            vulnerability_count: 5,
        },
    )
    .await
    .unwrap();
    let writer = OutputWriter::new(OutputFormat::Json);
    let mut out = Vec::new();

    // When
    annotations::execute(
        AnnotationsArgs {
            action: AnnotationsAction::Get {
                namespace: "apps".to_owned(),
                pod: "web".to_owned(),
            },
        },
        &cluster,
        &writer,
        &mut out,
    )
    .await
    .unwrap();

    // Then
    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json["pod"], "apps/web");
    assert_eq!(json["images"][0]["image"], "nginx:1.25");
    assert_eq!(json["images"][0]["policy_violations"], 2);
    assert_eq!(json["images"][0]["vulnerabilities"], 5);
}
