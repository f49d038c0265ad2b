//! 명령 기반 스캔 백엔드 통합 테스트
//!
//! `sh` 스크립트로 스캔 클라이언트와 조회 스크립트를 흉내 냅니다.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use perceptor_core::types::{ImageRef, ScanCounts};
use perceptor_scanner::{
    BackendMode, CommandScanBackend, ImagePullError, ImagePullErrorKind, ImagePullStats,
    ImagePuller, ScanBackend, ScanBackendConfig, ScanBackendConfigBuilder, ScanBackendError,
    ScanErrorKind, ScanJob, is_project_done,
};

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_owned(), script.to_owned()]
}

fn config(scan_script: &str, fetch_script: &str) -> ScanBackendConfig {
    ScanBackendConfigBuilder::new()
        .mode(BackendMode::Command)
        .scan_command("sh", sh(scan_script))
        .fetch_command("sh", sh(fetch_script))
        .build()
        .unwrap()
}

fn job() -> ScanJob {
    ScanJob::new("my-img:1.0-project-0", ImageRef::from("img:1.0"))
}

/// tarball 대신 작은 파일을 만드는 추출기
struct FilePuller {
    dir: PathBuf,
    fail: bool,
}

impl ImagePuller for FilePuller {
    async fn pull(&self, image: &ImageRef) -> Result<ImagePullStats, ImagePullError> {
        if self.fail {
            return Err(ImagePullError::new(
                image.as_str(),
                ImagePullErrorKind::CreateImage,
                "registry unreachable",
            ));
        }
        let tar_path = self.dir.join("image.tar");
        tokio::fs::write(&tar_path, b"tar").await.unwrap();
        Ok(ImagePullStats {
            tar_path,
            create_duration: Duration::ZERO,
            save_duration: Duration::ZERO,
            tar_size_bytes: 3,
        })
    }
}

#[tokio::test]
async fn scan_passes_project_and_image_to_command() {
    // Given: 인자를 파일에 기록하는 스캔 스크립트
    let dir = tempfile::tempdir().unwrap();
    let record = dir.path().join("args");
    let script = format!("echo \"{{project}} {{image}}\" > {}", record.display());
    let backend = CommandScanBackend::new(config(&script, "true")).unwrap();

    // When
    backend.scan(&job()).await.unwrap();

    // Then
    let recorded = std::fs::read_to_string(&record).unwrap();
    assert_eq!(recorded.trim(), "my-img:1.0-project-0 img:1.0");
}

#[tokio::test]
async fn failing_scanner_reports_kind_and_stderr() {
    let backend =
        CommandScanBackend::new(config("echo 'license expired' >&2; exit 3", "true")).unwrap();

    let err = backend.scan(&job()).await.unwrap_err();

    match err {
        ScanBackendError::Scan { kind, reason, .. } => {
            assert_eq!(kind, ScanErrorKind::FailedToRunScanner);
            assert!(reason.contains("license expired"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn missing_scanner_binary_is_scan_error() {
    let config = ScanBackendConfigBuilder::new()
        .scan_command("/nonexistent/scan.cli.sh", vec![])
        .fetch_command("true", vec![])
        .build()
        .unwrap();
    let backend = CommandScanBackend::new(config).unwrap();

    assert!(matches!(
        backend.scan(&job()).await,
        Err(ScanBackendError::Scan {
            kind: ScanErrorKind::FailedToRunScanner,
            ..
        })
    ));
}

#[tokio::test]
async fn pulled_tar_is_passed_and_removed() {
    // Given: 추출기 + tar 경로를 기록하는 스캔 스크립트
    let dir = tempfile::tempdir().unwrap();
    let record = dir.path().join("tar-arg");
    let script = format!("test -f {{tar}} && echo {{tar}} > {}", record.display());
    let puller = FilePuller {
        dir: dir.path().to_path_buf(),
        fail: false,
    };
    let backend = CommandScanBackend::with_puller(config(&script, "true"), puller).unwrap();

    // When
    backend.scan(&job()).await.unwrap();

    // Then: 스캔 시점에 파일이 있었고, 이후 삭제됨
    let tar_arg = std::fs::read_to_string(&record).unwrap();
    assert!(tar_arg.trim().ends_with("image.tar"));
    assert!(!Path::new(tar_arg.trim()).exists());
}

#[tokio::test]
async fn abandoned_scan_still_removes_tar() {
    // Given: 오래 걸리는 스캔 클라이언트
    let dir = tempfile::tempdir().unwrap();
    let puller = FilePuller {
        dir: dir.path().to_path_buf(),
        fail: false,
    };
    let backend = CommandScanBackend::with_puller(config("sleep 5", "true"), puller).unwrap();

    // When: 호출 측 타임아웃으로 스캔 future가 버려짐
    let result = tokio::time::timeout(Duration::from_millis(500), backend.scan(&job())).await;

    // Then
    assert!(result.is_err());
    assert!(!dir.path().join("image.tar").exists());
}

#[tokio::test]
async fn pull_failure_skips_scanner() {
    let dir = tempfile::tempdir().unwrap();
    let record = dir.path().join("ran");
    let script = format!("touch {}", record.display());
    let puller = FilePuller {
        dir: dir.path().to_path_buf(),
        fail: true,
    };
    let backend = CommandScanBackend::with_puller(config(&script, "true"), puller).unwrap();

    let err = backend.scan(&job()).await.unwrap_err();

    assert!(matches!(
        err,
        ScanBackendError::Scan {
            kind: ScanErrorKind::UnableToPullImage,
            ..
        }
    ));
    assert!(!record.exists());
}

#[tokio::test]
async fn fetch_parses_project_json() {
    // Given: 프로젝트 이름별 JSON 파일을 출력하는 조회 스크립트
    let dir = tempfile::tempdir().unwrap();
    let json = r#"{"Name":"my-img:1.0-project-0","Versions":[{"CodeLocations":[{"ScanSummaries":[{"Status":"COMPLETE"}]}],"RiskProfile":{"Categories":{"VULNERABILITY":{"HIGH":5}}},"PolicyStatus":{"ComponentVersionStatusCounts":{"IN_VIOLATION":2}}}]}"#;
    std::fs::write(dir.path().join("my-img:1.0-project-0.json"), json).unwrap();
    let fetch = format!("cat '{}/{{project}}.json' 2>/dev/null || true", dir.path().display());
    let backend = CommandScanBackend::new(config("true", &fetch)).unwrap();

    // When
    let found = backend.fetch_project("my-img:1.0-project-0").await.unwrap();
    let missing = backend.fetch_project("other").await.unwrap();

    // Then
    let project = found.unwrap();
    assert!(is_project_done(&project));
    assert_eq!(
        project.scan_results().unwrap().counts,
        ScanCounts {
            policy_violation_count: 2,
            vulnerability_count: 5
        }
    );
    assert!(missing.is_none());
}

#[tokio::test]
async fn fetch_errors_are_distinguished() {
    let failing = CommandScanBackend::new(config("true", "exit 1")).unwrap();
    assert!(matches!(
        failing.fetch_project("p").await,
        Err(ScanBackendError::Fetch { .. })
    ));

    let garbage = CommandScanBackend::new(config("true", "echo '{not json'")).unwrap();
    assert!(matches!(
        garbage.fetch_project("p").await,
        Err(ScanBackendError::Decode { .. })
    ));
}
