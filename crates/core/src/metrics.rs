//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `perceptor_`
//! - 컴포넌트명: `cluster_`, `scanner_`, `engine_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(perceptor_core::metrics::ENGINE_SCANS_SUBMITTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 파드 이벤트 종류 레이블 키 (add, update, delete)
pub const LABEL_KIND: &str = "kind";

/// 결과 레이블 키 (poll: done, not_done, not_found, error, malformed)
pub const LABEL_OUTCOME: &str = "outcome";

/// 이미지 상태 레이블 키 (ScanStatus 이름)
pub const LABEL_STATUS: &str = "status";

/// 사유 레이블 키 (queue drop: rejected, dropped_oldest)
pub const LABEL_REASON: &str = "reason";

// ─── Cluster 메트릭 ────────────────────────────────────────────────

/// Cluster: 수신한 파드 이벤트 수 (counter, label: kind)
pub const CLUSTER_POD_EVENTS_TOTAL: &str = "perceptor_cluster_pod_events_total";

/// Cluster: watch 스트림 오류 수 (counter)
pub const CLUSTER_WATCH_ERRORS_TOTAL: &str = "perceptor_cluster_watch_errors_total";

// ─── Scanner 메트릭 ────────────────────────────────────────────────

/// Scanner: 이미지 pull 소요 시간 (histogram, 초)
pub const SCANNER_IMAGE_PULL_DURATION_SECONDS: &str =
    "perceptor_scanner_image_pull_duration_seconds";

/// Scanner: 스캔 명령 실행 시간 (histogram, 초)
pub const SCANNER_SCAN_DURATION_SECONDS: &str = "perceptor_scanner_scan_duration_seconds";

// ─── Engine 메트릭 ─────────────────────────────────────────────────

/// Engine: 새로 발견된 이미지 수 (counter)
pub const ENGINE_IMAGES_DISCOVERED_TOTAL: &str = "perceptor_engine_images_discovered_total";

/// Engine: 작업 큐 길이 (gauge)
pub const ENGINE_QUEUE_DEPTH: &str = "perceptor_engine_queue_depth";

/// Engine: 큐 용량 초과로 밀려난 이미지 수 (counter, label: reason)
pub const ENGINE_QUEUE_OVERFLOW_TOTAL: &str = "perceptor_engine_queue_overflow_total";

/// Engine: 제출된 스캔 수 (counter)
pub const ENGINE_SCANS_SUBMITTED_TOTAL: &str = "perceptor_engine_scans_submitted_total";

/// Engine: 제출 실패한 스캔 수 (counter)
pub const ENGINE_SCANS_FAILED_TOTAL: &str = "perceptor_engine_scans_failed_total";

/// Engine: 결과 조회 수 (counter, label: outcome)
pub const ENGINE_POLLS_TOTAL: &str = "perceptor_engine_polls_total";

/// Engine: 병합된 스캔 결과 수 (counter)
pub const ENGINE_RESULTS_MERGED_TOTAL: &str = "perceptor_engine_results_merged_total";

/// Engine: Failed 상태로 전환된 이미지 수 (counter)
pub const ENGINE_IMAGES_FAILED_TOTAL: &str = "perceptor_engine_images_failed_total";

/// Engine: 기록된 파드 어노테이션 수 (counter)
pub const ENGINE_ANNOTATIONS_WRITTEN_TOTAL: &str = "perceptor_engine_annotations_written_total";

/// Engine: 실패한 파드 어노테이션 기록 수 (counter)
pub const ENGINE_ANNOTATION_FAILURES_TOTAL: &str =
    "perceptor_engine_annotation_failures_total";

/// Engine: 재시도 한도를 넘어 포기한 어노테이션 쓰기 (counter)
pub const ENGINE_ANNOTATIONS_ABANDONED_TOTAL: &str =
    "perceptor_engine_annotations_abandoned_total";

/// Engine: 상태별 이미지 수 (gauge, label: status)
pub const ENGINE_IMAGES: &str = "perceptor_engine_images";

/// Engine: 추적 중인 파드 수 (gauge)
pub const ENGINE_PODS: &str = "perceptor_engine_pods";

/// Engine: 어떤 파드도 참조하지 않는 이미지 수 (gauge)
pub const ENGINE_ORPHAN_IMAGES: &str = "perceptor_engine_orphan_images";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "perceptor_daemon_uptime_seconds";

/// Daemon: 등록된 모듈 수 (gauge)
pub const DAEMON_MODULES_REGISTERED: &str = "perceptor_daemon_modules_registered";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version, rust_version)
pub const DAEMON_BUILD_INFO: &str = "perceptor_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 이미지 pull/스캔 소요 시간 히스토그램 버킷 (초)
///
/// 1s ~ 30m 범위 (대형 이미지는 수십 분까지 걸림)
pub const SCAN_DURATION_BUCKETS: [f64; 10] = [
    1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
/// 일반적으로 `perceptor-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Cluster
    describe_counter!(
        CLUSTER_POD_EVENTS_TOTAL,
        "Pod events received from the cluster, by kind"
    );
    describe_counter!(
        CLUSTER_WATCH_ERRORS_TOTAL,
        "Errors reported by the pod watch stream"
    );

    // Scanner
    describe_histogram!(
        SCANNER_IMAGE_PULL_DURATION_SECONDS,
        "Time to pull and export an image tarball in seconds"
    );
    describe_histogram!(
        SCANNER_SCAN_DURATION_SECONDS,
        "Time spent running the scan command in seconds"
    );

    // Engine
    describe_counter!(
        ENGINE_IMAGES_DISCOVERED_TOTAL,
        "Images seen for the first time"
    );
    describe_gauge!(ENGINE_QUEUE_DEPTH, "Images waiting in the work queue");
    describe_counter!(
        ENGINE_QUEUE_OVERFLOW_TOTAL,
        "Images pushed out of a full work queue, by reason"
    );
    describe_counter!(
        ENGINE_SCANS_SUBMITTED_TOTAL,
        "Scans accepted by the scan backend"
    );
    describe_counter!(
        ENGINE_SCANS_FAILED_TOTAL,
        "Scan submissions that failed or timed out"
    );
    describe_counter!(
        ENGINE_POLLS_TOTAL,
        "Project status fetches, by outcome"
    );
    describe_counter!(
        ENGINE_RESULTS_MERGED_TOTAL,
        "Completed scan results merged into the cache"
    );
    describe_counter!(
        ENGINE_IMAGES_FAILED_TOTAL,
        "Images moved to the terminal Failed status"
    );
    describe_counter!(
        ENGINE_ANNOTATIONS_WRITTEN_TOTAL,
        "Pod annotation writes that succeeded"
    );
    describe_counter!(
        ENGINE_ANNOTATION_FAILURES_TOTAL,
        "Pod annotation writes that failed"
    );
    describe_counter!(
        ENGINE_ANNOTATIONS_ABANDONED_TOTAL,
        "Images whose annotation retries were given up"
    );
    describe_gauge!(ENGINE_IMAGES, "Known images, by scan status");
    describe_gauge!(ENGINE_PODS, "Pods currently tracked");
    describe_gauge!(
        ENGINE_ORPHAN_IMAGES,
        "Known images no tracked pod references"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Perceptor daemon uptime in seconds");
    describe_gauge!(
        DAEMON_MODULES_REGISTERED,
        "Number of modules registered in the daemon"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version labels)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        CLUSTER_POD_EVENTS_TOTAL,
        CLUSTER_WATCH_ERRORS_TOTAL,
        SCANNER_IMAGE_PULL_DURATION_SECONDS,
        SCANNER_SCAN_DURATION_SECONDS,
        ENGINE_IMAGES_DISCOVERED_TOTAL,
        ENGINE_QUEUE_DEPTH,
        ENGINE_QUEUE_OVERFLOW_TOTAL,
        ENGINE_SCANS_SUBMITTED_TOTAL,
        ENGINE_SCANS_FAILED_TOTAL,
        ENGINE_POLLS_TOTAL,
        ENGINE_RESULTS_MERGED_TOTAL,
        ENGINE_IMAGES_FAILED_TOTAL,
        ENGINE_ANNOTATIONS_WRITTEN_TOTAL,
        ENGINE_ANNOTATION_FAILURES_TOTAL,
        ENGINE_ANNOTATIONS_ABANDONED_TOTAL,
        ENGINE_IMAGES,
        ENGINE_PODS,
        ENGINE_ORPHAN_IMAGES,
        DAEMON_UPTIME_SECONDS,
        DAEMON_MODULES_REGISTERED,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_perceptor_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("perceptor_"),
                "Metric '{name}' does not start with 'perceptor_' prefix"
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES {
            if name.contains("_events_") || name.contains("_errors_") {
                assert!(name.ends_with("_total"), "counter '{name}' must end with _total");
            }
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 없어도 panic하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_KIND, LABEL_OUTCOME, LABEL_STATUS, LABEL_REASON] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn scan_duration_buckets_are_sorted() {
        let buckets = SCAN_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(
                buckets[i] > buckets[i - 1],
                "Bucket values must be in ascending order"
            );
        }
    }
}
