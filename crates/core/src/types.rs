//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 클러스터의 파드/컨테이너 스냅샷과 이미지 스캔 상태를 정의합니다.
//! 캐시, 클러스터 연동, 스캔 백엔드가 모두 이 타입으로 데이터를 교환합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 컨테이너 이미지 참조 (`name:tag` 또는 digest)
///
/// 캐시에서 이미지를 중복 제거하는 키로 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// 참조 문자열로 이미지 참조를 생성합니다.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// 참조 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ImageRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 파드 식별자 (`namespace:name`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PodKey {
    /// 네임스페이스
    pub namespace: String,
    /// 파드 이름
    pub name: String,
}

impl PodKey {
    /// 네임스페이스와 이름으로 파드 키를 생성합니다.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// 파드에 포함된 컨테이너 (이름, 이미지)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// 컨테이너 이름
    pub name: String,
    /// 이미지 참조
    pub image: ImageRef,
}

impl Container {
    pub fn new(name: impl Into<String>, image: impl Into<ImageRef>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }
}

/// 파드 스냅샷
///
/// add 이벤트에서 생성되고, update 이벤트에서 통째로 교체되며,
/// delete 이벤트에서 제거됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    /// 네임스페이스
    pub namespace: String,
    /// 파드 이름
    pub name: String,
    /// 클러스터가 부여한 고유 ID
    pub uid: String,
    /// 컨테이너 목록 (순서 유지)
    pub containers: Vec<Container>,
}

impl Pod {
    /// 파드 키를 반환합니다.
    pub fn key(&self) -> PodKey {
        PodKey::new(&self.namespace, &self.name)
    }

    /// 파드가 참조하는 이미지를 중복 없이 반환합니다 (등장 순서 유지).
    pub fn images(&self) -> Vec<ImageRef> {
        let mut images: Vec<ImageRef> = Vec::with_capacity(self.containers.len());
        for container in &self.containers {
            if !images.contains(&container.image) {
                images.push(container.image.clone());
            }
        }
        images
    }
}

/// 이미지 스캔 상태
///
/// 정상 경로에서는 앞으로만 진행합니다:
/// `NotScanned → ScanningInProgress → AnnotatingPods → Scanned`.
/// `Failed`는 재시도 한도를 넘긴 이미지의 종료 상태입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanStatus {
    NotScanned,
    ScanningInProgress,
    AnnotatingPods,
    Scanned,
    Failed,
}

impl ScanStatus {
    /// 모든 상태 (메트릭 게이지 순회용)
    pub const ALL: [ScanStatus; 5] = [
        ScanStatus::NotScanned,
        ScanStatus::ScanningInProgress,
        ScanStatus::AnnotatingPods,
        ScanStatus::Scanned,
        ScanStatus::Failed,
    ];

    /// `next`로의 전환이 허용되는지 확인합니다.
    pub fn can_transition_to(self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (Self::NotScanned, Self::ScanningInProgress)
                | (Self::ScanningInProgress, Self::AnnotatingPods)
                | (Self::ScanningInProgress, Self::Failed)
                | (Self::AnnotatingPods, Self::Scanned)
        )
    }

    /// 더 이상 전환이 없는 상태인지 여부
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Scanned | Self::Failed)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotScanned => write!(f, "NotScanned"),
            Self::ScanningInProgress => write!(f, "ScanningInProgress"),
            Self::AnnotatingPods => write!(f, "AnnotatingPods"),
            Self::Scanned => write!(f, "Scanned"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// 이미지 단위 스캔 결과 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounts {
    /// 정책 위반 수
    pub policy_violation_count: u32,
    /// 취약점 수 (HIGH 등급)
    pub vulnerability_count: u32,
}

/// 심각도 레벨
///
/// 스캔 백엔드가 보고하는 취약점 등급입니다.
/// `Ord` 구현으로 비교가 가능합니다 (`Unknown < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 등급 미상
    #[default]
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" | "med" => Self::Medium,
            "high" => Self::High,
            "critical" | "crit" => Self::Critical,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 이미지에서 발견된 취약점
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// 취약점 식별자 (예: CVE-2024-1234)
    pub name: String,
    /// 심각도
    pub severity: Severity,
}

impl fmt::Display for Vulnerability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(containers: &[(&str, &str)]) -> Pod {
        Pod {
            namespace: "ns".to_owned(),
            name: "p1".to_owned(),
            uid: "uid-1".to_owned(),
            containers: containers
                .iter()
                .map(|(name, image)| Container::new(*name, *image))
                .collect(),
        }
    }

    #[test]
    fn pod_key_display_is_namespace_colon_name() {
        assert_eq!(PodKey::new("ns", "p1").to_string(), "ns:p1");
    }

    #[test]
    fn pod_images_are_deduplicated_in_order() {
        let p = pod(&[("c1", "img:1.0"), ("c2", "sidecar:2"), ("c3", "img:1.0")]);
        assert_eq!(
            p.images(),
            vec![ImageRef::from("img:1.0"), ImageRef::from("sidecar:2")]
        );
    }

    #[test]
    fn scan_status_moves_forward_only() {
        assert!(ScanStatus::NotScanned.can_transition_to(ScanStatus::ScanningInProgress));
        assert!(ScanStatus::ScanningInProgress.can_transition_to(ScanStatus::AnnotatingPods));
        assert!(ScanStatus::AnnotatingPods.can_transition_to(ScanStatus::Scanned));
        assert!(ScanStatus::ScanningInProgress.can_transition_to(ScanStatus::Failed));

        assert!(!ScanStatus::ScanningInProgress.can_transition_to(ScanStatus::NotScanned));
        assert!(!ScanStatus::Scanned.can_transition_to(ScanStatus::NotScanned));
        assert!(!ScanStatus::NotScanned.can_transition_to(ScanStatus::Scanned));
        assert!(!ScanStatus::Failed.can_transition_to(ScanStatus::ScanningInProgress));
    }

    #[test]
    fn scan_status_terminal_states() {
        assert!(ScanStatus::Scanned.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
        assert!(!ScanStatus::AnnotatingPods.is_terminal());
    }

    #[test]
    fn scan_status_display() {
        let names: Vec<String> = ScanStatus::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "NotScanned",
                "ScanningInProgress",
                "AnnotatingPods",
                "Scanned",
                "Failed"
            ]
        );
    }

    #[test]
    fn severity_from_str_loose() {
        assert_eq!(Severity::from_str_loose("HIGH"), Severity::High);
        assert_eq!(Severity::from_str_loose("crit"), Severity::Critical);
        assert_eq!(Severity::from_str_loose("whatever"), Severity::Unknown);
    }

    #[test]
    fn image_ref_serializes_as_plain_string() {
        let json = serde_json::to_string(&ImageRef::from("img:1.0")).unwrap();
        assert_eq!(json, "\"img:1.0\"");
    }
}
