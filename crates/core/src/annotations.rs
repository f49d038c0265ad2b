//! 파드 어노테이션 스키마: 스캔 결과의 영속 표현
//!
//! 파드마다 예약 키([`ANNOTATION_KEY`]) 하나에 [`BlackDuckAnnotations`] 전체를
//! JSON 한 덩어리로 저장합니다. 다른 컨트롤러의 어노테이션과 충돌하지 않도록
//! 이 키 외에는 건드리지 않습니다.
//!
//! ```text
//! {
//!   "ImageAnnotations": { "<image-ref>": {"PolicyViolationCount": 2, "VulnerabilityCount": 5} },
//!   "KeyVals": { ... }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{ImageRef, ScanCounts};

/// 스캔 결과가 저장되는 예약 어노테이션 키
pub const ANNOTATION_KEY: &str = "BlackDuck";

/// 이미지 하나에 대한 어노테이션 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnnotation {
    #[serde(rename = "PolicyViolationCount", default)]
    pub policy_violation_count: u32,
    #[serde(rename = "VulnerabilityCount", default)]
    pub vulnerability_count: u32,
}

impl From<ScanCounts> for ImageAnnotation {
    fn from(counts: ScanCounts) -> Self {
        Self {
            policy_violation_count: counts.policy_violation_count,
            vulnerability_count: counts.vulnerability_count,
        }
    }
}

/// 파드에 기록되는 전체 어노테이션 구조
///
/// 두 맵 모두 누락 시 빈 맵으로 복원됩니다.
/// `KeyVals`는 비어 있으면 직렬화에서 생략됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackDuckAnnotations {
    #[serde(rename = "ImageAnnotations", default)]
    pub image_annotations: BTreeMap<String, ImageAnnotation>,
    #[serde(
        rename = "KeyVals",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub key_vals: BTreeMap<String, String>,
}

impl BlackDuckAnnotations {
    /// JSON blob을 파싱합니다.
    pub fn from_json(blob: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(blob)
    }

    /// JSON blob으로 직렬화합니다.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 파드의 전체 어노테이션 맵에서 예약 키를 읽어 복원합니다.
    ///
    /// 키가 없으면 빈 구조를, JSON이 깨져 있으면 경고를 남기고 빈 구조를 반환합니다.
    /// 읽기 자체는 실패하지 않습니다.
    pub fn from_pod_annotations(annotations: &BTreeMap<String, String>) -> Self {
        let Some(blob) = annotations.get(ANNOTATION_KEY) else {
            return Self::default();
        };
        match Self::from_json(blob) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    key = ANNOTATION_KEY,
                    error = %e,
                    "malformed annotation blob, treating as empty"
                );
                Self::default()
            }
        }
    }

    /// 이미지 결과를 병합합니다. 다른 이미지의 항목은 그대로 유지됩니다.
    pub fn merge_image(&mut self, image: &ImageRef, annotation: ImageAnnotation) {
        self.image_annotations
            .insert(image.as_str().to_owned(), annotation);
    }

    /// 특정 이미지의 결과를 조회합니다.
    pub fn image(&self, image: &ImageRef) -> Option<&ImageAnnotation> {
        self.image_annotations.get(image.as_str())
    }

    /// 예약 키 하나만 담은 어노테이션 맵을 만듭니다 (쓰기용).
    pub fn to_pod_annotations(&self) -> Result<BTreeMap<String, String>, serde_json::Error> {
        let mut map = BTreeMap::new();
        map.insert(ANNOTATION_KEY.to_owned(), self.to_json()?);
        Ok(map)
    }
}
