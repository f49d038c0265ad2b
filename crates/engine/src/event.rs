//! 캐시가 내보내는 이벤트

use perceptor_core::annotations::ImageAnnotation;
use perceptor_core::types::{ImageRef, PodKey, ScanCounts};

/// 이미지 스캔 완료 이벤트
///
/// `pods`는 이벤트를 만든 시점에 이 이미지를 참조하는 파드입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCompletion {
    pub image: ImageRef,
    pub counts: ScanCounts,
    pub pods: Vec<PodKey>,
}

impl ScanCompletion {
    /// 파드에 기록할 어노테이션 항목
    pub fn annotation(&self) -> ImageAnnotation {
        ImageAnnotation::from(self.counts)
    }
}
