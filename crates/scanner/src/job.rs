//! 스캔 작업 상관 레코드

use std::fmt;

use perceptor_core::types::ImageRef;

/// 백엔드 프로젝트 이름과 스캔 대상 이미지의 쌍
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanJob {
    /// 백엔드에 생성될 프로젝트 이름
    pub project_name: String,
    /// 스캔 대상 이미지
    pub image: ImageRef,
}

impl ScanJob {
    pub fn new(project_name: impl Into<String>, image: ImageRef) -> Self {
        Self {
            project_name: project_name.into(),
            image,
        }
    }

    /// 같은 이미지를 반복 스캔해도 충돌하지 않는 프로젝트 이름을 만듭니다.
    ///
    /// 형식: `my-{image}-project-{counter}`
    pub fn project_name_for(image: &ImageRef, counter: u64) -> String {
        format!("my-{image}-project-{counter}")
    }
}

impl fmt::Display for ScanJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.project_name, self.image)
    }
}
