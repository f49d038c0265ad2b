//! 스캔 백엔드 에러 타입
//!
//! - [`ScanBackendError`]: 스캔 제출/프로젝트 조회 실패
//! - [`ImagePullError`]: 이미지 tarball 추출 실패
//! - [`ScanResultsError`]: 백엔드 결과 구조가 잘못되어 집계할 수 없음
//!
//! `From<ScanBackendError> for PerceptorError` 구현으로 상위 레이어에서 `?`로 전파됩니다.

use std::fmt;

use perceptor_core::error::{ConfigError, PerceptorError};

/// 스캔 실패 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// 스캔 전 이미지 추출 실패
    UnableToPullImage,
    /// 스캔 명령 실행 실패 (실행 불가 또는 0이 아닌 종료 코드)
    FailedToRunScanner,
}

impl ScanErrorKind {
    /// 메트릭 레이블 값
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::UnableToPullImage => "pull_image",
            Self::FailedToRunScanner => "run_scanner",
        }
    }
}

impl fmt::Display for ScanErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnableToPullImage => f.write_str("unable to pull docker image"),
            Self::FailedToRunScanner => f.write_str("failed to run scanner"),
        }
    }
}

/// 스캔 백엔드 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanBackendError {
    /// 스캔 제출 실패
    #[error("scan of '{image}' failed: {kind}: {reason}")]
    Scan {
        /// 대상 이미지
        image: String,
        /// 실패 종류
        kind: ScanErrorKind,
        /// 원인
        reason: String,
    },

    /// 프로젝트 조회 실패
    #[error("fetch of project '{project}' failed: {reason}")]
    Fetch {
        /// 프로젝트 이름
        project: String,
        /// 원인
        reason: String,
    },

    /// 조회 결과를 프로젝트 구조로 해석할 수 없음
    #[error("project '{project}' response is not valid: {reason}")]
    Decode {
        /// 프로젝트 이름
        project: String,
        /// 원인
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl ScanBackendError {
    /// 이미지 추출 실패를 스캔 에러로 감쌉니다.
    pub fn from_pull(err: ImagePullError) -> Self {
        Self::Scan {
            image: err.image.clone(),
            kind: ScanErrorKind::UnableToPullImage,
            reason: err.to_string(),
        }
    }

    /// 스캔 명령 실패를 만듭니다.
    pub fn scanner_failed(image: &str, reason: impl Into<String>) -> Self {
        Self::Scan {
            image: image.to_owned(),
            kind: ScanErrorKind::FailedToRunScanner,
            reason: reason.into(),
        }
    }

    /// 메트릭 라벨용 종류 이름
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Scan { kind, .. } => kind.as_label(),
            Self::Fetch { .. } => "fetch",
            Self::Decode { .. } => "decode",
            Self::Config { .. } => "config",
        }
    }
}

impl From<ScanBackendError> for PerceptorError {
    fn from(err: ScanBackendError) -> Self {
        match err {
            ScanBackendError::Config { field, reason } => {
                PerceptorError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => PerceptorError::Scanner(other.to_string()),
        }
    }
}

/// 이미지 추출 실패 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePullErrorKind {
    /// 로컬 docker에 이미지를 만들지 못함
    CreateImage,
    /// 이미지를 내려받지 못함
    GetImage,
    /// docker가 실패 상태 코드를 반환
    BadStatus,
    /// tarball 파일을 만들지 못함
    CreateTar,
    /// tarball에 쓰지 못함
    CopyTar,
    /// tarball 정보를 읽지 못함
    FileStats,
}

impl fmt::Display for ImagePullErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CreateImage => "unable to create image in local docker",
            Self::GetImage => "unable to get image",
            Self::BadStatus => "bad status code from get image",
            Self::CreateTar => "unable to create tar file",
            Self::CopyTar => "unable to copy tar file",
            Self::FileStats => "unable to get file stats",
        };
        f.write_str(text)
    }
}

/// 이미지 추출 에러
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {image}: {reason}")]
pub struct ImagePullError {
    /// 대상 이미지
    pub image: String,
    /// 실패 종류
    pub kind: ImagePullErrorKind,
    /// 원인
    pub reason: String,
}

impl ImagePullError {
    pub fn new(image: &str, kind: ImagePullErrorKind, reason: impl fmt::Display) -> Self {
        Self {
            image: image.to_owned(),
            kind,
            reason: reason.to_string(),
        }
    }
}

/// 백엔드 결과를 집계할 수 없음
///
/// 엔진은 이 에러를 재시도 가능한 실패로 세고, 한도를 넘으면 이미지를 실패 처리합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanResultsError {
    /// 버전이 하나도 없음
    #[error("project '{project}' has no versions")]
    NoVersions {
        /// 프로젝트 이름
        project: String,
    },

    /// 음수 집계값
    #[error("project '{project}' reports negative {field}: {value}")]
    NegativeCount {
        /// 프로젝트 이름
        project: String,
        /// 집계 필드
        field: &'static str,
        /// 보고된 값
        value: i64,
    },
}
