//! 엔진 에러 타입
//!
//! [`EngineError`]는 캐시 액터, 작업 큐, 오케스트레이터 생명주기에서 발생합니다.
//! 외부 협력자(클러스터, 스캔 백엔드)의 개별 실패는 각 루프에서 기록하고 삼키므로
//! 여기에 포함되지 않습니다.

use perceptor_core::error::{ConfigError, PerceptorError};

/// 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 캐시 액터가 종료되어 요청을 처리할 수 없음
    #[error("vulnerability cache unavailable: {0}")]
    CacheUnavailable(String),

    /// 작업 큐가 닫힘
    #[error("work queue closed")]
    QueueClosed,

    /// 파드 이벤트 스트림이 모두 닫힘
    #[error("pod event streams closed")]
    EventsClosed,

    /// 빌더에 필수 구성 요소가 없음
    #[error("missing component: {0}")]
    MissingComponent(&'static str),
}

impl From<EngineError> for PerceptorError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Config { field, reason } => {
                PerceptorError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => PerceptorError::Engine(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_top_level_error() {
        let err: PerceptorError = EngineError::QueueClosed.into();
        assert!(matches!(err, PerceptorError::Engine(_)));

        let err: PerceptorError = EngineError::Config {
            field: "scan_concurrency".to_owned(),
            reason: "must be 1-7".to_owned(),
        }
        .into();
        assert!(err.to_string().contains("scan_concurrency"));
    }
}
