//! 클러스터 연동 에러 타입
//!
//! [`ClusterError`]는 파드 조회, 어노테이션 쓰기, watch 스트림에서 발생하는
//! 에러를 표현합니다. `From<ClusterError> for PerceptorError` 변환으로
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use perceptor_core::error::PerceptorError;

/// 클러스터 연동 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// 클러스터 API 연결 실패 (kubeconfig 없음, API 서버 불가 등)
    #[error("cluster connection error: {0}")]
    Connection(String),

    /// 클러스터 API 호출 실패
    #[error("cluster api error: {0}")]
    Api(String),

    /// 파드를 찾을 수 없음
    #[error("pod not found: {0}")]
    PodNotFound(String),

    /// 어노테이션 직렬화 실패
    #[error("annotation serialization error: {0}")]
    Serialization(String),

    /// watch 스트림 에러
    #[error("pod watch error: {0}")]
    Watch(String),

    /// 이벤트 채널이 닫힘
    #[error("event channel closed: {0}")]
    ChannelClosed(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl ClusterError {
    /// 클러스터에 도달하지 못한 경우인지 여부
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<ClusterError> for PerceptorError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::Config { field, reason } => {
                PerceptorError::Config(perceptor_core::error::ConfigError::InvalidValue {
                    field,
                    reason,
                })
            }
            other => PerceptorError::Cluster(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_top_level_cluster_error() {
        let err: PerceptorError = ClusterError::PodNotFound("ns:p1".to_owned()).into();
        assert!(matches!(err, PerceptorError::Cluster(_)));
        assert!(err.to_string().contains("ns:p1"));
    }

    #[test]
    fn config_error_keeps_field() {
        let err: PerceptorError = ClusterError::Config {
            field: "event_channel_capacity".to_owned(),
            reason: "must be 1-4096".to_owned(),
        }
        .into();
        assert!(matches!(err, PerceptorError::Config(_)));
        assert!(err.to_string().contains("event_channel_capacity"));
    }

    #[test]
    fn only_connection_errors_are_unreachable() {
        assert!(ClusterError::Connection("no kubeconfig".to_owned()).is_unreachable());
        assert!(!ClusterError::Api("403".to_owned()).is_unreachable());
    }
}
