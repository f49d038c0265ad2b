//! 클러스터 연동 설정
//!
//! core의 [`ClusterConfig`](perceptor_core::config::ClusterConfig)에서 파생됩니다.

use std::fmt;
use std::time::Duration;

use crate::error::ClusterError;

const MAX_EVENT_CHANNEL_CAPACITY: usize = 4096;
const MAX_CALL_TIMEOUT_SECS: u64 = 600;

/// 클러스터 구현 선택
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClusterMode {
    /// kube-rs 클라이언트와 watcher
    #[default]
    Kube,
    /// 인메모리 클러스터
    Mock,
}

impl ClusterMode {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "kube" | "kubernetes" => Some(Self::Kube),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

impl fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kube => f.write_str("kube"),
            Self::Mock => f.write_str("mock"),
        }
    }
}

/// 클러스터 클라이언트/watcher 설정
#[derive(Debug, Clone)]
pub struct ClusterClientConfig {
    pub mode: ClusterMode,
    /// 감시 대상 네임스페이스 (`None`이면 전체)
    pub namespace: Option<String>,
    /// 이벤트 종류별 채널 용량
    pub event_channel_capacity: usize,
    /// API 호출 타임아웃
    pub call_timeout: Duration,
}

impl Default for ClusterClientConfig {
    fn default() -> Self {
        Self::from_core(&perceptor_core::config::ClusterConfig::default())
    }
}

impl ClusterClientConfig {
    /// core 설정에서 생성합니다. 빈 네임스페이스는 전체를 의미합니다.
    pub fn from_core(core: &perceptor_core::config::ClusterConfig) -> Self {
        let namespace = core.namespace.trim();
        Self {
            mode: ClusterMode::from_str_loose(&core.mode).unwrap_or_default(),
            namespace: (!namespace.is_empty()).then(|| namespace.to_owned()),
            event_channel_capacity: core.event_channel_capacity,
            call_timeout: Duration::from_secs(core.call_timeout_secs),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.event_channel_capacity == 0
            || self.event_channel_capacity > MAX_EVENT_CHANNEL_CAPACITY
        {
            return Err(ClusterError::Config {
                field: "event_channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_EVENT_CHANNEL_CAPACITY}"),
            });
        }
        let secs = self.call_timeout.as_secs();
        if secs == 0 || secs > MAX_CALL_TIMEOUT_SECS {
            return Err(ClusterError::Config {
                field: "call_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_CALL_TIMEOUT_SECS}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_namespace_means_all() {
        let config = ClusterClientConfig::default();
        assert_eq!(config.namespace, None);
        config.validate().unwrap();
    }

    #[test]
    fn namespace_is_trimmed() {
        let core = perceptor_core::config::ClusterConfig {
            namespace: " apps ".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            ClusterClientConfig::from_core(&core).namespace.as_deref(),
            Some("apps")
        );
    }

    #[test]
    fn mode_parses_loosely() {
        assert_eq!(ClusterMode::from_str_loose(" Mock "), Some(ClusterMode::Mock));
        assert_eq!(ClusterMode::from_str_loose("kubernetes"), Some(ClusterMode::Kube));
        assert_eq!(ClusterMode::from_str_loose("nomad"), None);
        assert_eq!(ClusterMode::Mock.to_string(), "mock");
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let mut config = ClusterClientConfig::default();
        config.event_channel_capacity = MAX_EVENT_CHANNEL_CAPACITY + 1;
        assert!(config.validate().is_err());

        let mut config = ClusterClientConfig::default();
        config.call_timeout = Duration::from_secs(MAX_CALL_TIMEOUT_SECS + 1);
        assert!(config.validate().is_err());
    }
}
