//! 오케스트레이터 설정
//!
//! [`OrchestratorConfig`]는 core 설정의 `[engine]` 섹션과, 엔진이 외부 호출에 거는
//! 타임아웃(`[cluster].call_timeout_secs`, `[scanner].call_timeout_secs`)으로 구성됩니다.
//!
//! # 사용 예시
//!
//! ```
//! use std::time::Duration;
//! use perceptor_engine::{OrchestratorConfigBuilder, OverflowPolicy};
//!
//! let config = OrchestratorConfigBuilder::new()
//!     .scan_concurrency(3)
//!     .overflow_policy(OverflowPolicy::DropOldest)
//!     .poll_interval(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.scan_concurrency, 3);
//! ```

use std::time::Duration;

use perceptor_core::config::{MAX_POLL_CONCURRENCY, MAX_SCAN_CONCURRENCY, PerceptorConfig};

use crate::error::EngineError;
use crate::queue::OverflowPolicy;

/// 설정 상한값 상수
const MAX_QUEUE_CAPACITY: usize = 100_000;
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3600);
const MAX_BACKOFF_TICKS: u32 = 1024;
const MAX_RESULT_ERRORS: u32 = 1000;

/// 오케스트레이터 설정
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 스캔 대기 큐 용량
    pub queue_capacity: usize,
    /// 큐가 가득 찼을 때의 정책
    pub overflow_policy: OverflowPolicy,
    /// 동시에 제출할 수 있는 스캔 수
    pub scan_concurrency: usize,
    /// poll tick 하나에서 동시에 진행하는 결과 조회 수
    pub poll_concurrency: usize,
    /// 폴링 주기
    pub poll_interval: Duration,
    /// 미완료 조회 허용 횟수 (0이면 무제한)
    pub max_poll_attempts: u32,
    /// 조회 오류/결과 오류 허용 횟수
    pub max_result_errors: u32,
    /// 오류 백오프 상한 (tick 수)
    pub max_backoff_ticks: u32,
    /// 모델 메트릭 발행 주기
    pub model_metrics_interval: Duration,
    /// 스캔 백엔드 호출 타임아웃 (`None`이면 무제한)
    pub scan_timeout: Option<Duration>,
    /// 클러스터 API 호출 타임아웃
    pub cluster_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_core(&PerceptorConfig::default())
    }
}

impl OrchestratorConfig {
    /// core 설정에서 생성합니다. 알 수 없는 오버플로 정책은 `block`으로 취급합니다.
    pub fn from_core(core: &PerceptorConfig) -> Self {
        let engine = &core.engine;
        Self {
            queue_capacity: engine.queue_capacity,
            overflow_policy: OverflowPolicy::from_str_loose(&engine.overflow_policy)
                .unwrap_or_default(),
            scan_concurrency: engine.scan_concurrency,
            poll_concurrency: engine.poll_concurrency,
            poll_interval: Duration::from_secs(engine.poll_interval_secs),
            max_poll_attempts: engine.max_poll_attempts,
            max_result_errors: engine.max_result_errors,
            max_backoff_ticks: engine.max_backoff_ticks,
            model_metrics_interval: Duration::from_secs(engine.model_metrics_interval_secs),
            scan_timeout: (core.scanner.call_timeout_secs > 0)
                .then(|| Duration::from_secs(core.scanner.call_timeout_secs)),
            cluster_timeout: Duration::from_secs(core.cluster.call_timeout_secs),
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `queue_capacity`: 1-100000
    /// - `scan_concurrency`: 1-7
    /// - `poll_concurrency`: 1-64
    /// - `poll_interval`: 1초-1시간
    /// - `max_result_errors`: 1-1000
    /// - `max_backoff_ticks`: 1-1024
    /// - `model_metrics_interval`, `cluster_timeout`: 0이면 안 됨
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(config_error(
                "queue_capacity",
                format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }
        if self.scan_concurrency == 0 || self.scan_concurrency > MAX_SCAN_CONCURRENCY {
            return Err(config_error(
                "scan_concurrency",
                format!("must be 1-{MAX_SCAN_CONCURRENCY}"),
            ));
        }
        if self.poll_concurrency == 0 || self.poll_concurrency > MAX_POLL_CONCURRENCY {
            return Err(config_error(
                "poll_concurrency",
                format!("must be 1-{MAX_POLL_CONCURRENCY}"),
            ));
        }
        if self.poll_interval < Duration::from_secs(1) || self.poll_interval > MAX_POLL_INTERVAL {
            return Err(config_error(
                "poll_interval_secs",
                format!("must be 1-{}", MAX_POLL_INTERVAL.as_secs()),
            ));
        }
        if self.max_result_errors == 0 || self.max_result_errors > MAX_RESULT_ERRORS {
            return Err(config_error(
                "max_result_errors",
                format!("must be 1-{MAX_RESULT_ERRORS}"),
            ));
        }
        if self.max_backoff_ticks == 0 || self.max_backoff_ticks > MAX_BACKOFF_TICKS {
            return Err(config_error(
                "max_backoff_ticks",
                format!("must be 1-{MAX_BACKOFF_TICKS}"),
            ));
        }
        if self.model_metrics_interval.is_zero() {
            return Err(config_error(
                "model_metrics_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.cluster_timeout.is_zero() {
            return Err(config_error("call_timeout_secs", "must be greater than 0"));
        }
        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> EngineError {
    EngineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// [`OrchestratorConfig`] 빌더
#[derive(Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    pub fn scan_concurrency(mut self, concurrency: usize) -> Self {
        self.config.scan_concurrency = concurrency;
        self
    }

    pub fn poll_concurrency(mut self, concurrency: usize) -> Self {
        self.config.poll_concurrency = concurrency;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.max_poll_attempts = attempts;
        self
    }

    pub fn max_result_errors(mut self, errors: u32) -> Self {
        self.config.max_result_errors = errors;
        self
    }

    pub fn max_backoff_ticks(mut self, ticks: u32) -> Self {
        self.config.max_backoff_ticks = ticks;
        self
    }

    pub fn model_metrics_interval(mut self, interval: Duration) -> Self {
        self.config.model_metrics_interval = interval;
        self
    }

    pub fn scan_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.scan_timeout = timeout;
        self
    }

    pub fn cluster_timeout(mut self, timeout: Duration) -> Self {
        self.config.cluster_timeout = timeout;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `EngineError::Config` 반환
    pub fn build(self) -> Result<OrchestratorConfig, EngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = OrchestratorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.queue_capacity, 300);
        assert_eq!(config.overflow_policy, OverflowPolicy::Block);
        assert_eq!(config.scan_concurrency, 1);
        assert_eq!(config.poll_concurrency, 8);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn from_core_reads_timeouts_from_other_sections() {
        let mut core = PerceptorConfig::default();
        core.scanner.call_timeout_secs = 0;
        core.cluster.call_timeout_secs = 12;
        core.engine.overflow_policy = "drop_oldest".to_owned();

        let config = OrchestratorConfig::from_core(&core);

        assert_eq!(config.scan_timeout, None);
        assert_eq!(config.cluster_timeout, Duration::from_secs(12));
        assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
    }

    #[test]
    fn concurrency_is_bounded() {
        assert!(OrchestratorConfigBuilder::new().scan_concurrency(0).build().is_err());
        assert!(
            OrchestratorConfigBuilder::new()
                .scan_concurrency(MAX_SCAN_CONCURRENCY + 1)
                .build()
                .is_err()
        );
        OrchestratorConfigBuilder::new()
            .scan_concurrency(MAX_SCAN_CONCURRENCY)
            .build()
            .unwrap();
    }

    #[test]
    fn poll_concurrency_is_configurable_and_bounded() {
        // Given
        let mut core = PerceptorConfig::default();
        core.engine.poll_concurrency = 3;

        // When
        let config = OrchestratorConfig::from_core(&core);

        // Then
        assert_eq!(config.poll_concurrency, 3);
        assert!(OrchestratorConfigBuilder::new().poll_concurrency(0).build().is_err());
        assert!(
            OrchestratorConfigBuilder::new()
                .poll_concurrency(MAX_POLL_CONCURRENCY + 1)
                .build()
                .is_err()
        );
        let config = OrchestratorConfigBuilder::new()
            .poll_concurrency(MAX_POLL_CONCURRENCY)
            .build()
            .unwrap();
        assert_eq!(config.poll_concurrency, MAX_POLL_CONCURRENCY);
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert!(OrchestratorConfigBuilder::new().queue_capacity(0).build().is_err());
        assert!(
            OrchestratorConfigBuilder::new()
                .poll_interval(Duration::from_millis(500))
                .build()
                .is_err()
        );
        assert!(OrchestratorConfigBuilder::new().max_result_errors(0).build().is_err());
        assert!(OrchestratorConfigBuilder::new().max_backoff_ticks(0).build().is_err());
        assert!(
            OrchestratorConfigBuilder::new()
                .cluster_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
    }
}
