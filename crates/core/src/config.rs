//! 설정 관리: perceptor.toml 파싱 및 런타임 설정
//!
//! [`PerceptorConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PERCEPTOR_ENGINE_QUEUE_CAPACITY=500` 형식)
//! 3. 설정 파일 (`perceptor.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), perceptor_core::error::PerceptorError> {
//! use perceptor_core::config::PerceptorConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PerceptorConfig::load("perceptor.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PerceptorConfig::parse("[engine]\nscan_concurrency = 4")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PerceptorError};

/// 동시 스캔 상한 (스캔 백엔드가 허용하는 최대 병렬 작업 수)
pub const MAX_SCAN_CONCURRENCY: usize = 7;

/// poll tick 하나에서 동시에 진행하는 결과 조회 상한
pub const MAX_POLL_CONCURRENCY: usize = 64;

/// Perceptor 통합 설정
///
/// `perceptor.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 크레이트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerceptorConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 클러스터 연동 설정
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// 스캔 백엔드 설정
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// 오케스트레이터 설정
    #[serde(default)]
    pub engine: EngineConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl PerceptorConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PerceptorError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PerceptorError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PerceptorError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PerceptorError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PerceptorError> {
        toml::from_str(toml_str).map_err(|e| {
            PerceptorError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PERCEPTOR_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PERCEPTOR_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PERCEPTOR_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "PERCEPTOR_GENERAL_PID_FILE");

        // Cluster
        override_string(&mut self.cluster.mode, "PERCEPTOR_CLUSTER_MODE");
        override_string(&mut self.cluster.namespace, "PERCEPTOR_CLUSTER_NAMESPACE");
        override_usize(
            &mut self.cluster.event_channel_capacity,
            "PERCEPTOR_CLUSTER_EVENT_CHANNEL_CAPACITY",
        );
        override_u64(
            &mut self.cluster.call_timeout_secs,
            "PERCEPTOR_CLUSTER_CALL_TIMEOUT_SECS",
        );

        // Scanner
        override_string(&mut self.scanner.mode, "PERCEPTOR_SCANNER_MODE");
        override_string(
            &mut self.scanner.scan_command,
            "PERCEPTOR_SCANNER_SCAN_COMMAND",
        );
        override_csv(&mut self.scanner.scan_args, "PERCEPTOR_SCANNER_SCAN_ARGS");
        override_string(
            &mut self.scanner.fetch_command,
            "PERCEPTOR_SCANNER_FETCH_COMMAND",
        );
        override_csv(&mut self.scanner.fetch_args, "PERCEPTOR_SCANNER_FETCH_ARGS");
        override_bool(&mut self.scanner.pull_images, "PERCEPTOR_SCANNER_PULL_IMAGES");
        override_string(
            &mut self.scanner.docker_socket,
            "PERCEPTOR_SCANNER_DOCKER_SOCKET",
        );
        override_string(&mut self.scanner.tar_dir, "PERCEPTOR_SCANNER_TAR_DIR");
        override_u64(
            &mut self.scanner.call_timeout_secs,
            "PERCEPTOR_SCANNER_CALL_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.scanner.mock_polls_to_complete,
            "PERCEPTOR_SCANNER_MOCK_POLLS_TO_COMPLETE",
        );
        override_u32(
            &mut self.scanner.mock_policy_violations,
            "PERCEPTOR_SCANNER_MOCK_POLICY_VIOLATIONS",
        );
        override_u32(
            &mut self.scanner.mock_vulnerabilities,
            "PERCEPTOR_SCANNER_MOCK_VULNERABILITIES",
        );

        // Engine
        override_usize(
            &mut self.engine.queue_capacity,
            "PERCEPTOR_ENGINE_QUEUE_CAPACITY",
        );
        override_string(
            &mut self.engine.overflow_policy,
            "PERCEPTOR_ENGINE_OVERFLOW_POLICY",
        );
        override_usize(
            &mut self.engine.scan_concurrency,
            "PERCEPTOR_ENGINE_SCAN_CONCURRENCY",
        );
        override_usize(
            &mut self.engine.poll_concurrency,
            "PERCEPTOR_ENGINE_POLL_CONCURRENCY",
        );
        override_u64(
            &mut self.engine.poll_interval_secs,
            "PERCEPTOR_ENGINE_POLL_INTERVAL_SECS",
        );
        override_u32(
            &mut self.engine.max_poll_attempts,
            "PERCEPTOR_ENGINE_MAX_POLL_ATTEMPTS",
        );
        override_u32(
            &mut self.engine.max_result_errors,
            "PERCEPTOR_ENGINE_MAX_RESULT_ERRORS",
        );
        override_u32(
            &mut self.engine.max_backoff_ticks,
            "PERCEPTOR_ENGINE_MAX_BACKOFF_TICKS",
        );
        override_u64(
            &mut self.engine.model_metrics_interval_secs,
            "PERCEPTOR_ENGINE_MODEL_METRICS_INTERVAL_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "PERCEPTOR_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "PERCEPTOR_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "PERCEPTOR_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "PERCEPTOR_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PerceptorError> {
        one_of(
            "general.log_level",
            &self.general.log_level,
            &["trace", "debug", "info", "warn", "error"],
        )?;
        one_of(
            "general.log_format",
            &self.general.log_format,
            &["json", "pretty"],
        )?;

        one_of("cluster.mode", &self.cluster.mode, &["kube", "mock"])?;
        positive("cluster.event_channel_capacity", self.cluster.event_channel_capacity)?;
        positive("cluster.call_timeout_secs", self.cluster.call_timeout_secs)?;

        one_of("scanner.mode", &self.scanner.mode, &["command", "mock"])?;
        if self.scanner.mode == "command" {
            non_empty("scanner.scan_command", &self.scanner.scan_command)?;
            non_empty("scanner.fetch_command", &self.scanner.fetch_command)?;
            if self.scanner.pull_images {
                non_empty("scanner.docker_socket", &self.scanner.docker_socket)?;
                non_empty("scanner.tar_dir", &self.scanner.tar_dir)?;
            }
        }

        positive("engine.queue_capacity", self.engine.queue_capacity)?;
        one_of(
            "engine.overflow_policy",
            &self.engine.overflow_policy,
            &["block", "reject", "drop_oldest"],
        )?;
        if self.engine.scan_concurrency == 0
            || self.engine.scan_concurrency > MAX_SCAN_CONCURRENCY
        {
            return Err(ConfigError::InvalidValue {
                field: "engine.scan_concurrency".to_owned(),
                reason: format!("must be between 1 and {MAX_SCAN_CONCURRENCY}"),
            }
            .into());
        }
        if self.engine.poll_concurrency == 0
            || self.engine.poll_concurrency > MAX_POLL_CONCURRENCY
        {
            return Err(ConfigError::InvalidValue {
                field: "engine.poll_concurrency".to_owned(),
                reason: format!("must be between 1 and {MAX_POLL_CONCURRENCY}"),
            }
            .into());
        }
        positive("engine.poll_interval_secs", self.engine.poll_interval_secs)?;
        positive("engine.max_result_errors", self.engine.max_result_errors)?;
        positive("engine.max_backoff_ticks", self.engine.max_backoff_ticks)?;
        positive(
            "engine.model_metrics_interval_secs",
            self.engine.model_metrics_interval_secs,
        )?;

        if self.metrics.enabled {
            non_empty("metrics.listen_addr", &self.metrics.listen_addr)?;
            positive("metrics.port", self.metrics.port)?;
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 클러스터 연동 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// 클러스터 구현 (kube, mock)
    pub mode: String,
    /// 감시할 네임스페이스 (빈 문자열이면 전체)
    pub namespace: String,
    /// 이벤트 종류별 채널 용량
    pub event_channel_capacity: usize,
    /// API 호출 타임아웃 (초)
    pub call_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            mode: "kube".to_owned(),
            namespace: String::new(),
            event_channel_capacity: 64,
            call_timeout_secs: 30,
        }
    }
}

/// 스캔 백엔드 설정
///
/// `scan_args`에는 `{project}`, `{image}`, `{tar}` 치환자를,
/// `fetch_args`에는 `{project}` 치환자를 쓸 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// 백엔드 구현 (command, mock)
    pub mode: String,
    /// 스캔 실행 명령
    pub scan_command: String,
    /// 스캔 명령 인자
    pub scan_args: Vec<String>,
    /// 프로젝트 조회 명령 (표준 출력으로 프로젝트 JSON 출력)
    pub fetch_command: String,
    /// 조회 명령 인자
    pub fetch_args: Vec<String>,
    /// 스캔 전에 이미지를 tarball로 내려받을지 여부
    pub pull_images: bool,
    /// Docker 소켓 경로
    pub docker_socket: String,
    /// tarball 저장 디렉토리
    pub tar_dir: String,
    /// 호출 타임아웃 (초, 0이면 무제한)
    pub call_timeout_secs: u64,
    /// mock 모드: 완료로 보고하기까지의 조회 횟수
    pub mock_polls_to_complete: u32,
    /// mock 모드: 보고할 정책 위반 수
    pub mock_policy_violations: u32,
    /// mock 모드: 보고할 취약점 수
    pub mock_vulnerabilities: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mode: "command".to_owned(),
            scan_command: "./dependencies/scan.cli/bin/scan.cli.sh".to_owned(),
            scan_args: vec![
                "--project".to_owned(),
                "{project}".to_owned(),
                "--release".to_owned(),
                "{project}".to_owned(),
                "--name".to_owned(),
                "{project}".to_owned(),
                "{image}".to_owned(),
            ],
            fetch_command: "./dependencies/bin/fetch-project.sh".to_owned(),
            fetch_args: vec!["{project}".to_owned()],
            pull_images: false,
            docker_socket: "/var/run/docker.sock".to_owned(),
            tar_dir: "/var/images".to_owned(),
            call_timeout_secs: 1800,
            mock_polls_to_complete: 2,
            mock_policy_violations: 0,
            mock_vulnerabilities: 0,
        }
    }
}

/// 오케스트레이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 작업 큐 용량
    pub queue_capacity: usize,
    /// 큐가 가득 찼을 때의 정책 (block, reject, drop_oldest)
    pub overflow_policy: String,
    /// 동시 스캔 수 (1..=7)
    pub scan_concurrency: usize,
    /// poll tick 하나에서 동시에 진행하는 결과 조회 수 (1..=64)
    pub poll_concurrency: usize,
    /// 결과 조회 주기 (초)
    pub poll_interval_secs: u64,
    /// 미완료 조회 허용 횟수 (0이면 무제한)
    pub max_poll_attempts: u32,
    /// 조회 오류/결과 오류 허용 횟수
    pub max_result_errors: u32,
    /// 오류 백오프 상한 (tick 수)
    pub max_backoff_ticks: u32,
    /// 모델 메트릭 발행 주기 (초)
    pub model_metrics_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 300,
            overflow_policy: "block".to_owned(),
            scan_concurrency: 1,
            poll_concurrency: 8,
            poll_interval_secs: 10,
            max_poll_attempts: 360,
            max_result_errors: 5,
            max_backoff_ticks: 32,
            model_metrics_interval_secs: 15,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 노출 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 검증 헬퍼 ---

fn one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), PerceptorError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: format!("must be one of: {}", allowed.join(", ")),
    }
    .into())
}

fn positive<T: Default + PartialEq>(field: &str, value: T) -> Result<(), PerceptorError> {
    if value != T::default() {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: "must be greater than 0".to_owned(),
    }
    .into())
}

fn non_empty(field: &str, value: &str) -> Result<(), PerceptorError> {
    if !value.trim().is_empty() {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: "must not be empty".to_owned(),
    }
    .into())
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
