//! 스캔 백엔드 설정
//!
//! [`ScanBackendConfig`]는 core의 [`ScannerConfig`](perceptor_core::config::ScannerConfig)에서
//! 파생됩니다.
//!
//! # 사용 예시
//!
//! ```
//! use perceptor_scanner::{BackendMode, ScanBackendConfigBuilder};
//!
//! let config = ScanBackendConfigBuilder::new()
//!     .mode(BackendMode::Mock)
//!     .mock_polls_to_complete(1)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.mode, BackendMode::Mock);
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ScanBackendError;

/// 설정 상한값 상수
const MAX_CALL_TIMEOUT_SECS: u64 = 86_400; // 24 hours
const MAX_ARGS: usize = 64;
const MAX_MOCK_POLLS: u32 = 10_000;

/// 스캔 명령 인자 자리표시자
pub const PROJECT_PLACEHOLDER: &str = "{project}";
pub const IMAGE_PLACEHOLDER: &str = "{image}";
pub const TAR_PLACEHOLDER: &str = "{tar}";

/// 백엔드 구현 선택
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendMode {
    /// 외부 명령으로 스캔/조회
    #[default]
    Command,
    /// 인메모리 mock
    Mock,
}

impl BackendMode {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "command" => Some(Self::Command),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("command"),
            Self::Mock => f.write_str("mock"),
        }
    }
}

/// mock 백엔드가 보고할 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSettings {
    /// 완료로 보고하기까지의 조회 횟수
    pub polls_to_complete: u32,
    pub policy_violations: u32,
    pub vulnerabilities: u32,
}

/// 스캔 백엔드 설정
#[derive(Debug, Clone)]
pub struct ScanBackendConfig {
    pub mode: BackendMode,
    /// 스캔 실행 명령
    pub scan_command: String,
    /// 스캔 명령 인자 (`{project}`, `{image}`, `{tar}` 치환)
    pub scan_args: Vec<String>,
    /// 프로젝트 조회 명령 (표준 출력에 프로젝트 JSON, 없으면 빈 출력)
    pub fetch_command: String,
    /// 조회 명령 인자 (`{project}` 치환)
    pub fetch_args: Vec<String>,
    /// 스캔 전에 이미지를 tarball로 추출할지 여부
    pub pull_images: bool,
    pub docker_socket: String,
    pub tar_dir: PathBuf,
    /// 백엔드 호출 타임아웃 (`None`이면 무제한)
    pub call_timeout: Option<Duration>,
    pub mock: MockSettings,
}

impl Default for ScanBackendConfig {
    fn default() -> Self {
        Self::from_core(&perceptor_core::config::ScannerConfig::default())
    }
}

impl ScanBackendConfig {
    /// core 설정에서 생성합니다. 알 수 없는 모드는 `command`로 취급합니다.
    pub fn from_core(core: &perceptor_core::config::ScannerConfig) -> Self {
        Self {
            mode: BackendMode::from_str_loose(&core.mode).unwrap_or_default(),
            scan_command: core.scan_command.clone(),
            scan_args: core.scan_args.clone(),
            fetch_command: core.fetch_command.clone(),
            fetch_args: core.fetch_args.clone(),
            pull_images: core.pull_images,
            docker_socket: core.docker_socket.clone(),
            tar_dir: PathBuf::from(&core.tar_dir),
            call_timeout: (core.call_timeout_secs > 0)
                .then(|| Duration::from_secs(core.call_timeout_secs)),
            mock: MockSettings {
                polls_to_complete: core.mock_polls_to_complete,
                policy_violations: core.mock_policy_violations,
                vulnerabilities: core.mock_vulnerabilities,
            },
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `command` 모드: `scan_command`, `fetch_command`가 비어있으면 안 됨
    /// - 인자 수: 각각 최대 64개
    /// - `pull_images`: `docker_socket`, `tar_dir` 필요
    /// - `call_timeout`: 최대 86400초
    /// - mock 조회 횟수: 최대 10000
    pub fn validate(&self) -> Result<(), ScanBackendError> {
        if self.mode == BackendMode::Command {
            if self.scan_command.trim().is_empty() {
                return Err(config_error("scan_command", "must not be empty in command mode"));
            }
            if self.fetch_command.trim().is_empty() {
                return Err(config_error("fetch_command", "must not be empty in command mode"));
            }
        }

        if self.scan_args.len() > MAX_ARGS {
            return Err(config_error("scan_args", format!("at most {MAX_ARGS} arguments")));
        }
        if self.fetch_args.len() > MAX_ARGS {
            return Err(config_error("fetch_args", format!("at most {MAX_ARGS} arguments")));
        }

        if self.pull_images {
            if self.docker_socket.trim().is_empty() {
                return Err(config_error("docker_socket", "required when pull_images is set"));
            }
            if self.tar_dir.as_os_str().is_empty() {
                return Err(config_error("tar_dir", "required when pull_images is set"));
            }
        }

        if self
            .call_timeout
            .is_some_and(|timeout| timeout.as_secs() > MAX_CALL_TIMEOUT_SECS)
        {
            return Err(config_error(
                "call_timeout_secs",
                format!("must be 0 (no timeout) or 1-{MAX_CALL_TIMEOUT_SECS}"),
            ));
        }

        if self.mock.polls_to_complete > MAX_MOCK_POLLS {
            return Err(config_error(
                "mock_polls_to_complete",
                format!("must be at most {MAX_MOCK_POLLS}"),
            ));
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> ScanBackendError {
    ScanBackendError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// [`ScanBackendConfig`] 빌더
#[derive(Default)]
pub struct ScanBackendConfigBuilder {
    config: ScanBackendConfig,
}

impl ScanBackendConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: BackendMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// 스캔 명령과 인자를 설정합니다.
    pub fn scan_command(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.config.scan_command = command.into();
        self.config.scan_args = args;
        self
    }

    /// 조회 명령과 인자를 설정합니다.
    pub fn fetch_command(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.config.fetch_command = command.into();
        self.config.fetch_args = args;
        self
    }

    pub fn pull_images(mut self, pull: bool) -> Self {
        self.config.pull_images = pull;
        self
    }

    pub fn tar_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tar_dir = dir.into();
        self
    }

    pub fn call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    pub fn mock_polls_to_complete(mut self, polls: u32) -> Self {
        self.config.mock.polls_to_complete = polls;
        self
    }

    /// mock 백엔드가 보고할 집계값을 설정합니다.
    pub fn mock_counts(mut self, policy_violations: u32, vulnerabilities: u32) -> Self {
        self.config.mock.policy_violations = policy_violations;
        self.config.mock.vulnerabilities = vulnerabilities;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScanBackendError::Config` 반환
    pub fn build(self) -> Result<ScanBackendConfig, ScanBackendError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
