//! 외부 명령 기반 스캔 백엔드
//!
//! 스캔 클라이언트(예: `scan.cli.sh`)와 프로젝트 조회 스크립트를 하위 프로세스로
//! 실행합니다.
//!
//! - 스캔: `pull_images`가 켜져 있으면 먼저 이미지를 tarball로 추출하고,
//!   `scan_args`의 `{project}`, `{image}`, `{tar}`를 치환해 `scan_command`를 실행합니다.
//!   종료 후 tarball은 항상 삭제합니다. future가 중간에 버려져도 [`TarGuard`]가 지웁니다.
//! - 조회: `fetch_args`의 `{project}`를 치환해 `fetch_command`를 실행하고,
//!   표준 출력을 프로젝트 JSON으로 해석합니다. 출력이 비어 있으면 프로젝트 없음입니다.
//!
//! 하위 프로세스는 `kill_on_drop`으로 실행되므로, 호출 측 타임아웃으로 future가
//! 버려지면 함께 종료됩니다.

use std::process::{Output, Stdio};
use std::time::Instant;

use metrics::histogram;
use tokio::process::Command;
use tracing::{debug, info, warn};

use perceptor_core::metrics as m;

use crate::backend::ScanBackend;
use crate::config::{IMAGE_PLACEHOLDER, PROJECT_PLACEHOLDER, ScanBackendConfig, TAR_PLACEHOLDER};
use crate::docker::{BollardImagePuller, ImagePuller, TarGuard};
use crate::error::ScanBackendError;
use crate::job::ScanJob;
use crate::model::Project;

/// 에러 메시지에 포함할 출력 최대 길이
const MAX_OUTPUT_EXCERPT: usize = 512;

/// 명령 실행 기반 [`ScanBackend`]
pub struct CommandScanBackend<P = BollardImagePuller> {
    config: ScanBackendConfig,
    puller: Option<P>,
}

impl CommandScanBackend<BollardImagePuller> {
    /// 설정으로 생성합니다. `pull_images`가 켜져 있으면 docker에 연결합니다.
    ///
    /// # Errors
    ///
    /// 설정 검증 실패 또는 docker 소켓 연결 실패 시 `ScanBackendError::Config`
    pub fn new(config: ScanBackendConfig) -> Result<Self, ScanBackendError> {
        config.validate()?;
        let puller = if config.pull_images {
            Some(BollardImagePuller::connect(
                &config.docker_socket,
                config.tar_dir.clone(),
            )?)
        } else {
            None
        };
        Ok(Self { config, puller })
    }
}

impl<P: ImagePuller> CommandScanBackend<P> {
    /// 주어진 이미지 추출기를 사용합니다 (`pull_images` 설정과 무관).
    pub fn with_puller(config: ScanBackendConfig, puller: P) -> Result<Self, ScanBackendError> {
        config.validate()?;
        Ok(Self {
            config,
            puller: Some(puller),
        })
    }

    async fn run_scanner(&self, job: &ScanJob, tar: &str) -> Result<(), ScanBackendError> {
        let args = substitute(
            &self.config.scan_args,
            &[
                (PROJECT_PLACEHOLDER, job.project_name.as_str()),
                (IMAGE_PLACEHOLDER, job.image.as_str()),
                (TAR_PLACEHOLDER, tar),
            ],
        );
        info!(
            image = %job.image,
            project = %job.project_name,
            command = %self.config.scan_command,
            "running scan client"
        );

        let output = run(&self.config.scan_command, &args)
            .await
            .map_err(|e| ScanBackendError::scanner_failed(job.image.as_str(), e.to_string()))?;
        if !output.status.success() {
            return Err(ScanBackendError::scanner_failed(
                job.image.as_str(),
                format!("{}: {}", output.status, excerpt(&output)),
            ));
        }
        debug!(project = %job.project_name, output = %excerpt(&output), "scan client finished");
        Ok(())
    }
}

impl<P: ImagePuller> ScanBackend for CommandScanBackend<P> {
    async fn scan(&self, job: &ScanJob) -> Result<(), ScanBackendError> {
        let started = Instant::now();

        let tar = match &self.puller {
            Some(puller) => {
                let stats = puller
                    .pull(&job.image)
                    .await
                    .map_err(ScanBackendError::from_pull)?;
                Some(TarGuard::new(stats.tar_path))
            }
            None => None,
        };
        let tar_arg = tar
            .as_ref()
            .map(|t| t.path().to_string_lossy().into_owned())
            .unwrap_or_default();

        let result = self.run_scanner(job, &tar_arg).await;
        if let Some(tar) = tar {
            tar.remove().await;
        }

        let outcome = if result.is_ok() { "success" } else { "failure" };
        histogram!(m::SCANNER_SCAN_DURATION_SECONDS, m::LABEL_OUTCOME => outcome)
            .record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            warn!(project = %job.project_name, error = %e, "scan client failed");
        }
        result
    }

    async fn fetch_project(&self, project_name: &str) -> Result<Option<Project>, ScanBackendError> {
        let args = substitute(
            &self.config.fetch_args,
            &[(PROJECT_PLACEHOLDER, project_name)],
        );
        let output = run(&self.config.fetch_command, &args)
            .await
            .map_err(|e| ScanBackendError::Fetch {
                project: project_name.to_owned(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ScanBackendError::Fetch {
                project: project_name.to_owned(),
                reason: format!("{}: {}", output.status, excerpt(&output)),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let body = stdout.trim();
        if body.is_empty() || body == "null" {
            debug!(project = project_name, "project not found");
            return Ok(None);
        }
        serde_json::from_str(body)
            .map(Some)
            .map_err(|e| ScanBackendError::Decode {
                project: project_name.to_owned(),
                reason: e.to_string(),
            })
    }
}

async fn run(command: &str, args: &[String]) -> std::io::Result<Output> {
    Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
}

/// 인자 안의 자리표시자를 모두 치환합니다.
fn substitute(args: &[String], values: &[(&str, &str)]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            values
                .iter()
                .fold(arg.clone(), |acc, (placeholder, value)| {
                    acc.replace(placeholder, value)
                })
        })
        .collect()
}

/// 에러 메시지용 출력 발췌 (stderr 우선)
fn excerpt(output: &Output) -> String {
    let raw = if output.stderr.is_empty() {
        &output.stdout
    } else {
        &output.stderr
    };
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    match text.char_indices().nth(MAX_OUTPUT_EXCERPT) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_owned(),
    }
}
