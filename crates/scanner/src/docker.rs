//! 이미지 tarball 추출
//!
//! 스캔 클라이언트가 이미지 파일을 직접 읽어야 할 때, 로컬 docker 데몬에
//! 이미지를 만들고(`create_image`) tarball로 내보냅니다(`export_image`).
//!
//! 결과 파일 경로는 `{tar_dir}/{image의 '/'와 ':'를 '_'로 바꾼 이름}.tar`입니다.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use metrics::histogram;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use perceptor_core::metrics as m;
use perceptor_core::types::ImageRef;

use crate::error::{ImagePullError, ImagePullErrorKind, ScanBackendError};

const DOCKER_TIMEOUT_SECS: u64 = 120;

/// 이미지 추출 통계
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePullStats {
    /// 생성된 tarball 경로
    pub tar_path: PathBuf,
    /// `create_image` 소요 시간
    pub create_duration: Duration,
    /// tarball 저장 소요 시간
    pub save_duration: Duration,
    /// tarball 크기 (바이트)
    pub tar_size_bytes: u64,
}

impl ImagePullStats {
    pub fn total_duration(&self) -> Duration {
        self.create_duration + self.save_duration
    }
}

/// 이미지를 로컬 tarball로 내려받습니다.
pub trait ImagePuller: Send + Sync + 'static {
    /// 이미지를 내려받아 tarball을 만들고 통계를 반환합니다.
    ///
    /// # Errors
    ///
    /// 단계별 실패는 [`ImagePullErrorKind`]로 구분됩니다.
    fn pull(
        &self,
        image: &ImageRef,
    ) -> impl Future<Output = Result<ImagePullStats, ImagePullError>> + Send;
}

impl<T: ImagePuller> ImagePuller for Arc<T> {
    fn pull(
        &self,
        image: &ImageRef,
    ) -> impl Future<Output = Result<ImagePullStats, ImagePullError>> + Send {
        (**self).pull(image)
    }
}

/// 이미지의 tarball 경로를 계산합니다.
pub fn tar_file_path(tar_dir: &Path, image: &ImageRef) -> PathBuf {
    let file_name = image.as_str().replace(['/', ':'], "_");
    tar_dir.join(format!("{file_name}.tar"))
}

/// tarball을 삭제합니다. 실패는 기록만 합니다.
pub async fn remove_tar(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "tar file removed"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove tar file"),
    }
}

/// 사용이 끝나면 지워야 하는 tarball
///
/// [`remove`](Self::remove)나 [`keep`](Self::keep) 없이 drop되면 파일을 동기적으로 지웁니다.
/// 스캔이나 추출 future가 타임아웃, 태스크 중단으로 버려진 경우에 해당합니다.
#[derive(Debug)]
pub struct TarGuard {
    path: PathBuf,
    armed: bool,
}

impl TarGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 파일을 비동기로 지웁니다.
    pub async fn remove(mut self) {
        remove_tar(&self.path).await;
        self.armed = false;
    }

    /// 파일을 남기고 경로를 돌려받습니다.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TarGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "tar file removed after cancellation"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove tar file"),
        }
    }
}

/// `bollard` 기반 [`ImagePuller`]
pub struct BollardImagePuller {
    docker: Arc<bollard::Docker>,
    tar_dir: PathBuf,
}

impl BollardImagePuller {
    /// 지정한 소켓의 docker 데몬을 사용합니다.
    pub fn connect(socket_path: &str, tar_dir: impl Into<PathBuf>) -> Result<Self, ScanBackendError> {
        let docker = bollard::Docker::connect_with_socket(
            socket_path,
            DOCKER_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| ScanBackendError::Config {
            field: "docker_socket".to_owned(),
            reason: format!("failed to connect to docker at {socket_path}: {e}"),
        })?;
        Ok(Self {
            docker: Arc::new(docker),
            tar_dir: tar_dir.into(),
        })
    }

    async fn create_image(&self, image: &ImageRef) -> Result<(), ImagePullError> {
        use bollard::image::CreateImageOptions;

        let options = CreateImageOptions::<String> {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(item) = progress.next().await {
            let info = item.map_err(|e| {
                ImagePullError::new(image.as_str(), ImagePullErrorKind::CreateImage, e)
            })?;
            if let Some(message) = info.error {
                return Err(ImagePullError::new(
                    image.as_str(),
                    ImagePullErrorKind::CreateImage,
                    message,
                ));
            }
        }
        Ok(())
    }

    async fn save_to_tar(&self, image: &ImageRef, path: &Path) -> Result<u64, ImagePullError> {
        let tar_error = |kind, e: std::io::Error| ImagePullError::new(image.as_str(), kind, e);

        tokio::fs::create_dir_all(&self.tar_dir)
            .await
            .map_err(|e| tar_error(ImagePullErrorKind::CreateTar, e))?;
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| tar_error(ImagePullErrorKind::CreateTar, e))?;

        let mut chunks = self.docker.export_image(image.as_str());
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| export_error(image, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| tar_error(ImagePullErrorKind::CopyTar, e))?;
        }
        file.flush()
            .await
            .map_err(|e| tar_error(ImagePullErrorKind::CopyTar, e))?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| tar_error(ImagePullErrorKind::FileStats, e))?;
        Ok(metadata.len())
    }
}

impl ImagePuller for BollardImagePuller {
    async fn pull(&self, image: &ImageRef) -> Result<ImagePullStats, ImagePullError> {
        let tar = TarGuard::new(tar_file_path(&self.tar_dir, image));

        let started = Instant::now();
        let result: Result<ImagePullStats, ImagePullError> = async {
            self.create_image(image).await?;
            let create_duration = started.elapsed();

            let saving = Instant::now();
            let tar_size_bytes = match self.save_to_tar(image, tar.path()).await {
                Ok(size) => size,
                Err(e) => {
                    tar.remove().await;
                    return Err(e);
                }
            };
            Ok(ImagePullStats {
                tar_path: tar.keep(),
                create_duration,
                save_duration: saving.elapsed(),
                tar_size_bytes,
            })
        }
        .await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        histogram!(m::SCANNER_IMAGE_PULL_DURATION_SECONDS, m::LABEL_OUTCOME => outcome)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(stats) => info!(
                image = %image,
                tar = %stats.tar_path.display(),
                size_bytes = stats.tar_size_bytes,
                total_ms = stats.total_duration().as_millis() as u64,
                "image saved to tar"
            ),
            Err(e) => warn!(image = %image, error = %e, "image pull failed"),
        }
        result
    }
}

fn export_error(image: &ImageRef, err: bollard::errors::Error) -> ImagePullError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => ImagePullError::new(
            image.as_str(),
            ImagePullErrorKind::BadStatus,
            format!("status {status_code}: {message}"),
        ),
        other => ImagePullError::new(image.as_str(), ImagePullErrorKind::GetImage, other),
    }
}
