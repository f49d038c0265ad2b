//! # perceptor-scanner
//!
//! 스캔 백엔드 경계: 스캔 제출, 프로젝트 상태 조회, 완료 판정, 이미지 추출.
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 (`ScanBackendError`, `ImagePullError`, `ScanResultsError`)
//! - [`config`]: 백엔드 설정 (`ScanBackendConfig`, `ScanBackendConfigBuilder`)
//! - [`model`]: 프로젝트 상태 모델과 완료 판정 (`Project`, `is_project_done`)
//! - [`job`]: 스캔 작업 (`ScanJob`)
//! - [`backend`]: 백엔드 추상화 (`ScanBackend` trait)
//! - [`command`]: 외부 명령 구현 (`CommandScanBackend`)
//! - [`docker`]: 이미지 tarball 추출 (`ImagePuller`, `BollardImagePuller`)
//! - [`mock`]: 인메모리 구현 (`MockScanBackend`)

pub mod backend;
pub mod command;
pub mod config;
pub mod docker;
pub mod error;
pub mod job;
pub mod mock;
pub mod model;

pub use backend::ScanBackend;
pub use command::CommandScanBackend;
pub use config::{BackendMode, MockSettings, ScanBackendConfig, ScanBackendConfigBuilder};
pub use docker::{BollardImagePuller, ImagePullStats, ImagePuller, TarGuard};
pub use error::{
    ImagePullError, ImagePullErrorKind, ScanBackendError, ScanErrorKind, ScanResultsError,
};
pub use job::ScanJob;
pub use mock::MockScanBackend;
pub use model::{Project, ScanResults, ScanSummaryStatus, is_project_done};
