//! # perceptor-core
//!
//! Perceptor 전체에서 공유하는 기반 크레이트입니다.
//!
//! - [`types`]: 파드/컨테이너/이미지 스냅샷과 스캔 상태
//! - [`annotations`]: 파드에 기록되는 스캔 결과 어노테이션 코덱
//! - [`priority_queue`]: 키 기반 최대 힙
//! - [`scheduler`]: 일시정지 가능한 주기 실행기
//! - [`pipeline`]: 장기 실행 모듈의 생명주기 trait
//! - [`config`], [`error`], [`metrics`]: 설정, 에러 계층, 메트릭 이름

pub mod annotations;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod priority_queue;
pub mod scheduler;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PerceptorError, PipelineError, QueueError, SchedulerError};

// 설정
pub use config::PerceptorConfig;

// 어노테이션
pub use annotations::{ANNOTATION_KEY, BlackDuckAnnotations, ImageAnnotation};

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};

// 자료구조 / 스케줄러
pub use priority_queue::PriorityQueue;
pub use scheduler::{Scheduler, SchedulerState};

// 도메인 타입
pub use types::{
    Container, ImageRef, Pod, PodKey, ScanCounts, ScanStatus, Severity, Vulnerability,
};
