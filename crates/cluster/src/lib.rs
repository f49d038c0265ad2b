//! # perceptor-cluster
//!
//! 클러스터 이벤트 소스와 파드 어노테이션 쓰기를 담당합니다.
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 (`ClusterError`)
//! - [`config`]: 클라이언트 설정 (`ClusterClientConfig`)
//! - [`event`]: 파드 이벤트와 종류별 채널 (`AddPod`, `UpdatePod`, `DeletePod`, `PodEventStreams`)
//! - [`client`]: 클러스터 API 추상화 (`ClusterClient` trait)
//! - [`kubernetes`]: kube-rs 구현 (`KubeClusterClient`, `KubePodWatcher`)
//! - [`mock`]: 인메모리 구현 (`MockClusterClient`)
//! - [`watch`]: 스냅샷 기반 이벤트 변환 (`PodTracker`)

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod kubernetes;
pub mod mock;
pub mod watch;

pub use client::ClusterClient;
pub use config::{ClusterClientConfig, ClusterMode};
pub use error::ClusterError;
pub use event::{
    AddPod, DeletePod, PodEvent, PodEventKind, PodEventSenders, PodEventStreams, UpdatePod,
    pod_event_channels,
};
pub use kubernetes::{KubeClusterClient, KubePodWatcher};
pub use mock::MockClusterClient;
pub use watch::PodTracker;
