//! 파드 이벤트: 클러스터에서 엔진으로 흐르는 세 종류의 변경 알림
//!
//! 종류별로 독립된 bounded 채널을 사용하므로 한 종류의 적체가
//! 다른 종류의 전달을 막지 않습니다.
//!
//! ```text
//! watcher ──> PodEventSenders ──┬── adds    ──> ingest loop
//!                               ├── updates ──>
//!                               └── deletes ──>
//! ```

use std::fmt;

use metrics::counter;
use tokio::sync::mpsc;

use perceptor_core::metrics as m;
use perceptor_core::types::{Pod, PodKey};

use crate::error::ClusterError;

/// 새 파드 생성
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPod {
    pub new: Pod,
}

/// 기존 파드 변경 (이전/이후 스냅샷)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePod {
    pub old: Pod,
    pub new: Pod,
}

/// 파드 삭제
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePod {
    pub id: PodKey,
}

/// 세 이벤트 중 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodEvent {
    Add(AddPod),
    Update(UpdatePod),
    Delete(DeletePod),
}

impl PodEvent {
    /// 메트릭/로그용 종류 이름
    pub fn kind(&self) -> PodEventKind {
        match self {
            Self::Add(_) => PodEventKind::Add,
            Self::Update(_) => PodEventKind::Update,
            Self::Delete(_) => PodEventKind::Delete,
        }
    }

    /// 대상 파드 키
    pub fn pod_key(&self) -> PodKey {
        match self {
            Self::Add(e) => e.new.key(),
            Self::Update(e) => e.new.key(),
            Self::Delete(e) => e.id.clone(),
        }
    }
}

/// 파드 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodEventKind {
    Add,
    Update,
    Delete,
}

impl PodEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for PodEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 엔진이 소비하는 수신 측 스트림 묶음
pub struct PodEventStreams {
    pub adds: mpsc::Receiver<AddPod>,
    pub updates: mpsc::Receiver<UpdatePod>,
    pub deletes: mpsc::Receiver<DeletePod>,
}

/// 이벤트 소스가 사용하는 송신 측 묶음
#[derive(Clone)]
pub struct PodEventSenders {
    adds: mpsc::Sender<AddPod>,
    updates: mpsc::Sender<UpdatePod>,
    deletes: mpsc::Sender<DeletePod>,
}

impl PodEventSenders {
    /// 이벤트를 종류에 맞는 채널로 보냅니다. 채널이 가득 차면 대기합니다.
    pub async fn send(&self, event: PodEvent) -> Result<(), ClusterError> {
        let kind = event.kind();
        let result = match event {
            PodEvent::Add(e) => self.adds.send(e).await.map_err(|_| ()),
            PodEvent::Update(e) => self.updates.send(e).await.map_err(|_| ()),
            PodEvent::Delete(e) => self.deletes.send(e).await.map_err(|_| ()),
        };
        result.map_err(|()| ClusterError::ChannelClosed(format!("{kind} receiver dropped")))?;
        counter!(m::CLUSTER_POD_EVENTS_TOTAL, m::LABEL_KIND => kind.as_str()).increment(1);
        Ok(())
    }

    /// 모든 수신 측이 닫혔는지 여부
    pub fn is_closed(&self) -> bool {
        self.adds.is_closed() && self.updates.is_closed() && self.deletes.is_closed()
    }
}

/// 종류별 용량 `capacity`의 이벤트 채널 묶음을 생성합니다.
pub fn pod_event_channels(capacity: usize) -> (PodEventSenders, PodEventStreams) {
    let (adds_tx, adds_rx) = mpsc::channel(capacity);
    let (updates_tx, updates_rx) = mpsc::channel(capacity);
    let (deletes_tx, deletes_rx) = mpsc::channel(capacity);
    (
        PodEventSenders {
            adds: adds_tx,
            updates: updates_tx,
            deletes: deletes_tx,
        },
        PodEventStreams {
            adds: adds_rx,
            updates: updates_rx,
            deletes: deletes_rx,
        },
    )
}
