//! 스캔 대기 작업 큐
//!
//! 발견된 이미지를 디스패치 루프로 넘기는 유한 용량 FIFO 큐입니다.
//! 내부적으로 [`PriorityQueue`]를 사용하며, 삽입 순번의 음수를 우선순위로 두어
//! 가장 먼저 들어온 이미지가 먼저 나옵니다. 같은 이미지는 한 번만 대기합니다.
//!
//! 큐가 가득 찼을 때의 동작은 [`OverflowPolicy`]로 정합니다.
//!
//! | 정책 | 동작 |
//! |------|------|
//! | `Block` | 자리가 날 때까지 `push`가 대기 |
//! | `Reject` | 새 이미지를 거부 (`PushOutcome::Rejected`) |
//! | `DropOldest` | 가장 오래된 이미지를 버리고 새 이미지를 넣음 |
//!
//! 거부되거나 버려진 이미지는 호출 측이 캐시에 "대기 중 아님"으로 되돌려,
//! 이후 폴링 tick에서 다시 넣습니다.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use metrics::{counter, gauge};
use tokio::sync::Notify;

use perceptor_core::metrics as m;
use perceptor_core::priority_queue::PriorityQueue;
use perceptor_core::types::ImageRef;

use crate::error::EngineError;

/// 큐가 가득 찼을 때의 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// 자리가 날 때까지 대기
    #[default]
    Block,
    /// 새 항목 거부
    Reject,
    /// 가장 오래된 항목을 버림
    DropOldest,
}

impl OverflowPolicy {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "block" => Some(Self::Block),
            "reject" => Some(Self::Reject),
            "drop_oldest" => Some(Self::DropOldest),
            _ => None,
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("block"),
            Self::Reject => f.write_str("reject"),
            Self::DropOldest => f.write_str("drop_oldest"),
        }
    }
}

/// `push` 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// 큐에 들어감
    Queued,
    /// 이미 대기 중
    Duplicate,
    /// 큐가 가득 차 거부됨
    Rejected,
    /// 들어갔지만 가장 오래된 이미지가 버려짐
    DroppedOldest(ImageRef),
}

struct Inner {
    heap: PriorityQueue<ImageRef, ()>,
    next_seq: i64,
    closed: bool,
}

/// 유한 용량 이미지 작업 큐
pub struct WorkQueue {
    inner: Mutex<Inner>,
    capacity: usize,
    policy: OverflowPolicy,
    items: Notify,
    space: Notify,
}

impl WorkQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: PriorityQueue::with_capacity(capacity),
                next_seq: 0,
                closed: false,
            }),
            capacity,
            policy,
            items: Notify::new(),
            space: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// 현재 대기 중인 이미지 수
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// 이미지가 대기 중인지 여부
    pub fn contains(&self, image: &ImageRef) -> bool {
        self.lock().heap.has_key(image)
    }

    /// 이미지를 넣습니다.
    ///
    /// `Block` 정책에서는 자리가 날 때까지 대기합니다.
    ///
    /// # Errors
    ///
    /// 큐가 닫혔으면 `EngineError::QueueClosed`
    pub async fn push(&self, image: ImageRef) -> Result<PushOutcome, EngineError> {
        loop {
            let space = self.space.notified();
            {
                let mut inner = self.lock();
                if inner.closed {
                    return Err(EngineError::QueueClosed);
                }
                if inner.heap.has_key(&image) {
                    return Ok(PushOutcome::Duplicate);
                }
                if inner.heap.len() < self.capacity {
                    self.insert(&mut inner, image);
                    return Ok(PushOutcome::Queued);
                }
                match self.policy {
                    OverflowPolicy::Block => {}
                    OverflowPolicy::Reject => {
                        counter!(m::ENGINE_QUEUE_OVERFLOW_TOTAL, m::LABEL_REASON => "rejected")
                            .increment(1);
                        return Ok(PushOutcome::Rejected);
                    }
                    OverflowPolicy::DropOldest => {
                        let dropped = inner.heap.pop().ok().map(|(oldest, ())| oldest);
                        self.insert(&mut inner, image);
                        return Ok(match dropped {
                            Some(oldest) => {
                                counter!(
                                    m::ENGINE_QUEUE_OVERFLOW_TOTAL,
                                    m::LABEL_REASON => "dropped_oldest"
                                )
                                .increment(1);
                                PushOutcome::DroppedOldest(oldest)
                            }
                            None => PushOutcome::Queued,
                        });
                    }
                }
            }
            space.await;
        }
    }

    /// 가장 오래된 이미지를 꺼냅니다.
    ///
    /// 비어 있으면 새 이미지가 들어올 때까지 대기하고,
    /// 닫힌 뒤 비어 있으면 `None`을 반환합니다.
    pub async fn pop(&self) -> Option<ImageRef> {
        loop {
            let items = self.items.notified();
            {
                let mut inner = self.lock();
                if let Ok((image, ())) = inner.heap.pop() {
                    gauge!(m::ENGINE_QUEUE_DEPTH).set(inner.heap.len() as f64);
                    self.space.notify_one();
                    return Some(image);
                }
                if inner.closed {
                    return None;
                }
            }
            items.await;
        }
    }

    /// 큐를 닫습니다. 대기 중인 `push`/`pop`이 모두 깨어납니다.
    pub fn close(&self) {
        self.lock().closed = true;
        self.items.notify_waiters();
        self.space.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn insert(&self, inner: &mut Inner, image: ImageRef) {
        let seq = inner.next_seq;
        inner.next_seq += 1;
        // 키 중복은 호출 전에 확인됨
        if inner.heap.add(image, -seq, ()).is_ok() {
            gauge!(m::ENGINE_QUEUE_DEPTH).set(inner.heap.len() as f64);
            self.items.notify_one();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
