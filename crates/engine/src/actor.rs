//! 캐시 액터: [`VulnerabilityCache`]를 소유하는 단일 태스크
//!
//! 모든 캐시 변경은 [`CacheHandle`]이 보낸 요청을 액터가 순서대로 처리하는
//! 방식으로만 일어납니다. 요청마다 oneshot 채널로 응답을 돌려받습니다.
//!
//! ```text
//! ingest ──┐
//! dispatch ┼── CacheHandle ──mpsc──> CacheActor (VulnerabilityCache 소유)
//! poll ────┤                    <──oneshot──
//! writeback┘
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use perceptor_core::types::{ImageRef, Pod, PodKey};
use perceptor_scanner::job::ScanJob;

use crate::cache::{
    AddPodOutcome, ImageEntry, JobVerdict, ModelSummary, PodChange, PollOutcome, TickPlan,
    VulnerabilityCache,
};
use crate::error::EngineError;

/// 요청 채널 용량
const REQUEST_CHANNEL_CAPACITY: usize = 256;

enum Request {
    AddPod(Pod, oneshot::Sender<AddPodOutcome>),
    UpdatePod(Pod, oneshot::Sender<PodChange>),
    DeletePod(PodKey, oneshot::Sender<Option<Vec<ImageRef>>>),
    MarkUnqueued(ImageRef),
    BeginScan(ImageRef, oneshot::Sender<Option<ScanJob>>),
    ScanSubmitted(String),
    ScanFailed(String, oneshot::Sender<JobVerdict>),
    PlanTick(oneshot::Sender<TickPlan>),
    RecordPoll(String, PollOutcome, oneshot::Sender<JobVerdict>),
    AnnotationFinished(ImageRef, Vec<PodKey>),
    Image(ImageRef, oneshot::Sender<Option<ImageEntry>>),
    Summary(oneshot::Sender<ModelSummary>),
}

impl Request {
    fn name(&self) -> &'static str {
        match self {
            Self::AddPod(..) => "add_pod",
            Self::UpdatePod(..) => "update_pod",
            Self::DeletePod(..) => "delete_pod",
            Self::MarkUnqueued(..) => "mark_unqueued",
            Self::BeginScan(..) => "begin_scan",
            Self::ScanSubmitted(..) => "scan_submitted",
            Self::ScanFailed(..) => "scan_failed",
            Self::PlanTick(..) => "plan_tick",
            Self::RecordPoll(..) => "record_poll",
            Self::AnnotationFinished(..) => "annotation_finished",
            Self::Image(..) => "image",
            Self::Summary(..) => "summary",
        }
    }
}

/// 캐시를 소유하고 요청을 순서대로 처리하는 액터
pub struct CacheActor {
    cache: VulnerabilityCache,
    requests: mpsc::Receiver<Request>,
}

impl CacheActor {
    /// 액터 태스크를 시작하고 핸들을 반환합니다.
    ///
    /// `cancel`이 취소되거나 모든 핸들이 drop되면 태스크가 끝납니다.
    pub fn spawn(
        cache: VulnerabilityCache,
        cancel: CancellationToken,
    ) -> (CacheHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let actor = Self {
            cache,
            requests: rx,
        };
        let task = tokio::spawn(actor.run(cancel));
        (CacheHandle { requests: tx }, task)
    }

    async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("cache actor stopping (cancelled)");
                    break;
                }
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        debug!("cache actor stopping (all handles dropped)");
                        break;
                    };
                    self.handle(request);
                }
            }
        }
    }

    // 응답 수신 측이 사라진 경우(호출자 취소)는 무시한다.
    fn handle(&mut self, request: Request) {
        let cache = &mut self.cache;
        match request {
            Request::AddPod(pod, reply) => {
                let _ = reply.send(cache.add_pod(pod));
            }
            Request::UpdatePod(pod, reply) => {
                let _ = reply.send(cache.update_pod(pod));
            }
            Request::DeletePod(key, reply) => {
                let _ = reply.send(cache.delete_pod(&key));
            }
            Request::MarkUnqueued(image) => cache.mark_unqueued(&image),
            Request::BeginScan(image, reply) => {
                let _ = reply.send(cache.begin_scan(&image));
            }
            Request::ScanSubmitted(project) => cache.scan_submitted(&project),
            Request::ScanFailed(project, reply) => {
                let _ = reply.send(cache.scan_failed(&project));
            }
            Request::PlanTick(reply) => {
                let _ = reply.send(cache.plan_tick());
            }
            Request::RecordPoll(project, outcome, reply) => {
                let _ = reply.send(cache.record_poll(&project, outcome));
            }
            Request::AnnotationFinished(image, failed) => {
                cache.annotation_finished(&image, failed);
            }
            Request::Image(image, reply) => {
                let _ = reply.send(cache.image(&image).cloned());
            }
            Request::Summary(reply) => {
                let _ = reply.send(cache.summary());
            }
        }
    }
}

/// 캐시 액터에 요청을 보내는 핸들
///
/// 복제 비용이 작으므로 루프마다 하나씩 복제해 사용합니다.
#[derive(Clone)]
pub struct CacheHandle {
    requests: mpsc::Sender<Request>,
}

impl CacheHandle {
    pub async fn add_pod(&self, pod: Pod) -> Result<AddPodOutcome, EngineError> {
        self.call(|reply| Request::AddPod(pod, reply)).await
    }

    pub async fn update_pod(&self, pod: Pod) -> Result<PodChange, EngineError> {
        self.call(|reply| Request::UpdatePod(pod, reply)).await
    }

    pub async fn delete_pod(&self, key: PodKey) -> Result<Option<Vec<ImageRef>>, EngineError> {
        self.call(|reply| Request::DeletePod(key, reply)).await
    }

    pub async fn mark_unqueued(&self, image: ImageRef) -> Result<(), EngineError> {
        self.send(Request::MarkUnqueued(image)).await
    }

    pub async fn begin_scan(&self, image: ImageRef) -> Result<Option<ScanJob>, EngineError> {
        self.call(|reply| Request::BeginScan(image, reply)).await
    }

    pub async fn scan_submitted(&self, project: String) -> Result<(), EngineError> {
        self.send(Request::ScanSubmitted(project)).await
    }

    pub async fn scan_failed(&self, project: String) -> Result<JobVerdict, EngineError> {
        self.call(|reply| Request::ScanFailed(project, reply)).await
    }

    pub async fn plan_tick(&self) -> Result<TickPlan, EngineError> {
        self.call(Request::PlanTick).await
    }

    pub async fn record_poll(
        &self,
        project: String,
        outcome: PollOutcome,
    ) -> Result<JobVerdict, EngineError> {
        self.call(|reply| Request::RecordPoll(project, outcome, reply))
            .await
    }

    /// 어노테이션 쓰기 결과를 알립니다. `failed`는 쓰기에 실패한 파드입니다.
    pub async fn annotation_finished(
        &self,
        image: ImageRef,
        failed: Vec<PodKey>,
    ) -> Result<(), EngineError> {
        self.send(Request::AnnotationFinished(image, failed))
            .await
    }

    /// 이미지 상태의 복사본
    pub async fn image(&self, image: ImageRef) -> Result<Option<ImageEntry>, EngineError> {
        self.call(|reply| Request::Image(image, reply)).await
    }

    pub async fn summary(&self) -> Result<ModelSummary, EngineError> {
        self.call(Request::Summary).await
    }

    async fn send(&self, request: Request) -> Result<(), EngineError> {
        let name = request.name();
        self.requests
            .send(request)
            .await
            .map_err(|_| EngineError::CacheUnavailable(format!("{name}: actor stopped")))
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        let request = make(tx);
        let name = request.name();
        self.send(request).await?;
        rx.await
            .map_err(|_| EngineError::CacheUnavailable(format!("{name}: reply dropped")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perceptor_core::types::{Container, ScanStatus};

    fn pod(name: &str, image: &str) -> Pod {
        Pod {
            namespace: "ns".to_owned(),
            name: name.to_owned(),
            uid: format!("uid-{name}"),
            containers: vec![Container::new("c", image)],
        }
    }

    #[tokio::test]
    async fn requests_are_applied_in_order() {
        // Given
        let cancel = CancellationToken::new();
        let (handle, task) = CacheActor::spawn(VulnerabilityCache::default(), cancel.clone());

        // When
        let outcome = handle.add_pod(pod("p1", "img:1")).await.unwrap();
        let job = handle.begin_scan(ImageRef::from("img:1")).await.unwrap();

        // Then
        assert_eq!(outcome.discovered, vec![ImageRef::from("img:1")]);
        assert_eq!(job.unwrap().project_name, "my-img:1-project-0");
        let entry = handle.image(ImageRef::from("img:1")).await.unwrap().unwrap();
        assert_eq!(entry.status, ScanStatus::ScanningInProgress);
        assert_eq!(handle.summary().await.unwrap().pods, 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stopped_actor_reports_unavailable() {
        let cancel = CancellationToken::new();
        let (handle, task) = CacheActor::spawn(VulnerabilityCache::default(), cancel.clone());
        cancel.cancel();
        task.await.unwrap();

        let err = handle.summary().await.unwrap_err();

        assert!(matches!(err, EngineError::CacheUnavailable(_)));
    }

    #[tokio::test]
    async fn actor_stops_when_handles_drop() {
        let (handle, task) =
            CacheActor::spawn(VulnerabilityCache::default(), CancellationToken::new());
        drop(handle);
        task.await.unwrap();
    }
}
