//! Perceptor 오케스트레이터
//!
//! 캐시 액터, 작업 큐, 네 루프(ingest, dispatch, poll, writeback), 모델 메트릭 발행기를
//! 묶어 하나의 [`Pipeline`]으로 제공합니다.
//!
//! # 실패 정책
//!
//! 루프는 재시작하지 않습니다. 정지 요청 없이 끝난 루프가 있으면 에러 로그를 남기고,
//! 이후 `health_check`가 해당 루프 이름과 함께 `Unhealthy`를 보고합니다.
//!
//! # 재시작 제한
//!
//! 이벤트 스트림은 `start()`에서 소비되므로, `stop()` 후에는
//! [`PerceptorBuilder`]로 새 인스턴스를 만들어야 합니다.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use perceptor_cluster::client::ClusterClient;
use perceptor_cluster::event::{PodEventSenders, PodEventStreams, pod_event_channels};
use perceptor_core::error::{PerceptorError, PipelineError};
use perceptor_core::pipeline::{HealthStatus, Pipeline};
use perceptor_core::scheduler::Scheduler;
use perceptor_core::types::ImageRef;
use perceptor_scanner::backend::ScanBackend;

use crate::actor::{CacheActor, CacheHandle};
use crate::cache::{ImageEntry, ModelSummary, RetryPolicy, VulnerabilityCache};
use crate::config::OrchestratorConfig;
use crate::error::EngineError;
use crate::loops::{self, LoopContext};
use crate::queue::WorkQueue;
use crate::stats::{EngineStats, StatsSnapshot};

/// 기본 파드 이벤트 채널 용량 (외부 스트림 미사용 시)
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// 오케스트레이터 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PerceptorState {
    Initialized,
    Running,
    Stopped,
}

/// 실행 중에만 존재하는 구성 요소
struct Runtime {
    cancel: CancellationToken,
    actor_cancel: CancellationToken,
    cache: CacheHandle,
    queue: Arc<WorkQueue>,
    loops: Vec<JoinHandle<()>>,
    actor: JoinHandle<()>,
}

/// 취약점 스캔 오케스트레이터
pub struct Perceptor<C: ClusterClient, S: ScanBackend> {
    config: OrchestratorConfig,
    cluster: Arc<C>,
    backend: Arc<S>,
    events: Option<PodEventStreams>,
    state: PerceptorState,
    runtime: Option<Runtime>,
    stats: Arc<EngineStats>,
    /// 처음으로 예기치 않게 끝난 루프 이름
    failed_loop: Arc<OnceLock<&'static str>>,
}

impl<C: ClusterClient, S: ScanBackend> Perceptor<C, S> {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PerceptorState::Initialized => "initialized",
            PerceptorState::Running => "running",
            PerceptorState::Stopped => "stopped",
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// 처리 카운터
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 작업 큐에 대기 중인 이미지 수 (실행 중이 아니면 0)
    pub fn queue_depth(&self) -> usize {
        self.runtime.as_ref().map_or(0, |rt| rt.queue.len())
    }

    /// 예기치 않게 끝난 루프 이름
    pub fn failed_loop(&self) -> Option<&'static str> {
        self.failed_loop.get().copied()
    }

    /// 캐시 요약을 조회합니다.
    pub async fn summary(&self) -> Result<ModelSummary, EngineError> {
        self.cache_handle()?.summary().await
    }

    /// 이미지 상태를 조회합니다.
    pub async fn image(&self, image: &ImageRef) -> Result<Option<ImageEntry>, EngineError> {
        self.cache_handle()?.image(image.clone()).await
    }

    fn cache_handle(&self) -> Result<&CacheHandle, EngineError> {
        self.runtime
            .as_ref()
            .map(|rt| &rt.cache)
            .ok_or_else(|| EngineError::CacheUnavailable("perceptor is not running".to_owned()))
    }

    /// 루프를 감시 태스크로 실행합니다.
    fn supervise(
        &self,
        name: &'static str,
        cancel: CancellationToken,
        task: impl Future<Output = Result<(), EngineError>> + Send + 'static,
    ) -> JoinHandle<()> {
        let failed_loop = Arc::clone(&self.failed_loop);
        tokio::spawn(async move {
            let outcome = tokio::spawn(task).await;
            if cancel.is_cancelled() {
                debug!(task = name, "loop stopped");
                return;
            }
            match outcome {
                Ok(Ok(())) => error!(task = name, "loop exited unexpectedly"),
                Ok(Err(e)) => error!(task = name, error = %e, "loop failed"),
                Err(e) => error!(task = name, error = %e, "loop panicked"),
            }
            let _ = failed_loop.set(name);
        })
    }
}

impl<C: ClusterClient, S: ScanBackend> Pipeline for Perceptor<C, S> {
    async fn start(&mut self) -> Result<(), PerceptorError> {
        if self.state == PerceptorState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let events = self.events.take().ok_or_else(|| {
            PipelineError::InitFailed("pod event streams already consumed, rebuild the perceptor".to_owned())
        })?;

        info!(
            queue_capacity = self.config.queue_capacity,
            overflow_policy = %self.config.overflow_policy,
            scan_concurrency = self.config.scan_concurrency,
            poll_concurrency = self.config.poll_concurrency,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "starting perceptor"
        );

        let cancel = CancellationToken::new();
        let actor_cancel = CancellationToken::new();
        let policy = RetryPolicy {
            max_poll_attempts: self.config.max_poll_attempts,
            max_result_errors: self.config.max_result_errors,
            max_backoff_ticks: self.config.max_backoff_ticks,
        };
        let (cache, actor) = CacheActor::spawn(VulnerabilityCache::new(policy), actor_cancel.clone());
        let queue = Arc::new(WorkQueue::new(
            self.config.queue_capacity,
            self.config.overflow_policy,
        ));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (resubmits_tx, resubmits_rx) = mpsc::unbounded_channel();

        let ctx = Arc::new(LoopContext {
            cache: cache.clone(),
            queue: Arc::clone(&queue),
            cluster: Arc::clone(&self.cluster),
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
            completions: completions_tx,
            resubmits: resubmits_tx,
        });

        let mut tasks = vec![
            self.supervise(
                "ingest",
                cancel.clone(),
                loops::ingest_loop(Arc::clone(&ctx), events, cancel.clone()),
            ),
            self.supervise(
                "dispatch",
                cancel.clone(),
                loops::dispatch_loop(Arc::clone(&ctx), resubmits_rx, cancel.clone()),
            ),
            self.supervise(
                "writeback",
                cancel.clone(),
                loops::writeback_loop(Arc::clone(&ctx), completions_rx, cancel.clone()),
            ),
        ];

        let poll_ctx = Arc::clone(&ctx);
        let mut poll = Scheduler::new_running(
            "poll",
            self.config.poll_interval,
            cancel.clone(),
            false,
            move || {
                let ctx = Arc::clone(&poll_ctx);
                async move { loops::poll_tick(&ctx).await }
            },
        )
        .await?;
        tasks.push(self.supervise("poll", cancel.clone(), async move {
            poll.join().await;
            Ok(())
        }));

        let metrics_ctx = Arc::clone(&ctx);
        let mut model_metrics = Scheduler::new_running(
            "model-metrics",
            self.config.model_metrics_interval,
            cancel.clone(),
            true,
            move || {
                let ctx = Arc::clone(&metrics_ctx);
                async move { loops::publish_model_metrics(&ctx).await }
            },
        )
        .await?;
        tasks.push(self.supervise("model-metrics", cancel.clone(), async move {
            model_metrics.join().await;
            Ok(())
        }));

        self.runtime = Some(Runtime {
            cancel,
            actor_cancel,
            cache,
            queue,
            loops: tasks,
            actor,
        });
        self.state = PerceptorState::Running;
        info!("perceptor started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PerceptorError> {
        if self.state != PerceptorState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        let Some(runtime) = self.runtime.take() else {
            return Err(PipelineError::NotRunning.into());
        };

        info!("stopping perceptor");
        runtime.cancel.cancel();
        runtime.queue.close();
        for task in runtime.loops {
            let _ = task.await;
        }

        // 루프가 모두 끝난 뒤에 캐시 액터를 정지한다
        runtime.actor_cancel.cancel();
        let _ = runtime.actor.await;

        self.state = PerceptorState::Stopped;
        info!(stats = ?self.stats.snapshot(), "perceptor stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PerceptorState::Running => {
                if let Some(name) = self.failed_loop() {
                    return HealthStatus::Unhealthy(format!("{name} loop exited"));
                }
                match &self.runtime {
                    Some(rt) if rt.queue.len() >= rt.queue.capacity() => {
                        HealthStatus::Degraded("work queue full".to_owned())
                    }
                    _ => HealthStatus::Healthy,
                }
            }
            PerceptorState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PerceptorState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// [`Perceptor`] 빌더
///
/// 파드 이벤트 스트림을 지정하지 않으면 빌더가 채널을 만들고 송신 측을 돌려줍니다.
pub struct PerceptorBuilder<C, S> {
    config: OrchestratorConfig,
    cluster: Option<Arc<C>>,
    backend: Option<Arc<S>>,
    events: Option<PodEventStreams>,
    event_channel_capacity: usize,
}

impl<C: ClusterClient, S: ScanBackend> PerceptorBuilder<C, S> {
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            cluster: None,
            backend: None,
            events: None,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cluster(mut self, cluster: Arc<C>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn backend(mut self, backend: Arc<S>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// 외부 이벤트 소스가 만든 스트림을 사용합니다.
    pub fn events(mut self, events: PodEventStreams) -> Self {
        self.events = Some(events);
        self
    }

    /// 이벤트 채널 용량 (외부 스트림 미사용 시)
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// 오케스트레이터를 빌드합니다.
    ///
    /// # Returns
    ///
    /// - `Perceptor`: 오케스트레이터 인스턴스
    /// - `Option<PodEventSenders>`: 이벤트 송신 측 (외부 스트림을 지정한 경우 None)
    ///
    /// # Errors
    ///
    /// - 설정 검증 실패 시 `EngineError::Config`
    /// - 클러스터/백엔드 미지정 시 `EngineError::MissingComponent`
    pub fn build(self) -> Result<(Perceptor<C, S>, Option<PodEventSenders>), EngineError> {
        self.config.validate()?;
        let cluster = self.cluster.ok_or(EngineError::MissingComponent("cluster"))?;
        let backend = self.backend.ok_or(EngineError::MissingComponent("backend"))?;

        let (events, senders) = match self.events {
            Some(events) => (events, None),
            None => {
                if self.event_channel_capacity == 0 {
                    return Err(EngineError::Config {
                        field: "event_channel_capacity".to_owned(),
                        reason: "must be greater than 0".to_owned(),
                    });
                }
                let (senders, events) = pod_event_channels(self.event_channel_capacity);
                (events, Some(senders))
            }
        };

        let perceptor = Perceptor {
            config: self.config,
            cluster,
            backend,
            events: Some(events),
            state: PerceptorState::Initialized,
            runtime: None,
            stats: EngineStats::new(),
            failed_loop: Arc::new(OnceLock::new()),
        };
        Ok((perceptor, senders))
    }
}

impl<C: ClusterClient, S: ScanBackend> Default for PerceptorBuilder<C, S> {
    fn default() -> Self {
        Self::new()
    }
}
