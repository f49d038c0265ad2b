//! 오케스트레이터의 네 루프와 모델 메트릭 발행
//!
//! ```text
//!            PodEventStreams
//!                  │
//!            ┌─────▼─────┐      WorkQueue      ┌──────────┐
//!            │  ingest   ├────────────────────>│ dispatch ├──> ScanBackend::scan
//!            └─────┬─────┘                     └────▲─────┘
//!                  │                                │ resubmit
//!            CacheHandle                       ┌────┴─────┐
//!                  │                           │   poll   ├──> ScanBackend::fetch_project
//!                  │                           └────┬─────┘     (Scheduler tick)
//!                  │                                │ ScanCompletion
//!                  │                           ┌────▼──────┐
//!                  └───────────────────────────┤ writeback ├──> ClusterClient::set_annotations
//!                                              └───────────┘
//! ```
//!
//! 각 루프는 자기 반복의 에러 경계입니다. 외부 협력자의 개별 실패는 기록만 하고
//! 다음 항목으로 넘어가며, 캐시 액터나 큐가 사라진 경우에만 루프가 끝납니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use metrics::{counter, gauge};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use perceptor_cluster::client::ClusterClient;
use perceptor_cluster::error::ClusterError;
use perceptor_cluster::event::{AddPod, DeletePod, PodEventStreams, UpdatePod};
use perceptor_core::annotations::{BlackDuckAnnotations, ImageAnnotation};
use perceptor_core::metrics as m;
use perceptor_core::types::{ImageRef, PodKey};
use perceptor_scanner::backend::ScanBackend;
use perceptor_scanner::error::ScanBackendError;
use perceptor_scanner::job::ScanJob;
use perceptor_scanner::model::is_project_done;

use crate::actor::CacheHandle;
use crate::cache::{DueJob, JobVerdict, PollOutcome};
use crate::config::OrchestratorConfig;
use crate::error::EngineError;
use crate::event::ScanCompletion;
use crate::queue::{PushOutcome, WorkQueue};
use crate::stats::EngineStats;

/// 루프들이 공유하는 협력자와 채널
pub(crate) struct LoopContext<C, S> {
    pub cache: CacheHandle,
    pub queue: Arc<WorkQueue>,
    pub cluster: Arc<C>,
    pub backend: Arc<S>,
    pub config: OrchestratorConfig,
    pub stats: Arc<EngineStats>,
    pub completions: mpsc::UnboundedSender<ScanCompletion>,
    pub resubmits: mpsc::UnboundedSender<ScanJob>,
}

// --- ingest ---

/// 파드 이벤트를 캐시에 반영하고 새 이미지를 작업 큐에 넣습니다.
pub(crate) async fn ingest_loop<C, S>(
    ctx: Arc<LoopContext<C, S>>,
    mut events: PodEventStreams,
    cancel: CancellationToken,
) -> Result<(), EngineError>
where
    C: ClusterClient,
    S: ScanBackend,
{
    info!("ingest loop started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            Some(AddPod { new }) = events.adds.recv() => {
                EngineStats::bump(&ctx.stats.events_ingested);
                let key = new.key();
                let outcome = ctx.cache.add_pod(new).await?;
                if !outcome.added {
                    debug!(pod = %key, "pod already known");
                }
                annotate_joined(&ctx, outcome.annotate);
                enqueue(&ctx, outcome.discovered).await?;
            }
            Some(UpdatePod { new, .. }) = events.updates.recv() => {
                EngineStats::bump(&ctx.stats.events_ingested);
                let change = ctx.cache.update_pod(new).await?;
                annotate_joined(&ctx, change.annotate);
                enqueue(&ctx, change.discovered).await?;
            }
            Some(DeletePod { id }) = events.deletes.recv() => {
                EngineStats::bump(&ctx.stats.events_ingested);
                if ctx.cache.delete_pod(id.clone()).await?.is_none() {
                    debug!(pod = %id, "delete for unknown pod ignored");
                }
            }
            else => return Err(EngineError::EventsClosed),
        }
    }
}

/// 이미 결과가 있는 이미지에 합류한 파드의 어노테이션을 쓰기 루프로 넘깁니다.
fn annotate_joined<C, S>(ctx: &LoopContext<C, S>, completions: Vec<ScanCompletion>) {
    for completion in completions {
        debug!(image = %completion.image, pods = completion.pods.len(), "annotating pods joined after scan");
        if ctx.completions.send(completion).is_err() {
            warn!("writeback loop gone, annotation for joined pod dropped");
        }
    }
}

/// 이미지를 작업 큐에 넣습니다. 넣지 못한 이미지는 캐시에 되돌려 다음 tick에 다시 넣습니다.
async fn enqueue<C, S>(ctx: &LoopContext<C, S>, images: Vec<ImageRef>) -> Result<(), EngineError> {
    for image in images {
        match ctx.queue.push(image.clone()).await? {
            PushOutcome::Queued | PushOutcome::Duplicate => {}
            PushOutcome::Rejected => {
                warn!(image = %image, "work queue full, image deferred");
                ctx.cache.mark_unqueued(image).await?;
            }
            PushOutcome::DroppedOldest(oldest) => {
                warn!(image = %oldest, "work queue full, oldest image deferred");
                ctx.cache.mark_unqueued(oldest).await?;
            }
        }
    }
    Ok(())
}

// --- dispatch ---

/// 작업 큐와 재제출 채널에서 작업을 꺼내 동시성 한도 안에서 스캔을 제출합니다.
pub(crate) async fn dispatch_loop<C, S>(
    ctx: Arc<LoopContext<C, S>>,
    mut resubmits: mpsc::UnboundedReceiver<ScanJob>,
    cancel: CancellationToken,
) -> Result<(), EngineError>
where
    C: ClusterClient,
    S: ScanBackend,
{
    info!(
        concurrency = ctx.config.scan_concurrency,
        "dispatch loop started"
    );
    let permits = Arc::new(Semaphore::new(ctx.config.scan_concurrency));
    let mut scans = JoinSet::new();

    loop {
        while let Some(finished) = scans.try_join_next() {
            if let Err(e) = finished {
                error!(error = %e, "scan task panicked");
            }
        }

        // 허가를 먼저 얻어, 동시성 한도가 찬 동안에는 이미지가 큐에 머문다
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(job) = resubmits.recv() => job,
            image = ctx.queue.pop() => {
                let Some(image) = image else {
                    return Err(EngineError::QueueClosed);
                };
                match ctx.cache.begin_scan(image).await? {
                    Some(job) => job,
                    None => continue,
                }
            }
        };

        scans.spawn(submit_scan(Arc::clone(&ctx), job, permit));
    }

    // 진행 중인 스캔은 중단한다 (drop 시 스캔 프로세스는 종료되고 tarball은 지워짐)
    scans.shutdown().await;
    Ok(())
}

async fn submit_scan<C, S>(ctx: Arc<LoopContext<C, S>>, job: ScanJob, _permit: OwnedSemaphorePermit)
where
    C: ClusterClient,
    S: ScanBackend,
{
    info!(image = %job.image, project = %job.project_name, "submitting scan");
    let result = bounded(ctx.config.scan_timeout, ctx.backend.scan(&job), |limit| {
        ScanBackendError::scanner_failed(
            job.image.as_str(),
            format!("timed out after {}s", limit.as_secs()),
        )
    })
    .await;

    match result {
        Ok(()) => {
            counter!(m::ENGINE_SCANS_SUBMITTED_TOTAL).increment(1);
            EngineStats::bump(&ctx.stats.scans_submitted);
            info!(image = %job.image, project = %job.project_name, "scan submitted");
            if let Err(e) = ctx.cache.scan_submitted(job.project_name.clone()).await {
                warn!(project = %job.project_name, error = %e, "failed to record submission");
            }
        }
        Err(err) => {
            counter!(m::ENGINE_SCANS_FAILED_TOTAL, m::LABEL_KIND => err.as_label()).increment(1);
            EngineStats::bump(&ctx.stats.scans_failed);
            warn!(image = %job.image, project = %job.project_name, error = %err, "scan submission failed");
            match ctx.cache.scan_failed(job.project_name.clone()).await {
                Ok(JobVerdict::Failed(image)) => {
                    warn!(image = %image, "giving up on image after repeated submission failures");
                }
                Ok(_) => {}
                Err(e) => warn!(project = %job.project_name, error = %e, "failed to record submission failure"),
            }
        }
    }
}

// --- poll ---

/// 폴링 tick 하나를 처리합니다.
///
/// 고립된 이미지를 다시 큐에 넣고, 어노테이션 재시도를 내보낸 뒤,
/// 백오프가 끝난 작업을 조회하거나 재제출합니다.
pub(crate) async fn poll_tick<C, S>(ctx: &LoopContext<C, S>)
where
    C: ClusterClient,
    S: ScanBackend,
{
    let plan = match ctx.cache.plan_tick().await {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, "poll tick skipped");
            return;
        }
    };
    debug!(
        tick = plan.tick,
        due = plan.due.len(),
        stranded = plan.stranded.len(),
        reannotate = plan.reannotate.len(),
        "poll tick"
    );

    if let Err(e) = enqueue(ctx, plan.stranded).await {
        warn!(error = %e, "failed to requeue stranded images");
    }
    for completion in plan.reannotate {
        if ctx.completions.send(completion).is_err() {
            warn!("writeback loop gone, annotation retry dropped");
        }
    }

    let mut polls = Vec::with_capacity(plan.due.len());
    for due in plan.due {
        match due {
            DueJob::Resubmit(job) => {
                info!(image = %job.image, project = %job.project_name, "resubmitting scan");
                if ctx.resubmits.send(job).is_err() {
                    warn!("dispatch loop gone, resubmission dropped");
                }
            }
            DueJob::Poll(job) => polls.push(job),
        }
    }

    futures::stream::iter(polls)
        .map(|job| poll_job(ctx, job))
        .buffer_unordered(ctx.config.poll_concurrency)
        .collect::<Vec<()>>()
        .await;
}

async fn poll_job<C, S>(ctx: &LoopContext<C, S>, job: ScanJob)
where
    C: ClusterClient,
    S: ScanBackend,
{
    let fetched = bounded(
        ctx.config.scan_timeout,
        ctx.backend.fetch_project(&job.project_name),
        |limit| ScanBackendError::Fetch {
            project: job.project_name.clone(),
            reason: format!("timed out after {}s", limit.as_secs()),
        },
    )
    .await;

    let (outcome, label) = match fetched {
        Ok(None) => (PollOutcome::NotFound, "not_found"),
        Ok(Some(project)) if is_project_done(&project) => (PollOutcome::Done(project), "done"),
        Ok(Some(_)) => (PollOutcome::NotDone, "not_done"),
        Err(e) => {
            warn!(project = %job.project_name, error = %e, "project fetch failed");
            (PollOutcome::FetchFailed, "error")
        }
    };
    counter!(m::ENGINE_POLLS_TOTAL, m::LABEL_OUTCOME => label).increment(1);
    EngineStats::bump(&ctx.stats.polls);
    debug!(project = %job.project_name, outcome = label, "project polled");

    match ctx.cache.record_poll(job.project_name.clone(), outcome).await {
        Ok(JobVerdict::Completed(completion)) => {
            EngineStats::bump(&ctx.stats.results_merged);
            if ctx.completions.send(completion).is_err() {
                warn!(project = %job.project_name, "writeback loop gone, completion dropped");
            }
        }
        Ok(_) => {}
        Err(e) => warn!(project = %job.project_name, error = %e, "failed to record poll"),
    }
}

// --- writeback ---

/// 완료 이벤트마다 영향받는 파드에 어노테이션을 씁니다.
///
/// 파드마다 읽기-병합-쓰기를 하며, 한 파드의 실패는 나머지 파드 처리를 막지 않습니다.
/// 같은 어노테이션 키를 쓰는 다른 컨트롤러가 없다고 가정합니다.
pub(crate) async fn writeback_loop<C, S>(
    ctx: Arc<LoopContext<C, S>>,
    mut completions: mpsc::UnboundedReceiver<ScanCompletion>,
    cancel: CancellationToken,
) -> Result<(), EngineError>
where
    C: ClusterClient,
    S: ScanBackend,
{
    info!("writeback loop started");
    loop {
        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            completion = completions.recv() => match completion {
                Some(completion) => completion,
                None => return Ok(()),
            },
        };

        let annotation = completion.annotation();
        let mut failed = Vec::new();
        for pod in &completion.pods {
            match write_annotation(&ctx, pod, &completion.image, annotation).await {
                Ok(()) => {
                    counter!(m::ENGINE_ANNOTATIONS_WRITTEN_TOTAL).increment(1);
                    EngineStats::bump(&ctx.stats.annotations_written);
                    debug!(pod = %pod, image = %completion.image, "annotation written");
                }
                Err(ClusterError::PodNotFound(_)) => {
                    debug!(pod = %pod, image = %completion.image, "pod gone, annotation skipped");
                }
                Err(e) => {
                    counter!(m::ENGINE_ANNOTATION_FAILURES_TOTAL).increment(1);
                    EngineStats::bump(&ctx.stats.annotation_failures);
                    warn!(pod = %pod, image = %completion.image, error = %e, "annotation write failed");
                    failed.push(pod.clone());
                }
            }
        }

        info!(
            image = %completion.image,
            pods = completion.pods.len(),
            failed = failed.len(),
            "annotation pass finished"
        );
        ctx.cache
            .annotation_finished(completion.image, failed)
            .await?;
    }
}

async fn write_annotation<C, S>(
    ctx: &LoopContext<C, S>,
    pod: &PodKey,
    image: &ImageRef,
    annotation: ImageAnnotation,
) -> Result<(), ClusterError>
where
    C: ClusterClient,
    S: ScanBackend,
{
    let limit = Some(ctx.config.cluster_timeout);
    let current = bounded(limit, ctx.cluster.get_annotations(pod), |limit| {
        ClusterError::Api(format!("get annotations of {pod} timed out after {limit:?}"))
    })
    .await?;

    let mut merged = BlackDuckAnnotations::from_pod_annotations(&current);
    merged.merge_image(image, annotation);
    let encoded = merged
        .to_pod_annotations()
        .map_err(|e| ClusterError::Serialization(e.to_string()))?;

    bounded(limit, ctx.cluster.set_annotations(pod, encoded), |limit| {
        ClusterError::Api(format!("set annotations of {pod} timed out after {limit:?}"))
    })
    .await
}

// --- model metrics ---

/// 캐시 요약을 게이지로 발행합니다.
pub(crate) async fn publish_model_metrics<C, S>(ctx: &LoopContext<C, S>) {
    let summary = match ctx.cache.summary().await {
        Ok(summary) => summary,
        Err(e) => {
            debug!(error = %e, "model metrics skipped");
            return;
        }
    };
    for (status, count) in &summary.images_by_status {
        gauge!(m::ENGINE_IMAGES, m::LABEL_STATUS => status.to_string()).set(*count as f64);
    }
    gauge!(m::ENGINE_PODS).set(summary.pods as f64);
    gauge!(m::ENGINE_ORPHAN_IMAGES).set(summary.orphan_images as f64);
    gauge!(m::ENGINE_QUEUE_DEPTH).set(ctx.queue.len() as f64);
}

/// `limit`이 있으면 시간 제한을 걸어 실행합니다.
async fn bounded<T, E>(
    limit: Option<Duration>,
    call: impl Future<Output = Result<T, E>>,
    timed_out: impl FnOnce(Duration) -> E,
) -> Result<T, E> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(timed_out(limit))),
        None => call.await,
    }
}
