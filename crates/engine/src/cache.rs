//! 취약점 캐시: 파드/이미지/스캔 상태의 단일 진실 공급원
//!
//! [`VulnerabilityCache`]는 동기 상태 기계입니다. 잠금도 I/O도 없으며,
//! [`CacheActor`](crate::actor::CacheActor) 하나가 독점 소유하고
//! 다른 태스크는 메시지로만 접근합니다.
//!
//! # 이미지 상태 전이
//!
//! ```text
//! NotScanned --begin_scan--> ScanningInProgress --record_poll(Done)--> AnnotatingPods
//!                                   |                                       |
//!                                   | 재시도 한도 초과                       | 진행 중인 쓰기가 모두 끝남
//!                                   v                                       v
//!                                 Failed                                 Scanned
//! ```
//!
//! 결과가 병합된 뒤(`AnnotatingPods`, `Scanned`)에 이미지를 참조하게 된 파드는
//! 그 파드만 대상으로 하는 완료 이벤트를 받습니다. 쓰기에 실패한 파드는
//! 백오프 후 다시 내보내며, 연속 실패가 `max_result_errors`를 넘으면 포기합니다.
//!
//! # 불변식
//!
//! - 이미지마다 진행 중인 스캔 작업은 최대 하나 (`image_jobs`)
//! - 캐시에 있는 모든 이미지는 생성 시점에 적어도 하나의 파드가 참조함
//! - 이미지는 삭제되지 않음 (참조하는 파드가 없어진 이미지는 고아로 남음)

use std::collections::{BTreeMap, BTreeSet, HashMap};

use metrics::counter;
use tracing::{debug, info, warn};

use perceptor_core::metrics as m;
use perceptor_core::types::{ImageRef, Pod, PodKey, ScanCounts, ScanStatus, Vulnerability};
use perceptor_scanner::error::ScanResultsError;
use perceptor_scanner::job::ScanJob;
use perceptor_scanner::model::Project;

use crate::event::ScanCompletion;

/// 재시도 한도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 미완료 조회 허용 횟수 (0이면 무제한)
    pub max_poll_attempts: u32,
    /// 제출/조회/결과 오류 허용 횟수
    pub max_result_errors: u32,
    /// 오류 백오프 상한 (tick 수)
    pub max_backoff_ticks: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_poll_attempts: 360,
            max_result_errors: 5,
            max_backoff_ticks: 32,
        }
    }
}

impl RetryPolicy {
    /// `errors`번째 오류 뒤 다음 조회까지의 tick 수 (`2^errors`, 상한 적용)
    pub fn backoff_ticks(&self, errors: u32) -> u64 {
        1u64.checked_shl(errors)
            .unwrap_or(u64::MAX)
            .min(u64::from(self.max_backoff_ticks))
            .max(1)
    }
}

/// 캐시에 저장된 이미지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub status: ScanStatus,
    pub counts: ScanCounts,
    pub vulnerabilities: Vec<Vulnerability>,
    /// 이 이미지를 참조하는 파드
    pub pods: BTreeSet<PodKey>,
    /// 작업 큐에 들어가 있는지 여부
    queued: bool,
    /// 어노테이션 쓰기를 다시 해야 하는 파드
    annotation_retry: BTreeSet<PodKey>,
    /// 내보냈지만 아직 결과가 오지 않은 어노테이션 쓰기 수
    annotations_in_flight: u32,
    /// 연속으로 실패한 어노테이션 쓰기 수
    annotation_failures: u32,
    /// 어노테이션 재시도가 가능한 tick
    next_annotation_tick: u64,
}

impl ImageEntry {
    fn discovered() -> Self {
        Self {
            status: ScanStatus::NotScanned,
            counts: ScanCounts::default(),
            vulnerabilities: Vec::new(),
            pods: BTreeSet::new(),
            queued: true,
            annotation_retry: BTreeSet::new(),
            annotations_in_flight: 0,
            annotation_failures: 0,
            next_annotation_tick: 0,
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.pods.is_empty()
    }

    /// 결과가 병합되어 파드에 기록할 수 있는 상태인지 여부
    pub fn has_results(&self) -> bool {
        matches!(
            self.status,
            ScanStatus::AnnotatingPods | ScanStatus::Scanned
        )
    }

    /// 연속으로 실패한 어노테이션 쓰기 수
    pub fn annotation_failures(&self) -> u32 {
        self.annotation_failures
    }

    /// 어노테이션 재시도를 기다리는 파드
    pub fn annotation_retry(&self) -> &BTreeSet<PodKey> {
        &self.annotation_retry
    }

    /// `pods`를 대상으로 하는 완료 이벤트를 만들고 진행 중으로 기록합니다.
    fn emit(&mut self, image: &ImageRef, pods: Vec<PodKey>) -> ScanCompletion {
        self.annotations_in_flight += 1;
        ScanCompletion {
            image: image.clone(),
            counts: self.counts,
            pods,
        }
    }

    fn transition(&mut self, image: &ImageRef, next: ScanStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(image = %image, from = %self.status, to = %next, "invalid status transition ignored");
            return false;
        }
        debug!(image = %image, from = %self.status, to = %next, "image status changed");
        self.status = next;
        true
    }
}

/// 진행 중인 스캔 작업
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
    pub job: ScanJob,
    /// 미완료로 끝난 조회 수
    pub poll_attempts: u32,
    /// 제출/조회/결과 오류 수
    pub errors: u32,
    /// 다음 조회 tick
    next_poll_tick: u64,
    /// 제출이 진행 중인지 여부 (진행 중에는 조회하지 않음)
    submitting: bool,
    /// 제출을 다시 해야 하는지 여부
    resubmit: bool,
}

/// 파드 추가 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddPodOutcome {
    /// 새 파드로 기록되었는지 여부 (`false`면 중복)
    pub added: bool,
    /// 새로 발견되어 스캔이 필요한 이미지
    pub discovered: Vec<ImageRef>,
    /// 이미 결과가 있는 이미지에 대해 이 파드에 쓸 완료 이벤트
    pub annotate: Vec<ScanCompletion>,
}

/// 파드 변경 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodChange {
    /// 새로 발견되어 스캔이 필요한 이미지
    pub discovered: Vec<ImageRef>,
    /// 이 파드가 더 이상 참조하지 않는 이미지
    pub released: Vec<ImageRef>,
    /// 이미 결과가 있는 이미지에 대해 이 파드에 쓸 완료 이벤트
    pub annotate: Vec<ScanCompletion>,
}

/// 파드-이미지 참조를 기록한 결과
enum Attachment {
    /// 새 이미지
    Discovered,
    /// 스캔 전이거나 스캔 중인 이미지
    Pending,
    /// 결과가 있는 이미지 (파드에 바로 써야 함)
    Ready(ScanCompletion),
}

/// 조회 tick에 처리할 작업
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueJob {
    /// 프로젝트 상태 조회
    Poll(ScanJob),
    /// 실패했던 제출을 다시 시도
    Resubmit(ScanJob),
}

/// 백엔드 조회 결과
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// 프로젝트가 아직 없음
    NotFound,
    /// 프로젝트는 있으나 완료되지 않음
    NotDone,
    /// 조회 실패
    FetchFailed,
    /// 완료된 프로젝트
    Done(Project),
}

/// 조회 결과 반영 후의 판정
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobVerdict {
    /// 다음 tick에 다시 조회
    Pending,
    /// 결과가 병합됨
    Completed(ScanCompletion),
    /// 재시도 한도를 넘어 이미지가 실패 처리됨
    Failed(ImageRef),
    /// 이미 종료된 작업
    Unknown,
}

/// 조회 tick 하나의 작업 계획
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickPlan {
    pub tick: u64,
    /// 조회/재제출할 작업
    pub due: Vec<DueJob>,
    /// 큐에 없는 미스캔 이미지 (다시 넣어야 함)
    pub stranded: Vec<ImageRef>,
    /// 어노테이션 쓰기를 다시 해야 하는 완료 이벤트
    pub reannotate: Vec<ScanCompletion>,
}

/// 모델 요약 (메트릭/진단용)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSummary {
    pub pods: usize,
    /// [`ScanStatus::ALL`] 순서의 상태별 이미지 수
    pub images_by_status: Vec<(ScanStatus, usize)>,
    pub orphan_images: usize,
    pub in_progress_jobs: usize,
}

impl ModelSummary {
    pub fn images(&self) -> usize {
        self.images_by_status.iter().map(|(_, n)| n).sum()
    }

    pub fn count(&self, status: ScanStatus) -> usize {
        self.images_by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, n)| *n)
    }
}

/// 취약점 캐시
#[derive(Debug, Default)]
pub struct VulnerabilityCache {
    policy: RetryPolicy,
    pods: BTreeMap<PodKey, Pod>,
    images: BTreeMap<ImageRef, ImageEntry>,
    /// 프로젝트 이름 → 작업
    jobs: HashMap<String, JobEntry>,
    /// 이미지 → 프로젝트 이름
    image_jobs: HashMap<ImageRef, String>,
    project_counter: u64,
    tick: u64,
}

impl VulnerabilityCache {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn pod(&self, key: &PodKey) -> Option<&Pod> {
        self.pods.get(key)
    }

    pub fn image(&self, image: &ImageRef) -> Option<&ImageEntry> {
        self.images.get(image)
    }

    /// 이미지에 대해 진행 중인 작업
    pub fn job_for(&self, image: &ImageRef) -> Option<&JobEntry> {
        self.image_jobs
            .get(image)
            .and_then(|project| self.jobs.get(project))
    }

    pub fn in_progress_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// 파드를 추가합니다.
    ///
    /// 같은 키와 UID의 파드가 이미 있으면 아무것도 하지 않습니다.
    /// 키는 같지만 UID가 다르면(재생성된 파드) 새 파드로 다시 기록합니다.
    /// 재생성된 파드에는 이전 어노테이션이 없으므로 결과가 있는 이미지를 모두 다시 씁니다.
    pub fn add_pod(&mut self, pod: Pod) -> AddPodOutcome {
        let key = pod.key();
        if let Some(existing) = self.pods.get(&key) {
            if existing.uid == pod.uid {
                debug!(pod = %key, "duplicate pod add ignored");
                return AddPodOutcome::default();
            }
            debug!(pod = %key, "pod recreated");
            self.delete_pod(&key);
        }

        let mut outcome = AddPodOutcome {
            added: true,
            ..AddPodOutcome::default()
        };
        for image in pod.images() {
            match self.attach(&image, &key) {
                Attachment::Discovered => outcome.discovered.push(image),
                Attachment::Pending => {}
                Attachment::Ready(completion) => outcome.annotate.push(completion),
            }
        }
        debug!(
            pod = %key,
            discovered = outcome.discovered.len(),
            annotate = outcome.annotate.len(),
            "pod added"
        );
        self.pods.insert(key, pod);
        outcome
    }

    /// 파드 스냅샷을 교체하고 이미지 참조를 증분 반영합니다.
    ///
    /// 모르는 파드면 추가로 처리합니다.
    pub fn update_pod(&mut self, pod: Pod) -> PodChange {
        let key = pod.key();
        let Some(old) = self.pods.get(&key) else {
            let outcome = self.add_pod(pod);
            return PodChange {
                discovered: outcome.discovered,
                released: Vec::new(),
                annotate: outcome.annotate,
            };
        };

        let old_images: BTreeSet<ImageRef> = old.images().into_iter().collect();
        let new_images: BTreeSet<ImageRef> = pod.images().into_iter().collect();

        let mut change = PodChange::default();
        for image in old_images.difference(&new_images) {
            self.detach(image, &key);
            change.released.push(image.clone());
        }
        for image in new_images.difference(&old_images) {
            match self.attach(image, &key) {
                Attachment::Discovered => change.discovered.push(image.clone()),
                Attachment::Pending => {}
                Attachment::Ready(completion) => change.annotate.push(completion),
            }
        }
        debug!(
            pod = %key,
            discovered = change.discovered.len(),
            released = change.released.len(),
            annotate = change.annotate.len(),
            "pod updated"
        );
        self.pods.insert(key, pod);
        change
    }

    /// 파드를 제거하고, 더 이상 참조하지 않게 된 이미지를 반환합니다.
    pub fn delete_pod(&mut self, key: &PodKey) -> Option<Vec<ImageRef>> {
        let pod = self.pods.remove(key)?;
        let released = pod.images();
        for image in &released {
            self.detach(image, key);
        }
        debug!(pod = %key, released = released.len(), "pod deleted");
        Some(released)
    }

    /// 파드-이미지 참조를 기록합니다.
    fn attach(&mut self, image: &ImageRef, pod: &PodKey) -> Attachment {
        let Some(entry) = self.images.get_mut(image) else {
            let mut entry = ImageEntry::discovered();
            entry.pods.insert(pod.clone());
            self.images.insert(image.clone(), entry);
            counter!(m::ENGINE_IMAGES_DISCOVERED_TOTAL).increment(1);
            info!(image = %image, pod = %pod, "new image discovered");
            return Attachment::Discovered;
        };
        if !entry.pods.insert(pod.clone()) || !entry.has_results() {
            return Attachment::Pending;
        }
        debug!(image = %image, pod = %pod, status = %entry.status, "pod joined scanned image");
        Attachment::Ready(entry.emit(image, vec![pod.clone()]))
    }

    fn detach(&mut self, image: &ImageRef, pod: &PodKey) {
        if let Some(entry) = self.images.get_mut(image) {
            entry.pods.remove(pod);
        }
    }

    /// 큐에 넣지 못한 이미지를 "대기 중 아님"으로 되돌립니다.
    pub fn mark_unqueued(&mut self, image: &ImageRef) {
        if let Some(entry) = self.images.get_mut(image) {
            entry.queued = false;
        }
    }

    /// 스캔을 시작합니다.
    ///
    /// `NotScanned` 이미지만 `ScanningInProgress`로 옮기고 작업을 기록합니다.
    /// 다른 상태이거나 이미 작업이 있으면 `None`입니다.
    pub fn begin_scan(&mut self, image: &ImageRef) -> Option<ScanJob> {
        if self.image_jobs.contains_key(image) {
            debug!(image = %image, "scan already in flight, dispatch suppressed");
            return None;
        }
        let entry = self.images.get_mut(image)?;
        entry.queued = false;
        if !entry.transition(image, ScanStatus::ScanningInProgress) {
            return None;
        }

        let project = ScanJob::project_name_for(image, self.project_counter);
        self.project_counter += 1;
        let job = ScanJob::new(project.clone(), image.clone());
        self.image_jobs.insert(image.clone(), project.clone());
        self.jobs.insert(
            project,
            JobEntry {
                job: job.clone(),
                poll_attempts: 0,
                errors: 0,
                next_poll_tick: self.tick + 1,
                submitting: true,
                resubmit: false,
            },
        );
        Some(job)
    }

    /// 제출이 성공했음을 기록합니다.
    pub fn scan_submitted(&mut self, project: &str) {
        if let Some(entry) = self.jobs.get_mut(project) {
            entry.submitting = false;
            entry.resubmit = false;
            entry.next_poll_tick = self.tick + 1;
        }
    }

    /// 제출이 실패했음을 기록합니다. 한도 안이면 백오프 후 다시 제출합니다.
    pub fn scan_failed(&mut self, project: &str) -> JobVerdict {
        let verdict = self.record_error(project, "scan_failed");
        if let Some(entry) = self.jobs.get_mut(project) {
            entry.submitting = false;
            entry.resubmit = true;
        }
        verdict
    }

    /// 다음 조회 tick으로 진행하고 처리할 작업을 계획합니다.
    pub fn plan_tick(&mut self) -> TickPlan {
        self.tick += 1;
        let tick = self.tick;

        let mut due: Vec<DueJob> = Vec::new();
        for entry in self.jobs.values_mut() {
            if entry.submitting || entry.next_poll_tick > tick {
                continue;
            }
            if entry.resubmit {
                entry.submitting = true;
                due.push(DueJob::Resubmit(entry.job.clone()));
            } else {
                due.push(DueJob::Poll(entry.job.clone()));
            }
        }

        let mut stranded = Vec::new();
        let mut reannotate = Vec::new();
        for (image, entry) in &mut self.images {
            if entry.status == ScanStatus::NotScanned && !entry.queued {
                entry.queued = true;
                stranded.push(image.clone());
            }
            if entry.annotation_retry.is_empty() || entry.next_annotation_tick > tick {
                continue;
            }
            // 그사이 이미지를 떠난 파드는 제외
            let retry = std::mem::take(&mut entry.annotation_retry);
            let pods: Vec<PodKey> = retry
                .into_iter()
                .filter(|pod| entry.pods.contains(pod))
                .collect();
            if pods.is_empty() {
                entry.annotation_failures = 0;
                if entry.annotations_in_flight == 0 && entry.status == ScanStatus::AnnotatingPods {
                    entry.transition(image, ScanStatus::Scanned);
                }
                continue;
            }
            reannotate.push(entry.emit(image, pods));
        }

        TickPlan {
            tick,
            due,
            stranded,
            reannotate,
        }
    }

    /// 조회 결과를 반영합니다.
    pub fn record_poll(&mut self, project: &str, outcome: PollOutcome) -> JobVerdict {
        if !self.jobs.contains_key(project) {
            return JobVerdict::Unknown;
        }
        match outcome {
            PollOutcome::NotFound | PollOutcome::NotDone => self.record_miss(project),
            PollOutcome::FetchFailed => self.record_error(project, "fetch_failed"),
            PollOutcome::Done(status) => match self.add_scan_result(project, &status) {
                Ok(Some(completion)) => JobVerdict::Completed(completion),
                Ok(None) => JobVerdict::Unknown,
                Err(e) => {
                    warn!(project, error = %e, "malformed scan result");
                    self.record_error(project, "malformed_result")
                }
            },
        }
    }

    /// 완료된 프로젝트 결과를 이미지에 병합합니다.
    ///
    /// 성공하면 작업을 제거하고 이미지를 `AnnotatingPods`로 옮긴 뒤,
    /// 지금 이 이미지를 참조하는 파드로 완료 이벤트를 만듭니다.
    /// 모르는 프로젝트면 `Ok(None)`입니다.
    ///
    /// # Errors
    ///
    /// 결과 구조가 잘못되었으면 `ScanResultsError`를 반환하고 상태는 바뀌지 않습니다.
    pub fn add_scan_result(
        &mut self,
        project: &str,
        status: &Project,
    ) -> Result<Option<ScanCompletion>, ScanResultsError> {
        let Some(job) = self.jobs.get(project).map(|entry| entry.job.clone()) else {
            return Ok(None);
        };
        let results = status.scan_results()?;

        self.remove_job(project);
        let Some(entry) = self.images.get_mut(&job.image) else {
            return Ok(None);
        };
        if !entry.transition(&job.image, ScanStatus::AnnotatingPods) {
            return Ok(None);
        }
        entry.counts = results.counts;
        entry.vulnerabilities = results.vulnerabilities;
        entry.annotation_failures = 0;
        entry.annotation_retry.clear();
        counter!(m::ENGINE_RESULTS_MERGED_TOTAL).increment(1);
        info!(
            image = %job.image,
            project,
            policy_violations = entry.counts.policy_violation_count,
            vulnerabilities = entry.counts.vulnerability_count,
            pods = entry.pods.len(),
            "scan results merged"
        );

        let pods = entry.pods.iter().cloned().collect();
        Ok(Some(entry.emit(&job.image, pods)))
    }

    /// 완료 이벤트 하나의 어노테이션 쓰기 결과를 반영합니다.
    ///
    /// `failed`는 쓰기에 실패한 파드입니다. 실패한 파드는 백오프 후 다시 내보내고,
    /// 연속 실패가 `max_result_errors`를 넘으면 재시도를 포기합니다.
    /// 진행 중인 쓰기와 재시도할 파드가 모두 없어지면 `Scanned`로 옮깁니다.
    pub fn annotation_finished(&mut self, image: &ImageRef, failed: Vec<PodKey>) {
        let tick = self.tick;
        let policy = self.policy;
        let Some(entry) = self.images.get_mut(image) else {
            return;
        };
        entry.annotations_in_flight = entry.annotations_in_flight.saturating_sub(1);

        if failed.is_empty() {
            if entry.annotation_retry.is_empty() {
                entry.annotation_failures = 0;
            }
        } else {
            entry.annotation_failures += 1;
            if entry.annotation_failures > policy.max_result_errors {
                counter!(m::ENGINE_ANNOTATIONS_ABANDONED_TOTAL).increment(1);
                warn!(
                    image = %image,
                    pods = failed.len(),
                    failures = entry.annotation_failures,
                    "giving up on annotation writes"
                );
                entry.annotation_failures = 0;
                entry.annotation_retry.clear();
            } else {
                entry.next_annotation_tick =
                    tick.saturating_add(policy.backoff_ticks(entry.annotation_failures));
                debug!(
                    image = %image,
                    pods = failed.len(),
                    failures = entry.annotation_failures,
                    next_annotation_tick = entry.next_annotation_tick,
                    "annotation retry scheduled"
                );
                entry.annotation_retry.extend(failed);
            }
        }

        if entry.status == ScanStatus::AnnotatingPods
            && entry.annotations_in_flight == 0
            && entry.annotation_retry.is_empty()
        {
            entry.transition(image, ScanStatus::Scanned);
        }
    }

    /// 모델 요약을 만듭니다.
    pub fn summary(&self) -> ModelSummary {
        let images_by_status = ScanStatus::ALL
            .iter()
            .map(|status| {
                let n = self
                    .images
                    .values()
                    .filter(|entry| entry.status == *status)
                    .count();
                (*status, n)
            })
            .collect();
        ModelSummary {
            pods: self.pods.len(),
            images_by_status,
            orphan_images: self.images.values().filter(|e| e.is_orphan()).count(),
            in_progress_jobs: self.jobs.len(),
        }
    }

    fn record_miss(&mut self, project: &str) -> JobVerdict {
        let tick = self.tick;
        let Some(entry) = self.jobs.get_mut(project) else {
            return JobVerdict::Unknown;
        };
        entry.poll_attempts += 1;
        entry.next_poll_tick = tick + 1;
        let limit = self.policy.max_poll_attempts;
        if limit > 0 && entry.poll_attempts > limit {
            return self.fail_job(project, "poll_attempts_exceeded");
        }
        JobVerdict::Pending
    }

    fn record_error(&mut self, project: &str, reason: &'static str) -> JobVerdict {
        let tick = self.tick;
        let policy = self.policy;
        let Some(entry) = self.jobs.get_mut(project) else {
            return JobVerdict::Unknown;
        };
        entry.errors += 1;
        entry.next_poll_tick = tick.saturating_add(policy.backoff_ticks(entry.errors));
        debug!(
            project,
            reason,
            errors = entry.errors,
            next_poll_tick = entry.next_poll_tick,
            "job error recorded"
        );
        if entry.errors > policy.max_result_errors {
            return self.fail_job(project, reason);
        }
        JobVerdict::Pending
    }

    fn fail_job(&mut self, project: &str, reason: &'static str) -> JobVerdict {
        let Some(entry) = self.remove_job(project) else {
            return JobVerdict::Unknown;
        };
        let image = entry.job.image;
        if let Some(image_entry) = self.images.get_mut(&image) {
            image_entry.transition(&image, ScanStatus::Failed);
        }
        counter!(m::ENGINE_IMAGES_FAILED_TOTAL, m::LABEL_REASON => reason).increment(1);
        warn!(
            image = %image,
            project,
            reason,
            poll_attempts = entry.poll_attempts,
            errors = entry.errors,
            "image scan failed permanently"
        );
        JobVerdict::Failed(image)
    }

    fn remove_job(&mut self, project: &str) -> Option<JobEntry> {
        let entry = self.jobs.remove(project)?;
        self.image_jobs.remove(&entry.job.image);
        Some(entry)
    }
}
