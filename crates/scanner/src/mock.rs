//! 인메모리 스캔 백엔드
//!
//! 제출된 모든 스캔을 받아들이고, 프로젝트를 정해진 횟수만큼 조회한 뒤
//! `COMPLETE`로 보고합니다. 테스트와 데몬의 mock 모드에서 사용합니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::backend::ScanBackend;
use crate::config::MockSettings;
use crate::error::{ScanBackendError, ScanErrorKind};
use crate::job::ScanJob;
use crate::model::{
    CodeLocation, HIGH_RISK, IN_VIOLATION, PolicyStatus, Project, RiskProfile, ScanSummary,
    VULNERABILITY_CATEGORY, Version,
};

#[derive(Default)]
struct State {
    /// 프로젝트 이름 → 지금까지의 조회 횟수
    projects: HashMap<String, u32>,
    /// 직접 지정한 응답
    overrides: HashMap<String, Option<Project>>,
    failing_scans: HashSet<String>,
    failing_fetches: HashMap<String, u32>,
    submitted: Vec<ScanJob>,
}

/// 인메모리 [`ScanBackend`] 구현
pub struct MockScanBackend {
    settings: MockSettings,
    state: Mutex<State>,
}

impl Default for MockScanBackend {
    fn default() -> Self {
        Self::new(MockSettings {
            polls_to_complete: 1,
            policy_violations: 0,
            vulnerabilities: 0,
        })
    }
}

impl MockScanBackend {
    pub fn new(settings: MockSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(State::default()),
        }
    }

    /// 이 이미지의 스캔 제출을 실패시킵니다.
    pub fn fail_scans_of(self, image: &str) -> Self {
        self.lock().failing_scans.insert(image.to_owned());
        self
    }

    /// 이 프로젝트의 다음 `times`번 조회를 실패시킵니다.
    pub fn fail_next_fetches(&self, project: &str, times: u32) {
        self.lock()
            .failing_fetches
            .insert(project.to_owned(), times);
    }

    /// 이 프로젝트의 조회 응답을 고정합니다 (`None`이면 프로젝트 없음).
    pub fn respond_with(&self, project: &str, response: Option<Project>) {
        self.lock()
            .overrides
            .insert(project.to_owned(), response);
    }

    /// 지금까지 제출된 작업
    pub fn submitted(&self) -> Vec<ScanJob> {
        self.lock().submitted.clone()
    }

    /// 프로젝트의 누적 조회 횟수
    pub fn fetch_count(&self, project: &str) -> u32 {
        self.lock().projects.get(project).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 조회 횟수에 따른 프로젝트 상태를 만듭니다.
    fn project_after(&self, name: &str, fetches: u32) -> Project {
        let status = if fetches >= self.settings.polls_to_complete {
            "COMPLETE"
        } else {
            "SCANNING"
        };
        let risk_profile = RiskProfile {
            categories: [(
                VULNERABILITY_CATEGORY.to_owned(),
                [(HIGH_RISK.to_owned(), i64::from(self.settings.vulnerabilities))].into(),
            )]
            .into(),
        };
        let policy_status = PolicyStatus {
            overall_status: String::new(),
            component_version_status_counts: [(
                IN_VIOLATION.to_owned(),
                i64::from(self.settings.policy_violations),
            )]
            .into(),
        };
        Project {
            name: name.to_owned(),
            source: "mock".to_owned(),
            versions: vec![Version {
                version_name: name.to_owned(),
                code_locations: vec![CodeLocation {
                    name: name.to_owned(),
                    url: String::new(),
                    scan_summaries: vec![ScanSummary {
                        status: status.to_owned(),
                        ..Default::default()
                    }],
                }],
                risk_profile,
                policy_status,
                vulnerabilities: Vec::new(),
            }],
        }
    }
}

impl ScanBackend for MockScanBackend {
    async fn scan(&self, job: &ScanJob) -> Result<(), ScanBackendError> {
        let mut state = self.lock();
        if state.failing_scans.contains(job.image.as_str()) {
            return Err(ScanBackendError::Scan {
                image: job.image.to_string(),
                kind: ScanErrorKind::FailedToRunScanner,
                reason: "mock scan failure".to_owned(),
            });
        }
        state.projects.insert(job.project_name.clone(), 0);
        state.submitted.push(job.clone());
        debug!(project = %job.project_name, "mock scan accepted");
        Ok(())
    }

    async fn fetch_project(&self, project_name: &str) -> Result<Option<Project>, ScanBackendError> {
        let mut state = self.lock();
        let failing = state
            .failing_fetches
            .get_mut(project_name)
            .filter(|remaining| **remaining > 0);
        if let Some(remaining) = failing {
            *remaining -= 1;
            return Err(ScanBackendError::Fetch {
                project: project_name.to_owned(),
                reason: "mock fetch failure".to_owned(),
            });
        }

        let fetches = match state.projects.get_mut(project_name) {
            Some(count) => {
                *count += 1;
                *count
            }
            None => 0,
        };
        if let Some(response) = state.overrides.get(project_name) {
            return Ok(response.clone());
        }
        if fetches == 0 {
            return Ok(None);
        }
        drop(state);
        Ok(Some(self.project_after(project_name, fetches)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::is_project_done;
    use perceptor_core::types::{ImageRef, ScanCounts};

    fn settings(polls: u32) -> MockSettings {
        MockSettings {
            polls_to_complete: polls,
            policy_violations: 2,
            vulnerabilities: 5,
        }
    }

    #[tokio::test]
    async fn completes_after_configured_polls() {
        // Given
        let backend = MockScanBackend::new(settings(2));
        let job = ScanJob::new("my-img:1.0-project-0", ImageRef::from("img:1.0"));
        backend.scan(&job).await.unwrap();

        // When / Then: 첫 조회는 진행 중, 두 번째는 완료
        let first = backend.fetch_project(&job.project_name).await.unwrap().unwrap();
        assert!(!is_project_done(&first));
        let second = backend.fetch_project(&job.project_name).await.unwrap().unwrap();
        assert!(is_project_done(&second));
        assert_eq!(
            second.scan_results().unwrap().counts,
            ScanCounts {
                policy_violation_count: 2,
                vulnerability_count: 5
            }
        );
    }

    #[tokio::test]
    async fn unknown_project_is_none() {
        let backend = MockScanBackend::default();
        assert_eq!(backend.fetch_project("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn injected_failures() {
        let backend = MockScanBackend::default().fail_scans_of("bad:1");
        let err = backend
            .scan(&ScanJob::new("p", ImageRef::from("bad:1")))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanBackendError::Scan { .. }));
        assert!(backend.submitted().is_empty());

        backend.scan(&ScanJob::new("q", ImageRef::from("ok:1"))).await.unwrap();
        backend.fail_next_fetches("q", 1);
        assert!(backend.fetch_project("q").await.is_err());
        assert!(backend.fetch_project("q").await.unwrap().is_some());
    }
}
