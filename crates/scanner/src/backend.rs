//! Scan backend abstraction.
//!
//! The engine talks to the scan backend only through [`ScanBackend`]: submit a
//! job, then poll the backend project by name until it reports completion.
//! [`CommandScanBackend`](crate::command::CommandScanBackend) drives the vendor
//! scan client; [`MockScanBackend`](crate::mock::MockScanBackend) stands in for
//! it in tests and the daemon's mock mode.

use std::future::Future;
use std::sync::Arc;

use crate::error::ScanBackendError;
use crate::job::ScanJob;
use crate::model::Project;

/// Scan submission and project status lookup.
pub trait ScanBackend: Send + Sync + 'static {
    /// Submits a scan for the job's image under the job's project name.
    ///
    /// Completion is observed only through [`fetch_project`](Self::fetch_project).
    fn scan(&self, job: &ScanJob) -> impl Future<Output = Result<(), ScanBackendError>> + Send;

    /// Looks up a backend project by name.
    ///
    /// Returns `Ok(None)` when the backend has no such project yet.
    fn fetch_project(
        &self,
        project_name: &str,
    ) -> impl Future<Output = Result<Option<Project>, ScanBackendError>> + Send;
}

impl<T: ScanBackend> ScanBackend for Arc<T> {
    fn scan(&self, job: &ScanJob) -> impl Future<Output = Result<(), ScanBackendError>> + Send {
        (**self).scan(job)
    }

    fn fetch_project(
        &self,
        project_name: &str,
    ) -> impl Future<Output = Result<Option<Project>, ScanBackendError>> + Send {
        (**self).fetch_project(project_name)
    }
}
