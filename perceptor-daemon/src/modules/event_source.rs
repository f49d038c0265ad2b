//! Pod event source module.
//!
//! Runs the task that feeds the engine's pod event streams (the
//! Kubernetes watcher in production) under the daemon's lifecycle.
//!
//! ```text
//! kube watch ──> KubePodWatcher ──Add/Update/Delete──> PodEventSenders ──> perceptor
//! ```

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use perceptor_cluster::{ClusterError, KubePodWatcher};
use perceptor_core::error::{PerceptorError, PipelineError};
use perceptor_core::pipeline::{HealthStatus, Pipeline};

type SourceTask = JoinHandle<Result<(), ClusterError>>;
type Spawner = Box<dyn FnOnce(CancellationToken) -> SourceTask + Send + Sync>;

/// Lifecycle wrapper around a one-shot event source task.
///
/// The source can be started once; its task ends when the token is
/// cancelled, or on its own when the watch fails for good.
pub struct EventSourceModule {
    name: &'static str,
    spawner: Option<Spawner>,
    cancel: CancellationToken,
    task: Option<SourceTask>,
    stopped: bool,
}

impl EventSourceModule {
    pub fn new(
        name: &'static str,
        spawner: impl FnOnce(CancellationToken) -> SourceTask + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            spawner: Some(Box::new(spawner)),
            cancel: CancellationToken::new(),
            task: None,
            stopped: false,
        }
    }

    /// Wrap a Kubernetes pod watcher.
    pub fn kube(watcher: KubePodWatcher) -> Self {
        Self::new("pod-watcher", move |cancel| watcher.spawn(cancel))
    }
}

impl Pipeline for EventSourceModule {
    async fn start(&mut self) -> Result<(), PerceptorError> {
        if self.task.is_some() {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let spawner = self.spawner.take().ok_or_else(|| {
            PipelineError::InitFailed(format!("{} cannot be restarted", self.name))
        })?;
        self.task = Some(spawner(self.cancel.child_token()));
        tracing::info!(source = self.name, "event source started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PerceptorError> {
        let task = self.task.take().ok_or(PipelineError::NotRunning)?;
        self.cancel.cancel();
        self.stopped = true;

        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(source = self.name, error = %e, "event source ended with error");
            }
            Err(e) => {
                tracing::error!(source = self.name, error = %e, "event source task panicked");
            }
        }
        tracing::info!(source = self.name, "event source stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match &self.task {
            Some(task) if task.is_finished() => {
                HealthStatus::Unhealthy(format!("{} ended", self.name))
            }
            Some(_) => HealthStatus::Healthy,
            None if self.stopped => HealthStatus::Unhealthy("stopped".to_owned()),
            None => HealthStatus::Unhealthy("not started".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn idle_source() -> EventSourceModule {
        EventSourceModule::new("test-source", |cancel| {
            tokio::spawn(async move {
                cancel.cancelled().await;
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn lifecycle_reports_health() {
        // Given
        let mut source = idle_source();
        assert_eq!(
            source.health_check().await,
            HealthStatus::Unhealthy("not started".to_owned())
        );

        // When
        source.start().await.unwrap();

        // Then
        assert!(source.health_check().await.is_healthy());
        assert!(source.start().await.is_err());
        source.stop().await.unwrap();
        assert_eq!(
            source.health_check().await,
            HealthStatus::Unhealthy("stopped".to_owned())
        );
        assert!(source.stop().await.is_err());
    }

    #[tokio::test]
    async fn restart_is_rejected() {
        let mut source = idle_source();
        source.start().await.unwrap();
        source.stop().await.unwrap();

        let err = source.start().await.unwrap_err();
        assert!(err.to_string().contains("cannot be restarted"));
    }

    #[tokio::test]
    async fn source_that_ends_is_unhealthy() {
        let mut source = EventSourceModule::new("flaky", |_cancel| {
            tokio::spawn(async { Err(ClusterError::Watch("watch stream ended".to_owned())) })
        });
        source.start().await.unwrap();

        for _ in 0..100 {
            if source.health_check().await.is_unhealthy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(
            source.health_check().await,
            HealthStatus::Unhealthy("flaky ended".to_owned())
        );
        // 오류로 끝난 소스도 정상 정지
        source.stop().await.unwrap();
    }
}
