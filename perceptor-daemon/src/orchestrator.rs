//! Module orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `perceptor-daemon`.
//! It loads configuration, builds the enabled modules, manages their
//! startup/shutdown ordering, and runs the main loop until a signal.
//!
//! # Startup / Shutdown Order (producers first)
//!
//! 1. Pod watcher (produces Add/Update/Delete pod events, kube mode only)
//! 2. Perceptor engine (consumes pod events, scans images, writes annotations)

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use perceptor_core::config::PerceptorConfig;
use perceptor_core::metrics as m;
use perceptor_core::pipeline::HealthStatus;

use crate::health::{DaemonHealth, aggregate_status, log_transition};
use crate::metrics_server;
use crate::modules::perceptor::{self as perceptor_module, MockHarness};
use crate::modules::ModuleRegistry;
use crate::pid_file::PidFile;

/// Interval between aggregated health checks in [`Orchestrator::run`].
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    config: PerceptorConfig,
    modules: ModuleRegistry,
    harness: MockHarness,
    /// Cancels daemon-level background tasks (uptime updater).
    cancel: CancellationToken,
    background: Vec<JoinHandle<()>>,
    pid_file: Option<PidFile>,
    start_time: Instant,
    running: bool,
}

impl Orchestrator {
    /// Load `perceptor.toml` (with environment overrides) and build.
    ///
    /// # Errors
    ///
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - A module fails to initialize
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = PerceptorConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: PerceptorConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // 모듈이 메트릭을 기록하기 전에 설치
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let built = perceptor_module::init(&config).await?;
        let mut modules = ModuleRegistry::new();
        for handle in built.handles {
            modules.register(handle);
        }

        tracing::info!(
            modules = ?modules.names(),
            cluster_mode = %config.cluster.mode,
            scanner_mode = %config.scanner.mode,
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            record_daemon_metrics(modules.count());
        }

        Ok(Self {
            config,
            modules,
            harness: built.harness,
            cancel: CancellationToken::new(),
            background: Vec::new(),
            pid_file: None,
            start_time: Instant::now(),
            running: false,
        })
    }

    /// Write the PID file and start every enabled module.
    ///
    /// On failure the PID file is removed again and started modules are
    /// rolled back.
    pub async fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(anyhow::anyhow!("orchestrator already running"));
        }

        if !self.config.general.pid_file.is_empty() {
            self.pid_file = Some(PidFile::create(&self.config.general.pid_file)?);
        }

        if let Err(e) = self.modules.start_all().await {
            tracing::error!(error = %e, "module startup failed");
            if let Some(pid_file) = self.pid_file.take() {
                pid_file.remove();
            }
            return Err(e);
        }

        if self.config.metrics.enabled {
            self.background
                .push(spawn_uptime_updater(self.start_time, self.cancel.child_token()));
        }

        self.running = true;
        tracing::info!(modules = self.modules.enabled_count(), "perceptor daemon started");
        Ok(())
    }

    /// Start, then run until SIGTERM or SIGINT, then shut down.
    ///
    /// Health is checked periodically and logged whenever the aggregated
    /// status changes.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let shutdown_signal = wait_for_shutdown_signal();
        tokio::pin!(shutdown_signal);
        let mut health_tick = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_status = HealthStatus::Healthy;

        let signal = loop {
            tokio::select! {
                signal = &mut shutdown_signal => break signal,
                _ = health_tick.tick() => {
                    let report = self.health().await;
                    log_transition(&last_status, &report);
                    last_status = report.status;
                }
            }
        };

        match signal {
            Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
        }
        self.shutdown().await
    }

    /// Stop background tasks and every started module, then remove the
    /// PID file.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.running {
            return Err(anyhow::anyhow!("orchestrator is not running"));
        }
        self.running = false;

        self.cancel.cancel();
        for task in self.background.drain(..) {
            let _ = task.await;
        }

        let result = self.modules.stop_all().await;

        if let Some(pid_file) = self.pid_file.take() {
            pid_file.remove();
        }
        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "perceptor daemon stopped"
        );
        result
    }

    /// Current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules = self.modules.health_statuses().await;
        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    pub fn config(&self) -> &PerceptorConfig {
        &self.config
    }

    /// In-memory cluster and backend, present in mock modes.
    pub fn harness(&self) -> &MockHarness {
        &self.harness
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.names()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Wait for SIGTERM or SIGINT and return the signal name.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to listen for ctrl-c: {}", e))?;
    Ok("ctrl-c")
}

/// Record build info and the registered module count.
fn record_daemon_metrics(module_count: usize) {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_MODULES_REGISTERED).set(module_count as f64);
}

/// Periodically publish the uptime gauge until cancelled.
fn spawn_uptime_updater(start_time: Instant, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
            }
        }
        tracing::debug!("uptime updater stopped");
    })
}
