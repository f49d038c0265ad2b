//! Module registry and initialization.
//!
//! Every long-running component is wrapped in a [`ModuleHandle`] so the
//! orchestrator can start, stop and health-check it through
//! [`DynPipeline`] without knowing its concrete type.
//!
//! Modules are registered producers first: the pod event source before
//! the orchestrator engine that consumes its events.

pub mod event_source;
pub mod perceptor;

use perceptor_core::pipeline::{DynPipeline, HealthStatus};

use crate::health::ModuleHealth;

/// A handle to a registered module.
pub struct ModuleHandle {
    /// Module name for logging and health reporting.
    pub name: String,
    /// Whether this module is enabled in configuration.
    pub enabled: bool,
    /// The module's pipeline implementation (start/stop/health_check).
    pub pipeline: Box<dyn DynPipeline>,
    started: bool,
}

impl ModuleHandle {
    pub fn new(name: impl Into<String>, enabled: bool, pipeline: Box<dyn DynPipeline>) -> Self {
        Self {
            name: name.into(),
            enabled,
            pipeline,
            started: false,
        }
    }

    /// Disabled modules always report `Healthy`.
    pub async fn health_check(&self) -> HealthStatus {
        if !self.enabled {
            return HealthStatus::Healthy;
        }
        self.pipeline.health_check().await
    }
}

/// Registry of all daemon modules.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<ModuleHandle>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Call in dependency order, producers first.
    pub fn register(&mut self, handle: ModuleHandle) {
        tracing::debug!(module = %handle.name, enabled = handle.enabled, "module registered");
        self.modules.push(handle);
    }

    /// Start all enabled modules in registration order.
    ///
    /// If one fails, the modules already started are stopped again in
    /// reverse order before the start error is returned.
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        let mut failure = None;
        for handle in &mut self.modules {
            if !handle.enabled {
                tracing::debug!(module = %handle.name, "skipping disabled module");
                continue;
            }
            tracing::info!(module = %handle.name, "starting module");
            match handle.pipeline.start().await {
                Ok(()) => {
                    handle.started = true;
                    tracing::info!(module = %handle.name, "module started");
                }
                Err(e) => {
                    failure = Some(anyhow::anyhow!(
                        "failed to start module '{}': {}",
                        handle.name,
                        e
                    ));
                    break;
                }
            }
        }

        let Some(error) = failure else {
            return Ok(());
        };

        tracing::warn!(error = %error, "startup failed, rolling back started modules");
        for handle in self.modules.iter_mut().rev().filter(|h| h.started) {
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(module = %handle.name, error = %e, "rollback stop failed");
            }
            handle.started = false;
        }
        Err(error)
    }

    /// Stop every started module in registration order.
    ///
    /// Producers stop first so consumers see their inputs close. Errors
    /// are collected and the remaining modules are still stopped.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        for handle in self.modules.iter_mut().filter(|h| h.started) {
            tracing::info!(module = %handle.name, "stopping module");
            match handle.pipeline.stop().await {
                Ok(()) => tracing::info!(module = %handle.name, "module stopped"),
                Err(e) => {
                    tracing::error!(module = %handle.name, error = %e, "failed to stop module");
                    errors.push(format!("{}: {}", handle.name, e));
                }
            }
            handle.started = false;
        }

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping modules: {}",
                errors.join("; ")
            ));
        }
        Ok(())
    }

    /// Health of every registered module, in registration order.
    pub async fn health_statuses(&self) -> Vec<ModuleHealth> {
        let mut statuses = Vec::with_capacity(self.modules.len());
        for handle in &self.modules {
            statuses.push(ModuleHealth {
                name: handle.name.clone(),
                enabled: handle.enabled,
                status: handle.health_check().await,
            });
        }
        statuses
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn count(&self) -> usize {
        self.modules.len()
    }

    pub fn enabled_count(&self) -> usize {
        self.modules.iter().filter(|m| m.enabled).count()
    }
}
