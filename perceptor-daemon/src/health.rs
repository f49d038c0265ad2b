//! Aggregated health check reporting.
//!
//! The orchestrator polls each module's `health_check()` and folds the
//! results into one [`DaemonHealth`] report. The overall status is the
//! worst status among enabled modules.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use perceptor_core::pipeline::HealthStatus;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all modules).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-module health reports.
    pub modules: Vec<ModuleHealth>,
}

/// Health status for a single module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleHealth {
    /// Module name (e.g., "pod-watcher", "perceptor").
    pub name: String,
    /// Whether the module is enabled in configuration.
    pub enabled: bool,
    /// Current health status of the module.
    pub status: HealthStatus,
}

/// Aggregate multiple module health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Reasons are prefixed with the module name and joined with `"; "`.
/// When any module is unhealthy, degraded reasons are left out.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let mut degraded = Vec::new();
    let mut unhealthy = Vec::new();

    for module in modules.iter().filter(|m| m.enabled) {
        match &module.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                degraded.push(format!("{}: {}", module.name, reason));
            }
            HealthStatus::Unhealthy(reason) => {
                unhealthy.push(format!("{}: {}", module.name, reason));
            }
        }
    }

    if !unhealthy.is_empty() {
        HealthStatus::Unhealthy(unhealthy.join("; "))
    } else if !degraded.is_empty() {
        HealthStatus::Degraded(degraded.join("; "))
    } else {
        HealthStatus::Healthy
    }
}

/// Log a health report when its overall status differs from `previous`.
///
/// Returns `true` when the status changed.
pub fn log_transition(previous: &HealthStatus, current: &DaemonHealth) -> bool {
    if *previous == current.status {
        return false;
    }
    match &current.status {
        HealthStatus::Healthy => {
            tracing::info!(uptime_secs = current.uptime_secs, "daemon healthy");
        }
        HealthStatus::Degraded(reason) => {
            tracing::warn!(uptime_secs = current.uptime_secs, reason = %reason, "daemon degraded");
        }
        HealthStatus::Unhealthy(reason) => {
            tracing::error!(uptime_secs = current.uptime_secs, reason = %reason, "daemon unhealthy");
        }
    }
    true
}
