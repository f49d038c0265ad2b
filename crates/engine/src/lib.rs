//! # perceptor-engine
//!
//! Orchestration engine: the vulnerability cache and the loops that move each
//! image from discovery to annotated pods.
//!
//! # Module Structure
//!
//! - [`cache`]: the synchronous cache model (`VulnerabilityCache`, `RetryPolicy`)
//! - [`actor`]: the task that owns the cache (`CacheActor`, `CacheHandle`)
//! - [`queue`]: bounded work queue with an explicit overflow policy (`WorkQueue`)
//! - [`event`]: scan completion events (`ScanCompletion`)
//! - [`perceptor`]: the orchestrator (`Perceptor`, `PerceptorBuilder`, `Pipeline` impl)
//! - [`config`], [`error`], [`stats`]: configuration, errors and counters
//!
//! # Lifecycle of an image
//!
//! ```text
//! AddPod ──> cache discovers image ──> WorkQueue ──> dispatch: begin_scan + ScanBackend::scan
//!                                                              │
//!   pods annotated <── writeback <── ScanCompletion <── poll: fetch_project until COMPLETE
//! ```

pub mod actor;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
mod loops;
pub mod perceptor;
pub mod queue;
pub mod stats;

// --- Public API Re-exports ---

pub use actor::{CacheActor, CacheHandle};
pub use cache::{
    AddPodOutcome, DueJob, ImageEntry, JobVerdict, ModelSummary, PodChange, PollOutcome,
    RetryPolicy, TickPlan, VulnerabilityCache,
};
pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};
pub use error::EngineError;
pub use event::ScanCompletion;
pub use perceptor::{Perceptor, PerceptorBuilder};
pub use queue::{OverflowPolicy, PushOutcome, WorkQueue};
pub use stats::{EngineStats, StatsSnapshot};
