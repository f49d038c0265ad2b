//! # perceptor-daemon
//!
//! Library half of the daemon binary, split out so integration tests can
//! drive the orchestrator directly.
//!
//! - [`orchestrator`]: builds modules from `perceptor.toml` and runs them
//! - [`modules`]: module registry, pod event source, engine wiring
//! - [`health`]: health aggregation
//! - [`pid_file`], [`metrics_server`], [`logging`], [`cli`]: process plumbing

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod modules;
pub mod orchestrator;
pub mod pid_file;
