//! E2E test scenarios.

mod config_error;
mod lifecycle;
mod pipeline_flow;
