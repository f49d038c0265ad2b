//! Shared E2E test helpers.

pub mod cluster;
pub mod config;
