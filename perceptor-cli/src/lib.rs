//! # perceptor-cli
//!
//! Operator command line for Perceptor. The binary is a thin `main.rs`
//! over this library so command handlers can be tested against the
//! in-memory cluster and backend.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
