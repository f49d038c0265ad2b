//! E2E integration tests for perceptor-daemon.
//!
//! The daemon is built from configuration in mock cluster and mock
//! scanner mode; pods are fed in through the harness and results are read
//! back from the in-memory cluster's annotations.
//!
//! # Test Structure
//!
//! - `helpers/` -- config builder, pod factories, annotation waiters
//! - `scenarios/` -- one file per scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p perceptor-daemon --test e2e
//! ```

mod helpers;
mod scenarios;
