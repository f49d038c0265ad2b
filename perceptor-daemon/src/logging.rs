//! Tracing setup for the daemon.
//!
//! The level comes from `[general].log_level` unless `RUST_LOG` is set.
//! Cluster client internals (kube, hyper, tower) are capped at `warn` so a
//! `debug` daemon log shows the engine loops rather than every HTTP frame.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use perceptor_core::config::GeneralConfig;

/// Crates whose output is capped regardless of the configured level.
const QUIET_TARGETS: [&str; 5] = ["kube_client", "kube_runtime", "hyper", "hyper_util", "tower"];

/// Filter directives for a configured level, e.g. `"debug,kube_client=warn,..."`.
pub fn default_directives(level: &str) -> String {
    let mut directives = vec![level.to_owned()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

/// Install the global subscriber. Call once, before the first event.
///
/// `log_format` is `json` (one object per line) or `pretty`.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&config.log_level))
            .with_context(|| format!("invalid log level '{}'", config.log_level))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false),
            )
            .try_init()
            .context("tracing subscriber already installed"),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("tracing subscriber already installed"),
        other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    }
}
