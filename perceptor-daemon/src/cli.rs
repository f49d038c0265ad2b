//! CLI argument definitions for perceptor-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Perceptor vulnerability scan orchestrator.
///
/// Watches cluster pods, scans every image once, and writes the
/// results back onto the pods as annotations.
#[derive(Parser, Debug)]
#[command(name = "perceptor-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to perceptor.toml configuration file.
    #[arg(short, long, default_value = "/etc/perceptor/perceptor.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}
