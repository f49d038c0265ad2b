//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Perceptor -- scans cluster images and annotates pods with the results.
///
/// Use `perceptor <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "perceptor", version, about, long_about = None)]
pub struct Cli {
    /// Path to the perceptor.toml configuration file.
    #[arg(short, long, default_value = "perceptor.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration.
    Config(ConfigArgs),

    /// Read or edit the scan result annotation on a pod.
    Annotations(AnnotationsArgs),

    /// Query the scan backend.
    Project(ProjectArgs),
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, cluster, scanner, engine, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

// ---- annotations ----

#[derive(Args, Debug)]
pub struct AnnotationsArgs {
    #[command(subcommand)]
    pub action: AnnotationsAction,
}

#[derive(Subcommand, Debug)]
pub enum AnnotationsAction {
    /// Print the decoded scan results on a pod.
    Get {
        namespace: String,
        pod: String,
    },
    /// Merge one image's counts into the pod's annotation.
    Set {
        namespace: String,
        pod: String,
        image: String,
        #[arg(long, default_value_t = 0)]
        policy_violations: u32,
        #[arg(long, default_value_t = 0)]
        vulnerabilities: u32,
    },
    /// Remove the scan result annotation from a pod.
    Clear {
        namespace: String,
        pod: String,
    },
}

// ---- project ----

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub action: ProjectAction,
}

#[derive(Subcommand, Debug)]
pub enum ProjectAction {
    /// Fetch a project and report whether its scan is complete.
    Fetch {
        /// Project name, e.g. `my-img:1.0-project-0`.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_config_show_with_section() {
        let cli = Cli::parse_from(["perceptor", "config", "show", "--section", "engine"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("engine")),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.output, OutputFormat::Text);
        assert_eq!(cli.config, PathBuf::from("perceptor.toml"));
    }

    #[test]
    fn parse_annotations_set() {
        let cli = Cli::parse_from([
            "perceptor",
            "--output",
            "json",
            "annotations",
            "set",
            "ns",
            "p1",
            "img:1.0",
            "--policy-violations",
            "2",
            "--vulnerabilities",
            "5",
        ]);
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Annotations(AnnotationsArgs {
                action:
                    AnnotationsAction::Set {
                        namespace,
                        pod,
                        image,
                        policy_violations,
                        vulnerabilities,
                    },
            }) => {
                assert_eq!((namespace.as_str(), pod.as_str()), ("ns", "p1"));
                assert_eq!(image, "img:1.0");
                assert_eq!((policy_violations, vulnerabilities), (2, 5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn output_flag_is_global() {
        let cli = Cli::parse_from(["perceptor", "project", "fetch", "p", "--output", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn annotations_get_requires_pod() {
        assert!(Cli::try_parse_from(["perceptor", "annotations", "get", "ns"]).is_err());
    }
}
