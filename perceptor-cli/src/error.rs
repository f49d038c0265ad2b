//! CLI-specific error types and exit code mapping

use perceptor_cluster::ClusterError;
use perceptor_core::error::PerceptorError;
use perceptor_scanner::ScanBackendError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The cluster API could not be reached at all.
    #[error("cluster not reachable: {0}")]
    ClusterUnreachable(String),

    /// The cluster API answered with an error.
    #[error("cluster error: {0}")]
    Cluster(String),

    /// The scan backend failed.
    #[error("scan backend error: {0}")]
    Scanner(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, file read).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                     |
    /// |------|-----------------------------|
    /// | 0    | Success                     |
    /// | 1    | General / command error     |
    /// | 2    | Configuration error         |
    /// | 3    | Cluster unreachable         |
    /// | 10   | IO error                    |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::ClusterUnreachable(_) => 3,
            Self::Io(_) => 10,
            Self::Command(_) | Self::Cluster(_) | Self::Scanner(_) | Self::JsonSerialize(_) => 1,
        }
    }
}

impl From<PerceptorError> for CliError {
    fn from(e: PerceptorError) -> Self {
        match e {
            PerceptorError::Config(inner) => Self::Config(inner.to_string()),
            PerceptorError::Io(io) => Self::Io(io),
            other => Self::Command(other.to_string()),
        }
    }
}

impl From<ClusterError> for CliError {
    fn from(e: ClusterError) -> Self {
        if e.is_unreachable() {
            Self::ClusterUnreachable(e.to_string())
        } else {
            Self::Cluster(e.to_string())
        }
    }
}

impl From<ScanBackendError> for CliError {
    fn from(e: ScanBackendError) -> Self {
        Self::Scanner(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perceptor_core::error::ConfigError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("bad".to_owned()).exit_code(), 2);
        assert_eq!(CliError::Command("bad".to_owned()).exit_code(), 1);
        assert_eq!(CliError::ClusterUnreachable("down".to_owned()).exit_code(), 3);
        assert_eq!(CliError::Cluster("403".to_owned()).exit_code(), 1);
        assert_eq!(CliError::Scanner("boom".to_owned()).exit_code(), 1);
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert_eq!(CliError::Io(io).exit_code(), 10);
    }

    #[test]
    fn test_connection_failure_maps_to_unreachable() {
        let err: CliError = ClusterError::Connection("no kubeconfig".to_owned()).into();
        assert_eq!(err.exit_code(), 3);

        let err: CliError = ClusterError::PodNotFound("ns/p1".to_owned()).into();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_core_config_error_maps_to_config() {
        let core: PerceptorError = ConfigError::InvalidValue {
            field: "engine.scan_concurrency".to_owned(),
            reason: "must be between 1 and 7".to_owned(),
        }
        .into();

        let err: CliError = core.into();

        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("engine.scan_concurrency"));
    }
}
