//! Test configuration builder.

use perceptor_core::config::PerceptorConfig;

/// Builds a `PerceptorConfig` in mock cluster + mock scanner mode.
pub struct TestConfigBuilder {
    config: PerceptorConfig,
}

#[allow(dead_code)]
impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = PerceptorConfig::default();
        config.cluster.mode = "mock".to_owned();
        config.scanner.mode = "mock".to_owned();
        config.scanner.mock_polls_to_complete = 1;
        config.engine.poll_interval_secs = 1;
        Self { config }
    }

    pub fn mock_counts(mut self, policy_violations: u32, vulnerabilities: u32) -> Self {
        self.config.scanner.mock_policy_violations = policy_violations;
        self.config.scanner.mock_vulnerabilities = vulnerabilities;
        self
    }

    pub fn polls_to_complete(mut self, polls: u32) -> Self {
        self.config.scanner.mock_polls_to_complete = polls;
        self
    }

    pub fn scan_concurrency(mut self, concurrency: usize) -> Self {
        self.config.engine.scan_concurrency = concurrency;
        self
    }

    pub fn pid_file(mut self, path: impl Into<String>) -> Self {
        self.config.general.pid_file = path.into();
        self
    }

    pub fn build(self) -> PerceptorConfig {
        self.config
    }
}

/// Serialize a config as it would appear in `perceptor.toml`.
#[allow(dead_code)]
pub fn to_toml(config: &PerceptorConfig) -> String {
    toml::to_string(config).expect("config should serialize")
}
