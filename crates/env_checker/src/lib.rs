pub mod cfg_checker;
pub mod env_checker;

use process_runner::ProcessRunner;
use std::sync::Arc;

pub use cfg_checker::{
    AppConfig, CONFIG_SEARCH_PATHS, ConfigCheckReport, ConfigIssue, IssueLevel, LoadedConfig,
    OutputConfig, PromptsConfig, apply_env_overrides, check_config, load_config, load_config_from,
};
pub use env_checker::{CheckItem, EnvironmentReport, check_environment};

#[derive(Debug, Clone)]
pub struct EnvironmentCheckSummary {
    pub config: ConfigCheckReport,
    pub environment: EnvironmentReport,
}

impl EnvironmentCheckSummary {
    pub fn has_errors(&self) -> bool {
        self.config.has_errors() || self.environment.has_errors()
    }
}

/// Configuration report plus live probes of the JDK, parser and model.
pub async fn check_all(
    loaded: &LoadedConfig,
    runner: Arc<dyn ProcessRunner>,
) -> EnvironmentCheckSummary {
    EnvironmentCheckSummary {
        config: check_config(loaded),
        environment: check_environment(&loaded.config, runner).await,
    }
}
