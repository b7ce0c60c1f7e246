use surge_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Invalid scenario configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Scenario `{0}` has no base url to request")]
    MissingTarget(String),

    #[error("Failed to build the HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
