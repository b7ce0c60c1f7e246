use std::time::Duration;
use thiserror::Error;

/// Everything that can be wrong with a scenario before it starts.
///
/// Each of these is raised while loading or validating the configuration; no iteration runs
/// once one has been produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid threshold expression `{expr}`: {reason}")]
    InvalidThreshold { expr: String, reason: String },

    #[error("Unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("Aggregation `{aggregation}` is not available for {kind} metric `{metric}`")]
    AggregationMismatch {
        metric: String,
        kind: &'static str,
        aggregation: String,
    },

    #[error("Invalid tag filter `{0}`, expected `key:value`")]
    InvalidTag(String),

    #[error("Load profile must set exactly one of `vus`+`duration`, `stages` or `preset` (found {0})")]
    ConflictingProfile(&'static str),

    #[error("Load profile is missing; set `vus`+`duration`, `stages` or `preset`")]
    MissingProfile,

    #[error("Ramping profile needs at least one stage")]
    EmptyStages,

    #[error("Duration must be positive (found {0:?})")]
    ZeroDuration(Duration),

    #[error("Unknown preset `{0}`")]
    UnknownPreset(String),

    #[error("Invalid base url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid check `{name}`: {reason}")]
    InvalidCheck { name: String, reason: String },

    #[error("Invalid duration `{0}`")]
    InvalidDuration(String),

    #[error("Scenario file could not be parsed: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
