use crate::check::{default_checks, Check};
use crate::constants::{DEFAULT_GRACEFUL_STOP, DEFAULT_PAUSE, DEFAULT_TIMEOUT};
use crate::preset::Preset;
use crate::profile::{LoadProfile, Stage};
use crate::threshold::Threshold;
use crate::{duration, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::time::Duration;

/// The user-facing load shape: exactly one of `vus`+`duration`, `stages` or `preset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vus: Option<u32>,
    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<Stage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_vus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<Preset>,
}

impl LoadSpec {
    pub fn resolve(&self) -> Result<LoadProfile, ConfigError> {
        let constant = self.vus.is_some() || self.duration.is_some();
        let ramping = self.stages.is_some();
        let preset = self.preset.is_some();

        match (constant, ramping, preset) {
            (true, true, _) => Err(ConfigError::ConflictingProfile(
                "`vus`/`duration` and `stages`",
            )),
            (true, _, true) => Err(ConfigError::ConflictingProfile(
                "`vus`/`duration` and `preset`",
            )),
            (_, true, true) => Err(ConfigError::ConflictingProfile("`stages` and `preset`")),
            (false, false, false) => Err(ConfigError::MissingProfile),
            _ if self.start_vus.is_some() && !ramping => Err(ConfigError::ConflictingProfile(
                "`start_vus` without `stages`",
            )),
            (true, false, false) => match (self.vus, self.duration) {
                (Some(vus), Some(duration)) => Ok(LoadProfile::constant(vus, duration)),
                _ => Err(ConfigError::MissingProfile),
            },
            (false, true, false) => Ok(LoadProfile::Ramping {
                start_vus: self.start_vus.unwrap_or(0),
                stages: self.stages.clone().unwrap_or_default(),
            }),
            (false, false, true) => self
                .preset
                .map(|p| p.profile())
                .ok_or(ConfigError::MissingProfile),
        }
        .and_then(|profile| profile.validate().map(|_| profile))
    }
}

/// One entry of a threshold list: a bare expression, or an expression with abort options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSpec {
    Expr(String),
    Detailed {
        threshold: String,
        #[serde(default)]
        abort_on_fail: bool,
        #[serde(
            default,
            with = "duration::option",
            skip_serializing_if = "Option::is_none"
        )]
        delay_abort_eval: Option<Duration>,
    },
}

impl From<&str> for ThresholdSpec {
    fn from(expr: &str) -> Self {
        Self::Expr(expr.to_string())
    }
}

impl ThresholdSpec {
    fn resolve(&self, key: &str) -> Result<Threshold, ConfigError> {
        match self {
            Self::Expr(expr) => Threshold::parse(key, expr),
            Self::Detailed {
                threshold,
                abort_on_fail,
                delay_abort_eval,
            } => {
                let parsed = Threshold::parse(key, threshold)?;
                Ok(if *abort_on_fail {
                    parsed.abort_on_fail(*delay_abort_eval)
                } else {
                    parsed
                })
            }
        }
    }
}

/// Unvalidated scenario description, as read from a scenario file or assembled by the builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(flatten)]
    pub load: LoadSpec,
    #[serde(default)]
    pub thresholds: BTreeMap<String, Vec<ThresholdSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<Check>>,
    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub pause: Option<Duration>,
    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub graceful_stop: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rps: Option<NonZeroU32>,
}

impl ScenarioSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate everything and produce the immutable run configuration.
    pub fn resolve(&self) -> Result<ScenarioConfig, ConfigError> {
        let profile = self.load.resolve()?;

        let target = self
            .base_url
            .as_deref()
            .map(|base| target_url(base, self.path.as_deref()))
            .transpose()?;

        let thresholds = self
            .thresholds
            .iter()
            .flat_map(|(key, specs)| specs.iter().map(move |spec| spec.resolve(key)))
            .collect::<Result<Vec<_>, _>>()?;

        let checks = self.checks.clone().unwrap_or_else(default_checks);
        for check in &checks {
            check.validate()?;
        }

        let graceful_stop = self.graceful_stop.unwrap_or(DEFAULT_GRACEFUL_STOP);
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ConfigError::ZeroDuration(timeout));
        }

        Ok(ScenarioConfig {
            name: self.name.clone(),
            target,
            tags: self.tags.clone(),
            profile,
            thresholds,
            checks,
            pause: self.pause.unwrap_or(DEFAULT_PAUSE),
            timeout,
            retries: self.retries.unwrap_or(0),
            graceful_stop,
            max_rps: self.max_rps,
        })
    }
}

fn target_url(base: &str, path: Option<&str>) -> Result<String, ConfigError> {
    let joined = match path {
        Some(path) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ),
        None => base.to_string(),
    };

    let url = url::Url::parse(&joined).map_err(|err| ConfigError::InvalidUrl {
        url: joined.clone(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(joined),
        other => Err(ConfigError::InvalidUrl {
            url: joined.clone(),
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

/// Validated, immutable configuration of one scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub name: String,
    /// Full URL requested every iteration. Absent for scenarios driving a custom iteration.
    pub target: Option<String>,
    /// Tags attached to every outcome of this scenario.
    pub tags: BTreeMap<String, String>,
    pub profile: LoadProfile,
    pub thresholds: Vec<Threshold>,
    pub checks: Vec<Check>,
    pub pause: Duration,
    pub timeout: Duration,
    /// Extra attempts for requests which got no response at all.
    pub retries: u32,
    pub graceful_stop: Duration,
    pub max_rps: Option<NonZeroU32>,
}

impl ScenarioConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        ScenarioSpec::from_json(json)?.resolve()
    }
}
