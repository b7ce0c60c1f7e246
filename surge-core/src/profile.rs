use crate::{duration, ConfigError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One step of a ramping profile: move towards `target` VUs over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "duration")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// How many virtual users run, and for how long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadProfile {
    /// A fixed number of VUs for the whole run.
    Constant {
        vus: u32,
        #[serde(with = "duration")]
        duration: Duration,
    },
    /// VU count follows the stages, interpolating linearly inside each one.
    Ramping { start_vus: u32, stages: Vec<Stage> },
}

impl LoadProfile {
    pub fn constant(vus: u32, duration: Duration) -> Self {
        Self::Constant { vus, duration }
    }

    pub fn ramping(stages: Vec<Stage>) -> Self {
        Self::Ramping {
            start_vus: 0,
            stages,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Constant { duration, .. } => {
                if duration.is_zero() {
                    return Err(ConfigError::ZeroDuration(*duration));
                }
            }
            Self::Ramping { stages, .. } => {
                if stages.is_empty() {
                    return Err(ConfigError::EmptyStages);
                }
                if let Some(stage) = stages.iter().find(|s| s.duration.is_zero()) {
                    return Err(ConfigError::ZeroDuration(stage.duration));
                }
            }
        }
        Ok(())
    }

    /// Wall-clock length of the run this profile describes.
    pub fn total_duration(&self) -> Duration {
        match self {
            Self::Constant { duration, .. } => *duration,
            Self::Ramping { stages, .. } => stages.iter().map(|s| s.duration).sum(),
        }
    }

    pub fn max_vus(&self) -> u32 {
        match self {
            Self::Constant { vus, .. } => *vus,
            Self::Ramping { start_vus, stages } => stages
                .iter()
                .map(|s| s.target)
                .fold(*start_vus, u32::max),
        }
    }

    /// Number of VUs that should be active `elapsed` into the run.
    pub fn vus_at(&self, elapsed: Duration) -> u32 {
        match self {
            Self::Constant { vus, duration } => {
                if elapsed < *duration {
                    *vus
                } else {
                    0
                }
            }
            Self::Ramping { start_vus, stages } => {
                let mut from = *start_vus;
                let mut offset = Duration::ZERO;
                for stage in stages {
                    let end = offset + stage.duration;
                    if elapsed < end {
                        let progress =
                            (elapsed - offset).as_secs_f64() / stage.duration.as_secs_f64();
                        let delta = stage.target as f64 - from as f64;
                        return (from as f64 + delta * progress).round().max(0.) as u32;
                    }
                    from = stage.target;
                    offset = end;
                }
                from
            }
        }
    }
}

impl std::fmt::Display for LoadProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant { vus, duration } => write!(
                f,
                "{vus} VUs for {}",
                humantime::format_duration(*duration)
            ),
            Self::Ramping { stages, .. } => write!(
                f,
                "{} stages, up to {} VUs over {}",
                stages.len(),
                self.max_vus(),
                humantime::format_duration(self.total_duration())
            ),
        }
    }
}
