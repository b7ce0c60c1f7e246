use crate::profile::{LoadProfile, Stage};
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

const fn mins(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

/// Named, swappable load shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// A handful of VUs for a minute; checks the script and the target work at all.
    Smoke,
    /// Ramp to 20 VUs, hold for ten minutes, ramp down.
    AverageLoad,
    /// Twice the average load, held longer.
    Stress,
    /// A short, sharp burst.
    Spike,
    /// Average load held for hours.
    Soak,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Self::Smoke,
        Self::AverageLoad,
        Self::Stress,
        Self::Spike,
        Self::Soak,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::AverageLoad => "average-load",
            Self::Stress => "stress",
            Self::Spike => "spike",
            Self::Soak => "soak",
        }
    }

    pub fn profile(&self) -> LoadProfile {
        match self {
            Self::Smoke => LoadProfile::constant(3, mins(1)),
            Self::AverageLoad => LoadProfile::ramping(vec![
                Stage::new(secs(30), 20),
                Stage::new(mins(10), 20),
                Stage::new(secs(30), 0),
            ]),
            Self::Stress => LoadProfile::ramping(vec![
                Stage::new(mins(2), 40),
                Stage::new(mins(20), 40),
                Stage::new(mins(2), 0),
            ]),
            Self::Spike => LoadProfile::ramping(vec![
                Stage::new(mins(1), 200),
                Stage::new(secs(30), 0),
            ]),
            Self::Soak => LoadProfile::ramping(vec![
                Stage::new(mins(5), 20),
                Stage::new(mins(4 * 60), 20),
                Stage::new(mins(5), 0),
            ]),
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s.trim())
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
