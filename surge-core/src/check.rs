use crate::constants::DEFAULT_CHECK_DURATION;
use crate::outcome::{CheckResult, ResponseMeta};
use crate::{duration, ConfigError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a check asserts about a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Status code equals `equals`.
    Status { equals: u16 },
    /// Status code is in `200..300`.
    StatusSuccess,
    /// Response arrived strictly faster than `limit`.
    DurationBelow {
        #[serde(with = "duration")]
        limit: Duration,
    },
    /// Response arrived within `limit`.
    DurationAtMost {
        #[serde(with = "duration")]
        limit: Duration,
    },
}

impl Predicate {
    pub fn holds(&self, response: &ResponseMeta) -> bool {
        match self {
            Self::Status { equals } => response.status == *equals,
            Self::StatusSuccess => response.is_success(),
            Self::DurationBelow { limit } => response.duration < *limit,
            Self::DurationAtMost { limit } => response.duration <= *limit,
        }
    }
}

/// A named assertion evaluated against every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    #[serde(flatten)]
    pub predicate: Predicate,
}

impl Check {
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    pub fn status(code: u16) -> Self {
        Self::new(
            format!("status is {code}"),
            Predicate::Status { equals: code },
        )
    }

    pub fn duration_below(limit: Duration) -> Self {
        Self::new(
            format!("response time < {}", humantime::format_duration(limit)),
            Predicate::DurationBelow { limit },
        )
    }

    pub fn evaluate(&self, response: &ResponseMeta) -> CheckResult {
        CheckResult::new(self.name.clone(), self.predicate.holds(response))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidCheck {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("check name must not be empty"));
        }
        match self.predicate {
            Predicate::Status { equals } if !(100..=599).contains(&equals) => {
                Err(invalid("status must be a valid HTTP status code"))
            }
            Predicate::DurationBelow { limit } if limit.is_zero() => {
                Err(invalid("duration limit must be positive"))
            }
            _ => Ok(()),
        }
    }
}

/// The checks every scenario gets unless it sets its own: a 200 status and a sub-200ms response.
pub fn default_checks() -> Vec<Check> {
    vec![
        Check::status(200),
        Check::duration_below(DEFAULT_CHECK_DURATION),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, ms: u64) -> ResponseMeta {
        ResponseMeta {
            status,
            duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn default_checks_match_fast_ok_response() {
        let checks = default_checks();
        assert_eq!(checks[0].name, "status is 200");
        assert_eq!(checks[1].name, "response time < 200ms");

        let results: Vec<_> = checks.iter().map(|c| c.evaluate(&response(200, 80))).collect();
        assert!(results.iter().all(|r| r.passed));

        let results: Vec<_> = checks.iter().map(|c| c.evaluate(&response(500, 250))).collect();
        assert!(results.iter().all(|r| !r.passed));
    }

    #[test]
    fn duration_bounds() {
        let below = Predicate::DurationBelow {
            limit: Duration::from_millis(200),
        };
        let at_most = Predicate::DurationAtMost {
            limit: Duration::from_millis(200),
        };
        assert!(!below.holds(&response(200, 200)));
        assert!(at_most.holds(&response(200, 200)));
        assert!(Predicate::StatusSuccess.holds(&response(204, 0)));
        assert!(!Predicate::StatusSuccess.holds(&response(301, 0)));
    }

    #[test]
    fn checks_deserialize_from_json() {
        let checks: Vec<Check> = serde_json::from_str(
            r#"[
                {"name": "status is 200", "kind": "status", "equals": 200},
                {"name": "fast", "kind": "duration_below", "limit": "200ms"},
                {"name": "ok", "kind": "status_success"}
            ]"#,
        )
        .unwrap();

        assert_eq!(checks[0], Check::status(200));
        assert_eq!(
            checks[1].predicate,
            Predicate::DurationBelow {
                limit: Duration::from_millis(200)
            }
        );
        assert_eq!(checks[2].predicate, Predicate::StatusSuccess);
    }

    #[test]
    fn validation() {
        assert!(Check::status(200).validate().is_ok());
        assert!(Check::status(42).validate().is_err());
        assert!(Check::new("", Predicate::StatusSuccess).validate().is_err());
    }
}
