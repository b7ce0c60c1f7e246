use crate::constants::TRANSPORT_FAILURE_STATUS;
use crate::threshold::TagFilter;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// The parts of a response checks are allowed to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
    pub duration: Duration,
}

impl ResponseMeta {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of one named check against one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
}

impl CheckResult {
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            passed,
        }
    }
}

/// Everything recorded about a single VU iteration.
///
/// Built once at the end of the iteration and never changed afterwards; the evaluator only ever
/// reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationOutcome {
    duration: Duration,
    status: u16,
    checks: Vec<CheckResult>,
    tags: BTreeMap<String, String>,
    attempts: u32,
    error: Option<String>,
}

impl IterationOutcome {
    pub fn new(
        meta: ResponseMeta,
        checks: Vec<CheckResult>,
        tags: BTreeMap<String, String>,
        attempts: u32,
    ) -> Self {
        Self {
            duration: meta.duration,
            status: meta.status,
            checks,
            tags,
            attempts: attempts.max(1),
            error: None,
        }
    }

    /// An iteration whose request never got a response. Every check is recorded as failed.
    pub fn transport_failure<'a>(
        duration: Duration,
        check_names: impl IntoIterator<Item = &'a str>,
        tags: BTreeMap<String, String>,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            duration,
            status: TRANSPORT_FAILURE_STATUS,
            checks: check_names
                .into_iter()
                .map(|name| CheckResult::new(name, false))
                .collect(),
            tags,
            attempts: attempts.max(1),
            error: Some(error.into()),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn request_duration_ms(&self) -> f64 {
        self.duration.as_nanos() as f64 / 1e6
    }

    /// The `http_req_duration` sample for this iteration. Requests that never got a response
    /// have none.
    pub fn response_time_ms(&self) -> Option<f64> {
        (self.status != TRANSPORT_FAILURE_STATUS).then(|| self.request_duration_ms())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Failed iterations are those with a non-2xx status or at least one failing check.
    pub fn failed(&self) -> bool {
        !self.is_success_status() || self.checks.iter().any(|c| !c.passed)
    }

    pub fn matches(&self, filter: &TagFilter) -> bool {
        self.tags.get(&filter.key) == Some(&filter.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(status: u16, ms: u64) -> ResponseMeta {
        ResponseMeta {
            status,
            duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn failure_covers_status_and_checks() {
        let ok = IterationOutcome::new(
            meta(200, 10),
            vec![CheckResult::new("a", true)],
            BTreeMap::new(),
            1,
        );
        assert!(!ok.failed());

        let bad_check = IterationOutcome::new(
            meta(204, 10),
            vec![CheckResult::new("a", true), CheckResult::new("b", false)],
            BTreeMap::new(),
            1,
        );
        assert!(bad_check.failed());

        let bad_status = IterationOutcome::new(meta(503, 10), vec![], BTreeMap::new(), 1);
        assert!(bad_status.failed());
    }

    #[test]
    fn transport_failure_fails_every_check() {
        let outcome = IterationOutcome::transport_failure(
            Duration::from_millis(5),
            ["status is 200", "response time < 200ms"],
            BTreeMap::new(),
            3,
            "connection refused",
        );
        assert_eq!(outcome.status(), 0);
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(outcome.checks().len(), 2);
        assert!(outcome.checks().iter().all(|c| !c.passed));
        assert_eq!(outcome.error(), Some("connection refused"));
        assert!(outcome.failed());
    }

    #[test]
    fn only_responses_have_a_response_time() {
        let timed_out = IterationOutcome::transport_failure(
            Duration::from_secs(60),
            [],
            BTreeMap::new(),
            1,
            "timed out",
        );
        assert_eq!(timed_out.response_time_ms(), None);
        assert_eq!(timed_out.request_duration_ms(), 60_000.);

        let served = IterationOutcome::new(meta(500, 12), vec![], BTreeMap::new(), 1);
        assert_eq!(served.response_time_ms(), Some(12.));
    }

    #[test]
    fn tag_matching() {
        let tags = BTreeMap::from([("staticAsset".to_string(), "yes".to_string())]);
        let outcome = IterationOutcome::new(meta(200, 1), vec![], tags, 1);
        assert!(outcome.matches(&"staticAsset:yes".parse().unwrap()));
        assert!(!outcome.matches(&"staticAsset:no".parse().unwrap()));
        assert!(!outcome.matches(&"other:yes".parse().unwrap()));
    }
}
