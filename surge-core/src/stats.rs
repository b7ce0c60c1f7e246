use crate::evaluate::{all_passed, percentile, ThresholdResult};
use crate::outcome::IterationOutcome;
use crate::duration;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Why a run stopped before its profile ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The abort handle was triggered from outside the run.
    Signal,
    /// A threshold marked `abort_on_fail` was breached.
    Threshold(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("aborted by signal"),
            Self::Threshold(t) => write!(f, "aborted by threshold `{t}`"),
        }
    }
}

/// Pass/fail counts for one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

/// Request duration statistics in milliseconds. Every field is `None` when no request got a
/// response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub med: Option<f64>,
    pub max: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
}

impl TrendSummary {
    pub fn from_samples(mut samples: Vec<f64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_by(f64::total_cmp);

        Self {
            avg: Some(statistical::mean(&samples)),
            min: samples.first().copied(),
            med: percentile(&samples, 50.),
            max: samples.last().copied(),
            p90: percentile(&samples, 90.),
            p95: percentile(&samples, 95.),
        }
    }
}

/// End of run summary for a Scenario.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub name: String,
    #[serde(serialize_with = "duration::serialize")]
    pub elapsed: Duration,
    pub iterations: u64,
    pub http_reqs: u64,
    pub failure_rate: f64,
    pub checks: Vec<CheckSummary>,
    pub request_duration: TrendSummary,
    pub peak_vus: u32,
    pub aborted: Option<AbortReason>,
    pub thresholds: Vec<ThresholdResult>,
}

impl RunStatistics {
    pub fn from_outcomes(
        name: &str,
        outcomes: &[IterationOutcome],
        thresholds: Vec<ThresholdResult>,
        elapsed: Duration,
        peak_vus: u32,
        aborted: Option<AbortReason>,
    ) -> Self {
        let iterations = outcomes.len() as u64;
        let http_reqs = outcomes.iter().map(|o| o.attempts() as u64).sum();
        let failed = outcomes.iter().filter(|o| o.failed()).count();
        let failure_rate = if outcomes.is_empty() {
            0.
        } else {
            failed as f64 / outcomes.len() as f64
        };

        // NOTE: BTreeMap keeps the summary order stable between runs
        let mut checks: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        for check in outcomes.iter().flat_map(|o| o.checks()) {
            let entry = checks.entry(check.name.as_str()).or_default();
            if check.passed {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
        let checks = checks
            .into_iter()
            .map(|(name, (passes, fails))| CheckSummary {
                name: name.to_string(),
                passes,
                fails,
            })
            .collect();

        let request_duration = TrendSummary::from_samples(
            outcomes
                .iter()
                .filter_map(IterationOutcome::response_time_ms)
                .collect(),
        );

        Self {
            name: name.to_string(),
            elapsed,
            iterations,
            http_reqs,
            failure_rate,
            checks,
            request_duration,
            peak_vus,
            aborted,
            thresholds,
        }
    }

    /// A run passes iff every threshold passed.
    pub fn passed(&self) -> bool {
        all_passed(&self.thresholds)
    }
}

fn ms(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}ms"),
        None => "-".to_string(),
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario {} ran {} with up to {} VUs",
            self.name,
            humantime::format_duration(Duration::from_millis(self.elapsed.as_millis() as u64)),
            self.peak_vus
        )?;
        if let Some(reason) = &self.aborted {
            writeln!(f, "  {reason}")?;
        }

        for check in &self.checks {
            let mark = if check.fails == 0 { '✓' } else { '✗' };
            writeln!(
                f,
                "  {mark} {} ({} passed, {} failed)",
                check.name, check.passes, check.fails
            )?;
        }

        let d = &self.request_duration;
        writeln!(
            f,
            "  http_req_duration: avg={} min={} med={} max={} p(90)={} p(95)={}",
            ms(d.avg),
            ms(d.min),
            ms(d.med),
            ms(d.max),
            ms(d.p90),
            ms(d.p95)
        )?;
        writeln!(f, "  http_req_failed: {:.2}%", self.failure_rate * 100.)?;
        writeln!(f, "  http_reqs: {}", self.http_reqs)?;
        writeln!(f, "  iterations: {}", self.iterations)?;

        for result in &self.thresholds {
            let mark = if result.passed { '✓' } else { '✗' };
            let observed = result
                .observed
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "no samples".to_string());
            writeln!(f, "  {mark} {} (observed {observed})", result.threshold)?;
        }

        Ok(())
    }
}
