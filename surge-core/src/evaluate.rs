//! Threshold evaluation over a finished (or in-progress) set of iteration outcomes.
use crate::outcome::IterationOutcome;
use crate::threshold::{Aggregation, Metric, Threshold};
use serde::Serialize;
use tracing::{debug, warn};

/// Verdict for a single threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub threshold: Threshold,
    /// Aggregated value the expression was checked against. `None` when the metric had no samples
    /// for this aggregation.
    pub observed: Option<f64>,
    pub passed: bool,
}

/// Evaluate every threshold against `outcomes`.
///
/// Pure and deterministic: the same outcomes always produce the same verdicts, in the same order
/// as `thresholds`.
pub fn evaluate(thresholds: &[Threshold], outcomes: &[IterationOutcome]) -> Vec<ThresholdResult> {
    thresholds
        .iter()
        .map(|threshold| evaluate_one(threshold, outcomes))
        .collect()
}

/// True iff every threshold passed.
pub fn all_passed(results: &[ThresholdResult]) -> bool {
    results.iter().all(|r| r.passed)
}

pub fn evaluate_one(threshold: &Threshold, outcomes: &[IterationOutcome]) -> ThresholdResult {
    let included = outcomes.iter().filter(|o| match &threshold.tag {
        Some(tag) => o.matches(tag),
        None => true,
    });

    let observed = observe(threshold.metric, threshold.expr.aggregation, included);
    let passed = match observed {
        Some(value) => threshold.expr.holds(value),
        None => {
            debug!("No samples for `{threshold}`; nothing to breach.");
            true
        }
    };

    ThresholdResult {
        threshold: threshold.clone(),
        observed,
        passed,
    }
}

/// Aggregate one metric over the given outcomes.
pub fn observe<'a>(
    metric: Metric,
    aggregation: Aggregation,
    outcomes: impl Iterator<Item = &'a IterationOutcome>,
) -> Option<f64> {
    match metric {
        Metric::HttpReqDuration => {
            let mut samples: Vec<f64> = outcomes
                .filter_map(IterationOutcome::response_time_ms)
                .collect();
            trend(&mut samples, aggregation)
        }
        Metric::HttpReqFailed => {
            let (failed, total) = outcomes.fold((0usize, 0usize), |(failed, total), o| {
                (failed + o.failed() as usize, total + 1)
            });
            ratio(failed, total)
        }
        Metric::Checks => {
            let (passed, total) = outcomes
                .flat_map(|o| o.checks())
                .fold((0usize, 0usize), |(passed, total), c| {
                    (passed + c.passed as usize, total + 1)
                });
            ratio(passed, total)
        }
        Metric::HttpReqs => Some(outcomes.map(|o| o.attempts() as f64).sum()),
        Metric::Iterations => Some(outcomes.count() as f64),
    }
}

fn ratio(part: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(part as f64 / total as f64)
    }
}

fn trend(samples: &mut [f64], aggregation: Aggregation) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    match aggregation {
        Aggregation::Avg => Some(statistical::mean(samples)),
        Aggregation::Med => Some(statistical::median(samples)),
        Aggregation::Min => samples.iter().copied().reduce(f64::min),
        Aggregation::Max => samples.iter().copied().reduce(f64::max),
        Aggregation::Percentile(p) => {
            samples.sort_by(f64::total_cmp);
            percentile(samples, p)
        }
        Aggregation::Rate | Aggregation::Count => {
            warn!("Aggregation {aggregation} is not defined for trends.");
            None
        }
    }
}

/// Percentile of an ascending slice, linearly interpolating between the closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        n => {
            let rank = (p / 100.).clamp(0., 1.) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
        }
    }
}
