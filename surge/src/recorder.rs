use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics_util::AtomicBucket;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use surge_core::IterationOutcome;

/// Shared sink VUs push their outcomes into.
///
/// Every VU holds a clone; the run loop is the only reader and drains it once per tick.
#[derive(Clone)]
pub(crate) struct Recorder {
    #[allow(unused)]
    scenario: Arc<str>,
    outcomes: Arc<AtomicBucket<IterationOutcome>>,
    iterations: Arc<AtomicU64>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl Recorder {
    pub fn new(scenario: &str, max_rps: Option<NonZeroU32>) -> Self {
        Self {
            scenario: scenario.into(),
            outcomes: Arc::new(AtomicBucket::new()),
            iterations: Arc::new(AtomicU64::new(0)),
            limiter: max_rps.map(|rps| Arc::new(rate_limiter(rps))),
        }
    }

    /// Waits for the request-rate cap, if there is one.
    pub async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    pub fn record(&self, outcome: IterationOutcome) {
        #[cfg(feature = "metrics")]
        self.publish(&outcome);

        self.iterations.fetch_add(1, Ordering::Relaxed);
        self.outcomes.push(outcome);
    }

    /// Moves every outcome recorded since the last drain to `into`, returning how many moved.
    pub fn drain_into(&self, into: &mut Vec<IterationOutcome>) -> usize {
        let before = into.len();
        self.outcomes
            .clear_with(|block| into.extend_from_slice(block));
        into.len() - before
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    #[cfg(feature = "metrics")]
    fn publish(&self, outcome: &IterationOutcome) {
        use surge_core::{CHECKS, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATIONS};

        let scenario = self.scenario.to_string();
        if let Some(ms) = outcome.response_time_ms() {
            metrics::histogram!(HTTP_REQ_DURATION, "scenario" => scenario.clone()).record(ms);
        }
        metrics::counter!(HTTP_REQS, "scenario" => scenario.clone())
            .increment(outcome.attempts() as u64);
        metrics::counter!(ITERATIONS, "scenario" => scenario.clone()).increment(1);
        if outcome.failed() {
            metrics::counter!(HTTP_REQ_FAILED, "scenario" => scenario.clone()).increment(1);
        }
        for check in outcome.checks() {
            let result = if check.passed { "pass" } else { "fail" };
            metrics::counter!(
                CHECKS,
                "scenario" => scenario.clone(),
                "check" => check.name.clone(),
                "result" => result
            )
            .increment(1);
        }
    }
}

fn rate_limiter(max_rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(max_rps).allow_burst(NonZeroU32::MIN))
}
