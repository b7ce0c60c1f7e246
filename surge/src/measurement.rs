use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::time::Duration;
use surge_core::IterationOutcome;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Rolling view over one reporting window, used for progress logs only. Thresholds are always
/// evaluated on the exact outcomes.
#[derive(Debug, Clone)]
pub(crate) struct Measurement {
    pub vus: usize,
    pub iterations: u64,
    pub failed: u64,
    pub elapsed: Duration,
    latency: TDigest<K1>,
}

impl Measurement {
    pub fn new() -> Self {
        Self {
            vus: 0,
            iterations: 0,
            failed: 0,
            elapsed: Duration::ZERO,
            latency: default_tdigest(),
        }
    }

    pub fn absorb(&mut self, outcomes: &[IterationOutcome], elapsed: Duration, vus: usize) {
        self.vus = vus;
        self.elapsed += elapsed;
        for outcome in outcomes {
            self.iterations += 1;
            if outcome.failed() {
                self.failed += 1;
            }
            if let Some(ms) = outcome.response_time_ms() {
                self.latency.insert(ms);
            }
        }
    }

    pub fn iterations_per_sec(&self) -> f64 {
        if self.elapsed.is_zero() {
            0.
        } else {
            self.iterations as f64 / self.elapsed.as_secs_f64()
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.
        } else {
            self.failed as f64 / self.iterations as f64
        }
    }

    /// Latency quantile in milliseconds.
    pub fn latency(&self, quantile: f64) -> f64 {
        if self.latency.is_empty() {
            return 0.;
        }

        let ms = self.latency.quantile(quantile);
        // TDigest occasionally yields NaN on tiny inputs
        if ms.is_finite() {
            ms
        } else {
            error!("NaN latency calculation in progress report.");
            0.
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VUs={}, it/s={:.2}, ErrorRate={:.2}, p50={:.2}ms, p90={:.2}ms, p99={:.2}ms",
            self.vus,
            self.iterations_per_sec(),
            self.failure_rate(),
            self.latency(0.5),
            self.latency(0.90),
            self.latency(0.99),
        )
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use surge_core::{CheckResult, ResponseMeta};

    #[test]
    fn window_rates() {
        let outcomes: Vec<_> = (0..10)
            .map(|i| {
                IterationOutcome::new(
                    ResponseMeta {
                        status: if i == 0 { 500 } else { 200 },
                        duration: Duration::from_millis(10),
                    },
                    vec![CheckResult::new("ok", true)],
                    BTreeMap::new(),
                    1,
                )
            })
            .collect();

        let mut m = Measurement::new();
        m.absorb(&outcomes, Duration::from_secs(2), 4);
        assert_eq!(m.iterations, 10);
        assert_eq!(m.iterations_per_sec(), 5.);
        assert_eq!(m.failure_rate(), 0.1);
        let p50 = m.latency(0.5);
        assert!((0. ..=10.5).contains(&p50), "{p50}");
        assert!(m.to_string().starts_with("VUs=4"));
    }

    #[test]
    fn transport_failures_skip_latency() {
        let timed_out = IterationOutcome::transport_failure(
            Duration::from_secs(60),
            ["status is 200"],
            BTreeMap::new(),
            1,
            "timed out",
        );

        let mut m = Measurement::new();
        m.absorb(&[timed_out], Duration::from_secs(1), 1);
        assert_eq!(m.iterations, 1);
        assert_eq!(m.failure_rate(), 1.);
        assert_eq!(m.latency(0.99), 0.);
    }

    #[test]
    fn empty_window() {
        let m = Measurement::new();
        assert_eq!(m.iterations_per_sec(), 0.);
        assert_eq!(m.failure_rate(), 0.);
        assert_eq!(m.latency(0.99), 0.);
    }
}
