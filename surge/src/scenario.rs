//! Scenario logic and constants
use crate::iteration::{HttpIteration, Iteration};
use crate::measurement::Measurement;
use crate::recorder::Recorder;
use crate::timer::Timer;
use crate::vu_pool::VuPool;
use crate::{AbortHandle, ScenarioError};
use std::{
    future::Future,
    num::NonZeroU32,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use surge_core::{
    evaluate, evaluate_one, AbortReason, Check, Preset, RunStatistics, ScenarioConfig,
    ScenarioSpec, Stage, ThresholdSpec,
};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// How often the run loop adjusts the VU count.
const CONTROL_INTERVAL: Duration = Duration::from_millis(100);
/// How often progress is logged and `abort_on_fail` thresholds are re-evaluated.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

type RunnerFuture = Pin<Box<dyn Future<Output = Result<RunStatistics, ScenarioError>> + Send>>;

/// Load test scenario structure
///
/// A load profile, a set of thresholds and an iteration function. Awaiting it validates the
/// configuration, runs the virtual users and resolves to the run's [`RunStatistics`].
#[pin_project::pin_project]
pub struct Scenario<T> {
    func: T,
    spec: ScenarioSpec,
    abort: AbortHandle,
    runner_fut: Option<RunnerFuture>,
}

impl<T> Scenario<T> {
    /// Scenario driving a custom iteration function.
    pub fn new(name: &str, func: T) -> Self {
        Self::with_spec(ScenarioSpec::new(name), func)
    }

    pub fn with_spec(spec: ScenarioSpec, func: T) -> Self {
        Self {
            func,
            spec,
            abort: AbortHandle::new(),
            runner_fut: None,
        }
    }

    /// Handle which stops the run early when triggered.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn spec(&self) -> &ScenarioSpec {
        &self.spec
    }
}

impl Scenario<HttpIteration> {
    /// Scenario issuing one GET to `base_url` per iteration.
    pub fn http(name: &str, base_url: &str) -> Self {
        let mut spec = ScenarioSpec::new(name);
        spec.base_url = Some(base_url.to_string());
        Self::with_spec(spec, HttpIteration::new())
    }

    /// HTTP scenario described by a (possibly file-loaded) spec.
    pub fn from_spec(spec: ScenarioSpec) -> Self {
        Self::with_spec(spec, HttpIteration::new())
    }
}

impl<T: Iteration> Future for Scenario<T> {
    type Output = Result<RunStatistics, ScenarioError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if this.runner_fut.is_none() {
            let func = this.func.clone();
            let spec = this.spec.clone();
            let abort = this.abort.clone();
            *this.runner_fut = Some(Box::pin(async move {
                // NOTE: Everything is validated before a single VU is spawned
                let config = spec.resolve()?;
                let iteration = func.prepare(&config)?;
                Ok(run_scenario(iteration, config, abort).await)
            }));
        }

        if let Some(runner) = this.runner_fut {
            runner.as_mut().poll(cx)
        } else {
            unreachable!()
        }
    }
}

pub trait ConfigurableScenario:
    Future<Output = Result<RunStatistics, ScenarioError>> + Sized + Send
{
    fn vus(self, vus: u32) -> Self;
    fn duration(self, duration: Duration) -> Self;
    fn stage(self, duration: Duration, target: u32) -> Self;
    fn preset(self, preset: Preset) -> Self;
    fn threshold(self, key: &str, expr: &str) -> Self;
    fn abort_threshold(self, key: &str, expr: &str, delay: Option<Duration>) -> Self;
    fn check(self, check: Check) -> Self;
    fn pause(self, pause: Duration) -> Self;
    fn path(self, path: &str) -> Self;
    fn tag(self, key: &str, value: &str) -> Self;
    fn timeout(self, timeout: Duration) -> Self;
    fn retries(self, retries: u32) -> Self;
    fn graceful_stop(self, grace: Duration) -> Self;
    fn max_rps(self, max_rps: NonZeroU32) -> Self;
}

impl<T: Iteration> ConfigurableScenario for Scenario<T> {
    /// Run a constant number of VUs.
    ///
    /// NOTE: Must supply a `.duration()` as well
    ///
    /// # Example
    /// ```no_run
    /// use surge::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let stats = Scenario::http("health", "http://localhost:8080/api/v1/health")
    ///         .vus(10)
    ///         .duration(Duration::from_secs(30))
    ///         .await
    ///         .unwrap();
    ///     println!("{stats}");
    /// }
    /// ```
    fn vus(mut self, vus: u32) -> Self {
        self.spec.load.vus = Some(vus);
        self
    }

    /// Run for the given duration.
    ///
    /// NOTE: Only valid together with `.vus()`
    fn duration(mut self, duration: Duration) -> Self {
        self.spec.load.duration = Some(duration);
        self
    }

    /// Append a ramping stage: move towards `target` VUs over `duration`.
    ///
    /// # Example
    /// ```no_run
    /// use surge::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let _ = Scenario::http("ramp", "https://quickpizza.grafana.com")
    ///         .stage(Duration::from_secs(30), 20)
    ///         .stage(Duration::from_secs(600), 20)
    ///         .stage(Duration::from_secs(30), 0)
    ///         .await;
    /// }
    /// ```
    fn stage(mut self, duration: Duration, target: u32) -> Self {
        self.spec
            .load
            .stages
            .get_or_insert_with(Vec::new)
            .push(Stage::new(duration, target));
        self
    }

    /// Use one of the named load shapes.
    fn preset(mut self, preset: Preset) -> Self {
        self.spec.load.preset = Some(preset);
        self
    }

    /// Add a threshold, e.g. `.threshold("http_req_duration", "p(95)<500")`.
    ///
    /// The expression is parsed when the scenario starts; a malformed one fails the run before
    /// any request is sent.
    fn threshold(mut self, key: &str, expr: &str) -> Self {
        self.spec
            .thresholds
            .entry(key.to_string())
            .or_default()
            .push(ThresholdSpec::from(expr));
        self
    }

    /// Add a threshold which ends the run as soon as it is breached.
    fn abort_threshold(mut self, key: &str, expr: &str, delay: Option<Duration>) -> Self {
        self.spec
            .thresholds
            .entry(key.to_string())
            .or_default()
            .push(ThresholdSpec::Detailed {
                threshold: expr.to_string(),
                abort_on_fail: true,
                delay_abort_eval: delay,
            });
        self
    }

    /// Add a named check. The first call replaces the default checks.
    fn check(mut self, check: Check) -> Self {
        self.spec.checks.get_or_insert_with(Vec::new).push(check);
        self
    }

    fn pause(mut self, pause: Duration) -> Self {
        self.spec.pause = Some(pause);
        self
    }

    fn path(mut self, path: &str) -> Self {
        self.spec.path = Some(path.to_string());
        self
    }

    /// Tag every outcome of this scenario with `key:value`.
    fn tag(mut self, key: &str, value: &str) -> Self {
        self.spec.tags.insert(key.to_string(), value.to_string());
        self
    }

    fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = Some(timeout);
        self
    }

    fn retries(mut self, retries: u32) -> Self {
        self.spec.retries = Some(retries);
        self
    }

    fn graceful_stop(mut self, grace: Duration) -> Self {
        self.spec.graceful_stop = Some(grace);
        self
    }

    /// Cap the request rate across all VUs.
    fn max_rps(mut self, max_rps: NonZeroU32) -> Self {
        self.spec.max_rps = Some(max_rps);
        self
    }
}

#[instrument(name="scenario", skip_all, fields(name=config.name))]
pub(crate) async fn run_scenario<T: Iteration>(
    iteration: T,
    config: ScenarioConfig,
    abort: AbortHandle,
) -> RunStatistics {
    info!("Running {} with {}", config.name, config.profile);

    let recorder = Recorder::new(&config.name, config.max_rps);
    let mut pool = VuPool::new(iteration, recorder.clone(), config.pause);
    let total = config.profile.total_duration();

    let mut outcomes = vec![];
    let mut window = Measurement::new();
    let mut since_report = Duration::ZERO;
    let mut peak_vus = 0;
    let mut aborted = None;

    let mut timer = Timer::new(CONTROL_INTERVAL).await;
    debug!("Control interval {timer}");
    let start = Instant::now();
    pool.set_vus(config.profile.vus_at(Duration::ZERO) as usize);
    peak_vus = peak_vus.max(pool.vus());

    // NOTE: This loop only does bookkeeping; VUs never wait on it.
    loop {
        let tick = tokio::select! {
            tick = timer.tick() => tick,
            _ = abort.aborted() => Duration::ZERO,
        };

        let elapsed = start.elapsed();
        let drained = recorder.drain_into(&mut outcomes);
        window.absorb(&outcomes[outcomes.len() - drained..], tick, pool.vus());

        if abort.is_aborted() {
            warn!("Scenario aborted after {:?}", elapsed);
            aborted = Some(AbortReason::Signal);
            break;
        }

        if elapsed >= total {
            break;
        }

        pool.set_vus(config.profile.vus_at(elapsed) as usize);
        peak_vus = peak_vus.max(pool.vus());

        since_report += tick;
        if since_report >= REPORT_INTERVAL {
            since_report = Duration::ZERO;
            info!("{window}");
            window = Measurement::new();

            if let Some(breached) = breached_abort_threshold(&config, &outcomes, elapsed) {
                error!("Threshold `{breached}` breached; aborting run.");
                aborted = Some(AbortReason::Threshold(breached));
                break;
            }
        }
    }

    pool.shutdown(config.graceful_stop).await;
    recorder.drain_into(&mut outcomes);
    let elapsed = start.elapsed();

    let results = evaluate(&config.thresholds, &outcomes);
    for result in results.iter().filter(|r| !r.passed) {
        warn!(
            "Threshold `{}` failed (observed {:?})",
            result.threshold, result.observed
        );
    }

    info!("Scenario complete after {} iterations", recorder.iterations());

    RunStatistics::from_outcomes(
        &config.name,
        &outcomes,
        results,
        elapsed,
        peak_vus as u32,
        aborted,
    )
}

/// First `abort_on_fail` threshold, past its evaluation delay, which no longer holds.
fn breached_abort_threshold(
    config: &ScenarioConfig,
    outcomes: &[surge_core::IterationOutcome],
    elapsed: Duration,
) -> Option<String> {
    config
        .thresholds
        .iter()
        .filter(|t| t.abort_on_fail)
        .filter(|t| elapsed >= t.delay_abort_eval.unwrap_or(Duration::ZERO))
        .map(|t| evaluate_one(t, outcomes))
        .find(|r| !r.passed)
        .map(|r| r.threshold.to_string())
}
