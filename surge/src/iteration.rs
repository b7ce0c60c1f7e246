//! What a virtual user does on every loop: the [`Iteration`] trait, the stock HTTP GET iteration
//! and the cooperative [`pause`] between iterations.
use crate::ScenarioError;
use reqwest::Client;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use surge_core::{Check, IterationOutcome, ResponseMeta, ScenarioConfig};
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

/// One unit of VU work.
///
/// Implemented for every `Fn() -> impl Future<Output = IterationOutcome>` closure, and by
/// [`HttpIteration`] for the configured GET request.
pub trait Iteration: Clone + Send + Sync + 'static {
    /// Bind the iteration to the validated configuration before the first VU starts.
    fn prepare(&self, _config: &ScenarioConfig) -> Result<Self, ScenarioError> {
        Ok(self.clone())
    }

    fn iterate(&self) -> impl Future<Output = IterationOutcome> + Send;
}

impl<T, F> Iteration for T
where
    T: Fn() -> F + Clone + Send + Sync + 'static,
    F: Future<Output = IterationOutcome> + Send,
{
    fn iterate(&self) -> impl Future<Output = IterationOutcome> + Send {
        self()
    }
}

/// A fully described GET request plus the checks to run against its response.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub checks: Vec<Check>,
    pub tags: BTreeMap<String, String>,
    /// Extra attempts for requests which got no response.
    pub retries: u32,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            checks: surge_core::default_checks(),
            tags: BTreeMap::new(),
            retries: 0,
        }
    }
}

/// The stock iteration: GET the scenario's target once.
#[derive(Debug, Clone, Default)]
pub struct HttpIteration {
    bound: Option<Arc<(Client, HttpRequest)>>,
}

impl HttpIteration {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Iteration for HttpIteration {
    fn prepare(&self, config: &ScenarioConfig) -> Result<Self, ScenarioError> {
        let url = config
            .target
            .clone()
            .ok_or_else(|| ScenarioError::MissingTarget(config.name.clone()))?;
        let client = Client::builder().timeout(config.timeout).build()?;
        let request = HttpRequest {
            url,
            checks: config.checks.clone(),
            tags: config.tags.clone(),
            retries: config.retries,
        };

        Ok(Self {
            bound: Some(Arc::new((client, request))),
        })
    }

    fn iterate(&self) -> impl Future<Output = IterationOutcome> + Send {
        let bound = self.bound.clone();
        async move {
            match bound {
                Some(bound) => run_iteration(&bound.0, &bound.1).await,
                None => {
                    error!("HttpIteration used before being prepared.");
                    IterationOutcome::transport_failure(
                        Duration::ZERO,
                        [],
                        BTreeMap::new(),
                        1,
                        "iteration not prepared",
                    )
                }
            }
        }
    }
}

/// Issue a single GET, time it, and evaluate the request's checks against the response.
///
/// Never fails: a transport error or timeout becomes an outcome with status `0` and every check
/// failed, after `request.retries` further attempts.
pub async fn run_iteration(client: &Client, request: &HttpRequest) -> IterationOutcome {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let start = Instant::now();
        let result = send(client, &request.url).await;
        let duration = start.elapsed();

        match result {
            Ok(status) => {
                let meta = ResponseMeta { status, duration };
                let checks = request.checks.iter().map(|c| c.evaluate(&meta)).collect();
                let tags = outcome_tags(request, status);
                return IterationOutcome::new(meta, checks, tags, attempts);
            }
            Err(err) if attempts <= request.retries => {
                debug!("Attempt {attempts} to {} failed, retrying: {err}", request.url);
            }
            Err(err) => {
                warn!("Request to {} failed: {err}", request.url);
                return IterationOutcome::transport_failure(
                    duration,
                    request.checks.iter().map(|c| c.name.as_str()),
                    outcome_tags(request, surge_core::TRANSPORT_FAILURE_STATUS),
                    attempts,
                    err.to_string(),
                );
            }
        }
    }
}

async fn send(client: &Client, url: &str) -> Result<u16, reqwest::Error> {
    let response = client.get(url).send().await?;
    let status = response.status().as_u16();
    // NOTE: Duration covers the whole body, not just the headers
    response.bytes().await?;
    Ok(status)
}

fn outcome_tags(request: &HttpRequest, status: u16) -> BTreeMap<String, String> {
    let mut tags = request.tags.clone();
    tags.insert("method".to_string(), "GET".to_string());
    tags.insert("url".to_string(), request.url.clone());
    tags.insert("status".to_string(), status.to_string());
    tags.insert(
        "expected_response".to_string(),
        (200..300).contains(&status).to_string(),
    );
    tags
}

/// Suspend the calling VU between iterations. Other VUs keep running.
pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
