//! Hammer a local health endpoint, configured in code instead of from a file.
use std::time::Duration;
use surge::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    demos::init_tracing();

    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let stats = Scenario::http("health", &base_url)
        .path("/api/v1/health")
        .vus(10)
        .duration(Duration::from_secs(30))
        .pause(Duration::from_millis(100))
        .check(Check::status(200))
        .check(Check::duration_below(Duration::from_millis(50)))
        .threshold("http_req_duration", "p(95)<100")
        .threshold("http_req_failed", "rate<0.001")
        .threshold("checks", "rate>0.99")
        .await?;

    demos::report(&stats)
}
