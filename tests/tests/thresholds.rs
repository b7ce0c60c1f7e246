mod utils;
use utils::*;

use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surge::prelude::*;
use surge::{run_iteration, HttpRequest};

#[tokio::test]
#[ntest::timeout(20_000)]
async fn fast_endpoint_passes() {
    let base = mock_server().await;

    let stats = Scenario::http("health", &format!("{base}/api/v1/health"))
        .vus(5)
        .duration(Duration::from_secs(1))
        .pause(Duration::from_millis(50))
        .threshold("http_req_duration", "p(95)<500")
        .threshold("http_req_failed", "rate<0.01")
        .threshold("checks", "rate>0.99")
        .await
        .unwrap();

    assert!(stats.passed(), "{stats}");
    assert!(stats.iterations > 5);
    assert_eq!(stats.http_reqs, stats.iterations);
    assert_eq!(stats.failure_rate, 0.);
    assert_eq!(stats.thresholds.len(), 3);
    assert!(stats.checks.iter().all(|c| c.fails == 0));

    let summary = serde_json::to_value(&stats).unwrap();
    assert_eq!(summary["name"], "health");
    assert!(summary["thresholds"].as_array().is_some());
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn server_errors_breach_failure_rate() {
    let base = mock_server().await;

    let stats = Scenario::http("errors", &format!("{base}/status/500"))
        .vus(3)
        .duration(Duration::from_millis(800))
        .pause(Duration::from_millis(50))
        .threshold("http_req_failed", "rate<0.01")
        .threshold("http_req_duration", "p(95)<500")
        .await
        .unwrap();

    assert!(!stats.passed());
    assert_eq!(stats.failure_rate, 1.);

    let failed: Vec<_> = stats.thresholds.iter().filter(|t| !t.passed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].threshold.key(), "http_req_failed");
    assert_eq!(failed[0].observed, Some(1.));

    let status_check = stats
        .checks
        .iter()
        .find(|c| c.name == "status is 200")
        .unwrap();
    assert_eq!(status_check.passes, 0);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn tag_scoped_thresholds_only_see_tagged_requests() {
    let base = mock_server().await;

    let mut asset = HttpRequest::get(format!("{base}/static/app.css"));
    asset.tags.insert("staticAsset".into(), "yes".into());
    let mut page = HttpRequest::get(format!("{base}/delay/ms/150"));
    page.tags.insert("staticAsset".into(), "no".into());

    let requests = Arc::new((Client::new(), asset, page, AtomicU64::new(0)));
    let iteration = move || {
        let requests = requests.clone();
        async move {
            let (client, asset, page, n) = &*requests;
            if n.fetch_add(1, Ordering::Relaxed) % 2 == 0 {
                run_iteration(client, asset).await
            } else {
                run_iteration(client, page).await
            }
        }
    };

    let stats = Scenario::new("tagged", iteration)
        .vus(4)
        .duration(Duration::from_secs(1))
        .pause(Duration::from_millis(20))
        .threshold("http_req_duration{staticAsset:yes}", "p(95)<100")
        .threshold("http_req_duration{staticAsset:no}", "p(95)<100")
        .threshold("http_req_duration{staticAsset:maybe}", "p(95)<100")
        .await
        .unwrap();

    let by_key = |key: &str| {
        stats
            .thresholds
            .iter()
            .find(|t| t.threshold.key() == key)
            .unwrap()
    };

    assert!(by_key("http_req_duration{staticAsset:yes}").passed);
    assert!(!by_key("http_req_duration{staticAsset:no}").passed);

    let untagged = by_key("http_req_duration{staticAsset:maybe}");
    assert!(untagged.passed);
    assert_eq!(untagged.observed, None);
    assert!(!stats.passed());
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn system_tags_scope_by_status() {
    let base = mock_server().await;

    let stats = Scenario::http("flaky", &format!("{base}/flaky/50"))
        .vus(4)
        .duration(Duration::from_secs(1))
        .pause(Duration::from_millis(10))
        .threshold("http_req_failed{status:200}", "rate==0")
        .threshold("http_req_failed{status:500}", "rate==1")
        .threshold("http_req_failed{expected_response:true}", "rate==0")
        .await
        .unwrap();

    assert!(stats.passed(), "{stats}");
    assert!(stats.failure_rate > 0. && stats.failure_rate < 1.);
}
