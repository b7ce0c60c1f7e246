mod utils;
use utils::*;

use std::num::NonZeroU32;
use std::time::Duration;
use surge::core::{AbortReason, ScenarioSpec};
use surge::prelude::*;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn unreachable_host_is_recorded() {
    init();

    let stats = Scenario::http("unreachable", &closed_port_url())
        .vus(2)
        .duration(Duration::from_millis(500))
        .pause(Duration::from_millis(50))
        .timeout(Duration::from_secs(1))
        .retries(1)
        .threshold("http_req_failed", "rate<0.01")
        .threshold("http_req_duration", "p(95)<500")
        .await
        .unwrap();

    assert!(stats.iterations > 0);
    assert_eq!(stats.http_reqs, stats.iterations * 2);
    assert_eq!(stats.failure_rate, 1.);
    assert!(stats.checks.iter().all(|c| c.passes == 0));
    // Transport failures carry no response time
    assert_eq!(stats.request_duration.p95, None);

    let duration = stats
        .thresholds
        .iter()
        .find(|t| t.threshold.key() == "http_req_duration")
        .unwrap();
    assert!(duration.passed);
    assert!(!stats.passed());
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn abort_handle_stops_early() {
    let base = mock_server().await;

    let scenario = Scenario::http("abort", &format!("{base}/delay/ms/5"))
        .vus(3)
        .duration(Duration::from_secs(3_600))
        .pause(Duration::from_millis(10));
    let handle = scenario.abort_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.abort();
    });

    let stats = scenario.await.unwrap();
    assert_eq!(stats.aborted, Some(AbortReason::Signal));
    assert!(stats.iterations > 0);
    assert!(stats.elapsed < Duration::from_secs(10));
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn abort_on_fail_ends_run_before_profile() {
    let base = mock_server().await;

    let stats = Scenario::http("abort-on-fail", &format!("{base}/status/503"))
        .vus(2)
        .duration(Duration::from_secs(3_600))
        .pause(Duration::from_millis(10))
        .abort_threshold("http_req_failed", "rate<0.01", Some(Duration::from_millis(500)))
        .await
        .unwrap();

    match &stats.aborted {
        Some(AbortReason::Threshold(t)) => assert_eq!(t, "http_req_failed: rate<0.01"),
        other => panic!("unexpected abort reason {other:?}"),
    }
    assert!(stats.elapsed >= Duration::from_millis(500));
    assert!(stats.elapsed < Duration::from_secs(10));
    assert!(!stats.passed());
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn ramping_file_scenario() {
    let base = mock_server().await;

    let json = format!(
        r#"{{
            "name": "ramp",
            "base_url": "{base}",
            "path": "/delay/ms/5",
            "stages": [
                {{"duration": "500ms", "target": 4}},
                {{"duration": "500ms", "target": 0}}
            ],
            "thresholds": {{
                "http_req_failed": ["rate<0.01"],
                "iterations": ["count>0"]
            }},
            "pause": "20ms"
        }}"#
    );

    let stats = Scenario::from_spec(ScenarioSpec::from_json(&json).unwrap())
        .await
        .unwrap();

    assert!(stats.passed(), "{stats}");
    assert!(stats.peak_vus >= 3 && stats.peak_vus <= 4);
    assert!(stats.elapsed >= Duration::from_secs(1));
    assert!(stats.aborted.is_none());
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn max_rps_caps_request_rate() {
    let base = mock_server().await;

    let stats = Scenario::http("capped", &format!("{base}/limited/20/name/capped"))
        .vus(8)
        .duration(Duration::from_secs(1))
        .pause(Duration::ZERO)
        .max_rps(NonZeroU32::new(10).unwrap())
        .threshold("http_req_failed", "rate==0")
        .await
        .unwrap();

    assert!(stats.passed(), "{stats}");
    assert!(stats.iterations <= 15, "{} iterations", stats.iterations);
}

#[tokio::test]
async fn invalid_configuration_sends_nothing() {
    init();

    let result = Scenario::http("bad", &closed_port_url())
        .vus(1)
        .duration(Duration::from_secs(1))
        .threshold("http_req_duration", "rate<0.01")
        .await;

    assert!(matches!(result, Err(ScenarioError::Config(_))));

    let result = Scenario::http("bad-url", "not a url").preset(Preset::Smoke).await;
    assert!(matches!(result, Err(ScenarioError::Config(_))));
}
