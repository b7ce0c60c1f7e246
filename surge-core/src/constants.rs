use std::time::Duration;

/// Pause between iterations when none is configured. Matches the `sleep(1)` every scenario ends
/// with.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Per-request timeout used when the scenario does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long VUs get to finish their current iteration once the run is over.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// Response-time limit used by the default `response time` check.
pub const DEFAULT_CHECK_DURATION: Duration = Duration::from_millis(200);

/// Status code reported for iterations whose request never produced a response.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Exit code for a run which completed but breached at least one threshold.
pub const THRESHOLD_BREACH_EXIT_CODE: i32 = 99;

pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const HTTP_REQS: &str = "http_reqs";
pub const CHECKS: &str = "checks";
pub const ITERATIONS: &str = "iterations";
