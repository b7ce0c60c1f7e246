use axum::{debug_handler, extract::Path, http::StatusCode, routing::get, Router};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
use metrics::counter;
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{Arc, RwLock},
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub fn router() -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(status))
        .route("/flaky/:fail_percent", get(flaky))
        .route("/static/*asset", get(asset))
        .route("/limited/:max_rps/name/:name", get(limited))
        .layer(TraceLayer::new_for_http())
}

/// Serve on `addr` until the process exits.
pub async fn run(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router()).await?;
    Ok(())
}

/// Serve on `addr` in the background, returning the bound address (useful with port `0`).
pub async fn spawn(addr: SocketAddr) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router()).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });
    Ok(local)
}

#[debug_handler]
pub async fn health() -> &'static str {
    counter!("mock-service.requests", "route" => "health").increment(1);
    "ok"
}

#[debug_handler]
pub async fn delay(Path(delay_ms): Path<u64>) {
    counter!("mock-service.requests", "route" => "delay").increment(1);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[debug_handler]
pub async fn status(Path(code): Path<u16>) -> StatusCode {
    counter!("mock-service.requests", "route" => "status").increment(1);
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Fails roughly `fail_percent`% of requests with a 500.
#[debug_handler]
pub async fn flaky(Path(fail_percent): Path<u32>) -> StatusCode {
    counter!("mock-service.requests", "route" => "flaky").increment(1);
    if rand::thread_rng().gen_range(0..100) < fail_percent {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

#[debug_handler]
pub async fn asset(Path(asset): Path<String>) -> String {
    counter!("mock-service.requests", "route" => "static").increment(1);
    format!("/* {asset} */")
}

lazy_static! {
    static ref LIMITED_MAP: Arc<RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Rejects with 429 once `name` exceeds `max_rps`.
#[debug_handler]
pub async fn limited(Path((max_rps, name)): Path<(u32, String)>) -> StatusCode {
    counter!("mock-service.requests", "route" => "limited").increment(1);

    let Some(max_rps) = NonZeroU32::new(max_rps) else {
        return StatusCode::BAD_REQUEST;
    };

    let existing = match LIMITED_MAP.read() {
        Ok(map) => map.get(&name).cloned(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR,
    };
    let limiter = match existing {
        Some(limiter) => limiter,
        None => {
            let limiter = Arc::new(rate_limiter(max_rps));
            match LIMITED_MAP.write() {
                Ok(mut map) => map.entry(name).or_insert(limiter).clone(),
                Err(_) => return StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    };

    match limiter.check() {
        Ok(_) => StatusCode::OK,
        Err(_) => {
            debug!("Rate limited.");
            StatusCode::TOO_MANY_REQUESTS
        }
    }
}

/** Utils **/

pub fn rate_limiter(rps: NonZeroU32) -> DefaultDirectRateLimiter {
    // A small burst absorbs scheduling jitter on the caller's side
    RateLimiter::direct(Quota::per_second(rps).allow_burst(NonZeroU32::MIN.saturating_add(1)))
}
