//! Ramp to 20 VUs against quickpizza, hold for ten minutes, ramp down.
use surge::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    demos::init_tracing();

    let spec = demos::load_config("quickpizza")?;
    let scenario = Scenario::from_spec(spec);

    let abort = scenario.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping VUs.");
            abort.abort();
        }
    });

    let stats = scenario.await?;
    demos::report(&stats)
}
