//! `surge run`: execute a scenario file and exit with its verdict.
mod args;

use anyhow::Context;
use args::{Command, RunArgs, SurgeCli};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::process::ExitCode;
use surge::core::{RunStatistics, THRESHOLD_BREACH_EXIT_CODE};
use surge::Scenario;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("surge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = SurgeCli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args).await,
    };

    match result {
        Ok(stats) if stats.passed() => ExitCode::SUCCESS,
        Ok(_) => {
            error!("Some thresholds have been crossed.");
            ExitCode::from(THRESHOLD_BREACH_EXIT_CODE as u8)
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<RunStatistics> {
    if let Some(addr) = args.prometheus {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to start the Prometheus exporter")?;
        info!("Serving metrics on http://{addr}/metrics");
    }

    let scenario = Scenario::from_spec(args.spec()?);
    let abort = scenario.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping VUs.");
            abort.abort();
        }
    });

    let stats = scenario.await?;
    println!("{stats}");

    if let Some(path) = &args.summary_export {
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }

    Ok(stats)
}
