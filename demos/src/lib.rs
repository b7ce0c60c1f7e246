//! Shared setup for the demo binaries under `examples/`.
use anyhow::Context;
use std::path::PathBuf;
use surge::core::{RunStatistics, ScenarioSpec, THRESHOLD_BREACH_EXIT_CODE};
use tracing_subscriber::FmtSubscriber;

pub fn init_tracing() {
    FmtSubscriber::builder()
        .with_env_filter("surge=info")
        .init();
}

/// Loads `configs/<name>.json`.
pub fn load_config(name: &str) -> anyhow::Result<ScenarioSpec> {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "configs", &format!("{name}.json")]
        .iter()
        .collect();
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(ScenarioSpec::from_json(&json)?)
}

/// Prints the summary and exits the way `surge run` does.
pub fn report(stats: &RunStatistics) -> ! {
    println!("{stats}");
    if stats.passed() {
        std::process::exit(0)
    } else {
        std::process::exit(THRESHOLD_BREACH_EXIT_CODE)
    }
}
