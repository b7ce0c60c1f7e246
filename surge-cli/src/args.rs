use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use surge::core::{parse_duration, LoadSpec, Preset, ScenarioSpec, ThresholdSpec};

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct SurgeCli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a scenario file, a preset, or both.
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON scenario file.
    pub file: Option<PathBuf>,

    /// Scenario name, when no file is given.
    #[arg(long, default_value = "surge")]
    pub name: String,

    /// Replace the file's load shape with a named preset.
    #[arg(short, long)]
    pub preset: Option<Preset>,

    /// URL to GET on every iteration.
    #[arg(short, long)]
    pub url: Option<String>,

    /// Constant number of VUs; requires `--duration`.
    #[arg(long, requires = "duration", conflicts_with = "preset")]
    pub vus: Option<u32>,

    #[arg(short, long, value_parser = parse_duration, requires = "vus")]
    pub duration: Option<Duration>,

    /// Extra threshold, e.g. `--threshold 'http_req_duration=p(95)<500'`.
    #[arg(short, long = "threshold", value_name = "METRIC=EXPR")]
    pub thresholds: Vec<String>,

    /// Write the end-of-run summary as JSON.
    #[arg(long)]
    pub summary_export: Option<PathBuf>,

    /// Serve Prometheus metrics on this address while running.
    #[arg(long)]
    pub prometheus: Option<SocketAddr>,
}

impl RunArgs {
    /// The scenario described by the file, with command line overrides applied.
    pub fn spec(&self) -> anyhow::Result<ScenarioSpec> {
        let mut spec = match &self.file {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                ScenarioSpec::from_json(&json)
                    .with_context(|| format!("Failed to load {}", path.display()))?
            }
            None => ScenarioSpec::new(&self.name),
        };

        if let Some(url) = &self.url {
            spec.base_url = Some(url.clone());
            spec.path = None;
        }

        if let Some(preset) = self.preset {
            spec.load = LoadSpec {
                preset: Some(preset),
                ..Default::default()
            };
        } else if self.vus.is_some() {
            spec.load = LoadSpec {
                vus: self.vus,
                duration: self.duration,
                ..Default::default()
            };
        }

        for arg in &self.thresholds {
            let (key, expr) = arg
                .split_once('=')
                .with_context(|| format!("Threshold `{arg}` is not of the form METRIC=EXPR"))?;
            spec.thresholds
                .entry(key.trim().to_string())
                .or_default()
                .push(ThresholdSpec::from(expr));
        }

        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> RunArgs {
        let cli = SurgeCli::try_parse_from(["surge", "run"].iter().chain(args).copied()).unwrap();
        match cli.command {
            Command::Run(args) => args,
        }
    }

    #[test]
    fn preset_and_url_without_file() {
        let args = run_args(&["--preset", "smoke", "--url", "http://localhost:8080/api/v1/health"]);
        let config = args.spec().unwrap().resolve().unwrap();

        assert_eq!(config.profile, Preset::Smoke.profile());
        assert_eq!(
            config.target.as_deref(),
            Some("http://localhost:8080/api/v1/health")
        );
    }

    #[test]
    fn vus_require_duration() {
        let cli = SurgeCli::try_parse_from(["surge", "run", "--vus", "3"]);
        assert!(cli.is_err());
    }

    #[test]
    fn threshold_flags_are_added() {
        let args = run_args(&[
            "--vus",
            "2",
            "--duration",
            "10s",
            "--url",
            "http://localhost:8080",
            "-t",
            "http_req_failed=rate<0.01",
            "-t",
            "http_req_duration{staticAsset:yes}=p(95)<100",
        ]);
        let config = args.spec().unwrap().resolve().unwrap();

        assert_eq!(config.thresholds.len(), 2);
        assert_eq!(config.profile.total_duration(), Duration::from_secs(10));
    }

    #[test]
    fn malformed_threshold_flag() {
        let args = run_args(&["--preset", "smoke", "-t", "rate<0.01"]);
        assert!(args.spec().is_err());
    }
}
