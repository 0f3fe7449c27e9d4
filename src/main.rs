use clap::{error::ErrorKind, CommandFactory, Parser};
use client::{create_client, HttpScraper};
use config::{Config, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_PROMETHEUS_URL};
use sampler::DEFAULT_METRIC_NAME;
use tracing_subscriber::{fmt, EnvFilter};

mod client;
mod config;
mod metrics;
mod monitor;
mod sampler;

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Cli::parse();

    let config = match Config::from_cli(args) {
        Ok(config) => config,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    let client = create_client(config.fetch_timeout)?;
    let mut scraper = HttpScraper::new(client, config.prometheus_url.clone());
    monitor::run(&config, &mut scraper, &mut std::io::stdout()).await?;
    Ok(())
}

/// Monitor the action counter of a Temporal Server and report the average
/// actions per second and the total number of actions over a time window.
#[derive(Parser, Debug)]
#[command(name = "temporal-actions-count")]
#[command(
    after_help = "Examples:\n  temporal-actions-count --time-window-seconds 120\n  temporal-actions-count --time-window-seconds 120 --prometheus-url http://localhost:9090/metrics --included-namespace default"
)]
struct Cli {
    /// The time period in seconds to capture the action metrics
    #[arg(long)]
    time_window_seconds: u64,

    /// The Prometheus scrape URL
    #[arg(long, default_value = DEFAULT_PROMETHEUS_URL)]
    prometheus_url: String,

    /// The namespace to filter for; all namespaces are sampled when omitted
    #[arg(long)]
    included_namespace: Option<String>,

    /// A namespace whose series never count, e.g. temporal_system
    #[arg(long)]
    excluded_namespace: Option<String>,

    /// Counter to sample; `<name>_total` series match as well
    #[arg(long, default_value = DEFAULT_METRIC_NAME)]
    metric_name: String,

    /// Per-request timeout for a scrape, in milliseconds
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_MS)]
    fetch_timeout_ms: u64,

    /// Print a JSON summary of the run after the total
    #[arg(long)]
    json: bool,
}
