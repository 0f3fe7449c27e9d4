use std::io::{self, Write};

use chrono::{DateTime, Utc};
use miette::GraphicalReportHandler;
use serde::Serialize;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    client::{Scrape, ScrapeError},
    config::Config,
    sampler::{SamplingState, TickKind},
};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Outcome of one monitoring window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunReport {
    pub metric_name: String,
    pub prometheus_url: String,
    pub included_namespace: Option<String>,
    pub excluded_namespace: Option<String>,
    pub time_window_seconds: u64,
    pub ticks: u64,
    pub failed_ticks: u64,
    pub counter_resets: u64,
    pub total_actions: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Samples the counter once per tick for `time_window_seconds` ticks,
/// printing the per-tick rate and then the total to `out`.
///
/// Scrape failures are logged and count as a zero-delta tick; only write
/// errors on `out` end the run early.
pub async fn run<S: Scrape, W: Write>(
    config: &Config,
    scraper: &mut S,
    out: &mut W,
) -> io::Result<RunReport> {
    let selector = config.selector();
    print_banner(config, out)?;
    info!(
        url = %config.prometheus_url,
        metric = %config.metric_name,
        window = config.time_window_seconds,
        included_namespace = ?config.included_namespace,
        excluded_namespace = ?config.excluded_namespace,
        "monitoring started"
    );

    let started_at = Utc::now();
    let mut state = SamplingState::default();
    let mut ticker = interval(TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    for _ in 0..config.time_window_seconds {
        let tick = match scraper.scrape().await {
            Ok(samples) => {
                let snapshot = selector.snapshot(&samples);
                debug!(
                    snapshot = snapshot.value,
                    series = snapshot.series,
                    latest_timestamp = ?snapshot.latest_timestamp,
                    "scraped counter"
                );
                state.record(snapshot.value)
            }
            Err(err) => {
                log_scrape_failure(&err);
                state.record_failure()
            }
        };
        if let TickKind::Reset { previous, current } = tick.kind {
            warn!(previous, current, "counter went backwards, treating as a reset");
        }
        writeln!(out, "Current average actions per second: {:.2}", tick.delta)?;
        ticker.tick().await;
    }

    writeln!(
        out,
        "Total actions in the last {} seconds: {}",
        config.time_window_seconds,
        format_total(state.total_actions())
    )?;
    writeln!(out, "Monitoring completed.")?;

    let report = RunReport {
        metric_name: config.metric_name.clone(),
        prometheus_url: config.prometheus_url.to_string(),
        included_namespace: config.included_namespace.clone(),
        excluded_namespace: config.excluded_namespace.clone(),
        time_window_seconds: config.time_window_seconds,
        ticks: state.ticks(),
        failed_ticks: state.failed_ticks(),
        counter_resets: state.counter_resets(),
        total_actions: state.total_actions(),
        started_at,
        finished_at: Utc::now(),
    };
    info!(
        total = report.total_actions,
        failed_ticks = report.failed_ticks,
        counter_resets = report.counter_resets,
        "monitoring completed"
    );
    if config.json {
        writeln!(out, "{}", serde_json::to_string(&report)?)?;
    }
    Ok(report)
}

fn print_banner<W: Write>(config: &Config, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "Starting Prometheus {} metric monitoring with a time window of {} seconds...",
        config.metric_name, config.time_window_seconds
    )?;
    writeln!(out, "Monitoring Prometheus endpoint: {}", config.prometheus_url)?;
    match &config.included_namespace {
        Some(namespace) => writeln!(out, "Sampling only from namespace: {namespace}")?,
        None => writeln!(out, "Sampling from all namespaces.")?,
    }
    if let Some(namespace) = &config.excluded_namespace {
        writeln!(out, "Excluding namespace: {namespace}")?;
    }
    writeln!(
        out,
        "Please wait, the total number of actions will be reported after {} seconds...",
        config.time_window_seconds
    )
}

fn log_scrape_failure(err: &ScrapeError) {
    match err {
        ScrapeError::Parse(parse_err) => {
            let mut report = String::new();
            match GraphicalReportHandler::new().render_report(&mut report, parse_err) {
                Ok(()) => warn!(
                    line = parse_err.line(),
                    "skipping tick, metrics body did not parse:\n{report}"
                ),
                Err(_) => warn!(line = parse_err.line(), error = %err, "skipping tick"),
            }
        }
        _ => warn!(error = %err, "skipping tick"),
    }
}

/// Whole totals keep one decimal place, the way counters are usually read.
fn format_total(total: f64) -> String {
    if total.is_finite() && total.fract() == 0.0 {
        format!("{total:.1}")
    } else {
        total.to_string()
    }
}
