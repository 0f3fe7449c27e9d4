use reqwest::Url;
use tokio::time::Duration;

use crate::{metrics::is_valid_metric_name, sampler::CounterSelector, Cli};

pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:63626/metrics";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 900;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub time_window_seconds: u64,
    pub prometheus_url: Url,
    pub metric_name: String,
    pub included_namespace: Option<String>,
    pub excluded_namespace: Option<String>,
    pub fetch_timeout: Duration,
    pub json: bool,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--time-window-seconds must be a positive number of seconds")]
    ZeroTimeWindow,
    #[error("invalid --prometheus-url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported scheme {0:?} in --prometheus-url, expected http or https")]
    UnsupportedScheme(String),
    #[error("invalid --metric-name {0:?}")]
    InvalidMetricName(String),
    #[error("--fetch-timeout-ms must be greater than zero")]
    ZeroFetchTimeout,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.time_window_seconds == 0 {
            return Err(ConfigError::ZeroTimeWindow);
        }
        let prometheus_url =
            Url::parse(&cli.prometheus_url).map_err(|e| ConfigError::InvalidUrl {
                url: cli.prometheus_url.clone(),
                reason: e.to_string(),
            })?;
        if !matches!(prometheus_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(
                prometheus_url.scheme().to_string(),
            ));
        }
        if !is_valid_metric_name(&cli.metric_name) {
            return Err(ConfigError::InvalidMetricName(cli.metric_name));
        }
        if cli.fetch_timeout_ms == 0 {
            return Err(ConfigError::ZeroFetchTimeout);
        }

        Ok(Config {
            time_window_seconds: cli.time_window_seconds,
            prometheus_url,
            metric_name: cli.metric_name,
            included_namespace: non_empty(cli.included_namespace),
            excluded_namespace: non_empty(cli.excluded_namespace),
            fetch_timeout: Duration::from_millis(cli.fetch_timeout_ms),
            json: cli.json,
        })
    }

    pub fn selector(&self) -> CounterSelector {
        CounterSelector::new(self.metric_name.as_str())
            .include_namespace(self.included_namespace.clone())
            .exclude_namespace(self.excluded_namespace.clone())
    }
}

/// An empty namespace means "no filter".
fn non_empty(namespace: Option<String>) -> Option<String> {
    namespace.filter(|namespace| !namespace.is_empty())
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::*;

    fn config(args: &[&str]) -> Result<Config, ConfigError> {
        let cli = Cli::try_parse_from(
            std::iter::once("temporal-actions-count").chain(args.iter().copied()),
        )
        .unwrap();
        Config::from_cli(cli)
    }

    #[test]
    fn defaults() {
        let config = config(&["--time-window-seconds", "120"]).unwrap();
        assert_eq!(config.time_window_seconds, 120);
        assert_eq!(config.prometheus_url.as_str(), DEFAULT_PROMETHEUS_URL);
        assert_eq!(config.metric_name, "action");
        assert_eq!(config.included_namespace, None);
        assert_eq!(config.excluded_namespace, None);
        assert_eq!(config.fetch_timeout, Duration::from_millis(900));
        assert!(!config.json);
    }

    #[test]
    fn all_options() {
        let config = config(&[
            "--time-window-seconds",
            "120",
            "--prometheus-url",
            "http://localhost:9090/metrics",
            "--included-namespace",
            "default",
            "--excluded-namespace",
            "temporal_system",
            "--metric-name",
            "service_requests",
            "--fetch-timeout-ms",
            "250",
            "--json",
        ])
        .unwrap();
        assert_eq!(config.prometheus_url.port(), Some(9090));
        assert_eq!(config.included_namespace.as_deref(), Some("default"));
        assert_eq!(config.excluded_namespace.as_deref(), Some("temporal_system"));
        assert_eq!(config.metric_name, "service_requests");
        assert_eq!(config.fetch_timeout, Duration::from_millis(250));
        assert!(config.json);
    }

    #[test]
    fn empty_namespace_means_all() {
        let config = config(&["--time-window-seconds", "5", "--included-namespace", ""]).unwrap();
        assert_eq!(config.included_namespace, None);
    }

    #[test]
    fn zero_time_window() {
        let err = config(&["--time-window-seconds", "0"]).unwrap_err();
        assert_eq!(err, ConfigError::ZeroTimeWindow);
    }

    #[test]
    fn invalid_url() {
        let err = config(&["--time-window-seconds", "5", "--prometheus-url", "not a url"])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn unsupported_scheme() {
        let err = config(&[
            "--time-window-seconds",
            "5",
            "--prometheus-url",
            "ftp://localhost/metrics",
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedScheme("ftp".to_string()));
    }

    #[test]
    fn invalid_metric_name() {
        let err = config(&["--time-window-seconds", "5", "--metric-name", "action count"])
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidMetricName("action count".to_string()));
    }

    #[test]
    fn zero_fetch_timeout() {
        let err = config(&["--time-window-seconds", "5", "--fetch-timeout-ms", "0"]).unwrap_err();
        assert_eq!(err, ConfigError::ZeroFetchTimeout);
    }
}
