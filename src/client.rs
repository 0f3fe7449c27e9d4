use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, StatusCode, Url,
};
use tokio::time::Duration;

use crate::metrics::{parse_metric_samples, MetricSample, MetricsParseError};

/// Source of one scrape's worth of samples.
pub trait Scrape {
    async fn scrape(&mut self) -> Result<Vec<MetricSample>, ScrapeError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("request to metrics endpoint failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("metrics endpoint answered with {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Parse(#[from] MetricsParseError),
}

pub struct HttpScraper {
    client: Client,
    url: Url,
}

impl HttpScraper {
    pub fn new(client: Client, url: Url) -> Self {
        HttpScraper { client, url }
    }
}

impl Scrape for HttpScraper {
    async fn scrape(&mut self) -> Result<Vec<MetricSample>, ScrapeError> {
        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status(status));
        }
        let body = response.text().await?;
        Ok(parse_metric_samples(&body)?)
    }
}

pub fn create_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.append(
        ACCEPT,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    reqwest::ClientBuilder::new()
        .default_headers(headers)
        .timeout(timeout)
        .build()
}
