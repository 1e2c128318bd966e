use crate::common::error::AdapterError;
use crate::pipeline::ingestion::RateLimiter;
use metrics::counter;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = concat!("venue_crawler/", env!("CARGO_PKG_VERSION"));

/// Shared GET client for venue pages and detail pages.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl HttpFetcher {
    pub fn new(user_agent: Option<&str>, limiter: RateLimiter) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AdapterError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, limiter })
    }

    /// Fetch a page body. Client errors are `Unavailable`; server errors, rate
    /// limiting and network failures are `Transient`.
    pub async fn get_text(&self, url: &str) -> Result<String, AdapterError> {
        let _permit = self.limiter.acquire().await;
        debug!("GET {}", url);

        let resp = self.client.get(url).send().await.map_err(|e| {
            warn!("Request to {} failed: {}", url, e);
            counter!("venue_crawler_http_requests_total", "outcome" => "network_error")
                .increment(1);
            AdapterError::from(e)
        })?;

        let status = resp.status();
        let outcome = classify(status);
        counter!("venue_crawler_http_requests_total", "outcome" => outcome).increment(1);

        match outcome {
            "ok" => Ok(resp.text().await?),
            "transient" => Err(AdapterError::Transient(format!("{url} returned {status}"))),
            _ => Err(AdapterError::Unavailable(format!("{url} returned {status}"))),
        }
    }
}

fn classify(status: StatusCode) -> &'static str {
    if status.is_success() {
        "ok"
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        "transient"
    } else {
        "unavailable"
    }
}
