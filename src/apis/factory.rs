use crate::apis::adapter::{DetailFetcher, VenueAdapter};
use crate::apis::html_calendar::{HtmlCalendarAdapter, HtmlDetailFetcher};
use crate::apis::http::HttpFetcher;
use crate::common::error::{CrawlError, Result};
use crate::config::{Config, VenueConfig};
use crate::pipeline::ingestion::{Limits, RateLimiter};
use crate::pipeline::orchestrator::VenueSource;
use std::sync::Arc;

/// Request limits for one venue. Listing pages and detail pages share them.
pub fn venue_limits(venue: &VenueConfig) -> Limits {
    Limits {
        requests_per_min: venue.requests_per_min,
        concurrency: venue.max_in_flight,
    }
}

/// Build the adapter, optional detail fetcher and navigation limits for a configured venue.
pub fn create_source(venue: &VenueConfig, config: &Config) -> Result<VenueSource> {
    let limiter = RateLimiter::new(venue_limits(venue));
    let http = HttpFetcher::new(config.crawl.user_agent.as_deref(), limiter)
        .map_err(|e| CrawlError::Config(format!("venue '{}': {}", venue.id, e)))?;

    let adapter: Arc<dyn VenueAdapter> = Arc::new(HtmlCalendarAdapter::new(venue, http.clone())?);
    let details = match venue.selectors.detail_time.as_deref() {
        Some(selector) => {
            let fetcher: Arc<dyn DetailFetcher> =
                Arc::new(HtmlDetailFetcher::new(selector, http)?);
            Some(fetcher)
        }
        None => None,
    };

    Ok(VenueSource {
        adapter,
        details,
        navigator: config.navigator_config(venue),
    })
}

/// Resolve a venue id against the configuration and build its source.
pub fn create_source_by_id(id: &str, config: &Config) -> Result<VenueSource> {
    let venue = config.venue(id)?;
    create_source(venue, config)
}
