use crate::common::constants::*;
use crate::common::error::{CrawlError, Result};
use crate::common::types::Window;
use crate::pipeline::navigator::NavigatorConfig;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub window: WindowConfig,
    #[serde(default)]
    pub crawl: CrawlSettings,
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub max_pages: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub enricher_concurrency: usize,
    pub timeout_secs: u64,
    pub output_dir: PathBuf,
    pub master_file: String,
    pub user_agent: Option<String>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_ms: DEFAULT_BACKOFF_MS,
            enricher_concurrency: DEFAULT_ENRICHER_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            master_file: DEFAULT_MASTER_FILE.to_string(),
            user_agent: None,
        }
    }
}

/// One venue calendar, described by the CSS selectors the generic HTML adapter needs.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub id: String,
    pub name: String,
    pub start_url: String,
    pub requests_per_min: Option<u64>,
    /// Cap on concurrent requests to this venue, listing and detail pages together
    pub max_in_flight: Option<u32>,
    pub max_pages: Option<usize>,
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// One element per listed event (or per calendar-day event item)
    pub event: String,
    pub title: String,
    pub date: Option<String>,
    /// Read the date from this attribute (e.g. `data-fulldate`) instead of text
    pub date_attr: Option<String>,
    pub time: Option<String>,
    pub link: Option<String>,
    pub period_label: Option<String>,
    pub next: Option<String>,
    /// Showtime elements on the event's detail page; enables detail enrichment
    pub detail_time: Option<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CrawlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.window()?;
        if self.crawl.enricher_concurrency == 0 {
            return Err(CrawlError::Config(
                "crawl.enricher_concurrency must be at least 1".to_string(),
            ));
        }
        if self.crawl.max_pages == 0 {
            return Err(CrawlError::Config(
                "crawl.max_pages must be at least 1".to_string(),
            ));
        }
        let mut ids = HashSet::new();
        for venue in &self.venues {
            if !ids.insert(venue.id.as_str()) {
                return Err(CrawlError::Config(format!("duplicate venue id '{}'", venue.id)));
            }
            if venue.max_in_flight == Some(0) {
                return Err(CrawlError::Config(format!(
                    "venue '{}': max_in_flight must be at least 1",
                    venue.id
                )));
            }
            if venue.selectors.date.is_none() && venue.selectors.date_attr.is_none() {
                return Err(CrawlError::Config(format!(
                    "venue '{}' needs selectors.date or selectors.date_attr",
                    venue.id
                )));
            }
        }
        Ok(())
    }

    pub fn window(&self) -> Result<Window> {
        Window::new(self.window.start, self.window.end)
    }

    /// Look up a venue by id. A missing venue is fatal for that venue only.
    pub fn venue(&self, id: &str) -> Result<&VenueConfig> {
        self.venues
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| CrawlError::UnknownVenue(id.to_string()))
    }

    pub fn navigator_config(&self, venue: &VenueConfig) -> NavigatorConfig {
        NavigatorConfig {
            max_pages: venue.max_pages.unwrap_or(self.crawl.max_pages).max(1),
            max_retries: self.crawl.max_retries,
            backoff: Duration::from_millis(self.crawl.backoff_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.crawl.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[window]
start = "2025-04-14"
end = "2025-07-31"

[crawl]
max_pages = 6
enricher_concurrency = 3

[[venues]]
id = "fedexforum"
name = "FedExForum"
start_url = "https://example.com/calendar"
max_pages = 2
max_in_flight = 2

[venues.selectors]
event = ".view-item-calendar .contents"
title = "a.event-popup"
date_attr = "data-date"
period_label = ".date-heading h3"
next = ".date-next a"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.crawl.max_pages, 6);
        assert_eq!(config.crawl.enricher_concurrency, 3);
        assert_eq!(config.crawl.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.crawl.master_file, DEFAULT_MASTER_FILE);

        let venue = config.venue("fedexforum").unwrap();
        assert_eq!(venue.name, "FedExForum");
        assert_eq!(config.navigator_config(venue).max_pages, 2);
        assert_eq!(venue.max_in_flight, Some(2));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = Config::from_toml_str(include_str!("../config.toml")).unwrap();
        assert_eq!(config.venues.len(), 2);
        assert!(config.venue("united_center").unwrap().selectors.detail_time.is_some());
    }

    #[test]
    fn test_unknown_venue() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert!(matches!(
            config.venue("madison_square_garden"),
            Err(CrawlError::UnknownVenue(_))
        ));
    }

    #[test]
    fn test_rejects_reversed_window() {
        let bad = SAMPLE.replace("2025-07-31", "2025-01-01");
        assert!(matches!(
            Config::from_toml_str(&bad),
            Err(CrawlError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let bad = SAMPLE.replace("enricher_concurrency = 3", "enricher_concurrency = 0");
        assert!(Config::from_toml_str(&bad).is_err());

        let bad = SAMPLE.replace("max_in_flight = 2", "max_in_flight = 0");
        assert!(matches!(
            Config::from_toml_str(&bad),
            Err(CrawlError::Config(_))
        ));
    }
}
