#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use venue_crawler::apis::adapter::{DetailFetcher, PageHandle, VenueAdapter};
use venue_crawler::common::error::AdapterError;
use venue_crawler::common::types::{RawEventRecord, Window};
use venue_crawler::pipeline::navigator::NavigatorConfig;
use venue_crawler::pipeline::orchestrator::VenueSource;

/// One scripted listing page: optional month header plus rows.
#[derive(Clone, Default)]
pub struct Page {
    pub label: Option<String>,
    pub rows: Vec<Row>,
}

#[derive(Clone)]
pub struct Row {
    pub title: String,
    pub date: String,
    pub time: Option<String>,
    pub link: Option<String>,
}

pub fn row(title: &str, date: &str, time: Option<&str>) -> Row {
    Row {
        title: title.to_string(),
        date: date.to_string(),
        time: time.map(str::to_string),
        link: None,
    }
}

pub fn linked(title: &str, date: &str, link: &str) -> Row {
    Row {
        link: Some(link.to_string()),
        ..row(title, date, None)
    }
}

pub fn page(label: Option<&str>, rows: Vec<Row>) -> Page {
    Page {
        label: label.map(str::to_string),
        rows,
    }
}

/// In-memory venue whose pages are addressed by index.
pub struct ScriptedAdapter {
    pub id: String,
    pub name: String,
    pub pages: Vec<Page>,
    pub unavailable: bool,
    pub fetch_failures: AtomicUsize,
    pub advance_failures: AtomicUsize,
    pub fetch_delay: Option<Duration>,
    pub extracted_pages: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(id: &str, pages: Vec<Page>) -> Self {
        Self {
            id: id.to_string(),
            name: format!("{} Hall", id),
            pages,
            unavailable: false,
            fetch_failures: AtomicUsize::new(0),
            advance_failures: AtomicUsize::new(0),
            fetch_delay: None,
            extracted_pages: AtomicUsize::new(0),
        }
    }

    fn index(page: &PageHandle) -> usize {
        page.location.parse().unwrap_or(0)
    }
}

#[async_trait]
impl VenueAdapter for ScriptedAdapter {
    fn venue_id(&self) -> &str {
        &self.id
    }

    fn venue_name(&self) -> &str {
        &self.name
    }

    async fn load_start(&self) -> Result<PageHandle, AdapterError> {
        if self.unavailable {
            return Err(AdapterError::Unavailable("404 on start page".to_string()));
        }
        Ok(PageHandle::new("0"))
    }

    async fn fetch_page(&self, page: &mut PageHandle) -> Result<(), AdapterError> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.fetch_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fetch_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AdapterError::Transient("connection reset".to_string()));
        }
        page.content = Some(page.location.clone());
        Ok(())
    }

    fn current_period_label(&self, page: &PageHandle) -> Option<String> {
        self.pages.get(Self::index(page))?.label.clone()
    }

    fn extract_raw_records(&self, page: &PageHandle) -> Vec<Result<RawEventRecord, AdapterError>> {
        self.extracted_pages.fetch_add(1, Ordering::SeqCst);
        let Some(listing) = self.pages.get(Self::index(page)) else {
            return Vec::new();
        };
        listing
            .rows
            .iter()
            .map(|r| {
                if r.title.is_empty() {
                    return Err(AdapterError::Extraction {
                        field: "title".to_string(),
                        detail: r.date.clone(),
                    });
                }
                Ok(RawEventRecord {
                    venue_id: self.id.clone(),
                    title: r.title.clone(),
                    raw_date_text: r.date.clone(),
                    raw_time_text: r.time.clone(),
                    detail_link: r.link.clone(),
                })
            })
            .collect()
    }

    async fn has_more_and_advance(&self, page: &mut PageHandle) -> Result<bool, AdapterError> {
        let remaining = self.advance_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.advance_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AdapterError::Transient("next link timed out".to_string()));
        }
        let next = Self::index(page) + 1;
        if next < self.pages.len() {
            page.advance_to(next.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Detail pages keyed by link; a missing link is a failed fetch.
pub struct ScriptedDetails {
    pub pages: HashMap<String, Vec<String>>,
}

#[async_trait]
impl DetailFetcher for ScriptedDetails {
    async fn fetch_showtimes(&self, link: &str) -> Result<Vec<String>, AdapterError> {
        self.pages
            .get(link)
            .cloned()
            .ok_or_else(|| AdapterError::Transient(format!("{link} timed out")))
    }
}

pub fn window() -> Window {
    Window::new(
        NaiveDate::from_ymd_opt(2025, 4, 14).unwrap(),
        NaiveDate::from_ymd_opt(2025, 7, 31).unwrap(),
    )
    .unwrap()
}

pub fn nav_config() -> NavigatorConfig {
    NavigatorConfig {
        max_pages: 12,
        max_retries: 2,
        backoff: Duration::ZERO,
    }
}

pub fn source(adapter: ScriptedAdapter) -> VenueSource {
    VenueSource {
        adapter: Arc::new(adapter),
        details: None,
        navigator: nav_config(),
    }
}
