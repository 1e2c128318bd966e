use crate::apis::adapter::{DetailFetcher, PageHandle, VenueAdapter};
use crate::apis::http::HttpFetcher;
use crate::common::error::{AdapterError, CrawlError, Result};
use crate::common::types::RawEventRecord;
use crate::config::{SelectorConfig, VenueConfig};
use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

/// Selector-driven adapter for server-rendered venue calendars.
///
/// Pages are parsed synchronously inside each call so that no parsed document is
/// ever held across an await.
pub struct HtmlCalendarAdapter {
    venue_id: String,
    venue_name: String,
    start_url: String,
    selectors: SelectorConfig,
    http: HttpFetcher,
}

impl HtmlCalendarAdapter {
    pub fn new(venue: &VenueConfig, http: HttpFetcher) -> Result<Self> {
        validate_selectors(&venue.id, &venue.selectors)?;
        Url::parse(&venue.start_url).map_err(|e| {
            CrawlError::Config(format!(
                "venue '{}' has invalid start_url '{}': {}",
                venue.id, venue.start_url, e
            ))
        })?;
        Ok(Self {
            venue_id: venue.id.clone(),
            venue_name: venue.name.clone(),
            start_url: venue.start_url.clone(),
            selectors: venue.selectors.clone(),
            http,
        })
    }
}

#[async_trait]
impl VenueAdapter for HtmlCalendarAdapter {
    fn venue_id(&self) -> &str {
        &self.venue_id
    }

    fn venue_name(&self) -> &str {
        &self.venue_name
    }

    #[instrument(skip(self), fields(venue = %self.venue_id))]
    async fn load_start(&self) -> std::result::Result<PageHandle, AdapterError> {
        let mut page = PageHandle::new(self.start_url.clone());
        page.content = Some(self.http.get_text(&self.start_url).await?);
        Ok(page)
    }

    async fn fetch_page(&self, page: &mut PageHandle) -> std::result::Result<(), AdapterError> {
        if page.is_loaded() {
            return Ok(());
        }
        let page_number = page.page_number;
        let body = self.http.get_text(&page.location).await.map_err(|e| match e {
            // Only the start page decides availability; later pages are retried.
            AdapterError::Unavailable(msg) if page_number > 1 => AdapterError::Transient(msg),
            other => other,
        })?;
        page.content = Some(body);
        Ok(())
    }

    fn current_period_label(&self, page: &PageHandle) -> Option<String> {
        let selector = self.selectors.period_label.as_deref()?;
        let body = page.content.as_deref()?;
        first_text(body, selector)
    }

    fn extract_raw_records(
        &self,
        page: &PageHandle,
    ) -> Vec<std::result::Result<RawEventRecord, AdapterError>> {
        match page.content.as_deref() {
            Some(body) => extract_records(&self.venue_id, &self.selectors, &page.location, body),
            None => Vec::new(),
        }
    }

    async fn has_more_and_advance(
        &self,
        page: &mut PageHandle,
    ) -> std::result::Result<bool, AdapterError> {
        let Some(next) = self.selectors.next.as_deref() else {
            return Ok(false);
        };
        let Some(body) = page.content.as_deref() else {
            return Err(AdapterError::Transient(format!(
                "page {} not loaded before advance",
                page.page_number
            )));
        };
        match next_location(body, next, &page.location) {
            Some(url) => {
                debug!("Advancing {} to {}", self.venue_id, url);
                page.advance_to(url);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Reads showtimes from detail pages with the venue's `detail_time` selector.
pub struct HtmlDetailFetcher {
    selector: String,
    http: HttpFetcher,
}

impl HtmlDetailFetcher {
    pub fn new(selector: &str, http: HttpFetcher) -> Result<Self> {
        parse_selector(selector).map_err(CrawlError::Config)?;
        Ok(Self {
            selector: selector.to_string(),
            http,
        })
    }
}

#[async_trait]
impl DetailFetcher for HtmlDetailFetcher {
    async fn fetch_showtimes(&self, link: &str) -> std::result::Result<Vec<String>, AdapterError> {
        let body = self.http.get_text(link).await?;
        Ok(all_texts(&body, &self.selector))
    }
}

fn parse_selector(css: &str) -> std::result::Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector '{css}': {e}"))
}

fn validate_selectors(venue_id: &str, s: &SelectorConfig) -> Result<()> {
    let all = [
        Some(s.event.as_str()),
        Some(s.title.as_str()),
        s.date.as_deref(),
        s.time.as_deref(),
        s.link.as_deref(),
        s.period_label.as_deref(),
        s.next.as_deref(),
        s.detail_time.as_deref(),
    ];
    for css in all.into_iter().flatten() {
        parse_selector(css).map_err(|e| CrawlError::Config(format!("venue '{venue_id}': {e}")))?;
    }
    Ok(())
}

fn clean_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(body: &str, css: &str) -> Option<String> {
    let selector = parse_selector(css).ok()?;
    let doc = Html::parse_document(body);
    let text = doc.select(&selector).next().map(clean_text)?;
    (!text.is_empty()).then_some(text)
}

fn all_texts(body: &str, css: &str) -> Vec<String> {
    let Ok(selector) = parse_selector(css) else {
        return Vec::new();
    };
    let doc = Html::parse_document(body);
    doc.select(&selector)
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .collect()
}

fn resolve(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match Url::parse(base) {
        Ok(base) => base.join(href).ok().map(String::from),
        Err(_) => Url::parse(href).ok().map(String::from),
    }
}

/// Attribute on the element itself or its nearest ancestor carrying it.
fn attr_on_self_or_ancestor(el: ElementRef<'_>, attr: &str) -> Option<String> {
    if let Some(v) = el.value().attr(attr) {
        return Some(v.to_string());
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find_map(|a| a.value().attr(attr).map(str::to_string))
}

fn compile(css: Option<&str>) -> Option<Selector> {
    css.and_then(|c| parse_selector(c).ok())
}

fn extract_records(
    venue_id: &str,
    s: &SelectorConfig,
    base: &str,
    body: &str,
) -> Vec<std::result::Result<RawEventRecord, AdapterError>> {
    let (Ok(event), Ok(title)) = (parse_selector(&s.event), parse_selector(&s.title)) else {
        return Vec::new();
    };
    let date = compile(s.date.as_deref());
    let time = compile(s.time.as_deref());
    let link = compile(s.link.as_deref());

    let doc = Html::parse_document(body);
    doc.select(&event)
        .map(|el| {
            let snippet = || clean_text(el).chars().take(80).collect::<String>();

            let title_text = el
                .select(&title)
                .next()
                .map(clean_text)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| AdapterError::Extraction {
                    field: "title".to_string(),
                    detail: snippet(),
                })?;

            let date_el = date.as_ref().and_then(|d| el.select(d).next());
            let raw_date = match (&s.date_attr, date_el) {
                (Some(attr), Some(d)) => attr_on_self_or_ancestor(d, attr),
                (Some(attr), None) => attr_on_self_or_ancestor(el, attr),
                (None, Some(d)) => Some(clean_text(d)),
                (None, None) => None,
            }
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AdapterError::Extraction {
                field: "date".to_string(),
                detail: snippet(),
            })?;

            let raw_time = time
                .as_ref()
                .and_then(|t| el.select(t).next())
                .map(clean_text)
                .filter(|t| !t.is_empty());

            let href = match &link {
                Some(l) => el.select(l).next().and_then(|a| a.value().attr("href")),
                None => el
                    .select(&title)
                    .next()
                    .and_then(|t| t.value().attr("href")),
            };

            Ok(RawEventRecord {
                venue_id: venue_id.to_string(),
                title: title_text,
                raw_date_text: raw_date,
                raw_time_text: raw_time,
                detail_link: href.and_then(|h| resolve(base, h)),
            })
        })
        .collect()
}

fn is_disabled(el: ElementRef<'_>) -> bool {
    let v = el.value();
    v.attr("disabled").is_some()
        || v.attr("aria-disabled") == Some("true")
        || v.classes().any(|c| c.eq_ignore_ascii_case("disabled"))
}

fn next_location(body: &str, css: &str, base: &str) -> Option<String> {
    let selector = parse_selector(css).ok()?;
    let doc = Html::parse_document(body);
    let next = doc.select(&selector).next()?;
    if is_disabled(next) {
        return None;
    }
    let href = next.value().attr("href")?;
    let url = resolve(base, href)?;
    // A next link pointing at the current page would loop forever.
    (url != base).then_some(url)
}
