use crate::common::error::AdapterError;
use crate::common::types::RawEventRecord;
use async_trait::async_trait;

/// Cursor over one venue's listing. Owned by the navigator, mutated by the adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageHandle {
    /// 1-based index of the page currently loaded.
    pub page_number: usize,
    /// Where the current page lives (URL for HTTP adapters).
    pub location: String,
    /// Body of the current page once fetched; `None` means it still needs a fetch.
    pub content: Option<String>,
}

impl PageHandle {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            page_number: 1,
            location: location.into(),
            content: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }

    /// Point at the next page and drop the current body.
    pub fn advance_to(&mut self, location: impl Into<String>) {
        self.location = location.into();
        self.content = None;
        self.page_number += 1;
    }
}

/// Venue-specific knowledge of a calendar listing. Navigation policy lives in the
/// navigator; an adapter only knows how to load, read and step its own pages.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn venue_id(&self) -> &str;

    /// Display name written into the `Venue` column.
    fn venue_name(&self) -> &str;

    /// Open the listing. `Unavailable` is fatal for the venue.
    async fn load_start(&self) -> Result<PageHandle, AdapterError>;

    /// Make sure the current page body is loaded.
    async fn fetch_page(&self, page: &mut PageHandle) -> Result<(), AdapterError>;

    /// Visible month/period header, e.g. `"AUGUST 2025"`, if the page shows one.
    fn current_period_label(&self, page: &PageHandle) -> Option<String>;

    fn extract_raw_records(&self, page: &PageHandle) -> Vec<Result<RawEventRecord, AdapterError>>;

    /// Step to the next page. `Ok(false)` means there is nothing further.
    async fn has_more_and_advance(&self, page: &mut PageHandle) -> Result<bool, AdapterError>;
}

/// Reads showtime strings off an event's detail page.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch_showtimes(&self, link: &str) -> Result<Vec<String>, AdapterError>;
}
