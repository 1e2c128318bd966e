//! Calendar/pagination state machine.
//!
//! `Init → FetchPage → ExtractRecords → CheckTermination → Advance → FetchPage | Done | Failed`
//!
//! Each [`Navigator::step`] performs exactly one transition, so a crawl can be driven
//! step by step in tests or run to completion with [`Navigator::run`]. All mutable
//! crawl state lives in [`CrawlState`], owned by the caller.

use crate::apis::adapter::{PageHandle, VenueAdapter};
use crate::common::constants::{DEFAULT_BACKOFF_MS, DEFAULT_MAX_PAGES, DEFAULT_MAX_RETRIES};
use crate::common::error::AdapterError;
use crate::common::types::{Occurrence, RawEventRecord, ShowTime, Window};
use crate::pipeline::dedup::SeenKeys;
use crate::pipeline::normalize::{parse_period_label, Expansion, Normalizer, TimePlan};
use metrics::counter;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigatorConfig {
    pub max_pages: usize,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
    Init,
    FetchPage,
    ExtractRecords,
    CheckTermination,
    Advance,
    Done(Termination),
    Failed(String),
}

impl NavState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NavState::Done(_) | NavState::Failed(_))
    }
}

/// Why a crawl finished normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// The displayed period starts after the window end.
    PeriodBeyondWindow,
    /// The listing has no further page.
    NoMorePages,
    /// The page limit was reached.
    MaxPages,
    /// Advancing kept failing; treated like the end of the listing.
    AdvanceFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub records_extracted: usize,
    pub extraction_failures: usize,
    pub parse_failures: usize,
    pub outside_window: usize,
    pub admitted: usize,
    pub duplicates: usize,
    pub pending_details: usize,
    pub retries: usize,
}

/// A record parked until its detail page supplies showtimes.
#[derive(Debug, Clone)]
pub struct PendingDetail {
    pub venue: String,
    pub title: String,
    pub link: String,
    pub expansion: Expansion,
}

/// Everything a single venue crawl accumulates. Dropped without merging on cancellation.
#[derive(Debug)]
pub struct CrawlState {
    pub venue_id: String,
    pub venue_name: String,
    pub normalizer: Normalizer,
    pub seen: SeenKeys,
    pub collected: Vec<Occurrence>,
    pub pending: Vec<PendingDetail>,
    pub page: Option<PageHandle>,
    pub state: NavState,
    pub stats: CrawlStats,
    attempts: u32,
}

impl CrawlState {
    pub fn new(venue_id: &str, venue_name: &str, window: Window) -> Self {
        Self {
            venue_id: venue_id.to_string(),
            venue_name: venue_name.to_string(),
            normalizer: Normalizer::new(window),
            seen: SeenKeys::new(),
            collected: Vec::new(),
            pending: Vec::new(),
            page: None,
            state: NavState::Init,
            stats: CrawlStats::default(),
            attempts: 0,
        }
    }

    pub fn window(&self) -> Window {
        self.normalizer.window()
    }

    /// Pass an occurrence through the dedup gate into `collected`.
    pub fn admit(&mut self, occurrence: Occurrence) -> bool {
        debug_assert!(self.window().contains(occurrence.date));
        if self.seen.admit(&occurrence) {
            self.collected.push(occurrence);
            self.stats.admitted += 1;
            true
        } else {
            self.stats.duplicates += 1;
            false
        }
    }

    /// Fold enriched occurrences back in; they go through the same dedup gate.
    pub fn absorb_enriched(&mut self, occurrences: Vec<Occurrence>) -> usize {
        let mut admitted = 0;
        for occurrence in occurrences {
            if self.admit(occurrence) {
                admitted += 1;
            }
        }
        admitted
    }

    pub fn take_pending(&mut self) -> Vec<PendingDetail> {
        std::mem::take(&mut self.pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    Done(Termination),
    Failed(String),
}

pub struct Navigator {
    adapter: Arc<dyn VenueAdapter>,
    config: NavigatorConfig,
    park_for_details: bool,
}

impl Navigator {
    pub fn new(adapter: Arc<dyn VenueAdapter>, config: NavigatorConfig) -> Self {
        Self {
            adapter,
            config,
            park_for_details: false,
        }
    }

    /// Park records that have a detail link but no time text for the enricher.
    pub fn with_detail_parking(mut self, enabled: bool) -> Self {
        self.park_for_details = enabled;
        self
    }

    pub fn adapter(&self) -> &Arc<dyn VenueAdapter> {
        &self.adapter
    }

    pub fn config(&self) -> NavigatorConfig {
        self.config
    }

    pub fn new_state(&self, window: Window) -> CrawlState {
        CrawlState::new(self.adapter.venue_id(), self.adapter.venue_name(), window)
    }

    /// Drive the state machine to a terminal state.
    #[instrument(skip(self, state), fields(venue = %state.venue_id))]
    pub async fn run(&self, state: &mut CrawlState) -> CrawlOutcome {
        while !state.state.is_terminal() {
            self.step(state).await;
        }
        match &state.state {
            NavState::Done(reason) => {
                info!(
                    "Crawl of {} done ({:?}): {} pages, {} admitted, {} duplicates, {} parse failures",
                    state.venue_id,
                    reason,
                    state.stats.pages_fetched,
                    state.stats.admitted,
                    state.stats.duplicates,
                    state.stats.parse_failures
                );
                CrawlOutcome::Done(*reason)
            }
            NavState::Failed(reason) => {
                warn!("Crawl of {} failed: {}", state.venue_id, reason);
                CrawlOutcome::Failed(reason.clone())
            }
            _ => unreachable!("loop exits only on terminal states"),
        }
    }

    /// Perform one transition. Terminal states are left unchanged.
    pub async fn step(&self, state: &mut CrawlState) {
        let next = match state.state {
            NavState::Init => self.init(state).await,
            NavState::FetchPage => self.fetch(state).await,
            NavState::ExtractRecords => self.extract(state),
            NavState::CheckTermination => self.check_termination(state),
            NavState::Advance => self.advance(state).await,
            NavState::Done(_) | NavState::Failed(_) => return,
        };
        if next != state.state {
            debug!("{}: {:?} -> {:?}", state.venue_id, state.state, next);
            state.attempts = 0;
        }
        state.state = next;
    }

    async fn init(&self, state: &mut CrawlState) -> NavState {
        match self.adapter.load_start().await {
            Ok(page) => {
                state.page = Some(page);
                NavState::FetchPage
            }
            Err(AdapterError::Unavailable(msg)) => NavState::Failed(msg),
            Err(e) => self
                .retry(state, &e)
                .await
                .unwrap_or_else(|| NavState::Failed(format!("start page: {e}"))),
        }
    }

    async fn fetch(&self, state: &mut CrawlState) -> NavState {
        let Some(page) = state.page.as_mut() else {
            return NavState::Failed("no page handle before fetch".to_string());
        };
        let page_number = page.page_number;
        match self.adapter.fetch_page(page).await {
            Ok(()) => {
                state.stats.pages_fetched += 1;
                counter!("venue_crawler_pages_fetched_total", "venue" => state.venue_id.clone())
                    .increment(1);
                NavState::ExtractRecords
            }
            Err(AdapterError::Unavailable(msg)) => NavState::Failed(msg),
            Err(e) => self.retry(state, &e).await.unwrap_or_else(|| {
                NavState::Failed(format!("page {page_number} failed after retries: {e}"))
            }),
        }
    }

    fn extract(&self, state: &mut CrawlState) -> NavState {
        let Some(page) = state.page.as_ref() else {
            return NavState::Failed("no page handle before extraction".to_string());
        };

        if let Some(label) = self.adapter.current_period_label(page) {
            if let Some(period_start) = parse_period_label(&label) {
                if period_start > state.window().end {
                    info!(
                        "{}: period '{}' is past the window end, stopping",
                        state.venue_id, label
                    );
                    return NavState::Done(Termination::PeriodBeyondWindow);
                }
            }
        }

        let records = self.adapter.extract_raw_records(page);
        for record in records {
            match record {
                Ok(record) => {
                    state.stats.records_extracted += 1;
                    self.accept_record(state, record);
                }
                Err(e) => {
                    state.stats.extraction_failures += 1;
                    counter!("venue_crawler_extraction_failures_total", "venue" => state.venue_id.clone())
                        .increment(1);
                    warn!("{}: skipping record: {}", state.venue_id, e);
                }
            }
        }
        NavState::CheckTermination
    }

    fn accept_record(&self, state: &mut CrawlState, record: RawEventRecord) {
        let expansion = match state.normalizer.normalize(&record) {
            Ok(expansion) => expansion,
            Err(failure) => {
                state.stats.parse_failures += 1;
                counter!("venue_crawler_parse_failures_total", "venue" => state.venue_id.clone())
                    .increment(1);
                warn!(
                    venue = %state.venue_id,
                    title = %record.title,
                    raw_date = %record.raw_date_text,
                    raw_time = ?record.raw_time_text,
                    "dropping record: {}", failure
                );
                return;
            }
        };

        if expansion.is_empty() {
            state.stats.outside_window += 1;
            return;
        }

        let untimed = matches!(expansion.plan(), TimePlan::PerDate(times) if times == &[ShowTime::Tbd]);
        if self.park_for_details && untimed {
            if let Some(link) = record.detail_link {
                state.stats.pending_details += 1;
                state.pending.push(PendingDetail {
                    venue: state.venue_name.clone(),
                    title: record.title,
                    link,
                    expansion,
                });
                return;
            }
        }

        let occurrences: Vec<Occurrence> = expansion
            .occurrences(&state.venue_name, &record.title, record.detail_link.as_deref())
            .collect();
        let mut admitted = 0u64;
        for occurrence in occurrences {
            if state.admit(occurrence) {
                admitted += 1;
            }
        }
        counter!("venue_crawler_occurrences_admitted_total", "venue" => state.venue_id.clone())
            .increment(admitted);
    }

    fn check_termination(&self, state: &CrawlState) -> NavState {
        let page_number = state.page.as_ref().map_or(0, |p| p.page_number);
        if page_number >= self.config.max_pages {
            NavState::Done(Termination::MaxPages)
        } else {
            NavState::Advance
        }
    }

    async fn advance(&self, state: &mut CrawlState) -> NavState {
        let Some(page) = state.page.as_mut() else {
            return NavState::Done(Termination::NoMorePages);
        };
        match self.adapter.has_more_and_advance(page).await {
            Ok(true) => NavState::FetchPage,
            Ok(false) => NavState::Done(Termination::NoMorePages),
            Err(AdapterError::Unavailable(msg)) => {
                warn!("{}: cannot advance: {}", state.venue_id, msg);
                NavState::Done(Termination::AdvanceFailed)
            }
            Err(e) => self
                .retry(state, &e)
                .await
                .unwrap_or(NavState::Done(Termination::AdvanceFailed)),
        }
    }

    /// Sleep and stay in the current state, or `None` once retries are exhausted.
    async fn retry(&self, state: &mut CrawlState, err: &AdapterError) -> Option<NavState> {
        if state.attempts >= self.config.max_retries {
            warn!(
                "{}: giving up in {:?} after {} retries: {}",
                state.venue_id, state.state, state.attempts, err
            );
            return None;
        }
        state.attempts += 1;
        state.stats.retries += 1;
        let delay = backoff_delay(self.config.backoff, state.attempts);
        warn!(
            "{}: {:?} attempt {} failed ({}), retrying in {:?}",
            state.venue_id, state.state, state.attempts, err, delay
        );
        tokio::time::sleep(delay).await;
        Some(state.state.clone())
    }
}

/// `base * 2^(attempt-1)` plus up to 25% jitter.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
    let jitter_cap = exp.as_millis() as u64 / 4;
    if jitter_cap == 0 {
        return exp;
    }
    exp + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_cap))
}
