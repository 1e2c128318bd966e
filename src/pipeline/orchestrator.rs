use crate::apis::adapter::{DetailFetcher, VenueAdapter};
use crate::apis::factory::create_source_by_id;
use crate::common::types::Window;
use crate::config::Config;
use crate::pipeline::enrich::Enricher;
use crate::pipeline::navigator::{CrawlOutcome, CrawlStats, Navigator, NavigatorConfig, Termination};
use crate::pipeline::storage::{MergeReport, MergeStore};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Everything needed to crawl one venue.
#[derive(Clone)]
pub struct VenueSource {
    pub adapter: Arc<dyn VenueAdapter>,
    pub details: Option<Arc<dyn DetailFetcher>>,
    pub navigator: NavigatorConfig,
}

/// A requested venue, either ready to crawl or already known to be unusable.
pub enum PlannedVenue {
    Ready(VenueSource),
    Unresolved { venue_id: String, reason: String },
}

impl PlannedVenue {
    pub fn venue_id(&self) -> &str {
        match self {
            PlannedVenue::Ready(source) => source.adapter.venue_id(),
            PlannedVenue::Unresolved { venue_id, .. } => venue_id,
        }
    }
}

/// Resolve requested venue ids (all configured venues when `None`).
pub fn plan_venues(config: &Config, requested: Option<&[String]>) -> Vec<PlannedVenue> {
    let ids: Vec<String> = match requested {
        Some(ids) => ids.to_vec(),
        None => config.venues.iter().map(|v| v.id.clone()).collect(),
    };
    ids.into_iter()
        .map(|id| match create_source_by_id(&id, config) {
            Ok(source) => PlannedVenue::Ready(source),
            Err(e) => PlannedVenue::Unresolved {
                venue_id: id,
                reason: e.to_string(),
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VenueStatus {
    Completed(Termination),
    Failed(String),
    TimedOut,
}

impl VenueStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, VenueStatus::Completed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            VenueStatus::Completed(_) => "completed",
            VenueStatus::Failed(_) => "failed",
            VenueStatus::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueReport {
    pub venue_id: String,
    pub status: VenueStatus,
    pub stats: CrawlStats,
    pub details_fetched: usize,
    pub details_failed: usize,
    pub merge: Option<MergeReport>,
    pub duration_ms: u128,
}

impl VenueReport {
    fn failed(venue_id: &str, reason: impl Into<String>) -> Self {
        Self {
            venue_id: venue_id.to_string(),
            status: VenueStatus::Failed(reason.into()),
            stats: CrawlStats::default(),
            details_fetched: 0,
            details_failed: 0,
            merge: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub venues: Vec<VenueReport>,
}

impl RunSummary {
    pub fn total_added(&self) -> usize {
        self.venues
            .iter()
            .filter_map(|v| v.merge.as_ref())
            .map(|m| m.added)
            .sum()
    }

    /// Duplicates seen within crawls plus rows already present in the master.
    pub fn total_duplicates(&self) -> usize {
        self.venues
            .iter()
            .map(|v| v.stats.duplicates + v.merge.as_ref().map_or(0, |m| m.duplicates))
            .sum()
    }

    /// Records dropped because they could not be extracted or parsed.
    pub fn total_failed_records(&self) -> usize {
        self.venues
            .iter()
            .map(|v| v.stats.parse_failures + v.stats.extraction_failures)
            .sum()
    }

    pub fn failed_venues(&self) -> usize {
        self.venues.iter().filter(|v| !v.status.is_success()).count()
    }
}

/// Runs venue crawls concurrently and merges each finished crawl into the store.
pub struct Orchestrator {
    window: Window,
    store: Arc<MergeStore>,
    timeout: Duration,
    enricher_concurrency: usize,
}

impl Orchestrator {
    pub fn new(window: Window, store: Arc<MergeStore>, timeout: Duration, enricher_concurrency: usize) -> Self {
        Self {
            window,
            store,
            timeout,
            enricher_concurrency,
        }
    }

    pub fn from_config(config: &Config) -> crate::common::error::Result<Self> {
        Ok(Self::new(
            config.window()?,
            Arc::new(MergeStore::from_settings(&config.crawl)),
            config.timeout(),
            config.crawl.enricher_concurrency,
        ))
    }

    pub fn store(&self) -> &Arc<MergeStore> {
        &self.store
    }

    #[instrument(skip(self, planned), fields(venues = planned.len()))]
    pub async fn run(&self, planned: Vec<PlannedVenue>) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("🚀 Starting crawl run {} for {} venues", run_id, planned.len());

        let ids: Vec<String> = planned.iter().map(|p| p.venue_id().to_string()).collect();
        let mut reports: Vec<Option<VenueReport>> = vec![None; planned.len()];
        let mut tasks = JoinSet::new();

        for (index, venue) in planned.into_iter().enumerate() {
            match venue {
                PlannedVenue::Ready(source) => {
                    let window = self.window;
                    let store = Arc::clone(&self.store);
                    let timeout = self.timeout;
                    let concurrency = self.enricher_concurrency;
                    tasks.spawn(async move {
                        let report = crawl_venue(source, window, store, timeout, concurrency).await;
                        (index, report)
                    });
                }
                PlannedVenue::Unresolved { venue_id, reason } => {
                    error!("❌ {}: {}", venue_id, reason);
                    reports[index] = Some(VenueReport::failed(&venue_id, reason));
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => reports[index] = Some(report),
                Err(e) => error!("Venue task aborted: {}", e),
            }
        }

        let venues: Vec<VenueReport> = reports
            .into_iter()
            .zip(ids)
            .map(|(report, id)| report.unwrap_or_else(|| VenueReport::failed(&id, "crawl task aborted")))
            .collect();
        for report in &venues {
            counter!("venue_crawler_venues_total", "status" => report.status.label()).increment(1);
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            venues,
        };
        info!(
            "🎉 Run {} finished: {} added, {} duplicates, {} failed records, {} failed venues",
            run_id,
            summary.total_added(),
            summary.total_duplicates(),
            summary.total_failed_records(),
            summary.failed_venues()
        );
        summary
    }
}

struct CrawlResult {
    outcome: CrawlOutcome,
    stats: CrawlStats,
    occurrences: Vec<crate::common::types::Occurrence>,
    details_fetched: usize,
    details_failed: usize,
}

/// Navigate, enrich and merge one venue. The crawl part runs under the timeout;
/// on expiry its state is dropped and nothing is merged.
#[instrument(skip_all, fields(venue = %source.adapter.venue_id()))]
pub async fn crawl_venue(
    source: VenueSource,
    window: Window,
    store: Arc<MergeStore>,
    timeout: Duration,
    enricher_concurrency: usize,
) -> VenueReport {
    let venue_id = source.adapter.venue_id().to_string();
    let started = Instant::now();

    let crawl = async {
        let navigator = Navigator::new(Arc::clone(&source.adapter), source.navigator)
            .with_detail_parking(source.details.is_some());
        let mut state = navigator.new_state(window);
        let outcome = navigator.run(&mut state).await;

        let (mut details_fetched, mut details_failed) = (0, 0);
        if let (CrawlOutcome::Done(_), Some(fetcher)) = (&outcome, &source.details) {
            let pending = state.take_pending();
            if !pending.is_empty() {
                let report = Enricher::new(Arc::clone(fetcher), enricher_concurrency)
                    .enrich(pending)
                    .await;
                details_fetched = report.fetched;
                details_failed = report.failed;
                state.absorb_enriched(report.occurrences);
            }
        }

        CrawlResult {
            outcome,
            stats: state.stats,
            occurrences: state.collected,
            details_fetched,
            details_failed,
        }
    };

    let result = match tokio::time::timeout(timeout, crawl).await {
        Ok(result) => result,
        Err(_) => {
            warn!("⏱️ {} timed out after {:?}, discarding partial results", venue_id, timeout);
            let mut report = VenueReport::failed(&venue_id, "");
            report.status = VenueStatus::TimedOut;
            report.duration_ms = started.elapsed().as_millis();
            return report;
        }
    };

    let mut report = VenueReport {
        venue_id: venue_id.clone(),
        status: VenueStatus::Failed(String::new()),
        stats: result.stats,
        details_fetched: result.details_fetched,
        details_failed: result.details_failed,
        merge: None,
        duration_ms: 0,
    };

    match result.outcome {
        CrawlOutcome::Done(termination) => {
            debug_assert!(result.occurrences.iter().all(|o| window.contains(o.date)));
            match store.merge(&venue_id, &result.occurrences).await {
                Ok(merge) => {
                    info!(
                        "✅ {}: {} occurrences, {} new in master",
                        venue_id,
                        result.occurrences.len(),
                        merge.added
                    );
                    report.merge = Some(merge);
                    report.status = VenueStatus::Completed(termination);
                }
                Err(e) => {
                    error!("❌ {}: merge failed: {}", venue_id, e);
                    report.status = VenueStatus::Failed(format!("merge failed: {e}"));
                }
            }
        }
        CrawlOutcome::Failed(reason) => {
            error!("❌ {}: {}", venue_id, reason);
            report.status = VenueStatus::Failed(reason);
        }
    }

    let elapsed = started.elapsed();
    histogram!("venue_crawler_crawl_duration_seconds", "venue" => venue_id).record(elapsed.as_secs_f64());
    report.duration_ms = elapsed.as_millis();
    report
}
