use crate::apis::adapter::DetailFetcher;
use crate::common::error::AdapterError;
use crate::common::types::Occurrence;
use crate::pipeline::navigator::PendingDetail;
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Outcome of one enrichment batch.
#[derive(Debug, Default)]
pub struct EnrichReport {
    pub occurrences: Vec<Occurrence>,
    pub fetched: usize,
    pub failed: usize,
}

/// Fills in showtimes for parked records by reading their detail pages with
/// bounded parallelism. A failed page leaves its occurrences `TBD`.
pub struct Enricher {
    fetcher: Arc<dyn DetailFetcher>,
    concurrency: usize,
}

impl Enricher {
    pub fn new(fetcher: Arc<dyn DetailFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    #[instrument(skip(self, pending), fields(pending = pending.len()))]
    pub async fn enrich(&self, pending: Vec<PendingDetail>) -> EnrichReport {
        let mut report = EnrichReport::default();
        if pending.is_empty() {
            return report;
        }

        let mut links: Vec<&str> = pending.iter().map(|p| p.link.as_str()).collect();
        links.sort_unstable();
        links.dedup();
        info!(
            "Fetching {} detail pages for {} records (concurrency {})",
            links.len(),
            pending.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for link in links {
            let link = link.to_string();
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let started = Instant::now();
                let result = fetcher.fetch_showtimes(&link).await;
                histogram!("venue_crawler_detail_fetch_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                (link, result)
            });
        }

        let mut showtimes: HashMap<String, Vec<String>> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((link, Ok(times))) => {
                    report.fetched += 1;
                    counter!("venue_crawler_detail_fetches_total", "outcome" => "ok").increment(1);
                    debug!("{} showtimes from {}", times.len(), link);
                    showtimes.insert(link, times);
                }
                Ok((link, Err(e))) => {
                    report.failed += 1;
                    counter!("venue_crawler_detail_fetches_total", "outcome" => outcome_label(&e))
                        .increment(1);
                    warn!("Detail page {} failed, keeping TBD: {}", link, e);
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("venue_crawler_detail_fetches_total", "outcome" => "panic")
                        .increment(1);
                    warn!("Detail fetch task aborted: {}", e);
                }
            }
        }

        for item in pending {
            let raw = showtimes.get(&item.link).map(Vec::as_slice).unwrap_or(&[]);
            let expansion = item.expansion.with_detail_showtimes(raw);
            report.occurrences.extend(expansion.occurrences(
                &item.venue,
                &item.title,
                Some(item.link.as_str()),
            ));
        }
        report
    }
}

fn outcome_label(err: &AdapterError) -> &'static str {
    match err {
        AdapterError::Unavailable(_) => "unavailable",
        AdapterError::Transient(_) => "transient",
        AdapterError::Extraction { .. } => "extraction",
    }
}
