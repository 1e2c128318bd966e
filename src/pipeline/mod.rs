// Crawl pipeline: navigate, normalize, dedup, enrich, merge

pub mod dedup;
pub mod enrich;
pub mod ingestion;
pub mod navigator;
pub mod normalize;
pub mod orchestrator;
pub mod storage;

pub use navigator::{CrawlOutcome, CrawlState, NavState, Navigator, NavigatorConfig, Termination};
pub use orchestrator::{plan_venues, Orchestrator, PlannedVenue, RunSummary, VenueSource, VenueStatus};
pub use storage::{MergeReport, MergeStore};
