/// Literal used for occurrences without a published start time
pub const TBD: &str = "TBD";

// Defaults for the `[crawl]` config section
pub const DEFAULT_MAX_PAGES: usize = 24;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 500;
pub const DEFAULT_ENRICHER_CONCURRENCY: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_MASTER_FILE: &str = "all_venue_events.csv";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Longest date range the normalizer will expand
pub const MAX_RANGE_DAYS: i64 = 366;

/// File name of the per-venue output for this run
pub fn venue_file_name(venue_id: &str) -> String {
    format!("{}_events.csv", venue_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_file_name() {
        assert_eq!(venue_file_name("united_center"), "united_center_events.csv");
    }
}
