use metrics::{describe_counter, describe_histogram, Unit};
use std::net::SocketAddr;

pub const METRICS_PORT_ENV: &str = "VENUE_CRAWLER_METRICS_PORT";

pub fn metrics_port_from_env() -> Option<u16> {
    std::env::var(METRICS_PORT_ENV)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Installs the Prometheus exporter on `0.0.0.0:<port>`. Without a port the
/// metrics macros stay no-ops.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else {
        return;
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            describe();
            println!("📈 Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            println!("⚠️  Prometheus exporter install failed: {}", e);
        }
    }
}

fn describe() {
    describe_counter!("venue_crawler_http_requests_total", "Venue HTTP requests by outcome");
    describe_counter!("venue_crawler_pages_fetched_total", "Calendar pages fetched");
    describe_counter!(
        "venue_crawler_extraction_failures_total",
        "Records skipped because a field could not be read"
    );
    describe_counter!(
        "venue_crawler_parse_failures_total",
        "Records dropped because their date or time text was not recognized"
    );
    describe_counter!(
        "venue_crawler_occurrences_admitted_total",
        "Occurrences admitted by the in-crawl dedup gate"
    );
    describe_counter!("venue_crawler_detail_fetches_total", "Detail page fetches by outcome");
    describe_counter!("venue_crawler_merge_added_total", "Rows appended to the master file");
    describe_counter!(
        "venue_crawler_merge_duplicates_total",
        "Incoming rows already present in the master file"
    );
    describe_counter!("venue_crawler_venues_total", "Venue crawls by final status");
    describe_histogram!(
        "venue_crawler_detail_fetch_duration_seconds",
        Unit::Seconds,
        "Detail page fetch latency"
    );
    describe_histogram!(
        "venue_crawler_crawl_duration_seconds",
        Unit::Seconds,
        "Wall time of one venue crawl including merge"
    );
}
