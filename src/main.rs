use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use venue_crawler::common::constants::DEFAULT_CONFIG_PATH;
use venue_crawler::common::types::RawEventRecord;
use venue_crawler::config::Config;
use venue_crawler::observability::{init_logging, init_metrics, metrics_port_from_env};
use venue_crawler::pipeline::normalize::Normalizer;
use venue_crawler::pipeline::orchestrator::{plan_venues, Orchestrator, RunSummary, VenueStatus};
use venue_crawler::pipeline::storage::{read_csv, MergeStore};

#[derive(Parser)]
#[command(name = "venue_crawler")]
#[command(about = "Crawls venue event calendars into a de-duplicated, date-normalized dataset")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Serve Prometheus metrics on this port
    #[arg(long, global = true)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl venues and merge the results into the master file
    Crawl {
        /// Venue ids to crawl (comma-separated). Defaults to every configured venue
        #[arg(long)]
        venues: Option<String>,
        /// Also write the run summary as JSON to this path
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Fold an existing venue CSV into the master file
    Merge {
        csv: PathBuf,
        #[arg(long)]
        venue: String,
    },
    /// List configured venues
    List,
    /// Show how raw date/time text expands inside the configured window
    Normalize { date: String, time: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = init_logging();

    let cli = Cli::parse();
    init_metrics(cli.metrics_port.or_else(metrics_port_from_env));

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Crawl { venues, summary: summary_path } => {
            let requested: Option<Vec<String>> = venues.map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });
            let window = config.window()?;
            println!(
                "🔄 Crawling {} venue(s) for {} to {}...",
                requested.as_ref().map_or(config.venues.len(), Vec::len),
                window.start,
                window.end
            );

            let planned = plan_venues(&config, requested.as_deref());
            let orchestrator = Orchestrator::from_config(&config)?;
            let summary = orchestrator.run(planned).await;
            print_summary(&summary, &orchestrator);
            if let Some(path) = summary_path {
                let json = serde_json::to_string_pretty(&summary)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("   Summary: {}", path.display());
            }
        }
        Commands::Merge { csv, venue } => {
            let rows = read_csv(&csv).with_context(|| format!("reading {}", csv.display()))?;
            let store = MergeStore::from_settings(&config.crawl);
            let report = store.merge_master(&venue, &rows).await?;
            println!(
                "✅ Merged {}: {} added, {} already present ({})",
                csv.display(),
                report.added,
                report.duplicates,
                store.master_path().display()
            );
        }
        Commands::List => {
            println!("📋 Configured venues:");
            for venue in &config.venues {
                let details = if venue.selectors.detail_time.is_some() {
                    " [detail pages]"
                } else {
                    ""
                };
                println!("   {:<24} {} ({}){}", venue.id, venue.name, venue.start_url, details);
            }
        }
        Commands::Normalize { date, time } => {
            let record = RawEventRecord {
                venue_id: "cli".to_string(),
                title: String::new(),
                raw_date_text: date,
                raw_time_text: time,
                detail_link: None,
            };
            match Normalizer::new(config.window()?).normalize(&record) {
                Ok(expansion) => {
                    let mut count = 0;
                    for (date, time) in &expansion {
                        println!("   {}  {}", date, time);
                        count += 1;
                    }
                    if count == 0 {
                        println!("⚠️  Parsed, but every date falls outside the window");
                    }
                }
                Err(e) => println!("❌ {}", e),
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, orchestrator: &Orchestrator) {
    println!("\n📊 Crawl run {}:", summary.run_id);
    for venue in &summary.venues {
        match &venue.status {
            VenueStatus::Completed(termination) => {
                let added = venue.merge.as_ref().map_or(0, |m| m.added);
                println!(
                    "   ✅ {:<24} {} admitted, {} new, {} duplicates, {} failed records ({:?})",
                    venue.venue_id,
                    venue.stats.admitted,
                    added,
                    venue.stats.duplicates,
                    venue.stats.parse_failures + venue.stats.extraction_failures,
                    termination
                );
            }
            VenueStatus::Failed(reason) => {
                println!("   ❌ {:<24} failed: {}", venue.venue_id, reason);
            }
            VenueStatus::TimedOut => {
                println!("   ⏱️  {:<24} timed out, nothing merged", venue.venue_id);
            }
        }
    }
    println!("   Total added: {}", summary.total_added());
    println!("   Total duplicates: {}", summary.total_duplicates());
    println!("   Total failed records: {}", summary.total_failed_records());
    println!("   Master file: {}", orchestrator.store().master_path().display());
    info!(
        run_id = %summary.run_id,
        failed_venues = summary.failed_venues(),
        "crawl run complete"
    );
}
