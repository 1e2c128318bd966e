use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const DEFAULT_FILTER: &str = "venue_crawler=debug,info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initializes console output plus a daily-rolling JSON log file under `logs/`.
///
/// The returned guard flushes the file writer when dropped; keep it alive for the
/// life of the process.
pub fn init_logging() -> Option<WorkerGuard> {
    if fs::create_dir_all(LOG_DIR).is_err() {
        // No writable log dir; console only
        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "venue_crawler.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_writer(non_blocking_writer))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_init_is_repeatable() {
        let first = init_logging();
        // a second global subscriber is refused quietly
        let second = init_logging();
        assert!(first.is_some() && second.is_some());
    }
}
