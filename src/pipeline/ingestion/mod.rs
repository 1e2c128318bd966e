// Pipeline ingestion: request pacing for venue page fetches

pub mod rate_limiter;

pub use rate_limiter::{Limits, RateLimiter};
