pub mod apis;
pub mod common;
pub mod config;
pub mod observability;
pub mod pipeline;

pub use common::error::{AdapterError, CrawlError, ParseFailure, Result};
pub use common::types::{Occurrence, RawEventRecord, ShowTime, Window};
pub use config::Config;
