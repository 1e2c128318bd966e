// Common utilities and shared types used across the application

pub mod constants;
pub mod error;
pub mod types;

pub use error::{AdapterError, CrawlError, ParseFailure, Result};
pub use types::{Occurrence, RawEventRecord, ShowTime, Window};
