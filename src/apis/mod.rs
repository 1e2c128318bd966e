pub mod adapter;
pub mod factory;
pub mod html_calendar;
pub mod http;

pub use adapter::{DetailFetcher, PageHandle, VenueAdapter};
pub use factory::{create_source, create_source_by_id};
