pub mod merge_store;

pub use merge_store::{read_csv, write_csv, MergeReport, MergeStore};
