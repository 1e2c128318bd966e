use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("CSV read/write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown venue: {0}")]
    UnknownVenue(String),
}

pub type Result<T> = std::result::Result<T, CrawlError>;

/// Errors surfaced by a venue adapter or detail fetcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The starting resource cannot be used at all. Fatal for the venue.
    #[error("venue resource unavailable: {0}")]
    Unavailable(String),

    /// A fetch or navigation step failed but may succeed on retry.
    #[error("transient failure: {0}")]
    Transient(String),

    /// One record is missing an expected field.
    #[error("missing field '{field}' in record: {detail}")]
    Extraction { field: String, detail: String },
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        AdapterError::Transient(err.to_string())
    }
}

/// Raw date/time text that matched none of the supported patterns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("unrecognized date text: '{0}'")]
    Date(String),

    #[error("unknown month token '{token}' in '{text}'")]
    Month { token: String, text: String },

    #[error("date range too long or reversed: '{0}'")]
    Range(String),

    #[error("unrecognized time text: '{0}'")]
    Time(String),
}
