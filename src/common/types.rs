use crate::common::constants::TBD;
use crate::common::error::{CrawlError, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One event entry as read off a venue page. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventRecord {
    pub venue_id: String,
    pub title: String,
    pub raw_date_text: String,
    pub raw_time_text: Option<String>,
    pub detail_link: Option<String>,
}

/// Start time of an occurrence, or `TBD` when the venue has not published one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShowTime {
    At(NaiveTime),
    Tbd,
}

impl ShowTime {
    pub fn is_tbd(&self) -> bool {
        matches!(self, ShowTime::Tbd)
    }
}

impl fmt::Display for ShowTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShowTime::At(t) => write!(f, "{}", t.format("%I:%M %p")),
            ShowTime::Tbd => f.write_str(TBD),
        }
    }
}

impl FromStr for ShowTime {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(TBD) {
            return Ok(ShowTime::Tbd);
        }
        NaiveTime::parse_from_str(s, "%I:%M %p")
            .map(ShowTime::At)
            .map_err(|e| format!("invalid time '{}': {}", s, e))
    }
}

impl TryFrom<String> for ShowTime {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShowTime> for String {
    fn from(value: ShowTime) -> Self {
        value.to_string()
    }
}

/// Canonical unit of the dataset: one date + time instance of an event at one venue.
///
/// Field names follow the persisted column layout `Venue,Title,Date,Time,Link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    #[serde(rename = "Venue")]
    pub venue: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Time")]
    pub time: ShowTime,
    #[serde(rename = "Link")]
    pub link: Option<String>,
}

/// Inclusive reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(CrawlError::Config(format!(
                "window end {} is before window start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
