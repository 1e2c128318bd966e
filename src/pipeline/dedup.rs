use crate::common::types::{Occurrence, ShowTime};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Lowercase and collapse internal whitespace so that titles differing only by
/// capitalization or spacing identify the same event.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deduplication key of an occurrence: `(venue, normalized title, date, time)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub venue: String,
    pub title: String,
    pub date: NaiveDate,
    pub time: ShowTime,
}

impl IdentityKey {
    pub fn of(occurrence: &Occurrence) -> Self {
        Self {
            venue: occurrence.venue.clone(),
            title: normalize_title(&occurrence.title),
            date: occurrence.date,
            time: occurrence.time,
        }
    }
}

/// Set of keys already admitted. The only gate through which occurrences are stored.
#[derive(Debug, Default, Clone)]
pub struct SeenKeys {
    keys: HashSet<IdentityKey>,
}

impl SeenKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the index from occurrences that are already stored.
    pub fn from_occurrences<'a>(existing: impl IntoIterator<Item = &'a Occurrence>) -> Self {
        let mut seen = Self::new();
        for occurrence in existing {
            seen.keys.insert(IdentityKey::of(occurrence));
        }
        seen
    }

    /// Returns `true` and records the key if it was absent; `false` for a duplicate.
    pub fn admit(&mut self, occurrence: &Occurrence) -> bool {
        self.keys.insert(IdentityKey::of(occurrence))
    }

    pub fn contains(&self, occurrence: &Occurrence) -> bool {
        self.keys.contains(&IdentityKey::of(occurrence))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Free-function form of [`SeenKeys::admit`].
pub fn admit(occurrence: &Occurrence, seen: &mut SeenKeys) -> bool {
    seen.admit(occurrence)
}
