//! Date/time normalization: raw calendar text in, canonical `(date, time)` pairs out.
//!
//! The normalizer is pure. A record either expands into an [`Expansion`] (a
//! lazy, cloneable sequence clipped to the reporting window) or fails with a
//! [`ParseFailure`] that the caller counts and logs; it never aborts a crawl.

pub mod dates;
pub mod times;

use crate::common::error::ParseFailure;
use crate::common::types::{Occurrence, RawEventRecord, ShowTime, Window};
use chrono::NaiveDate;
pub use dates::{parse_date_text, parse_period_label, DateSpan};
pub use times::{parse_showtime_entries, parse_showtime_list, parse_showtimes, parse_time};

/// How showtimes attach to the days of a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimePlan {
    /// Every day gets every listed time.
    PerDate(Vec<ShowTime>),
    /// Times are zipped positionally against the days of the full span;
    /// days past the end of the list get `TBD`.
    Zipped(Vec<ShowTime>),
}

/// Restartable expansion of one raw record into `(date, time)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    span: DateSpan,
    window: Window,
    plan: TimePlan,
}

impl Expansion {
    pub fn new(span: DateSpan, window: Window, plan: TimePlan) -> Self {
        Self { span, window, plan }
    }

    pub fn plan(&self) -> &TimePlan {
        &self.plan
    }

    /// Replace the time plan with raw detail-page showtimes. A single-day span takes
    /// every time from every entry; a longer span zips one time per entry against its days.
    pub fn with_detail_showtimes(self, raw: &[String]) -> Self {
        let plan = if self.span.first == self.span.last {
            let times = parse_showtime_entries(raw);
            TimePlan::PerDate(if times.is_empty() { vec![ShowTime::Tbd] } else { times })
        } else {
            TimePlan::Zipped(parse_showtime_list(raw))
        };
        Self { plan, ..self }
    }

    pub fn iter(&self) -> ExpansionIter<'_> {
        let start = self.span.first.max(self.window.start);
        let end = self.span.last.min(self.window.end);
        ExpansionIter {
            expansion: self,
            day: if start <= end { Some(start) } else { None },
            end,
            slot: 0,
        }
    }

    /// Materialize occurrences for a venue/title/link.
    pub fn occurrences<'a>(
        &'a self,
        venue: &'a str,
        title: &'a str,
        link: Option<&'a str>,
    ) -> impl Iterator<Item = Occurrence> + 'a {
        self.iter().map(move |(date, time)| Occurrence {
            venue: venue.to_string(),
            title: title.to_string(),
            date,
            time,
            link: link.map(str::to_string),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<'a> IntoIterator for &'a Expansion {
    type Item = (NaiveDate, ShowTime);
    type IntoIter = ExpansionIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ExpansionIter<'a> {
    expansion: &'a Expansion,
    day: Option<NaiveDate>,
    end: NaiveDate,
    slot: usize,
}

impl<'a> Iterator for ExpansionIter<'a> {
    type Item = (NaiveDate, ShowTime);

    fn next(&mut self) -> Option<Self::Item> {
        let day = self.day?;
        let (time, day_done) = match &self.expansion.plan {
            TimePlan::PerDate(times) => {
                let time = times.get(self.slot).copied().unwrap_or(ShowTime::Tbd);
                self.slot += 1;
                (time, self.slot >= times.len())
            }
            TimePlan::Zipped(times) => {
                let offset = (day - self.expansion.span.first).num_days() as usize;
                (times.get(offset).copied().unwrap_or(ShowTime::Tbd), true)
            }
        };
        if day_done {
            self.slot = 0;
            self.day = day.succ_opt().filter(|next| *next <= self.end);
        }
        Some((day, time))
    }
}

/// Window-bound normalizer shared by the navigator and the enricher.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    window: Window,
}

impl Normalizer {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Expand a raw record. Time text falls back to any time embedded in the date text.
    pub fn normalize(&self, record: &RawEventRecord) -> Result<Expansion, ParseFailure> {
        let parsed = parse_date_text(&record.raw_date_text, &self.window)?;
        let time_text = record
            .raw_time_text
            .as_deref()
            .or(parsed.embedded_time.as_deref());
        let times = parse_showtimes(time_text)?;
        Ok(Expansion::new(parsed.span, self.window, TimePlan::PerDate(times)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    fn window() -> Window {
        Window::new(
            NaiveDate::from_ymd_opt(2025, 4, 14).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 31).unwrap(),
        )
        .unwrap()
    }

    fn record(date: &str, time: Option<&str>) -> RawEventRecord {
        RawEventRecord {
            venue_id: "test_arena".to_string(),
            title: "Concert".to_string(),
            raw_date_text: date.to_string(),
            raw_time_text: time.map(str::to_string),
            detail_link: None,
        }
    }

    fn pairs(exp: &Expansion) -> Vec<(String, String)> {
        exp.iter()
            .map(|(d, t)| (d.format("%Y-%m-%d").to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn test_same_month_range_without_time() {
        let exp = Normalizer::new(window())
            .normalize(&record("Jun 22-23, 2025", None))
            .unwrap();
        assert_eq!(
            pairs(&exp),
            vec![
                ("2025-06-22".to_string(), "TBD".to_string()),
                ("2025-06-23".to_string(), "TBD".to_string()),
            ]
        );
    }

    #[test]
    fn test_meridiem_suffix_is_canonicalized() {
        let exp = Normalizer::new(window())
            .normalize(&record("2025-04-20", Some("7:00p")))
            .unwrap();
        assert_eq!(
            pairs(&exp),
            vec![("2025-04-20".to_string(), "07:00 PM".to_string())]
        );
    }

    #[test]
    fn test_multiple_showtimes_share_date() {
        let exp = Normalizer::new(window())
            .normalize(&record("May 3, 2025", Some("7:00 PM, 9:30 PM")))
            .unwrap();
        let got: Vec<_> = exp.iter().collect();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].0, got[1].0);
        assert_ne!(got[0].1, got[1].1);
    }

    #[test]
    fn test_range_clipped_to_window() {
        let exp = Normalizer::new(window())
            .normalize(&record("Jul 30 - Aug 2, 2025", None))
            .unwrap();
        let dates: Vec<_> = exp.iter().map(|(d, _)| d.to_string()).collect();
        assert_eq!(dates, vec!["2025-07-30", "2025-07-31"]);

        let outside = Normalizer::new(window())
            .normalize(&record("Sep 1, 2025", Some("8pm")))
            .unwrap();
        assert!(outside.is_empty());
    }

    #[test]
    fn test_zipped_showtimes_pad_with_tbd() {
        let exp = Normalizer::new(window())
            .normalize(&record("Jun 10 - 12, 2025", None))
            .unwrap()
            .with_detail_showtimes(&raw(&["7:30 PM", "2:00 PM"]));
        assert_eq!(
            pairs(&exp),
            vec![
                ("2025-06-10".to_string(), "07:30 PM".to_string()),
                ("2025-06-11".to_string(), "02:00 PM".to_string()),
                ("2025-06-12".to_string(), "TBD".to_string()),
            ]
        );
    }

    #[test]
    fn test_zipped_positions_follow_full_span_when_clipped() {
        let exp = Normalizer::new(window())
            .normalize(&record("Apr 12 - 15, 2025", None))
            .unwrap()
            .with_detail_showtimes(&raw(&["6pm", "7pm", "8pm"]));
        assert_eq!(
            pairs(&exp),
            vec![
                ("2025-04-14".to_string(), "08:00 PM".to_string()),
                ("2025-04-15".to_string(), "TBD".to_string()),
            ]
        );
    }

    #[test]
    fn test_single_day_takes_every_detail_showtime() {
        let exp = Normalizer::new(window())
            .normalize(&record("May 3, 2025", None))
            .unwrap()
            .with_detail_showtimes(&raw(&["2:00 PM & 7:30 PM"]));
        assert_eq!(
            pairs(&exp),
            vec![
                ("2025-05-03".to_string(), "02:00 PM".to_string()),
                ("2025-05-03".to_string(), "07:30 PM".to_string()),
            ]
        );

        let unreadable = Normalizer::new(window())
            .normalize(&record("May 3, 2025", None))
            .unwrap()
            .with_detail_showtimes(&raw(&["garbled"]));
        assert_eq!(
            pairs(&unreadable),
            vec![("2025-05-03".to_string(), "TBD".to_string())]
        );
    }

    #[test]
    fn test_expansion_is_restartable() {
        let exp = Normalizer::new(window())
            .normalize(&record("Jun 1 - 3, 2025", Some("7pm, 9pm")))
            .unwrap();
        let first: Vec<_> = exp.iter().collect();
        let second: Vec<_> = (&exp).into_iter().collect();
        assert_eq!(first.len(), 6);
        assert_eq!(first, second);
    }

    #[test]
    fn test_embedded_time_used_when_time_missing() {
        let exp = Normalizer::new(window())
            .normalize(&record("22 Apr 2025 7:30PM ET", None))
            .unwrap();
        assert_eq!(
            pairs(&exp),
            vec![("2025-04-22".to_string(), "07:30 PM".to_string())]
        );
    }

    #[test]
    fn test_unparseable_record_fails_without_panicking() {
        let n = Normalizer::new(window());
        assert!(n.normalize(&record("Coming soon", None)).is_err());
        assert!(n.normalize(&record("Jun 5 2025", Some("whenever"))).is_err());
    }
}
