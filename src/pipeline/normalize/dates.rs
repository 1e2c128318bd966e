//! Date text parsing.
//!
//! Venue markup spells dates every way imaginable. Rather than keep one
//! `strptime` pattern per venue, the text is cleaned into a token stream
//! (month, day, year, dash) and matched against a handful of shapes:
//!
//! * `June 22, 2025`, `Sun, Jun 22 2025`, `22 Jun 2025`, `Aug 29`
//! * `2025-06-22`, `2025-06-22T19:30:00`, `06-22-2025`, `06/22/2025`
//! * `Jun 22-23, 2025`, `22-24 June 2025`, `Jun 30 - Jul 2, 2025`, `Dec 30, 2025 - Jan 2, 2026`
//! * `Fri - Sun, Jun 20 - 22, 2025` (weekday ranges are ignored)

use crate::common::constants::MAX_RANGE_DAYS;
use crate::common::error::ParseFailure;
use crate::common::types::Window;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

const MONTH_NAMES: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

// Abbreviations and misspellings seen in venue markup
const MONTH_ALIASES: &[(&str, u32)] = &[
    ("jan", 1),
    ("janurary", 1),
    ("feb", 2),
    ("febuary", 2),
    ("feburary", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("junee", 6),
    ("jul", 7),
    ("julyy", 7),
    ("aug", 8),
    ("agust", 8),
    ("sep", 9),
    ("sept", 9),
    ("septemeber", 9),
    ("oct", 10),
    ("nov", 11),
    ("novemeber", 11),
    ("dec", 12),
    ("decemeber", 12),
];

const WEEKDAYS: &[&str] = &[
    "mon", "monday", "tue", "tues", "tuesday", "wed", "weds", "wednesday", "thu", "thur",
    "thurs", "thursday", "fri", "friday", "sat", "saturday", "sun", "sunday",
];

const FILLER: &[&str] = &["on", "at", "@", "from", "of", "the", "date", "dates", "&"];

static EMBEDDED_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}:\d{2}\s*(?:[ap]\.?m?\b\.?)?|\d{1,2}\s*[ap]\.?m\b\.?)(?:\s*[ecmp][sd]?t\b)?",
    )
    .expect("static regex")
});
static ISO_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4}-\d{1,2}-\d{1,2})t(\d{1,2}:\d{2})(?::\d{2}(?:\.\d+)?)?(?:z|[+-]\d{2}:?\d{2})?")
        .expect("static regex")
});
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("static regex"));
static US_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4})\b").expect("static regex")
});
static US_DATE_NO_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").expect("static regex"));
static RANGE_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+(?:to|thru|through|until)\s+").expect("static regex"));
static ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").expect("static regex"));

/// Inclusive span of calendar days described by one date text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

/// Result of parsing a date text: the span plus any time found inside the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDate {
    pub span: DateSpan,
    pub embedded_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tok {
    Month(u32),
    Day(u32),
    Year(i32),
    Dash,
}

#[derive(Debug, Clone, Copy, Default)]
struct PartialDate {
    month: Option<u32>,
    day: u32,
    year: Option<i32>,
}

/// Resolve a month token (full name, abbreviation or known misspelling).
pub fn month_from_token(token: &str) -> Option<u32> {
    let token = token.trim_end_matches('.').to_lowercase();
    if let Some(pos) = MONTH_NAMES.iter().position(|m| *m == token) {
        return Some(pos as u32 + 1);
    }
    MONTH_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, m)| *m)
}

fn month_name(month: &str) -> &'static str {
    month
        .parse::<usize>()
        .ok()
        .and_then(|m| m.checked_sub(1))
        .and_then(|i| MONTH_NAMES.get(i))
        .copied()
        .unwrap_or("invalid-month")
}

/// Parse raw date text into a day span, inferring missing years from the window.
pub fn parse_date_text(text: &str, window: &Window) -> Result<ParsedDate, ParseFailure> {
    let original = text.trim();
    if original.is_empty() {
        return Err(ParseFailure::Date(original.to_string()));
    }

    let mut cleaned = original.to_lowercase();
    let iso_time = ISO_DATETIME
        .captures(&cleaned)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string());
    cleaned = ISO_DATETIME.replace_all(&cleaned, " $1 ").into_owned();
    let embedded_time = iso_time.or_else(|| {
        EMBEDDED_TIME
            .find(&cleaned)
            .map(|m| m.as_str().trim().to_string())
    });
    cleaned = EMBEDDED_TIME.replace_all(&cleaned, " ").into_owned();

    let tokens = tokenize(&cleaned, original, false)?;
    let span = match_shapes(&tokens, original, window)?;

    if span.last < span.first || (span.last - span.first).num_days() > MAX_RANGE_DAYS {
        return Err(ParseFailure::Range(original.to_string()));
    }

    Ok(ParsedDate { span, embedded_time })
}

/// Parse a calendar header such as `"AUGUST 2025"` into the first day of that month.
pub fn parse_period_label(label: &str) -> Option<NaiveDate> {
    let cleaned = label.to_lowercase();
    let tokens = tokenize(&cleaned, label, true).ok()?;
    let month = tokens.iter().find_map(|t| match t {
        Tok::Month(m) => Some(*m),
        _ => None,
    })?;
    let year = tokens.iter().find_map(|t| match t {
        Tok::Year(y) => Some(*y),
        _ => None,
    })?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn tokenize(cleaned: &str, original: &str, lenient: bool) -> Result<Vec<Tok>, ParseFailure> {
    let s = ISO_DATE.replace_all(cleaned, |c: &regex::Captures| {
        format!(" {} {} {} ", month_name(&c[2]), &c[3], &c[1])
    });
    let s = US_DATE.replace_all(&s, |c: &regex::Captures| {
        format!(" {} {} {} ", month_name(&c[1]), &c[2], &c[3])
    });
    let s = US_DATE_NO_YEAR.replace_all(&s, |c: &regex::Captures| {
        format!(" {} {} ", month_name(&c[1]), &c[2])
    });
    let s = RANGE_WORDS.replace_all(&s, " - ");
    let s = ORDINAL.replace_all(&s, "$1");
    let s = s
        .replace(&['\u{2013}', '\u{2014}'][..], "-")
        .replace('-', " - ")
        .replace(&[',', '.', '(', ')', '|'][..], " ");

    let mut tokens = Vec::new();
    for word in s.split_whitespace() {
        if word == "-" {
            tokens.push(Tok::Dash);
        } else if word.chars().all(|c| c.is_ascii_digit()) {
            let value: u32 = word
                .parse()
                .map_err(|_| ParseFailure::Date(original.to_string()))?;
            if word.len() == 4 {
                tokens.push(Tok::Year(value as i32));
            } else if (1..=31).contains(&value) {
                tokens.push(Tok::Day(value));
            } else if !lenient {
                // "00" and friends
                return Err(ParseFailure::Date(original.to_string()));
            }
        } else if let Some(month) = month_from_token(word) {
            tokens.push(Tok::Month(month));
        } else if WEEKDAYS.contains(&word) || FILLER.contains(&word) || lenient {
            continue;
        } else {
            return Err(ParseFailure::Month {
                token: word.to_string(),
                text: original.to_string(),
            });
        }
    }

    // Skipped weekdays ("Fri - Sun") leave dashes with nothing on one side
    let mut tidy: Vec<Tok> = Vec::with_capacity(tokens.len());
    for tok in tokens {
        if tok == Tok::Dash && matches!(tidy.last(), None | Some(Tok::Dash)) {
            continue;
        }
        tidy.push(tok);
    }
    if tidy.last() == Some(&Tok::Dash) {
        tidy.pop();
    }
    Ok(tidy)
}

fn partial(tokens: &[Tok], original: &str) -> Result<PartialDate, ParseFailure> {
    let fail = || ParseFailure::Date(original.to_string());
    match tokens {
        [Tok::Month(m), Tok::Day(d)] | [Tok::Day(d), Tok::Month(m)] => Ok(PartialDate {
            month: Some(*m),
            day: *d,
            year: None,
        }),
        [Tok::Month(m), Tok::Day(d), Tok::Year(y)] | [Tok::Day(d), Tok::Month(m), Tok::Year(y)] => {
            Ok(PartialDate {
                month: Some(*m),
                day: *d,
                year: Some(*y),
            })
        }
        [Tok::Day(d)] => Ok(PartialDate {
            month: None,
            day: *d,
            year: None,
        }),
        [Tok::Day(d), Tok::Year(y)] => Ok(PartialDate {
            month: None,
            day: *d,
            year: Some(*y),
        }),
        _ => Err(fail()),
    }
}

fn match_shapes(tokens: &[Tok], original: &str, window: &Window) -> Result<DateSpan, ParseFailure> {
    let fail = || ParseFailure::Date(original.to_string());
    let parts: Vec<&[Tok]> = tokens.split(|t| *t == Tok::Dash).collect();

    match parts.as_slice() {
        [single] => {
            let p = partial(single, original)?;
            let month = p.month.ok_or_else(fail)?;
            let date = match p.year {
                Some(y) => NaiveDate::from_ymd_opt(y, month, p.day).ok_or_else(fail)?,
                None => infer_year(month, p.day, window).ok_or_else(fail)?,
            };
            Ok(DateSpan {
                first: date,
                last: date,
            })
        }
        [left, right] => {
            let l = partial(left, original)?;
            let r = partial(right, original)?;
            // "22-24 June 2025": the left day borrows the right month
            let l_month = l.month.or(r.month).ok_or_else(fail)?;
            let r_month = r.month.unwrap_or(l_month);

            let first = match l.year.or(r.year) {
                Some(y) if l.year.is_some() || r.month.is_none() || r_month >= l_month => {
                    NaiveDate::from_ymd_opt(y, l_month, l.day).ok_or_else(fail)?
                }
                // "Dec 30 - Jan 2, 2026": the trailing year belongs to the end
                Some(y) => NaiveDate::from_ymd_opt(y - 1, l_month, l.day).ok_or_else(fail)?,
                None => infer_year(l_month, l.day, window).ok_or_else(fail)?,
            };
            let mut last = NaiveDate::from_ymd_opt(
                r.year.unwrap_or(first.year()),
                r_month,
                r.day,
            )
            .ok_or_else(fail)?;
            if last < first && r.year.is_none() {
                last = NaiveDate::from_ymd_opt(first.year() + 1, r_month, r.day).ok_or_else(fail)?;
            }
            Ok(DateSpan { first, last })
        }
        _ => Err(fail()),
    }
}

/// Pick the year that places month/day inside the window, falling back to the
/// window's starting year.
fn infer_year(month: u32, day: u32, window: &Window) -> Option<NaiveDate> {
    (window.start.year()..=window.end.year())
        .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
        .find(|d| window.contains(*d))
        .or_else(|| NaiveDate::from_ymd_opt(window.start.year(), month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window::new(
            NaiveDate::from_ymd_opt(2025, 4, 14).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 31).unwrap(),
        )
        .unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn span(text: &str) -> DateSpan {
        parse_date_text(text, &window()).unwrap().span
    }

    #[test]
    fn test_single_date_shapes() {
        let expected = DateSpan {
            first: d(2025, 6, 22),
            last: d(2025, 6, 22),
        };
        assert_eq!(span("June 22, 2025"), expected);
        assert_eq!(span("Sun, Jun 22 2025"), expected);
        assert_eq!(span("22 Jun 2025"), expected);
        assert_eq!(span("2025-06-22"), expected);
        assert_eq!(span("06-22-2025"), expected);
        assert_eq!(span("06/22/2025"), expected);
        assert_eq!(span("Sunday, June 22nd"), expected);
        assert_eq!(span("Junee 22 2025"), expected);
        assert_eq!(span("2025-06-22T19:30:00"), expected);
        assert_eq!(span("2025-06-22T19:30:00-04:00"), expected);
    }

    #[test]
    fn test_year_inferred_from_window() {
        assert_eq!(span("Aug 29").first, d(2025, 8, 29));
        assert_eq!(span("Sept. 3").first, d(2025, 9, 3));

        let wrapping = Window::new(d(2025, 11, 1), d(2026, 2, 28)).unwrap();
        let parsed = parse_date_text("Jan 10", &wrapping).unwrap();
        assert_eq!(parsed.span.first, d(2026, 1, 10));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(
            span("Jun 22-23, 2025"),
            DateSpan {
                first: d(2025, 6, 22),
                last: d(2025, 6, 23)
            }
        );
        assert_eq!(
            span("Jun 30 - Jul 2, 2025"),
            DateSpan {
                first: d(2025, 6, 30),
                last: d(2025, 7, 2)
            }
        );
        assert_eq!(
            span("Dec 30, 2025 - Jan 2, 2026"),
            DateSpan {
                first: d(2025, 12, 30),
                last: d(2026, 1, 2)
            }
        );
        assert_eq!(
            span("Dec 30 - Jan 2, 2026"),
            DateSpan {
                first: d(2025, 12, 30),
                last: d(2026, 1, 2)
            }
        );
        assert_eq!(
            span("July 4 to July 6 2025"),
            DateSpan {
                first: d(2025, 7, 4),
                last: d(2025, 7, 6)
            }
        );
        assert_eq!(
            span("Fri - Sun, Jun 20 - 22, 2025"),
            DateSpan {
                first: d(2025, 6, 20),
                last: d(2025, 6, 22)
            }
        );
        assert_eq!(
            span("Jun 20 - 22, 2025 (Fri - Sun)"),
            DateSpan {
                first: d(2025, 6, 20),
                last: d(2025, 6, 22)
            }
        );
        assert_eq!(
            span("22-24 June 2025"),
            DateSpan {
                first: d(2025, 6, 22),
                last: d(2025, 6, 24)
            }
        );
        assert_eq!(
            span("Jun 22 \u{2013} 24 2025"),
            DateSpan {
                first: d(2025, 6, 22),
                last: d(2025, 6, 24)
            }
        );
    }

    #[test]
    fn test_embedded_time_is_extracted() {
        let parsed = parse_date_text("22 Apr 2025 7:30PM ET", &window()).unwrap();
        assert_eq!(parsed.span.first, d(2025, 4, 22));
        assert_eq!(parsed.embedded_time.as_deref(), Some("7:30pm et"));

        let iso = parse_date_text("2025-06-22T19:30:00", &window()).unwrap();
        assert_eq!(iso.span.first, d(2025, 6, 22));
        assert_eq!(iso.embedded_time.as_deref(), Some("19:30"));
    }

    #[test]
    fn test_failures() {
        let w = window();
        assert!(matches!(
            parse_date_text("Date not found", &w),
            Err(ParseFailure::Month { .. })
        ));
        assert!(matches!(
            parse_date_text("Jun 00 2025", &w),
            Err(ParseFailure::Date(_))
        ));
        assert!(parse_date_text("", &w).is_err());
        assert!(parse_date_text("Feb 30 2025", &w).is_err());
        assert!(parse_date_text("13/40/2025", &w).is_err());
        assert!(matches!(
            parse_date_text("Jan 1 2025 - Jan 1 2027", &w),
            Err(ParseFailure::Range(_))
        ));
    }

    #[test]
    fn test_period_label() {
        assert_eq!(parse_period_label("AUGUST 2025"), Some(d(2025, 8, 1)));
        assert_eq!(parse_period_label("< Jul 2025 >"), Some(d(2025, 7, 1)));
        assert_eq!(parse_period_label("Upcoming Events"), None);
    }

    #[test]
    fn test_month_tokens() {
        assert_eq!(month_from_token("Sept."), Some(9));
        assert_eq!(month_from_token("JULYY"), Some(7));
        assert_eq!(month_from_token("smarch"), None);
    }
}
