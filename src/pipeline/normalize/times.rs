use crate::common::error::ParseFailure;
use crate::common::types::ShowTime;
use chrono::{NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

static SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:,|&|\||;|/|\band\b)\s*").expect("static regex"));
static PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:doors?|showtimes?|shows?|event starts|starts?|begins|time)\s*(?::|at)?\s*")
        .expect("static regex")
});
static TZ_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\b(?:[ecmp][sd]?t|local)$").expect("static regex"));
static CLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(?:([ap])\.?\s*m?\.?)?$").expect("static regex")
});

static TIME_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s*(?:-|\x{2013}|\x{2014}|\bto\b|\buntil\b)\s*(.+)$").expect("static regex")
});

const TBA_MARKERS: &[&str] = &["tba", "tbd", "tbc", "time tba", "time tbd", "to be announced"];

fn is_tba(text: &str) -> bool {
    let t = text.trim().trim_end_matches('.').to_lowercase();
    t.is_empty() || TBA_MARKERS.contains(&t.as_str())
}

/// Parse one showtime such as `7:00 PM`, `7:00p`, `7pm`, `Doors: 7:30 p.m. ET` or `19:30`.
pub fn parse_time(piece: &str) -> Option<NaiveTime> {
    let lowered = piece.trim().to_lowercase().replace('@', " ");
    let unprefixed = PREFIX.replace(lowered.trim(), "");
    let bare = TZ_SUFFIX.replace(unprefixed.trim(), "");
    let s = bare.trim();

    match s {
        "noon" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
        _ => {}
    }

    let caps = CLOCK.captures(s)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    let hour24 = match caps.get(3).map(|m| m.as_str()) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (meridiem, hour) {
                ("a", 12) => 0,
                ("a", h) => h,
                ("p", 12) => 12,
                (_, h) => h + 12,
            }
        }
        // bare "7" is too ambiguous, bare "19:30" is a 24-hour clock
        None if caps.get(2).is_some() => hour,
        None => return None,
    };

    NaiveTime::from_hms_opt(hour24, minute, 0)
}

/// Read a range such as `8PM-11PM` or `7-10 pm` as its start time. A start with no
/// meridiem borrows the end's, falling back to AM when that would start after the end.
fn range_start(piece: &str) -> Option<NaiveTime> {
    let caps = TIME_RANGE.captures(piece.trim())?;
    let (start, end) = (caps.get(1)?.as_str(), caps.get(2)?.as_str());
    if let Some(t) = parse_time(start) {
        return Some(t);
    }
    let end_time = parse_time(end)?;
    let meridiem = if end_time.hour() >= 12 { "pm" } else { "am" };
    let borrowed = parse_time(&format!("{start} {meridiem}"))?;
    if borrowed > end_time {
        return parse_time(&format!("{start} am"));
    }
    Some(borrowed)
}

/// Parse optional raw time text into one or more showtimes.
///
/// Missing text and TBA markers yield a single `TBD`. Text that is present but
/// contains no recognizable time is a parse failure.
pub fn parse_showtimes(raw: Option<&str>) -> Result<Vec<ShowTime>, ParseFailure> {
    let raw = match raw {
        Some(text) if !is_tba(text) => text,
        _ => return Ok(vec![ShowTime::Tbd]),
    };

    let mut times: Vec<ShowTime> = Vec::new();
    let mut saw_tba = false;
    for piece in SPLIT.split(raw.trim()) {
        if is_tba(piece) {
            saw_tba = true;
            continue;
        }
        if let Some(t) = parse_time(piece).or_else(|| range_start(piece)) {
            let t = ShowTime::At(t);
            if !times.contains(&t) {
                times.push(t);
            }
        }
    }

    if times.is_empty() {
        if saw_tba {
            return Ok(vec![ShowTime::Tbd]);
        }
        return Err(ParseFailure::Time(raw.to_string()));
    }
    Ok(times)
}

/// Normalize a list of raw showtime strings from a detail page, keeping order.
/// Entries that cannot be read become `TBD` so positions are preserved.
pub fn parse_showtime_list(raw: &[String]) -> Vec<ShowTime> {
    raw.iter()
        .map(|text| match parse_showtimes(Some(text)) {
            Ok(times) => times.first().copied().unwrap_or(ShowTime::Tbd),
            Err(_) => ShowTime::Tbd,
        })
        .collect()
}

/// Collect every time listed across a detail page's entries, in order and without
/// repeats. Used for single-day events, where one entry may list several shows.
pub fn parse_showtime_entries(raw: &[String]) -> Vec<ShowTime> {
    let mut times: Vec<ShowTime> = Vec::new();
    for text in raw {
        if let Ok(parsed) = parse_showtimes(Some(text)) {
            for t in parsed.into_iter().filter(|t| *t != ShowTime::Tbd) {
                if !times.contains(&t) {
                    times.push(t);
                }
            }
        }
    }
    times
}
