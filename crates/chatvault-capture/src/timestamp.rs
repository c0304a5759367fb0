//! Normalization of the client's rendered timestamps.
//!
//! The structured metadata attribute carries `[time, date]` in the user's
//! locale: 12- or 24-hour clock, `/`, `.` or `-` separated dates, two- or
//! four-digit years, day/month order varying by region.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use chatvault_core::timestamp::{to_canonical, APPROXIMATE_FORMAT};
use chatvault_core::DateOrder;

static BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.+?)\]").unwrap());

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})[:.](\d{2})(?:[:.](\d{2}))?\s*([ap])?\.?\s*(?:m\.?)?$").unwrap()
});

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,4})[/.\-](\d{1,2})[/.\-](\d{2,4})\.?$").unwrap());

static BARE_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d{1,2}):(\d{2})\s*(AM|PM)?$").unwrap());

/// Text inside the first `[...]` of the metadata attribute.
pub fn bracket_text(pre_plain_text: &str) -> Option<&str> {
    BRACKET_RE
        .captures(pre_plain_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Parse a `time, date` (or `date, time`) pair into a date-time.
pub fn parse_structured(text: &str, order: DateOrder) -> Option<NaiveDateTime> {
    let (first, second) = text.split_once(',')?;
    let (first, second) = (first.trim(), second.trim());
    let (time, date) = if first.contains(':') {
        (first, second)
    } else {
        (second, first)
    };
    Some(NaiveDateTime::new(parse_date(date, order)?, parse_time(time)?))
}

/// Canonical form of a structured `[time, date]` prefix.
pub fn canonical_from_structured(text: &str, order: DateOrder) -> Option<String> {
    parse_structured(text, order).map(|dt| to_canonical(&dt))
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    // U+202F and U+00A0 show up between the time and the meridiem.
    let normalized = text.replace(['\u{202f}', '\u{a0}'], " ");
    let caps = TIME_RE.captures(normalized.trim())?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let second: u32 = caps
        .get(3)
        .map_or(Some(0), |m| m.as_str().parse().ok())?;

    if let Some(meridiem) = caps.get(4) {
        if hour == 0 || hour > 12 {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("p");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn parse_date(text: &str, order: DateOrder) -> Option<NaiveDate> {
    let caps = DATE_RE.captures(text.trim())?;
    let a = &caps[1];
    let b: u32 = caps[2].parse().ok()?;
    let c = &caps[3];

    if a.len() == 4 {
        let year: i32 = a.parse().ok()?;
        let day: u32 = c.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, b, day);
    }

    let a: u32 = a.parse().ok()?;
    let year = expand_year(c)?;
    let (month, day) = if a > 12 {
        (b, a)
    } else if b > 12 {
        (a, b)
    } else {
        match order {
            DateOrder::Mdy => (a, b),
            DateOrder::Dmy => (b, a),
        }
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_year(text: &str) -> Option<i32> {
    let year: i32 = text.parse().ok()?;
    match text.len() {
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

/// A bare `H:MM [AM|PM]` span combined with `today`, in the approximate
/// (non-canonical) form.
pub fn approximate_from_bare_time(text: &str, today: NaiveDate) -> Option<String> {
    let caps = BARE_TIME_RE.captures(text.trim())?;
    let time = parse_time(caps.get(0)?.as_str())?;
    Some(NaiveDateTime::new(today, time).format(APPROXIMATE_FORMAT).to_string())
}

/// Whether a span's text looks like a bare rendered time.
pub fn is_bare_time(text: &str) -> bool {
    BARE_TIME_RE.is_match(text.trim())
}
