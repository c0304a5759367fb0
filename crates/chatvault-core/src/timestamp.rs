//! Canonical timestamp format shared by capture and storage.

use chrono::NaiveDateTime;

/// `YYYY-MM-DDTHH:MM:SS`, local time of the capturing client.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Lower-confidence form used when only a time of day was visible.
pub const APPROXIMATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Whether `value` is a well-formed canonical date-time.
pub fn is_canonical(value: &str) -> bool {
    NaiveDateTime::parse_from_str(value.trim(), CANONICAL_FORMAT).is_ok()
}

/// Format a date-time in the canonical form.
pub fn to_canonical(dt: &NaiveDateTime) -> String {
    dt.format(CANONICAL_FORMAT).to_string()
}

/// Current UTC time in the canonical form (chat activity, row creation).
pub fn now_canonical() -> String {
    to_canonical(&chrono::Utc::now().naive_utc())
}
