//! Field merge rules applied when an incoming message collides with a stored
//! one on external id. Pure functions, no I/O.

use chatvault_core::timestamp::is_canonical;

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Merge a timestamp.
///
/// Precedence:
/// 1. a canonical stored value is kept;
/// 2. otherwise a canonical incoming value replaces it;
/// 3. an absent stored value takes whatever arrives;
/// 4. otherwise the stored value stays.
///
/// A malformed fallback timestamp therefore never clobbers a good one, and a
/// later well-formed timestamp upgrades an earlier malformed one.
pub fn merge_timestamp(stored: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let stored = present(stored);
    let incoming = present(incoming);
    match (stored, incoming) {
        (Some(s), _) if is_canonical(s) => Some(s.to_string()),
        (_, Some(i)) if is_canonical(i) => Some(i.to_string()),
        (None, i) => i.map(str::to_string),
        (Some(s), _) => Some(s.to_string()),
    }
}

/// Merge a media reference: the first successful attachment wins.
pub fn merge_media_ref(stored: Option<&str>, incoming: Option<&str>) -> Option<String> {
    present(stored).or(present(incoming)).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_never_clobbers_canonical() {
        let merged = merge_timestamp(Some("2025-01-01T10:00:00"), Some("10:05 AM"));
        assert_eq!(merged.as_deref(), Some("2025-01-01T10:00:00"));
    }

    #[test]
    fn test_canonical_upgrades_malformed() {
        let merged = merge_timestamp(Some("10:05 AM"), Some("2025-01-01T10:05:00"));
        assert_eq!(merged.as_deref(), Some("2025-01-01T10:05:00"));
    }

    #[test]
    fn test_both_canonical_keeps_stored() {
        let merged = merge_timestamp(Some("2025-01-01T10:00:00"), Some("2025-01-02T09:00:00"));
        assert_eq!(merged.as_deref(), Some("2025-01-01T10:00:00"));
    }

    #[test]
    fn test_absent_takes_anything() {
        assert_eq!(
            merge_timestamp(None, Some("10:05 AM")).as_deref(),
            Some("10:05 AM")
        );
        assert_eq!(merge_timestamp(Some(""), None), None);
        assert_eq!(
            merge_timestamp(Some("10:05 AM"), Some("2025-01-01 10:06")).as_deref(),
            Some("10:05 AM")
        );
    }

    #[test]
    fn test_media_first_wins() {
        assert_eq!(
            merge_media_ref(Some("/media/a.jpg"), Some("/media/b.jpg")).as_deref(),
            Some("/media/a.jpg")
        );
        assert_eq!(
            merge_media_ref(None, Some("/media/b.jpg")).as_deref(),
            Some("/media/b.jpg")
        );
        assert_eq!(
            merge_media_ref(Some(""), Some("/media/b.jpg")).as_deref(),
            Some("/media/b.jpg")
        );
        assert_eq!(merge_media_ref(None, None), None);
    }
}
