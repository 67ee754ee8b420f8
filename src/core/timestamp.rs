use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Fixed-width ISO-8601 layout. Every stored stamp has the same width so
/// lexical order of the column matches chronological order.
const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format(STORED_FORMAT).to_string()
}

/// Parse a stored stamp. Accepts any RFC 3339 value, not just our own layout,
/// so rows written by other tools still load.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a due date typed by a user.
///
/// Accepts RFC 3339 (`2026-03-01T09:30:00+02:00`), a naive date-time
/// (`2026-03-01T09:30` or `2026-03-01 09:30:00`, taken as UTC) or a bare date
/// (`2026-03-01`, midnight UTC).
pub fn parse_due_input(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Some(dt) = parse_timestamp(s) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
