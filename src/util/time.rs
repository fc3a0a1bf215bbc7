use anyhow::{bail, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

// Parse a window string like "7d", "YYYY-MM-DD", or RFC3339 into a UTC timestamp.
// Returns Some(ts) on success; None if unparseable.
pub fn parse_window_str(s: &str) -> Option<DateTime<Utc>> {
    // "7d" -> now - 7 days
    if let Some(stripped) = s.strip_suffix('d') {
        if let Ok(days) = stripped.parse::<i64>() {
            if days > 0 {
                return Some(Utc::now() - Duration::days(days));
            }
        }
    }
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = nd.and_hms_opt(0, 0, 0) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

// Helper for Option<String> inputs used by CLI flags like --since
pub fn parse_since_opt(since: &Option<String>) -> Result<Option<DateTime<Utc>>> {
    let Some(s) = since.as_ref() else { return Ok(None) };
    match parse_window_str(s) {
        Some(ts) => Ok(Some(ts)),
        None => bail!("Invalid --since value: {} (expected Nd, YYYY-MM-DD or RFC3339)", s),
    }
}

/// Epoch seconds to UTC; None when out of chrono's range.
pub fn from_epoch_secs(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

// Tolerant timestamp parsing for posted dates found in raw dumps.
// Naive forms are taken as UTC.
pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() { return None; }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return nd.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(from_epoch_secs);
    }
    None
}
