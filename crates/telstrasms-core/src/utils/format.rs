use chrono::{DateTime, FixedOffset, NaiveDateTime};

/// Display format for message times in the table (day/month, no year)
const TABLE_TIME_FORMAT: &str = "%d/%m %H:%M:%S";

/// Offset-less layouts the provider has been seen to use
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Format a message timestamp for the table
pub fn format_timestamp(ts: DateTime<FixedOffset>) -> String {
    ts.format(TABLE_TIME_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp from the provider.
/// Timestamps without an offset are taken as UTC. Returns None if unparseable.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
