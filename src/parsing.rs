use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Parse a user supplied instant, interpreted as UTC.
///
/// Accepted forms: `YYYY-MM-DD HH:MM`, `YYYY-MM-DD` (midnight), `HH:MM`
/// (on `today`) and `MM-DD` (midnight, in the year of `today`).
pub fn parse_datetime(input: &str, today: NaiveDate) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Some(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M") {
        return Some(today.and_time(t).and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{}-{}", today.year(), s), "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Parse a Kubernetes style memory quantity into bytes.
pub fn parse_memory_to_bytes(q: &str) -> Option<f64> {
    let q = q.trim();
    if q.is_empty() {
        return None;
    }

    // binary suffixes first so "Mi" is not read as "M" followed by garbage
    const UNITS: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
        ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("K", 1e3),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
    ];

    for (suffix, multiplier) in UNITS {
        if let Some(number) = q.strip_suffix(suffix) {
            return number
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v * multiplier);
        }
    }
    q.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

pub fn parse_bool(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "TRUE" | "True" | "yes")
}
