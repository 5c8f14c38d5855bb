use crate::error::ReportError;
use crate::types::{MetricKind, PodIdentity, TimeSeries, TimeSeriesPoint};

/// Reject series that are filed under the wrong key or kind, are not strictly
/// ascending by timestamp, or carry non-finite values. Series are never re-sorted.
pub fn validate_series(
    key: &PodIdentity,
    expected: MetricKind,
    series: &TimeSeries,
) -> Result<(), ReportError> {
    if series.kind != expected {
        return Err(ReportError::integrity(
            key,
            expected,
            format!("series of kind {} filed under {}", series.kind, expected),
        ));
    }
    if &series.pod != key {
        return Err(ReportError::integrity(
            key,
            expected,
            format!("series belongs to {}", series.pod),
        ));
    }
    for pair in series.points.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.timestamp == prev.timestamp {
            return Err(ReportError::integrity(
                key,
                expected,
                format!("duplicate timestamp {}", next.timestamp),
            ));
        }
        if next.timestamp < prev.timestamp {
            return Err(ReportError::integrity(
                key,
                expected,
                format!("timestamp {} follows {}", next.timestamp, prev.timestamp),
            ));
        }
    }
    if let Some(bad) = series
        .points
        .iter()
        .find(|p| p.value.map(|v| !v.is_finite()).unwrap_or(false))
    {
        return Err(ReportError::integrity(
            key,
            expected,
            format!("non-finite value at {}", bad.timestamp),
        ));
    }
    Ok(())
}

/// Maximum and mean over the present samples. Absent samples count for nothing.
pub fn usage_stats(series: Option<&TimeSeries>) -> (Option<f64>, Option<f64>) {
    let Some(series) = series else {
        return (None, None);
    };
    let (count, sum, max) = series
        .present_values()
        .fold((0usize, 0.0f64, f64::NEG_INFINITY), |(n, sum, max), v| {
            (n + 1, sum + v, max.max(v))
        });
    if count == 0 {
        return (None, None);
    }
    (Some(max), Some(sum / count as f64))
}

pub fn latest_present(series: &TimeSeries) -> Option<&TimeSeriesPoint> {
    series.points.iter().rev().find(|p| p.value.is_some())
}

/// Most recent present limit, and whether earlier present limits differ from it.
pub fn limit_value(series: Option<&TimeSeries>) -> (Option<f64>, bool) {
    let Some(latest) = series.and_then(latest_present).and_then(|p| p.value) else {
        return (None, false);
    };
    let changed = series
        .map(|s| s.present_values().any(|v| v != latest))
        .unwrap_or(false);
    (Some(latest), changed)
}

/// Most recent present request. Requests are informational, so no change flag.
pub fn request_value(series: Option<&TimeSeries>) -> Option<f64> {
    series.and_then(latest_present).and_then(|p| p.value)
}

/// Peak usage relative to limit. A zero or negative limit means no limit.
pub fn compute_percentage(peak: Option<f64>, limit: Option<f64>) -> Option<f64> {
    match (peak, limit) {
        (Some(peak), Some(limit)) if limit > 0.0 => Some(peak / limit * 100.0),
        _ => None,
    }
}
