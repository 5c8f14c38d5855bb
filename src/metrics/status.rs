use chrono::{DateTime, Utc};

use super::base::latest_present;
use super::EngineConfig;
use crate::types::{PodStatus, TimeSeries};

/// Classify a pod from its CPU-usage series.
///
/// CPU is used rather than memory because memory can stay non-zero for a
/// terminated pod that has not been reaped yet, while CPU usage stops as soon
/// as nothing is scheduled. The window `[now - active_window, now]` is
/// inclusive at both ends.
pub fn classify_status(
    cpu_usage: Option<&TimeSeries>,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> PodStatus {
    // a window reaching past the earliest representable instant covers everything
    let window_start = now
        .checked_sub_signed(config.active_window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let active = cpu_usage
        .map(|s| {
            s.points
                .iter()
                .any(|p| p.value.is_some() && p.timestamp >= window_start && p.timestamp <= now)
        })
        .unwrap_or(false);
    if active {
        PodStatus::Active
    } else {
        PodStatus::Completed
    }
}

pub fn last_cpu_sample(cpu_usage: Option<&TimeSeries>) -> Option<DateTime<Utc>> {
    cpu_usage.and_then(latest_present).map(|p| p.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricKind, PodIdentity, TimeSeriesPoint};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 6, 12, 0, 0).unwrap()
    }

    fn cpu(points: &[(i64, Option<f64>)]) -> TimeSeries {
        TimeSeries::new(
            PodIdentity::new("prod", "default", "worker"),
            MetricKind::UsageCpu,
            points
                .iter()
                .map(|(t, v)| TimeSeriesPoint { timestamp: now() + Duration::seconds(*t), value: *v })
                .collect(),
        )
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let cfg = EngineConfig::default();
        assert_eq!(classify_status(Some(&cpu(&[(-60, Some(1.0))])), &cfg, now()), PodStatus::Active);
        assert_eq!(classify_status(Some(&cpu(&[(-61, Some(1.0))])), &cfg, now()), PodStatus::Completed);
        assert_eq!(classify_status(Some(&cpu(&[(0, Some(1.0))])), &cfg, now()), PodStatus::Active);
    }

    #[test]
    fn test_absent_points_do_not_count() {
        let cfg = EngineConfig::default();
        let s = cpu(&[(-120, Some(1.0)), (-10, None)]);
        assert_eq!(classify_status(Some(&s), &cfg, now()), PodStatus::Completed);
        assert_eq!(last_cpu_sample(Some(&s)), Some(now() - Duration::seconds(120)));
    }

    #[test]
    fn test_missing_cpu_series_is_completed() {
        let cfg = EngineConfig::default();
        assert_eq!(classify_status(None, &cfg, now()), PodStatus::Completed);
        assert_eq!(classify_status(Some(&cpu(&[])), &cfg, now()), PodStatus::Completed);
        assert_eq!(last_cpu_sample(None), None);
    }

    #[test]
    fn test_window_is_configurable() {
        let s = cpu(&[(-300, Some(1.0))]);
        assert_eq!(classify_status(Some(&s), &EngineConfig::default(), now()), PodStatus::Completed);
        assert_eq!(
            classify_status(Some(&s), &EngineConfig::with_window_seconds(600).unwrap(), now()),
            PodStatus::Active
        );
    }

    #[test]
    fn test_window_longer_than_history_covers_every_sample() {
        let cfg = EngineConfig::with_window_seconds(10_000_000_000_000).unwrap();
        let s = cpu(&[(-86_400 * 365, Some(1.0))]);
        assert_eq!(classify_status(Some(&s), &cfg, now()), PodStatus::Active);
        assert_eq!(classify_status(None, &cfg, now()), PodStatus::Completed);
    }

    #[test]
    fn test_window_beyond_duration_range_is_rejected() {
        assert!(EngineConfig::with_window_seconds(i64::MAX).is_none());
        assert!(EngineConfig::with_window_seconds(60).is_some());
    }

    #[test]
    fn test_samples_after_now_are_outside_window() {
        let s = cpu(&[(30, Some(1.0))]);
        assert_eq!(classify_status(Some(&s), &EngineConfig::default(), now()), PodStatus::Completed);
    }
}
