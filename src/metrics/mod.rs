// Aggregation and classification of raw pod time series
pub mod base;
pub mod distribution;
pub mod status;

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::ReportError;
use crate::types::{
    MetricKind, MetricSeriesSets, PodIdentity, PodMetricSummary, ResourceSummary, TimeSeries,
};
use base::{compute_percentage, limit_value, request_value, usage_stats, validate_series};
use status::{classify_status, last_cpu_sample};

// Re-export commonly used items
pub use distribution::{Distribution, ReportDistribution, UtilizationBuckets};

pub const DEFAULT_ACTIVE_WINDOW_SECONDS: i64 = 60;

/// Tunables for [`aggregate`], passed explicitly per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub active_window: Duration,
}

impl EngineConfig {
    /// `None` when `seconds` does not fit in a `Duration`.
    pub fn with_window_seconds(seconds: i64) -> Option<Self> {
        Duration::try_seconds(seconds).map(|active_window| Self { active_window })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            active_window: Duration::seconds(DEFAULT_ACTIVE_WINDOW_SECONDS),
        }
    }
}

/// Build one summary per pod seen in any of the four series sets. Request
/// series only fill in `request` for those pods.
///
/// Every series is validated first; a single malformed series fails the whole
/// call so that no partial row set is ever returned. Output is ordered by pod
/// identity.
pub fn aggregate(
    sets: &MetricSeriesSets,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Vec<PodMetricSummary>, ReportError> {
    for kind in MetricKind::ALL.into_iter().chain(MetricKind::REQUESTS) {
        for (pod, series) in sets.get(kind) {
            validate_series(pod, kind, series)?;
        }
    }

    let pods: BTreeSet<&PodIdentity> = MetricKind::ALL
        .iter()
        .flat_map(|kind| sets.get(*kind).keys())
        .collect();
    debug!(
        "aggregating {} pods from {} series",
        pods.len(),
        sets.series_count()
    );

    Ok(pods
        .into_iter()
        .map(|pod| summarize_pod(pod, sets, config, now))
        .collect())
}

fn summarize_pod(
    pod: &PodIdentity,
    sets: &MetricSeriesSets,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> PodMetricSummary {
    let cpu_usage = sets.usage_cpu.get(pod);
    PodMetricSummary {
        pod: pod.clone(),
        memory: summarize_resource(
            sets.usage_memory.get(pod),
            sets.limit_memory.get(pod),
            sets.request_memory.get(pod),
        ),
        cpu: summarize_resource(cpu_usage, sets.limit_cpu.get(pod), sets.request_cpu.get(pod)),
        status: classify_status(cpu_usage, config, now),
        last_cpu_sample: last_cpu_sample(cpu_usage),
    }
}

fn summarize_resource(
    usage: Option<&TimeSeries>,
    limit: Option<&TimeSeries>,
    request: Option<&TimeSeries>,
) -> ResourceSummary {
    let (peak, average) = usage_stats(usage);
    let (limit, limit_changed) = limit_value(limit);
    ResourceSummary {
        peak,
        average,
        limit,
        request: request_value(request),
        // always from peak: exceeding a limit is driven by peaks
        percentage: compute_percentage(peak, limit),
        limit_changed,
    }
}
