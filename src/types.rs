use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::metrics::EngineConfig;
use crate::planner::TimeRange;
use crate::report::{OutputFormat, SortKey};

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub app_key: String,
    pub api_key_id: Option<String>,
    pub api_url: String,
    pub cluster_name: Option<String>,
    pub namespace: Option<String>,
    pub pod_filter: Option<String>,
    pub time_range: TimeRange,
    pub active_window: chrono::Duration,
    pub sort_by: SortKey,
    pub memory_threshold_bytes: Option<f64>,
    pub output_format: OutputFormat,
    pub validate_credentials: bool,
}

impl Config {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            active_window: self.active_window,
        }
    }
}

/// Identity of a pod as reported by the metrics backend tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PodIdentity {
    pub cluster: String,
    pub namespace: String,
    pub pod: String,
}

impl PodIdentity {
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        pod: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            pod: pod.into(),
        }
    }
}

impl fmt::Display for PodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.cluster, self.namespace, self.pod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    UsageMemory,
    LimitMemory,
    UsageCpu,
    LimitCpu,
    RequestMemory,
    RequestCpu,
}

impl MetricKind {
    /// Kinds that decide which pods get a row.
    pub const ALL: [MetricKind; 4] = [
        MetricKind::UsageMemory,
        MetricKind::LimitMemory,
        MetricKind::UsageCpu,
        MetricKind::LimitCpu,
    ];

    /// Kinds fetched alongside [`MetricKind::ALL`] to annotate existing rows.
    pub const REQUESTS: [MetricKind; 2] = [MetricKind::RequestMemory, MetricKind::RequestCpu];

    /// Backend metric name queried for this kind.
    pub fn metric_name(&self) -> &'static str {
        match self {
            MetricKind::UsageMemory => "kubernetes.memory.usage",
            MetricKind::LimitMemory => "kubernetes.memory.limits",
            MetricKind::UsageCpu => "kubernetes.cpu.usage.total",
            MetricKind::LimitCpu => "kubernetes.cpu.limits",
            MetricKind::RequestMemory => "kubernetes.memory.requests",
            MetricKind::RequestCpu => "kubernetes.cpu.requests",
        }
    }

    /// Factor converting backend values into report units (bytes or cores).
    /// CPU usage arrives in nanocores while CPU limits and requests are
    /// already in cores.
    pub fn value_scale(&self) -> f64 {
        match self {
            MetricKind::UsageCpu => 1e-9,
            _ => 1.0,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::UsageMemory => "usage-memory",
            MetricKind::LimitMemory => "limit-memory",
            MetricKind::UsageCpu => "usage-cpu",
            MetricKind::LimitCpu => "limit-cpu",
            MetricKind::RequestMemory => "request-memory",
            MetricKind::RequestCpu => "request-cpu",
        };
        f.write_str(s)
    }
}

/// A single sample. `value` is `None` when the backend reported no sample at
/// that instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value: Some(value) }
    }

    pub fn absent(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, value: None }
    }
}

/// Points for one (pod, metric) pair, ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub pod: PodIdentity,
    pub kind: MetricKind,
    pub points: Vec<TimeSeriesPoint>,
}

impl TimeSeries {
    pub fn new(pod: PodIdentity, kind: MetricKind, points: Vec<TimeSeriesPoint>) -> Self {
        Self { pod, kind, points }
    }

    pub fn present_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().filter_map(|p| p.value)
    }
}

pub type SeriesSet = BTreeMap<PodIdentity, TimeSeries>;

/// Raw query results for the four metric kinds, plus the request series.
///
/// Request sets never add pods to a report; they only fill in the request
/// figure of pods already present in one of the other four sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSeriesSets {
    pub usage_memory: SeriesSet,
    pub limit_memory: SeriesSet,
    pub usage_cpu: SeriesSet,
    pub limit_cpu: SeriesSet,
    pub request_memory: SeriesSet,
    pub request_cpu: SeriesSet,
}

impl MetricSeriesSets {
    pub fn get(&self, kind: MetricKind) -> &SeriesSet {
        match kind {
            MetricKind::UsageMemory => &self.usage_memory,
            MetricKind::LimitMemory => &self.limit_memory,
            MetricKind::UsageCpu => &self.usage_cpu,
            MetricKind::LimitCpu => &self.limit_cpu,
            MetricKind::RequestMemory => &self.request_memory,
            MetricKind::RequestCpu => &self.request_cpu,
        }
    }

    pub fn get_mut(&mut self, kind: MetricKind) -> &mut SeriesSet {
        match kind {
            MetricKind::UsageMemory => &mut self.usage_memory,
            MetricKind::LimitMemory => &mut self.limit_memory,
            MetricKind::UsageCpu => &mut self.usage_cpu,
            MetricKind::LimitCpu => &mut self.limit_cpu,
            MetricKind::RequestMemory => &mut self.request_memory,
            MetricKind::RequestCpu => &mut self.request_cpu,
        }
    }

    /// Insert a series into the set matching its kind, returning any series it replaced.
    pub fn insert(&mut self, series: TimeSeries) -> Option<TimeSeries> {
        self.get_mut(series.kind).insert(series.pod.clone(), series)
    }

    pub fn series_count(&self) -> usize {
        MetricKind::ALL
            .iter()
            .chain(MetricKind::REQUESTS.iter())
            .map(|k| self.get(*k).len())
            .sum()
    }
}

/// Pod activity derived from recent CPU samples.
///
/// This is a heuristic, not a Kubernetes phase lookup: a pod is `Active` when
/// it reported CPU usage within the active window, `Completed` otherwise
/// (including when it never reported CPU usage at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PodStatus {
    Active,
    Completed,
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodStatus::Active => f.write_str("Active"),
            PodStatus::Completed => f.write_str("Completed"),
        }
    }
}

/// Peak/average/limit figures for one resource. `None` renders as "N/A".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceSummary {
    pub peak: Option<f64>,
    pub average: Option<f64>,
    pub limit: Option<f64>,
    /// Most recent present request.
    pub request: Option<f64>,
    pub percentage: Option<f64>,
    /// Earlier limit samples in the window differ from the reported one.
    pub limit_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodMetricSummary {
    pub pod: PodIdentity,
    /// Bytes.
    pub memory: ResourceSummary,
    /// Cores.
    pub cpu: ResourceSummary,
    pub status: PodStatus,
    pub last_cpu_sample: Option<DateTime<Utc>>,
}
