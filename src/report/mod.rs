pub mod format;
pub mod render;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::metrics::ReportDistribution;
use crate::planner::QueryPlan;
use crate::types::{PodMetricSummary, PodStatus};

pub use render::{render, render_json, render_table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    MemoryDesc,
    MemoryAsc,
    CpuDesc,
    CpuAsc,
    Name,
    Namespace,
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory-desc" | "memory" => Ok(SortKey::MemoryDesc),
            "memory-asc" => Ok(SortKey::MemoryAsc),
            "cpu-desc" | "cpu" => Ok(SortKey::CpuDesc),
            "cpu-asc" => Ok(SortKey::CpuAsc),
            "name" => Ok(SortKey::Name),
            "namespace" => Ok(SortKey::Namespace),
            other => Err(anyhow!(
                "unknown sort key '{}', expected memory-desc, memory-asc, cpu-desc, cpu-asc, name or namespace",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(anyhow!("unknown output format '{}', expected table or json", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub sort_by: SortKey,
    /// Keep only pods whose peak memory reaches this many bytes.
    pub memory_threshold_bytes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub cluster: String,
    pub namespace: Option<String>,
    pub pod_filter: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

impl ReportMetadata {
    pub fn from_plan(plan: &QueryPlan, generated_at: DateTime<Utc>) -> Self {
        let (start, end) = plan.window();
        Self {
            cluster: plan.scope.cluster.clone(),
            namespace: plan.scope.namespace.clone(),
            pod_filter: plan.scope.pod_name_filter.clone(),
            start,
            end,
            generated_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportTotals {
    pub pods: usize,
    pub active: usize,
    pub completed: usize,
    pub peak_memory_bytes: f64,
    pub peak_cpu_cores: f64,
}

impl ReportTotals {
    pub fn from_rows(rows: &[PodMetricSummary]) -> Self {
        let active = rows.iter().filter(|r| r.status == PodStatus::Active).count();
        Self {
            pods: rows.len(),
            active,
            completed: rows.len() - active,
            peak_memory_bytes: rows.iter().filter_map(|r| r.memory.peak).sum(),
            peak_cpu_cores: rows.iter().filter_map(|r| r.cpu.peak).sum(),
        }
    }
}

/// Filtered, sorted rows ready for a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub metadata: ReportMetadata,
    pub rows: Vec<PodMetricSummary>,
    pub totals: ReportTotals,
    pub distribution: ReportDistribution,
}

impl UsageReport {
    pub fn new(metadata: ReportMetadata, rows: Vec<PodMetricSummary>, options: &ReportOptions) -> Self {
        let mut rows = apply_memory_threshold(rows, options.memory_threshold_bytes);
        sort_rows(&mut rows, options.sort_by);
        let totals = ReportTotals::from_rows(&rows);
        let distribution = ReportDistribution::from_summaries(&rows);
        Self {
            metadata,
            rows,
            totals,
            distribution,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn apply_memory_threshold(rows: Vec<PodMetricSummary>, threshold: Option<f64>) -> Vec<PodMetricSummary> {
    match threshold {
        Some(min) if min > 0.0 => rows
            .into_iter()
            .filter(|r| r.memory.peak.map(|p| p >= min).unwrap_or(false))
            .collect(),
        _ => rows,
    }
}

pub fn sort_rows(rows: &mut [PodMetricSummary], key: SortKey) {
    rows.sort_by(|a, b| {
        let primary = match key {
            SortKey::MemoryDesc => compare_figures(a.memory.peak, b.memory.peak, true),
            SortKey::MemoryAsc => compare_figures(a.memory.peak, b.memory.peak, false),
            SortKey::CpuDesc => compare_figures(a.cpu.peak, b.cpu.peak, true),
            SortKey::CpuAsc => compare_figures(a.cpu.peak, b.cpu.peak, false),
            SortKey::Name => a.pod.pod.cmp(&b.pod.pod),
            SortKey::Namespace => a
                .pod
                .namespace
                .cmp(&b.pod.namespace)
                .then_with(|| a.pod.pod.cmp(&b.pod.pod)),
        };
        primary.then_with(|| a.pod.cmp(&b.pod))
    });
}

// Missing figures go last whichever the direction.
fn compare_figures(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PodIdentity, ResourceSummary};
    use chrono::TimeZone;

    fn row(ns: &str, name: &str, mem: Option<f64>, cpu: Option<f64>, status: PodStatus) -> PodMetricSummary {
        PodMetricSummary {
            pod: PodIdentity::new("prod", ns, name),
            memory: ResourceSummary { peak: mem, average: mem, ..Default::default() },
            cpu: ResourceSummary { peak: cpu, average: cpu, ..Default::default() },
            status,
            last_cpu_sample: None,
        }
    }

    fn metadata() -> ReportMetadata {
        let end = Utc.with_ymd_and_hms(2025, 3, 6, 12, 0, 0).unwrap();
        ReportMetadata {
            cluster: "prod".into(),
            namespace: None,
            pod_filter: None,
            start: end - chrono::Duration::hours(1),
            end,
            generated_at: end,
        }
    }

    fn names(rows: &[PodMetricSummary]) -> Vec<&str> {
        rows.iter().map(|r| r.pod.pod.as_str()).collect()
    }

    fn sample() -> Vec<PodMetricSummary> {
        vec![
            row("b", "small", Some(10.0), Some(0.5), PodStatus::Active),
            row("a", "unknown", None, None, PodStatus::Completed),
            row("a", "big", Some(90.0), Some(0.1), PodStatus::Active),
            row("c", "mid", Some(50.0), Some(2.0), PodStatus::Completed),
        ]
    }

    #[test]
    fn test_sort_by_memory_puts_missing_last() {
        let mut rows = sample();
        sort_rows(&mut rows, SortKey::MemoryDesc);
        assert_eq!(names(&rows), vec!["big", "mid", "small", "unknown"]);

        sort_rows(&mut rows, SortKey::MemoryAsc);
        assert_eq!(names(&rows), vec!["small", "mid", "big", "unknown"]);
    }

    #[test]
    fn test_sort_by_cpu_name_and_namespace() {
        let mut rows = sample();
        sort_rows(&mut rows, SortKey::CpuDesc);
        assert_eq!(names(&rows), vec!["mid", "small", "big", "unknown"]);

        sort_rows(&mut rows, SortKey::CpuAsc);
        assert_eq!(names(&rows), vec!["big", "small", "mid", "unknown"]);

        sort_rows(&mut rows, SortKey::Name);
        assert_eq!(names(&rows), vec!["big", "mid", "small", "unknown"]);

        sort_rows(&mut rows, SortKey::Namespace);
        assert_eq!(names(&rows), vec!["big", "unknown", "small", "mid"]);
    }

    #[test]
    fn test_memory_threshold_filters_rows() {
        let rows = apply_memory_threshold(sample(), Some(40.0));
        let mut kept = names(&rows);
        kept.sort();
        assert_eq!(kept, vec!["big", "mid"]);

        assert_eq!(apply_memory_threshold(sample(), None).len(), 4);
        assert_eq!(apply_memory_threshold(sample(), Some(0.0)).len(), 4);
    }

    #[test]
    fn test_report_totals() {
        let report = UsageReport::new(metadata(), sample(), &ReportOptions::default());
        assert_eq!(report.totals.pods, 4);
        assert_eq!(report.totals.active, 2);
        assert_eq!(report.totals.completed, 2);
        assert_eq!(report.totals.peak_memory_bytes, 150.0);
        assert!((report.totals.peak_cpu_cores - 2.6).abs() < 1e-9);
        assert_eq!(report.distribution.memory.as_ref().unwrap().count, 3);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_parse_sort_key_and_format() {
        assert_eq!("memory-desc".parse::<SortKey>().unwrap(), SortKey::MemoryDesc);
        assert_eq!("CPU-ASC".parse::<SortKey>().unwrap(), SortKey::CpuAsc);
        assert_eq!("namespace".parse::<SortKey>().unwrap(), SortKey::Namespace);
        assert!("size".parse::<SortKey>().is_err());

        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("Table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
