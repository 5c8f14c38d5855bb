use serde::Serialize;

use crate::types::{PodMetricSummary, ResourceSummary};

/// Spread of one figure across pods, for capacity planning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub count: usize,
    pub min: f64,
    pub median: f64,
    pub p90: f64,
    pub p99: f64,
    pub max: f64,
    pub mean: f64,
}

impl Distribution {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let count = sorted.len();
        Some(Self {
            count,
            min: sorted[0],
            median: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p99: percentile(&sorted, 99.0),
            max: sorted[count - 1],
            mean: sorted.iter().sum::<f64>() / count as f64,
        })
    }
}

// nearest index on already sorted values
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Pod counts by peak-to-limit percentage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UtilizationBuckets {
    pub below_50: usize,
    pub from_50_to_80: usize,
    pub from_80_to_100: usize,
    pub at_or_above_100: usize,
    /// No limit, or a non-positive one.
    pub no_limit: usize,
    /// A limit is set but the pod reported no usage.
    pub no_usage: usize,
}

impl UtilizationBuckets {
    pub fn add(&mut self, summary: &ResourceSummary) {
        match (summary.limit, summary.percentage) {
            (Some(limit), _) if limit <= 0.0 => self.no_limit += 1,
            (None, _) => self.no_limit += 1,
            (Some(_), None) => self.no_usage += 1,
            (Some(_), Some(p)) if p < 50.0 => self.below_50 += 1,
            (Some(_), Some(p)) if p < 80.0 => self.from_50_to_80 += 1,
            (Some(_), Some(p)) if p < 100.0 => self.from_80_to_100 += 1,
            (Some(_), Some(_)) => self.at_or_above_100 += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.below_50
            + self.from_50_to_80
            + self.from_80_to_100
            + self.at_or_above_100
            + self.no_limit
            + self.no_usage
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportDistribution {
    pub memory: Option<Distribution>,
    pub cpu: Option<Distribution>,
    pub memory_buckets: UtilizationBuckets,
    pub cpu_buckets: UtilizationBuckets,
}

impl ReportDistribution {
    pub fn from_summaries(rows: &[PodMetricSummary]) -> Self {
        let memory_peaks: Vec<f64> = rows.iter().filter_map(|r| r.memory.peak).collect();
        let cpu_peaks: Vec<f64> = rows.iter().filter_map(|r| r.cpu.peak).collect();
        let mut memory_buckets = UtilizationBuckets::default();
        let mut cpu_buckets = UtilizationBuckets::default();
        for row in rows {
            memory_buckets.add(&row.memory);
            cpu_buckets.add(&row.cpu);
        }
        Self {
            memory: Distribution::from_values(&memory_peaks),
            cpu: Distribution::from_values(&cpu_peaks),
            memory_buckets,
            cpu_buckets,
        }
    }
}
