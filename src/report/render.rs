use anyhow::{Context, Result};
use tabled::{settings::Style, Table, Tabled};

use super::format::{
    base_pod_name, format_cpu, format_memory, format_percentage, or_na, or_no_limit, or_no_request,
};
use super::{OutputFormat, UsageReport};
use crate::metrics::{Distribution, UtilizationBuckets};
use crate::types::PodMetricSummary;

#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Mem Peak")]
    mem_peak: String,
    #[tabled(rename = "Mem Avg")]
    mem_avg: String,
    #[tabled(rename = "Mem Req")]
    mem_req: String,
    #[tabled(rename = "Mem Limit")]
    mem_limit: String,
    #[tabled(rename = "Mem %")]
    mem_pct: String,
    #[tabled(rename = "CPU Peak")]
    cpu_peak: String,
    #[tabled(rename = "CPU Avg")]
    cpu_avg: String,
    #[tabled(rename = "CPU Req")]
    cpu_req: String,
    #[tabled(rename = "CPU Limit")]
    cpu_limit: String,
    #[tabled(rename = "CPU %")]
    cpu_pct: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&PodMetricSummary> for PodRow {
    fn from(r: &PodMetricSummary) -> Self {
        // "*" marks a limit that changed during the window
        let mark = |changed: bool| if changed { "*" } else { "" };
        Self {
            namespace: r.pod.namespace.clone(),
            pod: r.pod.pod.clone(),
            workload: base_pod_name(&r.pod.pod).to_string(),
            mem_peak: or_na(r.memory.peak, format_memory),
            mem_avg: or_na(r.memory.average, format_memory),
            mem_req: or_no_request(r.memory.request, format_memory),
            mem_limit: format!("{}{}", or_no_limit(r.memory.limit, format_memory), mark(r.memory.limit_changed)),
            mem_pct: or_na(r.memory.percentage, format_percentage),
            cpu_peak: or_na(r.cpu.peak, format_cpu),
            cpu_avg: or_na(r.cpu.average, format_cpu),
            cpu_req: or_no_request(r.cpu.request, format_cpu),
            cpu_limit: format!("{}{}", or_no_limit(r.cpu.limit, format_cpu), mark(r.cpu.limit_changed)),
            cpu_pct: or_na(r.cpu.percentage, format_percentage),
            status: r.status.to_string(),
        }
    }
}

pub fn render(report: &UsageReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(report)),
        OutputFormat::Json => render_json(report),
    }
}

pub fn render_json(report: &UsageReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

pub fn render_table(report: &UsageReport) -> String {
    let meta = &report.metadata;
    let mut out = Vec::new();

    out.push(format!("Pod resource usage for cluster {}", meta.cluster));
    if let Some(ns) = &meta.namespace {
        out.push(format!("Namespace filter: {}", ns));
    }
    if let Some(filter) = &meta.pod_filter {
        out.push(format!("Pod name filter: {}", filter));
    }
    out.push(format!(
        "Time range: {} to {}",
        meta.start.format("%Y-%m-%d %H:%M:%S"),
        meta.end.format("%Y-%m-%d %H:%M:%S")
    ));

    if report.is_empty() {
        out.push("No metrics data found for the specified filters".to_string());
        return out.join("\n");
    }

    let rows: Vec<PodRow> = report.rows.iter().map(PodRow::from).collect();
    out.push(Table::new(rows).with(Style::rounded()).to_string());

    let totals = &report.totals;
    out.push(format!(
        "Total pods shown: {} ({} active, {} completed)",
        totals.pods, totals.active, totals.completed
    ));
    out.push(format!("Total peak memory: {}", format_memory(totals.peak_memory_bytes)));
    out.push(format!("Total peak CPU: {}", format_cpu(totals.peak_cpu_cores)));

    out.push(String::new());
    out.push("Resource distribution (peak per pod):".to_string());
    let dist = &report.distribution;
    out.extend(distribution_lines("Memory", dist.memory.as_ref(), &dist.memory_buckets, format_memory));
    out.extend(distribution_lines("CPU", dist.cpu.as_ref(), &dist.cpu_buckets, format_cpu));

    out.join("\n")
}

fn distribution_lines(
    label: &str,
    dist: Option<&Distribution>,
    buckets: &UtilizationBuckets,
    fmt: fn(f64) -> String,
) -> Vec<String> {
    let Some(d) = dist else {
        return vec![format!("{}: no data", label)];
    };
    vec![
        format!("{} ({} pods):", label, d.count),
        format!(
            "  Min: {}  Median: {}  P90: {}  P99: {}  Max: {}  Average: {}",
            fmt(d.min),
            fmt(d.median),
            fmt(d.p90),
            fmt(d.p99),
            fmt(d.max),
            fmt(d.mean)
        ),
        format!(
            "  Of limit: <50%: {}  50-80%: {}  80-100%: {}  >=100%: {}  no limit: {}  no usage: {}",
            buckets.below_50,
            buckets.from_50_to_80,
            buckets.from_80_to_100,
            buckets.at_or_above_100,
            buckets.no_limit,
            buckets.no_usage
        ),
    ]
}
