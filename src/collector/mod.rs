use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::metrics::{self, EngineConfig};
use crate::planner::{QueryPlan, ScopeFilter};
use crate::report::{ReportMetadata, ReportOptions, UsageReport};
use crate::source::MetricsSource;
use crate::types::{Config, MetricKind, MetricSeriesSets, SeriesSet};

/// Runs a query plan against a metrics source and turns the results into a report.
pub struct ReportCollector<'a, S> {
    source: &'a S,
    engine: EngineConfig,
    options: ReportOptions,
}

impl<'a, S: MetricsSource> ReportCollector<'a, S> {
    pub fn new(source: &'a S, config: &Config) -> Self {
        Self {
            source,
            engine: config.engine_config(),
            options: ReportOptions {
                sort_by: config.sort_by,
                memory_threshold_bytes: config.memory_threshold_bytes,
            },
        }
    }

    pub fn with_options(source: &'a S, engine: EngineConfig, options: ReportOptions) -> Self {
        Self { source, engine, options }
    }

    /// Fetch all four metric kinds and both request kinds concurrently.
    /// Aggregation only starts once every query has returned.
    pub async fn collect(&self, plan: &QueryPlan) -> Result<MetricSeriesSets> {
        let (usage_memory, limit_memory, usage_cpu, limit_cpu, request_memory, request_cpu) = tokio::try_join!(
            self.source.fetch_series(plan.query(MetricKind::UsageMemory)),
            self.source.fetch_series(plan.query(MetricKind::LimitMemory)),
            self.source.fetch_series(plan.query(MetricKind::UsageCpu)),
            self.source.fetch_series(plan.query(MetricKind::LimitCpu)),
            self.source.fetch_series(plan.query(MetricKind::RequestMemory)),
            self.source.fetch_series(plan.query(MetricKind::RequestCpu)),
        )?;

        let filter = plan.filter();
        let sets = MetricSeriesSets {
            usage_memory: retain_in_scope(usage_memory, filter, MetricKind::UsageMemory),
            limit_memory: retain_in_scope(limit_memory, filter, MetricKind::LimitMemory),
            usage_cpu: retain_in_scope(usage_cpu, filter, MetricKind::UsageCpu),
            limit_cpu: retain_in_scope(limit_cpu, filter, MetricKind::LimitCpu),
            request_memory: retain_in_scope(request_memory, filter, MetricKind::RequestMemory),
            request_cpu: retain_in_scope(request_cpu, filter, MetricKind::RequestCpu),
        };
        for kind in MetricKind::ALL {
            let count = sets.get(kind).len();
            if count == 0 {
                warn!("no {} series returned for cluster {}", kind, plan.scope.cluster);
            } else {
                info!("{} series for {}", count, kind);
            }
        }
        for kind in MetricKind::REQUESTS {
            debug!("{} series for {}", sets.get(kind).len(), kind);
        }
        Ok(sets)
    }

    pub async fn build_report(&self, plan: &QueryPlan, now: DateTime<Utc>) -> Result<UsageReport> {
        let sets = self.collect(plan).await?;
        let rows = metrics::aggregate(&sets, &self.engine, now)?;
        info!("aggregated {} pods", rows.len());
        Ok(UsageReport::new(ReportMetadata::from_plan(plan, now), rows, &self.options))
    }
}

fn retain_in_scope(mut set: SeriesSet, filter: &ScopeFilter, kind: MetricKind) -> SeriesSet {
    let before = set.len();
    set.retain(|pod, _| filter.matches(pod));
    let dropped = before - set.len();
    if dropped > 0 {
        warn!("dropped {} {} series outside the requested scope", dropped, kind);
    }
    set
}
