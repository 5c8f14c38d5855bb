use anyhow::Result;
use std::future::Future;

use crate::planner::MetricQuery;
use crate::types::SeriesSet;

/// Backend that executes one planned metric query.
///
/// Implementations return one series per pod identity, with points ascending
/// by timestamp and values already converted to report units (see
/// [`crate::types::MetricKind::value_scale`]).
pub trait MetricsSource {
    fn fetch_series(&self, query: &MetricQuery) -> impl Future<Output = Result<SeriesSet>> + Send;
}
