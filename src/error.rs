use chrono::{DateTime, Utc};

use crate::types::MetricKind;

/// Failures of the planning and aggregation core.
///
/// Missing samples, empty series and absent limits are not errors; they
/// surface as `None` fields in the summaries.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("Invalid time range: start {start} must be before end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid query scope: {0}")]
    InvalidScope(String),

    #[error("Malformed {metric} series for {pod}: {reason}")]
    DataIntegrity {
        pod: String,
        metric: MetricKind,
        reason: String,
    },
}

impl ReportError {
    pub fn integrity(pod: impl ToString, metric: MetricKind, reason: impl Into<String>) -> Self {
        ReportError::DataIntegrity {
            pod: pod.to_string(),
            metric,
            reason: reason.into(),
        }
    }
}
