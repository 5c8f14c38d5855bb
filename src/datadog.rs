use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, error, warn};

use crate::error::ReportError;
use crate::planner::{MetricQuery, ScopeTag, TagMatcher};
use crate::source::MetricsSource;
use crate::types::{Config, MetricKind, PodIdentity, SeriesSet, TimeSeries, TimeSeriesPoint};

const CLUSTER_TAG: &str = "kube_cluster_name";
const NAMESPACE_TAG: &str = "kube_namespace";
const POD_TAG: &str = "pod_name";

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub series: Vec<RawSeries>,
}

#[derive(Debug, Deserialize)]
pub struct RawSeries {
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub tag_set: Vec<String>,
    /// `[epoch millis, value or null]`
    #[serde(default)]
    pub pointlist: Vec<(f64, Option<f64>)>,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    valid: bool,
}

/// Datadog metrics API client (v1 timeseries query).
pub struct DatadogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    app_key: String,
}

impl DatadogClient {
    pub fn new(base_url: &str, api_key: &str, app_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            app_key: app_key.to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.api_url, &cfg.api_key, &cfg.app_key)
    }

    /// Check the API key against `/api/v1/validate`.
    pub async fn validate(&self) -> Result<()> {
        let url = format!("{}/api/v1/validate", self.base_url);
        let res = self
            .http
            .get(&url)
            .header("DD-API-KEY", &self.api_key)
            .send()
            .await
            .context("Failed to send Datadog validate request")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            error!("Datadog key validation failed: {} - {}", status, body);
            return Err(anyhow!("Datadog rejected the API key ({})", status));
        }
        let body: ValidateResponse = res.json().await.context("Failed to parse validate response")?;
        if !body.valid {
            return Err(anyhow!("Datadog reports the API key as invalid"));
        }
        Ok(())
    }

    async fn query(&self, query: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<QueryResponse> {
        let url = format!("{}/api/v1/query", self.base_url);
        debug!("datadog query: {}", query);
        let res = self
            .http
            .get(&url)
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .query(&[
                ("from", from.timestamp().to_string()),
                ("to", to.timestamp().to_string()),
                ("query", query.to_string()),
            ])
            .send()
            .await
            .context("Failed to send Datadog query")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            error!("Datadog query failed: {} - {}", status, body);
            return Err(anyhow!("Datadog query returned {}: {}", status, body));
        }
        let body: QueryResponse = res.json().await.context("Failed to parse Datadog query response")?;
        if body.status.as_deref() == Some("error") {
            return Err(anyhow!(
                "Datadog query error: {}",
                body.error.as_deref().unwrap_or("unknown error")
            ));
        }
        Ok(body)
    }

    /// Cluster names that reported CPU usage during the hour before `now`.
    pub async fn list_clusters(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let query = format!("avg:{}{{*}} by {{{}}}", MetricKind::UsageCpu.metric_name(), CLUSTER_TAG);
        let response = self.query(&query, now - Duration::hours(1), now).await?;
        let clusters: BTreeSet<String> = response
            .series
            .iter()
            .flat_map(|s| s.tag_set.iter())
            .filter_map(|tag| tag.split_once(':'))
            .filter(|(key, value)| *key == CLUSTER_TAG && !value.is_empty() && !value.eq_ignore_ascii_case("n/a"))
            .map(|(_, value)| value.to_string())
            .collect();
        Ok(clusters.into_iter().collect())
    }
}

impl MetricsSource for DatadogClient {
    async fn fetch_series(&self, query: &MetricQuery) -> Result<SeriesSet> {
        let response = self.query(&render_query(query), query.start, query.end).await?;
        Ok(decode_series(query.kind, response)?)
    }
}

/// Render a planned query in Datadog's metric query language.
pub fn render_query(query: &MetricQuery) -> String {
    let tags: Vec<String> = query
        .filter
        .predicates
        .iter()
        .map(|p| {
            let key = match p.tag {
                ScopeTag::Cluster => CLUSTER_TAG,
                ScopeTag::Namespace => NAMESPACE_TAG,
                ScopeTag::PodName => POD_TAG,
            };
            let value = match &p.matcher {
                TagMatcher::Exact(v) => v.clone(),
                // Datadog only knows `*`; the collector re-applies the exact glob
                TagMatcher::Glob(glob) => glob.as_str().replace('?', "*"),
            };
            format!("{}:{}", key, value)
        })
        .collect();
    let tag_filter = if tags.is_empty() { "*".to_string() } else { tags.join(",") };
    format!(
        "max:{}{{{}}} by {{{},{},{}}}",
        query.metric_name, tag_filter, CLUSTER_TAG, NAMESPACE_TAG, POD_TAG
    )
}

/// Convert a query response into a series set for `kind`.
pub fn decode_series(kind: MetricKind, response: QueryResponse) -> Result<SeriesSet, ReportError> {
    let mut set = SeriesSet::new();
    for raw in response.series {
        let Some(pod) = identity_from_tags(&raw.tag_set) else {
            warn!(
                "skipping {} series without pod tags (scope {})",
                kind,
                raw.scope.as_deref().unwrap_or("unknown")
            );
            continue;
        };
        let scale = kind.value_scale();
        let mut points = Vec::with_capacity(raw.pointlist.len());
        for (millis, value) in raw.pointlist {
            let timestamp = timestamp_from_millis(millis)
                .ok_or_else(|| ReportError::integrity(&pod, kind, format!("invalid timestamp {}", millis)))?;
            points.push(TimeSeriesPoint {
                timestamp,
                value: value.map(|v| v * scale),
            });
        }
        if set.contains_key(&pod) {
            return Err(ReportError::integrity(&pod, kind, "pod reported by more than one series"));
        }
        set.insert(pod.clone(), TimeSeries::new(pod, kind, points));
    }
    Ok(set)
}

fn identity_from_tags(tags: &[String]) -> Option<PodIdentity> {
    let lookup = |key: &str| {
        tags.iter()
            .filter_map(|t| t.split_once(':'))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    };
    Some(PodIdentity::new(lookup(CLUSTER_TAG)?, lookup(NAMESPACE_TAG)?, lookup(POD_TAG)?))
}

fn timestamp_from_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() || millis.fract() != 0.0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}
