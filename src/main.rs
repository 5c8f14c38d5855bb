use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{info, warn};

use pod_usage_report::{
    load_config, plan_queries, render, Config, DatadogClient, QueryScope, ReportCollector,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = load_config()?;
    info!("datadog api = {}", cfg.api_url);
    if let Some(key_id) = &cfg.api_key_id {
        info!("datadog api key id = {}", key_id);
    }

    let client = DatadogClient::from_config(&cfg)?;

    // Check credentials early (fail fast if requested)
    if cfg.validate_credentials {
        client.validate().await?;
        info!("Datadog credentials validated");
    }

    let now = Utc::now();
    let cluster = resolve_cluster(&client, &cfg, now).await?;
    let scope = scope_from_config(cluster, &cfg);
    let plan = plan_queries(&scope, &cfg.time_range, now)?;
    let (start, end) = plan.window();
    info!("Collecting pod usage for cluster {} from {} to {}", scope.cluster, start, end);

    let collector = ReportCollector::new(&client, &cfg);
    let report = collector.build_report(&plan, now).await?;
    info!("Report contains {} pods", report.rows.len());

    println!("{}", render(&report, cfg.output_format)?);
    Ok(())
}

/// Use the configured cluster, or the only cluster Datadog knows about.
async fn resolve_cluster(client: &DatadogClient, cfg: &Config, now: chrono::DateTime<Utc>) -> Result<String> {
    if let Some(cluster) = &cfg.cluster_name {
        return Ok(cluster.clone());
    }
    warn!("CLUSTER_NAME not set, looking up available clusters");
    let clusters = client.list_clusters(now).await?;
    match clusters.as_slice() {
        [only] => {
            info!("Using the only reporting cluster: {}", only);
            Ok(only.clone())
        }
        [] => bail!("CLUSTER_NAME not set and no clusters reported CPU usage in the last hour"),
        many => bail!(
            "CLUSTER_NAME not set and several clusters are available: {}",
            many.join(", ")
        ),
    }
}

fn scope_from_config(cluster: String, cfg: &Config) -> QueryScope {
    let mut scope = QueryScope::new(cluster);
    if let Some(ns) = &cfg.namespace {
        scope = scope.with_namespace(ns.clone());
    }
    if let Some(filter) = &cfg.pod_filter {
        scope = scope.with_pod_filter(filter.clone());
    }
    scope
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
