use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::metrics::{EngineConfig, DEFAULT_ACTIVE_WINDOW_SECONDS};
use crate::parsing::{parse_bool, parse_datetime, parse_memory_to_bytes};
use crate::planner::{RangeShortcut, TimeRange};
use crate::types::Config;

const DEFAULT_SITE: &str = "datadoghq.com";

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;

    /// Like `get_var`, but blank values count as unset.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get_var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment for tests
#[derive(Debug, Default, Clone)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    load_config_at(env, Utc::now())
}

/// Load configuration, resolving relative dates (`HH:MM`, `MM-DD`) and the
/// default custom end time against `now`.
pub fn load_config_at<E: EnvironmentProvider>(env: &E, now: DateTime<Utc>) -> Result<Config> {
    let api_key = env
        .get_non_empty("DD_API_KEY")
        .ok_or_else(|| anyhow!("DD_API_KEY must be set"))?;
    let app_key = env
        .get_non_empty("DD_APP_KEY")
        .ok_or_else(|| anyhow!("DD_APP_KEY must be set"))?;

    let api_url = match env.get_non_empty("DD_API_URL") {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let site = env.get_non_empty("DD_SITE").unwrap_or_else(|| DEFAULT_SITE.to_string());
            format!("https://api.{}", site)
        }
    };

    let time_range = load_time_range(env, now)?;

    let active_window_seconds: i64 = env
        .get_non_empty("ACTIVE_POD_WINDOW_SECONDS")
        .map(|v| v.parse::<i64>())
        .transpose()
        .context("Invalid ACTIVE_POD_WINDOW_SECONDS")?
        .unwrap_or(DEFAULT_ACTIVE_WINDOW_SECONDS);
    if active_window_seconds <= 0 {
        bail!("Invalid ACTIVE_POD_WINDOW_SECONDS: must be a positive number of seconds");
    }
    let active_window = EngineConfig::with_window_seconds(active_window_seconds)
        .ok_or_else(|| anyhow!("Invalid ACTIVE_POD_WINDOW_SECONDS: {} is out of range", active_window_seconds))?
        .active_window;

    let sort_by = env
        .get_non_empty("SORT_BY")
        .map(|v| v.parse())
        .transpose()
        .context("Invalid SORT_BY")?
        .unwrap_or_default();

    let output_format = env
        .get_non_empty("OUTPUT_FORMAT")
        .map(|v| v.parse())
        .transpose()
        .context("Invalid OUTPUT_FORMAT")?
        .unwrap_or_default();

    let memory_threshold_bytes = match env.get_non_empty("MEMORY_THRESHOLD") {
        Some(v) => Some(
            parse_memory_to_bytes(&v)
                .ok_or_else(|| anyhow!("Invalid MEMORY_THRESHOLD '{}': expected a quantity like 512Mi", v))?,
        ),
        None => None,
    };

    let validate_credentials = env
        .get_non_empty("VALIDATE_CREDENTIALS")
        .map(|v| parse_bool(&v))
        .unwrap_or(true);

    Ok(Config {
        api_key,
        app_key,
        api_key_id: env.get_non_empty("DD_API_KEY_ID"),
        api_url,
        cluster_name: env.get_non_empty("CLUSTER_NAME"),
        namespace: env.get_non_empty("NAMESPACE"),
        pod_filter: env.get_non_empty("POD_FILTER"),
        time_range,
        active_window,
        sort_by,
        memory_threshold_bytes,
        output_format,
        validate_credentials,
    })
}

fn load_time_range<E: EnvironmentProvider>(env: &E, now: DateTime<Utc>) -> Result<TimeRange> {
    let today = now.date_naive();
    match (env.get_non_empty("START_TIME"), env.get_non_empty("END_TIME")) {
        (Some(start), end) => {
            let start_at = parse_datetime(&start, today)
                .ok_or_else(|| anyhow!("Invalid START_TIME '{}'", start))?;
            let end_at = match end {
                Some(end) => parse_datetime(&end, today).ok_or_else(|| anyhow!("Invalid END_TIME '{}'", end))?,
                None => now,
            };
            Ok(TimeRange::Custom { start: start_at, end: end_at })
        }
        (None, Some(_)) => Err(anyhow!("END_TIME requires START_TIME")),
        (None, None) => {
            let shortcut = env
                .get_non_empty("TIME_RANGE")
                .map(|v| v.parse::<RangeShortcut>())
                .transpose()
                .context("Invalid TIME_RANGE")?
                .unwrap_or(RangeShortcut::OneHour);
            Ok(TimeRange::Shortcut(shortcut))
        }
    }
}
