// Public modules
pub mod types;
pub mod error;
pub mod config;
pub mod parsing;
pub mod planner;
pub mod metrics;
pub mod source;
pub mod datadog;
pub mod collector;
pub mod report;

// Re-export commonly used items
pub use types::*;
pub use error::ReportError;
pub use config::{load_config, load_config_at, load_config_with_env, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use parsing::{parse_bool, parse_datetime, parse_memory_to_bytes};
pub use planner::{plan_queries, GlobPattern, MetricQuery, QueryPlan, QueryScope, RangeShortcut, ScopeFilter, TimeRange};
pub use metrics::{aggregate, EngineConfig, ReportDistribution};
pub use source::MetricsSource;
pub use datadog::DatadogClient;
pub use collector::ReportCollector;
pub use report::{render, OutputFormat, ReportOptions, SortKey, UsageReport};
