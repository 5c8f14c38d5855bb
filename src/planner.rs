use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::str::FromStr;

use crate::error::ReportError;
use crate::types::{MetricKind, PodIdentity};

/// Preset trailing windows ending at the evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeShortcut {
    OneHour,
    SixHours,
    OneDay,
    SevenDays,
}

impl RangeShortcut {
    pub fn duration(&self) -> Duration {
        match self {
            RangeShortcut::OneHour => Duration::hours(1),
            RangeShortcut::SixHours => Duration::hours(6),
            RangeShortcut::OneDay => Duration::hours(24),
            RangeShortcut::SevenDays => Duration::days(7),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeShortcut::OneHour => "1h",
            RangeShortcut::SixHours => "6h",
            RangeShortcut::OneDay => "24h",
            RangeShortcut::SevenDays => "7d",
        }
    }
}

impl FromStr for RangeShortcut {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1h" => Ok(RangeShortcut::OneHour),
            "6h" => Ok(RangeShortcut::SixHours),
            "24h" | "1d" => Ok(RangeShortcut::OneDay),
            "7d" => Ok(RangeShortcut::SevenDays),
            other => Err(anyhow!("unknown time range '{}', expected one of 1h, 6h, 24h, 7d", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Shortcut(RangeShortcut),
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::Shortcut(RangeShortcut::OneHour)
    }
}

impl TimeRange {
    /// Concrete `(start, end)` for this range evaluated at `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), ReportError> {
        match *self {
            TimeRange::Shortcut(shortcut) => Ok((now - shortcut.duration(), now)),
            TimeRange::Custom { start, end } if start < end => Ok((start, end)),
            TimeRange::Custom { start, end } => Err(ReportError::InvalidRange { start, end }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryScope {
    pub cluster: String,
    pub namespace: Option<String>,
    pub pod_name_filter: Option<String>,
}

impl QueryScope {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: None,
            pod_name_filter: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_pod_filter(mut self, pattern: impl Into<String>) -> Self {
        self.pod_name_filter = Some(pattern.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeTag {
    Cluster,
    Namespace,
    PodName,
}

/// Shell-style pattern compiled to an anchored regex. `*` matches any run of
/// characters, `?` a single character, everything else is literal.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, ReportError> {
        let mut source = String::from("(?s)^");
        let mut literal = String::new();
        for c in pattern.chars() {
            match c {
                '*' | '?' => {
                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                    source.push_str(if c == '*' { ".*" } else { "." });
                }
                _ => literal.push(c),
            }
        }
        source.push_str(&regex::escape(&literal));
        source.push('$');
        let regex = Regex::new(&source)
            .map_err(|e| ReportError::InvalidScope(format!("invalid pod name pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for GlobPattern {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagMatcher {
    Exact(String),
    Glob(GlobPattern),
}

impl TagMatcher {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            TagMatcher::Exact(expected) => expected == value,
            TagMatcher::Glob(glob) => glob.is_match(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPredicate {
    pub tag: ScopeTag,
    pub matcher: TagMatcher,
}

/// Conjunction of tag predicates. Rendering into a backend query language is
/// left to the metrics source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeFilter {
    pub predicates: Vec<TagPredicate>,
}

impl ScopeFilter {
    pub fn from_scope(scope: &QueryScope) -> Result<Self, ReportError> {
        let mut predicates = vec![TagPredicate {
            tag: ScopeTag::Cluster,
            matcher: TagMatcher::Exact(scope.cluster.trim().to_string()),
        }];
        if let Some(ns) = scope.namespace.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            predicates.push(TagPredicate {
                tag: ScopeTag::Namespace,
                matcher: TagMatcher::Exact(ns.to_string()),
            });
        }
        if let Some(pattern) = scope.pod_name_filter.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let matcher = if pattern.contains(['*', '?']) {
                TagMatcher::Glob(GlobPattern::new(pattern)?)
            } else {
                TagMatcher::Exact(pattern.to_string())
            };
            predicates.push(TagPredicate { tag: ScopeTag::PodName, matcher });
        }
        Ok(Self { predicates })
    }

    pub fn matches(&self, pod: &PodIdentity) -> bool {
        self.predicates.iter().all(|p| {
            let value = match p.tag {
                ScopeTag::Cluster => &pod.cluster,
                ScopeTag::Namespace => &pod.namespace,
                ScopeTag::PodName => &pod.pod,
            };
            p.matcher.matches(value)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub kind: MetricKind,
    pub metric_name: &'static str,
    pub filter: ScopeFilter,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The four queries needed for one report, plus the two request queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub scope: QueryScope,
    pub queries: [MetricQuery; 4],
    pub request_queries: [MetricQuery; 2],
}

impl QueryPlan {
    pub fn query(&self, kind: MetricKind) -> &MetricQuery {
        match kind {
            MetricKind::RequestMemory => &self.request_queries[0],
            MetricKind::RequestCpu => &self.request_queries[1],
            // built in `MetricKind::ALL` order
            _ => &self.queries[kind as usize],
        }
    }

    pub fn filter(&self) -> &ScopeFilter {
        &self.queries[0].filter
    }

    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.queries[0].start, self.queries[0].end)
    }
}

pub fn plan_queries(
    scope: &QueryScope,
    range: &TimeRange,
    now: DateTime<Utc>,
) -> Result<QueryPlan, ReportError> {
    if scope.cluster.trim().is_empty() {
        return Err(ReportError::InvalidScope("cluster name must not be empty".to_string()));
    }
    let (start, end) = range.resolve(now)?;
    let filter = ScopeFilter::from_scope(scope)?;
    let query = |kind: MetricKind| MetricQuery {
        kind,
        metric_name: kind.metric_name(),
        filter: filter.clone(),
        start,
        end,
    };
    Ok(QueryPlan {
        scope: scope.clone(),
        queries: MetricKind::ALL.map(&query),
        request_queries: MetricKind::REQUESTS.map(&query),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_shortcut_ranges_end_at_now() {
        let cases = [
            ("1h", Duration::hours(1)),
            ("6h", Duration::hours(6)),
            ("24h", Duration::hours(24)),
            ("7d", Duration::days(7)),
        ];
        for (input, expected) in cases {
            let shortcut: RangeShortcut = input.parse().unwrap();
            let (start, end) = TimeRange::Shortcut(shortcut).resolve(now()).unwrap();
            assert_eq!(end, now(), "end for {}", input);
            assert_eq!(end - start, expected, "duration for {}", input);
            assert_eq!(shortcut.as_str(), input);
        }
        assert!("3h".parse::<RangeShortcut>().is_err());
    }

    #[test]
    fn test_custom_range_requires_start_before_end() {
        let start = now() - Duration::hours(2);
        let ok = TimeRange::Custom { start, end: now() };
        assert_eq!(ok.resolve(now()).unwrap(), (start, now()));

        let equal = TimeRange::Custom { start: now(), end: now() };
        assert!(matches!(equal.resolve(now()), Err(ReportError::InvalidRange { .. })));

        let reversed = TimeRange::Custom { start: now(), end: start };
        assert!(matches!(reversed.resolve(now()), Err(ReportError::InvalidRange { .. })));
    }

    #[test]
    fn test_plan_produces_one_query_per_metric() {
        let scope = QueryScope::new("prod").with_namespace("payments").with_pod_filter("api-*");
        let plan = plan_queries(&scope, &TimeRange::default(), now()).unwrap();

        assert_eq!(plan.queries.len(), 4);
        assert_eq!(plan.request_queries.len(), 2);
        for kind in MetricKind::ALL.into_iter().chain(MetricKind::REQUESTS) {
            let q = plan.query(kind);
            assert_eq!(q.kind, kind);
            assert_eq!(q.metric_name, kind.metric_name());
            assert_eq!(q.end, now());
            assert_eq!(q.start, now() - Duration::hours(1));
        }
        assert_eq!(
            plan.filter().predicates,
            vec![
                TagPredicate { tag: ScopeTag::Cluster, matcher: TagMatcher::Exact("prod".into()) },
                TagPredicate { tag: ScopeTag::Namespace, matcher: TagMatcher::Exact("payments".into()) },
                TagPredicate { tag: ScopeTag::PodName, matcher: TagMatcher::Glob(GlobPattern::new("api-*").unwrap()) },
            ]
        );
    }

    #[test]
    fn test_plan_rejects_empty_cluster_and_bad_range() {
        let err = plan_queries(&QueryScope::new("  "), &TimeRange::default(), now()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidScope(_)));

        let range = TimeRange::Custom { start: now(), end: now() - Duration::minutes(1) };
        let err = plan_queries(&QueryScope::new("prod"), &range, now()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRange { .. }));
    }

    #[test]
    fn test_pod_filter_without_wildcards_is_exact() {
        let filter = ScopeFilter::from_scope(&QueryScope::new("prod").with_pod_filter("api-7d6cf")).unwrap();
        assert_eq!(filter.predicates[1].matcher, TagMatcher::Exact("api-7d6cf".into()));
        assert!(filter.matches(&PodIdentity::new("prod", "default", "api-7d6cf")));
        assert!(!filter.matches(&PodIdentity::new("prod", "default", "api-7d6cf-x2nds")));
    }

    #[test]
    fn test_scope_filter_is_conjunctive() {
        let filter = ScopeFilter::from_scope(&QueryScope::new("prod").with_namespace("web").with_pod_filter("*front*")).unwrap();
        assert!(filter.matches(&PodIdentity::new("prod", "web", "frontend-1")));
        assert!(filter.matches(&PodIdentity::new("prod", "web", "my-frontend")));
        assert!(!filter.matches(&PodIdentity::new("staging", "web", "frontend-1")));
        assert!(!filter.matches(&PodIdentity::new("prod", "batch", "frontend-1")));
        assert!(!filter.matches(&PodIdentity::new("prod", "web", "backend-1")));
    }

    fn glob_matches(pattern: &str, value: &str) -> bool {
        GlobPattern::new(pattern).unwrap().is_match(value)
    }

    #[test]
    fn test_glob_matching() {
        assert!(glob_matches("podname-*", "podname-abc"));
        assert!(glob_matches("podname-*", "podname-"));
        assert!(!glob_matches("podname-*", "other-podname-abc"));
        assert!(glob_matches("*suffix*", "has-suffix-here"));
        assert!(glob_matches("a?c", "abc"));
        assert!(!glob_matches("a?c", "ac"));
        assert!(glob_matches("*", ""));
        assert!(glob_matches("a*b*c", "axxbyyc"));
        assert!(!glob_matches("a*b*c", "axxbyy"));
    }

    #[test]
    fn test_glob_treats_regex_syntax_literally() {
        assert!(glob_matches("api.v1-*", "api.v1-0"));
        assert!(!glob_matches("api.v1-*", "apixv1-0"));
        assert!(glob_matches("job[1]-?", "job[1]-a"));
        assert!(glob_matches("(a+b)*", "(a+b)-x"));
        assert!(!glob_matches("pod-?", "pod-ab"));
        assert_eq!(GlobPattern::new("web-*").unwrap().as_str(), "web-*");
    }
}
