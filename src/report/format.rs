use lazy_regex::{regex, Regex};

const MIB: f64 = 1024.0 * 1024.0;

pub fn format_memory(bytes: f64) -> String {
    let mb = bytes / MIB;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else {
        format!("{:.1} MB", mb)
    }
}

pub fn format_cpu(cores: f64) -> String {
    if cores >= 1.0 {
        format!("{:.2} cores", cores)
    } else {
        format!("{:.0} mcores", cores * 1000.0)
    }
}

pub fn format_percentage(pct: f64) -> String {
    format!("{:.0}%", pct)
}

pub fn or_na(value: Option<f64>, f: fn(f64) -> String) -> String {
    value.map(f).unwrap_or_else(|| "N/A".to_string())
}

pub fn or_no_limit(value: Option<f64>, f: fn(f64) -> String) -> String {
    value.map(f).unwrap_or_else(|| "No limit".to_string())
}

pub fn or_no_request(value: Option<f64>, f: fn(f64) -> String) -> String {
    value.map(f).unwrap_or_else(|| "No request".to_string())
}

/// Strip the generated suffix controllers append to pod names, so
/// `api-7d6cf8d579-x2nds` reads as `api`. The first matching pattern wins.
pub fn base_pod_name(pod: &str) -> &str {
    let patterns: [&Regex; 4] = [
        regex!(r"-[0-9a-f]{8,10}-[0-9a-z]{5,7}$"),
        regex!(r"-[0-9a-f]{8,16}$"),
        regex!(r"-[0-9]+$"),
        regex!(r"-[a-z0-9]{5,10}$"),
    ];
    for re in patterns {
        if let Some(m) = re.find(pod) {
            return &pod[..m.start()];
        }
    }
    pod
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(150.0 * MIB), "150.0 MB");
        assert_eq!(format_memory(1536.0 * MIB), "1.5 GB");
        assert_eq!(format_memory(0.0), "0.0 MB");
    }

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(2.5), "2.50 cores");
        assert_eq!(format_cpu(1.0), "1.00 cores");
        assert_eq!(format_cpu(0.25), "250 mcores");
        assert_eq!(format_cpu(0.0), "0 mcores");
    }

    #[test]
    fn test_missing_values() {
        assert_eq!(or_na(None, format_cpu), "N/A");
        assert_eq!(or_no_limit(None, format_memory), "No limit");
        assert_eq!(or_no_request(None, format_cpu), "No request");
        assert_eq!(or_no_request(Some(0.5), format_cpu), "500 mcores");
        assert_eq!(or_na(Some(75.0), format_percentage), "75%");
    }

    #[test]
    fn test_base_pod_name() {
        assert_eq!(base_pod_name("api-server-7d6cf8d579-x2nds"), "api-server");
        assert_eq!(base_pod_name("cache-7d6cf8d579"), "cache");
        assert_eq!(base_pod_name("kafka-2"), "kafka");
        assert_eq!(base_pod_name("job-runner-abc12"), "job-runner");
        assert_eq!(base_pod_name("postgres"), "postgres");
    }
}
