use std::time::Duration;

/// Statuses worth retrying for an idempotent GET.
pub(crate) fn retriable_status(code: u16) -> bool {
    matches!(code, 429 | 502 | 503 | 504)
}

pub(crate) fn backoff(current: Duration) -> Duration {
    current.saturating_mul(2)
}

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

pub(crate) fn guess_filename_from_url(url: &str) -> Option<String> {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit('/').next().and_then(|s| {
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths() {
        assert_eq!(
            urljoin("https://api.grndwork.com/", "/v1/data"),
            "https://api.grndwork.com/v1/data"
        );
        assert_eq!(
            urljoin("https://api.grndwork.com", "v1/qc"),
            "https://api.grndwork.com/v1/qc"
        );
        assert_eq!(urljoin("https://a", "https://b/c"), "https://b/c");
    }

    #[test]
    fn retries_only_transient_statuses() {
        assert!(retriable_status(429));
        assert!(retriable_status(503));
        assert!(!retriable_status(500));
        assert!(!retriable_status(404));
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(Duration::from_secs(30)), Duration::from_secs(60));
    }

    #[test]
    fn filename_from_url() {
        assert_eq!(
            guess_filename_from_url("https://x/reports/a.pdf?sig=1").as_deref(),
            Some("a.pdf")
        );
        assert_eq!(guess_filename_from_url("https://x/reports/"), None);
    }
}
