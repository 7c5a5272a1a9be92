//! Traffic filtering applied before the recorder sees a request

use crate::config::FilterConfig;
use crate::url::path_and_query;

/// Decides which requests and error outcomes are recorded
#[derive(Debug, Clone, Default)]
pub struct TrafficFilter {
    exclude: Vec<String>,
    ignore_error_statuses: Vec<u16>,
}

impl TrafficFilter {
    /// Create a filter from its configuration
    #[must_use]
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            exclude: config.exclude.clone(),
            ignore_error_statuses: config.ignore_error_statuses.clone(),
        }
    }

    /// Check whether a request URL is on the exclusion list
    ///
    /// The URL matches when it equals an entry as issued, or when its path
    /// (without query) does.
    #[must_use]
    pub fn is_excluded(&self, url: &str) -> bool {
        let target = path_and_query(url);
        let path = target.split('?').next().unwrap_or_default();
        self.exclude
            .iter()
            .any(|excluded| excluded == url || excluded == path)
    }

    /// Check whether an error with this status is recorded
    #[must_use]
    pub fn records_error(&self, status: u16) -> bool {
        !self.ignore_error_statuses.contains(&status)
    }
}
