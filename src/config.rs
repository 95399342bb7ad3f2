//! Filter engine configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Default subscription endpoints, fetched in order.
const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://easylist.to/easylist/easylist.txt",
    "https://easylist.to/easylist/easyprivacy.txt",
];

/// Per-cache verdict capacity.
const DEFAULT_CACHE_CAPACITY: usize = 1500;

/// Snapshot refresh threshold: 1 day.
const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 86400;

/// Statistics report interval: 5 minutes.
const DEFAULT_REPORT_INTERVAL_SECS: u64 = 300;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration for a [`FilterEngine`](crate::engine::FilterEngine).
///
/// All fields have defaults, so `FilterConfig::default()` is a working
/// configuration; `with_*` builders override individual fields and
/// [`from_yaml_file`](FilterConfig::from_yaml_file) loads one from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Subscription endpoint URLs, processed in order during a refresh.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Directory holding the persisted snapshot and verdict caches.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Maximum entries per verdict cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Snapshot age beyond which a remote refresh is triggered.
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: u64,

    /// Interval between statistics reports.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,

    /// Timeout for one endpoint fetch.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Initial value of the engine's exception toggle.
    #[serde(default = "default_with_exception")]
    pub with_exception: bool,
}

fn default_endpoints() -> Vec<String> {
    DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("easyfilter")
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_refresh_threshold_secs() -> u64 {
    DEFAULT_REFRESH_THRESHOLD_SECS
}

fn default_report_interval_secs() -> u64 {
    DEFAULT_REPORT_INTERVAL_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_with_exception() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            cache_dir: default_cache_dir(),
            cache_capacity: default_cache_capacity(),
            refresh_threshold_secs: default_refresh_threshold_secs(),
            report_interval_secs: default_report_interval_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            with_exception: default_with_exception(),
        }
    }
}

impl FilterConfig {
    /// Load a configuration from a YAML file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Override the subscription endpoints.
    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Override the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Override the per-cache verdict capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Override the snapshot refresh threshold.
    ///
    /// Default is 1 day (86400 seconds).
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold_secs = threshold.as_secs();
        self
    }

    /// Override the statistics report interval.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval_secs = interval.as_secs();
        self
    }

    /// Override the endpoint fetch timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_secs = timeout.as_secs();
        self
    }

    /// Override the initial exception toggle.
    pub fn with_exception(mut self, with_exception: bool) -> Self {
        self.with_exception = with_exception;
        self
    }

    /// The snapshot refresh threshold as a [`Duration`].
    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    /// The statistics report interval as a [`Duration`].
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// The endpoint fetch timeout as a [`Duration`].
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
