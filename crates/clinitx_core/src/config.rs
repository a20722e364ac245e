//! Bundle processing configuration.

use std::time::Duration;

/// Configuration for bundle processing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on a transaction's lifetime when the request sets no
    /// deadline of its own (`None` = unbounded).
    pub transaction_timeout: Option<Duration>,

    /// Largest number of entries accepted in one bundle.
    pub max_entries: usize,

    /// Base URL prefixed to response `fullUrl`s (`None` = relative).
    ///
    /// Only `fullUrl` is prefixed. `location` and rewritten references
    /// always stay in the relative `Type/id/_history/n` form.
    pub base_url: Option<String>,

    /// Whether batch bundles are accepted.
    pub allow_batch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transaction_timeout: Some(Duration::from_secs(30)),
            max_entries: 1000,
            base_url: None,
            allow_batch: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default transaction timeout.
    #[must_use]
    pub fn transaction_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Sets the maximum number of entries per bundle.
    #[must_use]
    pub const fn max_entries(mut self, value: usize) -> Self {
        self.max_entries = value;
        self
    }

    /// Sets the base URL for response `fullUrl`s.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets whether batch bundles are accepted.
    #[must_use]
    pub const fn allow_batch(mut self, value: bool) -> Self {
        self.allow_batch = value;
        self
    }
}
