//! Aggregator configuration.

use lag_core::{LagError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default cache lifetime.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(3600);

/// Configuration for one [`Aggregator`](crate::Aggregator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Whether records are read from and written to the cache.
    pub cache_enabled: bool,
    /// Directory holding one `<key>.json` file per provider.
    pub cache_directory: PathBuf,
    /// How long a cached record stays fresh.
    pub cache_duration: Duration,
    /// Upper bound on the number of posts kept.
    pub max_results: usize,
    /// Whether a record with failed fields is still written to the cache.
    pub cache_partial_results: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_directory: PathBuf::from("./cache"),
            cache_duration: DEFAULT_CACHE_DURATION,
            max_results: 1,
            cache_partial_results: true,
        }
    }
}

impl AggregatorConfig {
    /// Enable or disable caching.
    #[must_use]
    pub const fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the cache directory.
    #[must_use]
    pub fn with_cache_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.cache_directory = directory.into();
        self
    }

    /// Set the cache lifetime.
    #[must_use]
    pub const fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        self
    }

    /// Set the maximum number of posts.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Choose whether partially failed refreshes are cached.
    #[must_use]
    pub const fn with_cache_partial_results(mut self, cache_partial: bool) -> Self {
        self.cache_partial_results = cache_partial;
        self
    }

    /// Check the numeric bounds.
    ///
    /// The cache directory is checked when the cache is opened.
    ///
    /// # Errors
    /// Returns [`LagError::InvalidParameter`] if `cache_duration` or
    /// `max_results` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.cache_duration.is_zero() {
            return Err(LagError::InvalidParameter(
                "cache_duration must be greater than zero".to_string(),
            ));
        }
        if self.max_results == 0 {
            return Err(LagError::InvalidParameter(
                "max_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AggregatorConfig::default();
        assert!(config.cache_enabled);
        assert_eq!(config.cache_directory, PathBuf::from("./cache"));
        assert_eq!(config.cache_duration, Duration::from_secs(3600));
        assert_eq!(config.max_results, 1);
        assert!(config.cache_partial_results);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = AggregatorConfig::default()
            .with_cache_enabled(false)
            .with_cache_directory("/tmp/lag")
            .with_cache_duration(Duration::from_secs(60))
            .with_max_results(5)
            .with_cache_partial_results(false);
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_directory, PathBuf::from("/tmp/lag"));
        assert_eq!(config.cache_duration, Duration::from_secs(60));
        assert_eq!(config.max_results, 5);
        assert!(!config.cache_partial_results);
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let zero_ttl = AggregatorConfig::default().with_cache_duration(Duration::ZERO);
        assert!(matches!(zero_ttl.validate(), Err(LagError::InvalidParameter(_))));

        let zero_posts = AggregatorConfig::default().with_max_results(0);
        assert!(matches!(zero_posts.validate(), Err(LagError::InvalidParameter(_))));
    }
}
