//! Cache-aside aggregator serving one provider's record.

use std::sync::Arc;
use std::time::Duration;

use lag_cache::{FileCache, NoopCache};
use lag_core::{
    Post, Profile, RecordCache, Result, ResultRecord, SocialProvider, Statistics,
};
use tracing::{debug, instrument, warn};

use crate::config::AggregatorConfig;

/// Where an aggregator's record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Served from a fresh cache entry.
    Cached,
    /// Fetched live during construction.
    Refreshed,
}

/// The profile, statistics and latest posts of one provider.
///
/// Construction performs the whole cache-aside cycle: a fresh cache entry is
/// served as-is, otherwise the provider's three fetches run concurrently and
/// whatever succeeded is stored. A failed fetch leaves its field empty
/// instead of failing construction.
///
/// # Example
///
/// ```rust,ignore
/// use lag::{Aggregator, AggregatorConfig};
/// use std::sync::Arc;
///
/// let provider = Arc::new(lag::PinterestProvider::from_env()?);
/// let aggregator = Aggregator::new(provider, AggregatorConfig::default()).await?;
/// println!("{:?}", aggregator.statistics());
/// ```
pub struct Aggregator {
    provider: Arc<dyn SocialProvider>,
    cache: Arc<dyn RecordCache>,
    config: AggregatorConfig,
    record: ResultRecord,
    state: CacheState,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("provider", &self.provider.name())
            .field("cache_key", &self.provider.cache_key())
            .field("state", &self.state)
            .field("posts", &self.record.posts.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Aggregator {
    /// Build an aggregator backed by a [`FileCache`] in
    /// `config.cache_directory`, or by no cache when caching is disabled.
    ///
    /// # Errors
    /// Returns [`lag_core::LagError::InvalidParameter`] for out-of-range
    /// settings and [`lag_core::LagError::InvalidCacheDirectory`] if the cache
    /// directory is unusable.
    pub async fn new(provider: Arc<dyn SocialProvider>, config: AggregatorConfig) -> Result<Self> {
        config.validate()?;
        let cache: Arc<dyn RecordCache> = if config.cache_enabled {
            Arc::new(FileCache::new(config.cache_directory.clone())?)
        } else {
            Arc::new(NoopCache::new())
        };
        Self::with_cache(provider, cache, config).await
    }

    /// Build an aggregator on top of any [`RecordCache`].
    ///
    /// With caching disabled, `cache` is neither read nor written.
    ///
    /// # Errors
    /// Returns [`lag_core::LagError::InvalidParameter`] for out-of-range
    /// settings, or a fatal error raised by one of the provider's fetches.
    #[instrument(skip_all, fields(provider = provider.name()))]
    pub async fn with_cache(
        provider: Arc<dyn SocialProvider>,
        cache: Arc<dyn RecordCache>,
        config: AggregatorConfig,
    ) -> Result<Self> {
        config.validate()?;

        let cached = if config.cache_enabled {
            load_fresh(cache.as_ref(), provider.cache_key(), config.cache_duration).await
        } else {
            None
        };

        let (mut record, state) = match cached {
            Some(record) => (record, CacheState::Cached),
            None => (
                refresh(provider.as_ref(), cache.as_ref(), &config).await?,
                CacheState::Refreshed,
            ),
        };
        record.posts.truncate(config.max_results);

        Ok(Self {
            provider,
            cache,
            config,
            record,
            state,
        })
    }

    /// Profile data; empty if it could not be fetched.
    pub const fn profile(&self) -> &Profile {
        &self.record.profile
    }

    /// Statistics; empty if they could not be fetched.
    pub const fn statistics(&self) -> &Statistics {
        &self.record.statistics
    }

    /// Latest posts, most recent first, at most `max_results` of them.
    pub fn posts(&self) -> &[Post] {
        &self.record.posts
    }

    /// The whole record.
    pub const fn record(&self) -> &ResultRecord {
        &self.record
    }

    /// Consume the aggregator, returning its record.
    pub fn into_record(self) -> ResultRecord {
        self.record
    }

    /// Whether the record was served from cache or fetched live.
    pub const fn state(&self) -> CacheState {
        self.state
    }

    /// Display name of the provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Cache key of the provider's entry.
    pub fn cache_key(&self) -> &str {
        self.provider.cache_key()
    }

    /// The configuration this aggregator was built with.
    pub const fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Delete this provider's cache entry so the next construction refetches.
    ///
    /// # Errors
    /// Returns an error if the entry exists but cannot be removed.
    pub async fn invalidate(&self) -> Result<()> {
        debug!(key = self.cache_key(), "Invalidating cache entry");
        self.cache.invalidate(self.provider.cache_key()).await
    }

    // Constructors for the bundled providers

    /// Aggregate a Facebook page.
    ///
    /// # Errors
    /// Fails on missing credentials or as [`Aggregator::new`].
    #[cfg(feature = "facebook")]
    pub async fn facebook(
        provider_config: lag_facebook::FacebookConfig,
        config: AggregatorConfig,
    ) -> Result<Self> {
        let provider = lag_facebook::FacebookProvider::new(provider_config)?;
        Self::new(Arc::new(provider), config).await
    }

    /// Aggregate an Instagram account.
    ///
    /// # Errors
    /// Fails on missing credentials or as [`Aggregator::new`].
    #[cfg(feature = "instagram")]
    pub async fn instagram(
        provider_config: lag_instagram::InstagramConfig,
        config: AggregatorConfig,
    ) -> Result<Self> {
        let provider = lag_instagram::InstagramProvider::new(provider_config)?;
        Self::new(Arc::new(provider), config).await
    }

    /// Aggregate a Twitter account.
    ///
    /// # Errors
    /// Fails on missing credentials or as [`Aggregator::new`].
    #[cfg(feature = "twitter")]
    pub async fn twitter(
        provider_config: lag_twitter::TwitterConfig,
        config: AggregatorConfig,
    ) -> Result<Self> {
        let provider = lag_twitter::TwitterProvider::new(provider_config)?;
        Self::new(Arc::new(provider), config).await
    }

    /// Aggregate a YouTube channel.
    ///
    /// # Errors
    /// Fails on missing credentials or as [`Aggregator::new`].
    #[cfg(feature = "youtube")]
    pub async fn youtube(
        provider_config: lag_youtube::YouTubeConfig,
        config: AggregatorConfig,
    ) -> Result<Self> {
        let provider = lag_youtube::YouTubeProvider::new(provider_config)?;
        Self::new(Arc::new(provider), config).await
    }

    /// Aggregate a Pinterest profile.
    ///
    /// # Errors
    /// Fails on a missing username or as [`Aggregator::new`].
    #[cfg(feature = "pinterest")]
    pub async fn pinterest(
        provider_config: lag_pinterest::PinterestConfig,
        config: AggregatorConfig,
    ) -> Result<Self> {
        let provider = lag_pinterest::PinterestProvider::new(provider_config)?;
        Self::new(Arc::new(provider), config).await
    }
}

/// Read `key` if it is fresh. Any cache failure counts as a miss.
async fn load_fresh(cache: &dyn RecordCache, key: &str, ttl: Duration) -> Option<ResultRecord> {
    match cache.is_fresh(key, ttl).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(key, "Cache miss");
            return None;
        }
        Err(e) => {
            warn!(key, error = %e, "Cache freshness check failed");
            return None;
        }
    }

    match cache.read(key).await {
        Ok(record) => {
            debug!(key, "Cache hit");
            Some(record)
        }
        Err(e) => {
            warn!(key, error = %e, "Discarding unreadable cache entry");
            None
        }
    }
}

/// Fetch all three fields and store the result.
async fn refresh(
    provider: &dyn SocialProvider,
    cache: &dyn RecordCache,
    config: &AggregatorConfig,
) -> Result<ResultRecord> {
    let name = provider.name();
    debug!(provider = name, max_results = config.max_results, "Refreshing");

    let (profile, statistics, posts) = tokio::join!(
        provider.fetch_profile(),
        provider.fetch_statistics(),
        provider.fetch_posts(config.max_results),
    );

    let mut complete = true;
    let profile = settle(name, "profile", profile, &mut complete)?;
    let statistics = settle(name, "statistics", statistics, &mut complete)?;
    let mut posts = settle(name, "posts", posts, &mut complete)?;
    posts.truncate(config.max_results);

    let record = ResultRecord::new(profile, statistics, posts);

    if !config.cache_enabled {
        return Ok(record);
    }
    if !complete && !config.cache_partial_results {
        debug!(provider = name, "Not caching partial record");
        return Ok(record);
    }
    if let Err(e) = cache.write(provider.cache_key(), &record).await {
        warn!(provider = name, error = %e, "Failed to cache record");
    }

    Ok(record)
}

/// Degrade a failed fetch to its empty default. Fatal errors still propagate.
fn settle<T: Default>(
    provider: &str,
    field: &str,
    result: Result<T>,
    complete: &mut bool,
) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(provider, field, error = %e, "Fetch failed, using empty default");
            *complete = false;
            Ok(T::default())
        }
    }
}
