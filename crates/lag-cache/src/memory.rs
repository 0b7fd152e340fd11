//! In-memory cache implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lag_core::{LagError, RecordCache, Result, ResultRecord, is_within_ttl};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache entry with the time it was last written.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Serialized record; empty for a placeholder.
    data: String,
    cached_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(data: String) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Simple in-memory cache for testing and development.
///
/// Records are stored serialized, so reads exercise the same
/// deserialization path as the file cache. Data is lost when the cache is
/// dropped.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw entry content with an explicit write time.
    ///
    /// Lets callers seed stale or corrupt entries.
    pub async fn insert_raw(&self, key: &str, data: impl Into<String>, cached_at: DateTime<Utc>) {
        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                data: data.into(),
                cached_at,
            },
        );
    }

    /// Number of entries, placeholders included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl RecordCache for InMemoryCache {
    #[instrument(skip(self))]
    async fn is_fresh(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.data.is_empty() => Ok(false),
            Some(entry) => {
                let fresh = is_within_ttl(entry.age(), ttl);
                debug!(fresh, "Checked cache entry freshness");
                Ok(fresh)
            }
            None => {
                entries.insert(key.to_string(), CacheEntry::new(String::new()));
                debug!("Created placeholder cache entry");
                Ok(false)
            }
        }
    }

    #[instrument(skip(self))]
    async fn read(&self, key: &str) -> Result<ResultRecord> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(key)
            .ok_or_else(|| LagError::Cache(format!("no entry for {key}")))?;

        serde_json::from_str(&entry.data).map_err(|e| LagError::CacheCorrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    #[instrument(skip(self, record))]
    async fn write(&self, key: &str, record: &ResultRecord) -> Result<()> {
        let data = serde_json::to_string(record).map_err(|e| LagError::Cache(e.to_string()))?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry::new(data));
        debug!("Cached record");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate(&self, key: &str) -> Result<()> {
        if self.entries.write().await.remove(key).is_some() {
            debug!("Removed cache entry");
        }
        Ok(())
    }

    async fn age(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|entry| !entry.data.is_empty())
            .map(CacheEntry::age))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use lag_core::{Profile, Statistics};

    const TTL: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = InMemoryCache::new();

        // Initially stale, and a placeholder now exists
        assert!(!cache.is_fresh("lag--test", TTL).await.unwrap());
        assert_eq!(cache.len().await, 1);
        assert!(!cache.is_fresh("lag--test", TTL).await.unwrap());

        let record = ResultRecord::new(
            Profile::new("someone"),
            Statistics::new().with("followers", 5),
            Vec::new(),
        );
        cache.write("lag--test", &record).await.unwrap();

        assert!(cache.is_fresh("lag--test", TTL).await.unwrap());
        assert_eq!(cache.read("lag--test").await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_memory_cache_freshness_boundary() {
        let cache = InMemoryCache::new();
        let data = serde_json::to_string(&ResultRecord::default()).unwrap();

        cache
            .insert_raw("lag--test", data.clone(), Utc::now() - TimeDelta::seconds(3599))
            .await;
        assert!(cache.is_fresh("lag--test", TTL).await.unwrap());

        cache
            .insert_raw("lag--test", data, Utc::now() - TimeDelta::seconds(3601))
            .await;
        assert!(!cache.is_fresh("lag--test", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_cache_corrupt_entry() {
        let cache = InMemoryCache::new();
        cache.insert_raw("lag--test", "[1, 2", Utc::now()).await;

        assert!(matches!(
            cache.read("lag--test").await,
            Err(LagError::CacheCorrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_cache_invalidate() {
        let cache = InMemoryCache::new();
        cache
            .write("lag--test", &ResultRecord::default())
            .await
            .unwrap();

        cache.invalidate("lag--test").await.unwrap();
        cache.invalidate("lag--test").await.unwrap();

        assert!(cache.is_empty().await);
        assert!(cache.age("lag--test").await.unwrap().is_none());
    }
}
