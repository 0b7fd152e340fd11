//! No-op cache implementation.

use async_trait::async_trait;
use lag_core::{LagError, RecordCache, Result, ResultRecord};
use std::time::Duration;
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// Every entry is reported stale, reads fail and writes are discarded, so
/// each aggregator construction performs a live fetch. Used when caching is
/// disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecordCache for NoopCache {
    async fn is_fresh(&self, _key: &str, _ttl: Duration) -> Result<bool> {
        trace!("NoopCache: is_fresh called, returning false");
        Ok(false)
    }

    async fn read(&self, key: &str) -> Result<ResultRecord> {
        trace!("NoopCache: read called, returning error");
        Err(LagError::Cache(format!("caching disabled, no entry for {key}")))
    }

    async fn write(&self, _key: &str, _record: &ResultRecord) -> Result<()> {
        trace!("NoopCache: write called, doing nothing");
        Ok(())
    }

    async fn invalidate(&self, _key: &str) -> Result<()> {
        trace!("NoopCache: invalidate called, doing nothing");
        Ok(())
    }

    async fn age(&self, _key: &str) -> Result<Option<Duration>> {
        Ok(None)
    }
}
