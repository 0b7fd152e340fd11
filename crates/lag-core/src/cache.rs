//! Cache trait for storing one normalized record per provider.
//!
//! This module defines the [`RecordCache`] trait: a durable, TTL-gated
//! key to [`ResultRecord`] store. Freshness is derived from when an entry was
//! last written, never from a timestamp stored inside the record.

use async_trait::async_trait;
use std::time::Duration;

use crate::{error::Result, types::ResultRecord};

/// Trait for caching normalized provider records.
///
/// Implementations can store data in various backends (files, memory, etc.)
/// to avoid repeated upstream calls within the TTL window.
#[async_trait]
pub trait RecordCache: Send + Sync + std::fmt::Debug {
    /// Reports whether the entry for `key` is within `ttl`.
    ///
    /// Fails closed: a missing entry is replaced by an empty placeholder and
    /// reported stale, as is an entry that has never been populated.
    async fn is_fresh(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Reads the stored record.
    ///
    /// Fails with [`LagError::CacheCorrupt`](crate::LagError::CacheCorrupt)
    /// if the stored content does not deserialize.
    async fn read(&self, key: &str) -> Result<ResultRecord>;

    /// Stores a record, replacing any previous entry.
    ///
    /// A concurrent reader never observes a partially written entry.
    async fn write(&self, key: &str, record: &ResultRecord) -> Result<()>;

    /// Removes the entry if present. Idempotent.
    async fn invalidate(&self, key: &str) -> Result<()>;

    /// Returns how long ago the entry was last written, or `None` if there
    /// is no populated entry.
    async fn age(&self, key: &str) -> Result<Option<Duration>>;
}

/// Returns `true` if an entry of the given age is still fresh.
///
/// The bound is inclusive: an entry exactly `ttl` old is fresh.
#[must_use]
pub fn is_within_ttl(age: Duration, ttl: Duration) -> bool {
    age <= ttl
}
