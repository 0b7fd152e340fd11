//! The adapter contract every social network implements.
//!
//! A [`SocialProvider`] fetches raw upstream data and normalizes it into the
//! shared [`Profile`], [`Statistics`] and [`Post`] shapes. Its three fetch
//! operations are independent: the aggregator invokes each one and degrades
//! a failure to an empty default without affecting the others.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{Post, Profile, Statistics},
};

/// A provider-specific adapter for one upstream social network.
///
/// Credentials and identity are resolved once at construction; a missing
/// required value must fail construction with
/// [`LagError::MissingCredential`](crate::LagError::MissingCredential).
#[async_trait]
pub trait SocialProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "YouTube").
    fn name(&self) -> &str;

    /// Returns the cache key under which this provider's record is stored
    /// (e.g., `lag--youtube`).
    fn cache_key(&self) -> &str;

    /// Fetches profile information.
    ///
    /// Returns at least a display identifier. A failed picture sub-fetch
    /// omits [`Profile::picture`] rather than failing the profile.
    async fn fetch_profile(&self) -> Result<Profile>;

    /// Fetches provider-specific counters.
    ///
    /// Fails with [`LagError::UpstreamUnavailable`](crate::LagError::UpstreamUnavailable)
    /// when the upstream returns no usable payload. A payload that parses but
    /// carries no counters yields an empty [`Statistics`].
    async fn fetch_statistics(&self) -> Result<Statistics>;

    /// Fetches at most `max_results` posts, newest first.
    ///
    /// Provider-specific filters apply before the count, so fewer than
    /// `max_results` posts may be returned.
    async fn fetch_posts(&self, max_results: usize) -> Result<Vec<Post>>;
}
