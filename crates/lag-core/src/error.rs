//! Error types for provider, cache and aggregation operations.
//!
//! This module defines [`LagError`]. Credential and cache-directory errors are
//! fatal at construction time; the remaining variants describe a single
//! failed upstream call or sub-fetch and are recoverable by the aggregator.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching, normalizing or caching social data.
#[derive(Error, Debug)]
pub enum LagError {
    /// A required credential was neither configured nor present in the environment.
    #[error("Missing credential: {variable} is not configured or set in the environment")]
    MissingCredential {
        /// The environment variable naming the missing value.
        variable: String,
    },

    /// The cache directory does not exist or cannot be written to.
    #[error("Invalid cache directory {}: {reason}", path.display())]
    InvalidCacheDirectory {
        /// The configured directory.
        path: PathBuf,
        /// Why the directory was rejected.
        reason: String,
    },

    /// An upstream call returned no usable payload (network failure, timeout,
    /// non-success status or empty body).
    #[error("Upstream unavailable for {provider}: {reason}")]
    UpstreamUnavailable {
        /// The provider whose upstream failed.
        provider: String,
        /// What went wrong.
        reason: String,
    },

    /// A stored cache entry could not be deserialized.
    #[error("Cache entry {key} is corrupt: {reason}")]
    CacheCorrupt {
        /// The cache key that was read.
        key: String,
        /// The deserialization failure.
        reason: String,
    },

    /// An image or per-post detail sub-fetch failed.
    #[error("Media fetch failed: {0}")]
    PartialMediaFailure(String),

    /// An upstream payload could not be parsed into the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error interacting with the cache storage medium.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An invalid configuration parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl LagError {
    /// Shorthand for [`LagError::UpstreamUnavailable`].
    pub fn upstream(provider: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if this error should abort construction rather than
    /// degrade a single field.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. }
                | Self::InvalidCacheDirectory { .. }
                | Self::InvalidParameter(_)
        )
    }
}

/// Result type alias using [`LagError`].
pub type Result<T> = std::result::Result<T, LagError>;
