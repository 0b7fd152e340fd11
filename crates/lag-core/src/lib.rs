#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/latestandgreatest/lag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for social profile providers.
//!
//! This crate provides the foundational abstractions shared by every provider:
//!
//! - [`SocialProvider`](provider::SocialProvider) - Adapter contract for one network
//! - [`RecordCache`](cache::RecordCache) - TTL-gated record storage
//! - [`ResultRecord`](types::ResultRecord) - The normalized `{profile, statistics, latest}` record
//! - [`CredentialSource`](credentials::CredentialSource) - Explicit-or-environment secrets
//! - [`HttpClient`](http::HttpClient) - Timeout-bound HTTP with uniform error mapping

/// Cache trait for storing normalized records.
pub mod cache;
/// Credential lookup and resolution.
pub mod credentials;
/// Error types for provider and cache operations.
pub mod error;
/// Shared HTTP client.
pub mod http;
/// Profile picture embedding.
pub mod picture;
/// Provider adapter trait.
pub mod provider;
/// Normalized schema types.
pub mod types;

/// Local mock HTTP server for provider tests.
#[cfg(any(feature = "test-util", test))]
pub mod testing;

// Re-export commonly used items at crate root
pub use cache::{RecordCache, is_within_ttl};
pub use credentials::{CredentialSource, Environment};
pub use error::{LagError, Result};
pub use http::HttpClient;
pub use provider::SocialProvider;
pub use types::{Media, Picture, Post, Profile, ResultRecord, Statistics};
