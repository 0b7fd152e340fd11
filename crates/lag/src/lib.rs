#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/latestandgreatest/lag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Cache-aside aggregation of social network profiles.
//!
//! This crate re-exports the core schema and traits, the cache
//! implementations and the bundled providers, and provides the
//! [`Aggregator`] that ties one provider to one cache entry.
//!
//! # Features
//!
//! - `facebook` - Facebook page provider (Graph API)
//! - `instagram` - Instagram account provider (Graph API)
//! - `twitter` - Twitter account provider (v1.1, OAuth 1.0a)
//! - `youtube` - YouTube channel provider (Data API v3)
//! - `pinterest` - Pinterest profile provider (meta tags and RSS)

// Core types and traits
pub use lag_core::*;

// Cache implementations
pub use lag_cache::{FileCache, InMemoryCache, NoopCache};

// Providers
#[cfg(feature = "facebook")]
pub use lag_facebook::{FacebookConfig, FacebookProvider};
#[cfg(feature = "instagram")]
pub use lag_instagram::{InstagramConfig, InstagramProvider};
#[cfg(feature = "pinterest")]
pub use lag_pinterest::{PinterestConfig, PinterestProvider};
#[cfg(feature = "twitter")]
pub use lag_twitter::{TwitterConfig, TwitterProvider};
#[cfg(feature = "youtube")]
pub use lag_youtube::{YouTubeConfig, YouTubeProvider};

mod aggregator;
mod config;
pub use aggregator::{Aggregator, CacheState};
pub use config::{AggregatorConfig, DEFAULT_CACHE_DURATION};
