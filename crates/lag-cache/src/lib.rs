#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/latestandgreatest/lag/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Record cache implementations for social profile providers.
//!
//! This crate provides implementations of the [`RecordCache`] trait from `lag-core`:
//!
//! - [`FileCache`] - Persistent one-file-per-provider cache (default)
//! - [`InMemoryCache`] - Simple in-memory cache for testing
//! - [`NoopCache`] - No-op cache used when caching is disabled

/// File-based cache implementation.
pub mod file;
/// In-memory cache implementation.
pub mod memory;
/// No-op cache implementation.
pub mod noop;

// Re-export the trait for convenience
pub use lag_core::RecordCache;

// Re-export implementations
pub use file::FileCache;
pub use memory::InMemoryCache;
pub use noop::NoopCache;
