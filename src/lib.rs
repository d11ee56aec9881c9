//! Periodic RSS ingestion with deduplicated SQLite storage and paginated
//! news queries.
//!
//! - [`feed`] - HTTP retrieval and RSS parsing
//! - [`storage`] - SQLite persistence keyed on item link
//! - [`pagination`] - Page arithmetic with short-page correction
//! - [`ingest`] - Per-source polling loops
//! - [`query`] - Deadline-bounded listing and lookup
//! - [`config`] - TOML configuration with environment overrides

pub mod config;
pub mod feed;
pub mod ingest;
pub mod pagination;
pub mod query;
pub mod storage;
pub mod util;
