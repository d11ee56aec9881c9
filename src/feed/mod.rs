//! Feed retrieval and RSS parsing.
//!
//! - [`fetcher`] - Single-attempt HTTP retrieval behind the [`FeedFetcher`] trait
//! - [`parser`] - RSS 2.0 decoding with per-item date tolerance
//!
//! # Example
//!
//! ```ignore
//! use newsservice::feed::{parse_feed, FeedFetcher, HttpFetcher};
//!
//! let bytes = fetcher.fetch("https://example.com/rss").await?;
//! let feed = parse_feed(&bytes)?;
//! ```

mod fetcher;
mod parser;
mod types;

pub use fetcher::{
    FeedFetcher, FetchError, HttpFetcher, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FEED_SIZE,
};
pub use parser::{parse_channel, parse_feed, parse_pub_date, ParseError, ParsedChannel};
pub use types::{Feed, Item};
