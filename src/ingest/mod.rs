//! Periodic feed ingestion.
//!
//! An [`Ingestor`] composes a [`FeedFetcher`](crate::feed::FeedFetcher), the
//! RSS parser and a [`NewsRepository`](crate::storage::NewsRepository).
//! [`Ingestor::spawn`] starts one independent loop per [`Source`]; a failure
//! in any stage is logged and the loop carries on after the delay chosen by
//! its [`RetryPolicy`].

mod orchestrator;
mod retry;

pub use orchestrator::{IngestError, Ingestor, Source, Stage, StageError};
pub use retry::{ExponentialBackoff, FixedInterval, RetryPolicy};
