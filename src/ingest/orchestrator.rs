use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::retry::{FixedInterval, RetryPolicy};
use crate::feed::{parse_feed, FeedFetcher, FetchError, ParseError};
use crate::storage::{NewsRepository, StorageError};

// ============================================================================
// Types
// ============================================================================

/// A configured feed to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Pipeline step an ingestion cycle failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Parse,
    Store,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Store => "store",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StorageError),
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Fetch(_) => Stage::Fetch,
            StageError::Parse(_) => Stage::Parse,
            StageError::Store(_) => Stage::Store,
        }
    }
}

/// One failed ingestion cycle, tagged with the source it ran for.
#[derive(Debug, Error)]
#[error("{} stage failed for source '{source_name}': {error}", .error.stage())]
pub struct IngestError {
    pub source_name: String,
    #[source]
    pub error: StageError,
}

impl IngestError {
    fn new(source: &Source, error: impl Into<StageError>) -> Self {
        Self {
            source_name: source.name.clone(),
            error: error.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.error.stage()
    }
}

// ============================================================================
// Ingestor
// ============================================================================

/// Runs fetch → parse → save for each configured source.
///
/// Cloning is cheap; every spawned loop gets its own clone and keeps its
/// failure count locally.
#[derive(Clone)]
pub struct Ingestor {
    fetcher: Arc<dyn FeedFetcher>,
    repository: Arc<dyn NewsRepository>,
    policy: Arc<dyn RetryPolicy>,
}

impl Ingestor {
    /// Create an ingestor that waits `interval` between cycles.
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        repository: Arc<dyn NewsRepository>,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            repository,
            policy: Arc::new(FixedInterval(interval)),
        }
    }

    pub fn with_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Run a single cycle for `source`.
    ///
    /// Returns the number of items handed to the repository.
    pub async fn process_source(&self, source: &Source) -> Result<usize, IngestError> {
        let body = self
            .fetcher
            .fetch(&source.url)
            .await
            .map_err(|e| IngestError::new(source, e))?;
        self.parse_and_store(source, &body).await
    }

    async fn parse_and_store(&self, source: &Source, body: &[u8]) -> Result<usize, IngestError> {
        let feed = parse_feed(body).map_err(|e| IngestError::new(source, e))?;
        self.repository
            .save_news(&feed)
            .await
            .map_err(|e| IngestError::new(source, e))
    }

    /// Run one cycle for every source concurrently.
    ///
    /// Results come back in the order of `sources`; failures are logged.
    pub async fn run_once(&self, sources: &[Source]) -> Vec<Result<usize, IngestError>> {
        let cycles = sources.iter().map(|source| async move {
            let result = self.process_source(source).await;
            log_cycle(source, &result);
            result
        });
        futures::future::join_all(cycles).await
    }

    /// Start one polling loop per source.
    ///
    /// Each loop runs until `shutdown` turns `true` or its sender is
    /// dropped. Shutdown is observed while fetching and while waiting
    /// between cycles, never during a save.
    pub fn spawn(
        &self,
        sources: Vec<Source>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        sources
            .into_iter()
            .map(|source| {
                let ingestor = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { ingestor.poll_source(source, shutdown).await })
            })
            .collect()
    }

    async fn poll_source(self, source: Source, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(source = %source.name, url = %source.url, "Starting ingestion loop");
        let mut consecutive_failures: u32 = 0;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                fetched = self.fetcher.fetch(&source.url) => fetched,
            };

            let result = match fetched {
                Ok(body) => self.parse_and_store(&source, &body).await,
                Err(e) => Err(IngestError::new(&source, e)),
            };
            log_cycle(&source, &result);

            consecutive_failures = match result {
                Ok(_) => 0,
                Err(_) => consecutive_failures.saturating_add(1),
            };

            let delay = self.policy.next_delay(consecutive_failures);
            tracing::debug!(source = %source.name, delay_ms = delay.as_millis() as u64, "Waiting for next cycle");

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(source = %source.name, "Ingestion loop stopped");
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn log_cycle(source: &Source, result: &Result<usize, IngestError>) {
    match result {
        Ok(count) => {
            tracing::info!(source = %source.name, items = count, "Ingestion cycle complete")
        }
        Err(e) => tracing::warn!(
            source = %source.name,
            stage = e.stage().as_str(),
            error = %e.error,
            "Ingestion cycle failed"
        ),
    }
}
