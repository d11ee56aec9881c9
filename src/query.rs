//! Read path for stored news.
//!
//! [`NewsQueryService`] runs the count and result queries with the same
//! filter, hands both to [`PageResult`], and bounds every call with a
//! deadline so a stalled store cannot hold a caller forever.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::pagination::{PageResult, ValidationError, DEFAULT_PER_PAGE};
use crate::storage::{NewsFilter, NewsRecord, NewsRepository, StorageError};

/// Default bound on a single query call.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("News item {0} not found")]
    NotFound(i64),

    #[error("Invalid query: {0}")]
    Validation(#[from] ValidationError),

    #[error("Query did not complete within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for QueryError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => QueryError::NotFound(id),
            other => QueryError::Storage(other),
        }
    }
}

#[derive(Clone)]
pub struct NewsQueryService {
    repository: Arc<dyn NewsRepository>,
    deadline: Duration,
    per_page: i64,
}

impl NewsQueryService {
    pub fn new(repository: Arc<dyn NewsRepository>) -> Self {
        Self {
            repository,
            deadline: DEFAULT_QUERY_TIMEOUT,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Page size and deadline taken from `per_page` and `query_timeout_secs`.
    pub fn from_config(repository: Arc<dyn NewsRepository>, config: &Config) -> Self {
        Self::new(repository)
            .with_per_page(config.per_page)
            .with_deadline(config.query_timeout())
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_per_page(mut self, per_page: i64) -> Self {
        self.per_page = per_page;
        self
    }

    /// Fetch one page of news matching `filter`.
    ///
    /// `page` is 1-based and clamped into range. Any `limit`/`offset` on
    /// `filter` is replaced by the page window. Count and results share a
    /// single deadline.
    pub async fn list_news(
        &self,
        filter: &NewsFilter,
        page: i64,
    ) -> Result<PageResult<NewsRecord>, QueryError> {
        if self.per_page < 1 {
            return Err(ValidationError::InvalidPerPage(self.per_page).into());
        }

        self.with_deadline_bound(async {
            let total = self.repository.get_news_count(filter).await?;
            let mut result = PageResult::new(total, page, self.per_page);
            result.validate()?;

            let window = filter.clone().with_page(result.per_page, result.offset());
            let records = self.repository.get_news_by_filter(&window).await?;
            result.set_results(records);

            tracing::debug!(
                total = result.total_results,
                page = result.current_page,
                returned = result.results.len(),
                "Listed news page"
            );
            Ok::<_, QueryError>(result)
        })
        .await
    }

    pub async fn get_detailed_news(&self, id: i64) -> Result<NewsRecord, QueryError> {
        self.with_deadline_bound(async {
            self.repository
                .get_detailed_news(id)
                .await
                .map_err(QueryError::from)
        })
        .await
    }

    async fn with_deadline_bound<T, F>(&self, query: F) -> Result<T, QueryError>
    where
        F: Future<Output = Result<T, QueryError>>,
    {
        match tokio::time::timeout(self.deadline, query).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(deadline_ms = self.deadline.as_millis() as u64, "Query deadline exceeded");
                Err(QueryError::DeadlineExceeded(self.deadline))
            }
        }
    }
}
