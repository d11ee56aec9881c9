use async_trait::async_trait;

use super::schema::Database;
use super::types::{NewsFilter, NewsRecord, StorageError};
use crate::feed::Feed;

/// Persistence surface consumed by ingestion and query serving.
///
/// [`Database`] is the production implementation; tests substitute their
/// own to inject failures or latency.
#[async_trait]
pub trait NewsRepository: Send + Sync {
    async fn save_news(&self, feed: &Feed) -> Result<usize, StorageError>;

    async fn get_detailed_news(&self, id: i64) -> Result<NewsRecord, StorageError>;

    async fn get_news_count(&self, filter: &NewsFilter) -> Result<i64, StorageError>;

    async fn get_news_by_filter(&self, filter: &NewsFilter)
        -> Result<Vec<NewsRecord>, StorageError>;

    /// Release held resources. Idempotent.
    async fn close(&self);
}

#[async_trait]
impl NewsRepository for Database {
    async fn save_news(&self, feed: &Feed) -> Result<usize, StorageError> {
        Database::save_news(self, feed).await
    }

    async fn get_detailed_news(&self, id: i64) -> Result<NewsRecord, StorageError> {
        Database::get_detailed_news(self, id).await
    }

    async fn get_news_count(&self, filter: &NewsFilter) -> Result<i64, StorageError> {
        Database::get_news_count(self, filter).await
    }

    async fn get_news_by_filter(
        &self,
        filter: &NewsFilter,
    ) -> Result<Vec<NewsRecord>, StorageError> {
        Database::get_news_by_filter(self, filter).await
    }

    async fn close(&self) {
        Database::close(self).await
    }
}
