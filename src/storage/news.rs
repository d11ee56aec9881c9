use sqlx::{QueryBuilder, Sqlite};

use super::predicate::Predicate;
use super::schema::Database;
use super::types::{NewsDbRow, NewsFilter, NewsRecord, StorageError};
use crate::feed::Feed;

/// Rows per multi-row INSERT. 8 columns * 50 = 400 bind parameters, well
/// under SQLite's limit.
const BATCH_SIZE: usize = 50;

const NEWS_COLUMNS: &str = "id, title, description, content, author, published_at, \
                            source, link, category, created_at, updated_at";

impl Database {
    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Store every item of `feed` in one transaction, skipping known links.
    ///
    /// Returns the number of items *attempted*. Items whose link already
    /// exists are silently skipped by `ON CONFLICT(link) DO NOTHING`, so the
    /// value is not the number of new rows. An empty feed returns `Ok(0)`
    /// without touching the store.
    ///
    /// Any failure rolls back the whole feed: either all of its new items
    /// become visible or none do.
    pub async fn save_news(&self, feed: &Feed) -> Result<usize, StorageError> {
        if feed.items.is_empty() {
            return Ok(0);
        }

        let source = feed.source_name();
        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!(source = %source, error = %e, "Failed to start transaction");
            e
        })?;

        let mut inserted: u64 = 0;
        for chunk in feed.items.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO news (title, description, content, author, published_at, source, link, category) ",
            );

            builder.push_values(chunk, |mut b, item| {
                b.push_bind(&item.title)
                    .push_bind(&item.description)
                    // Feeds only carry a summary; it doubles as the stored content
                    .push_bind(&item.description)
                    .push_bind(item.author.as_deref().unwrap_or_default())
                    .push_bind(item.published_at.timestamp())
                    .push_bind(source)
                    .push_bind(&item.link)
                    .push_bind(item.category.as_deref());
            });
            builder.push(" ON CONFLICT(link) DO NOTHING");

            // Dropping `tx` on the error path rolls the transaction back
            let result = builder.build().execute(&mut *tx).await.map_err(|e| {
                tracing::error!(source = %source, error = %e, "Failed to execute insert batch");
                e
            })?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            tracing::error!(source = %source, error = %e, "Failed to commit transaction");
            e
        })?;

        let attempted = feed.items.len();
        tracing::info!(
            source = %source,
            items_attempted = attempted,
            items_inserted = inserted,
            "News saved"
        );

        Ok(attempted)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Fetch a single record by its surrogate key.
    ///
    /// A missing row is [`StorageError::NotFound`], never a generic failure.
    pub async fn get_detailed_news(&self, id: i64) -> Result<NewsRecord, StorageError> {
        let row = sqlx::query_as::<_, NewsDbRow>(&format!(
            "SELECT {NEWS_COLUMNS} FROM news WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into_record()),
            None => {
                tracing::warn!(news_id = id, "News not found");
                Err(StorageError::NotFound(id))
            }
        }
    }

    /// Count the records matching `filter`, ignoring its limit, offset and ordering.
    pub async fn get_news_count(&self, filter: &NewsFilter) -> Result<i64, StorageError> {
        let predicate = Predicate::from_filter(filter);
        let mut builder = count_query(&predicate);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// List the records matching `filter` in the requested order.
    ///
    /// Applies exactly the conditions [`Database::get_news_count`] applies
    /// for the same filter, plus ordering, limit and offset.
    pub async fn get_news_by_filter(
        &self,
        filter: &NewsFilter,
    ) -> Result<Vec<NewsRecord>, StorageError> {
        let predicate = Predicate::from_filter(filter);
        let mut builder = select_query(&predicate, filter);

        let rows: Vec<NewsDbRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(NewsDbRow::into_record).collect())
    }
}

fn count_query(predicate: &Predicate) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM news");
    predicate.push_where(&mut builder);
    builder
}

fn select_query(predicate: &Predicate, filter: &NewsFilter) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(format!("SELECT {NEWS_COLUMNS} FROM news"));
    predicate.push_where(&mut builder);

    builder.push(" ORDER BY ");
    builder.push(filter.order_by.unwrap_or_default().as_sql());

    let limit = filter.limit.filter(|l| *l > 0);
    let offset = filter.offset.filter(|o| *o > 0);
    match (limit, offset) {
        (Some(limit), _) => {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
        // SQLite only accepts OFFSET after a LIMIT
        (None, Some(_)) => {
            builder.push(" LIMIT -1");
        }
        (None, None) => {}
    }
    if let Some(offset) = offset {
        builder.push(" OFFSET ");
        builder.push_bind(offset);
    }

    builder
}
