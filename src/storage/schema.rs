use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StorageError;

// ============================================================================
// Database
// ============================================================================

/// Connection settings for [`Database::open_with`].
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Handle to the news store. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection with default pool settings and run migrations
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        Self::open_with(path, &DatabaseOptions::default()).await
    }

    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens an in-memory database held by a single connection
    /// that is never recycled, so the data lives exactly as long as the pool.
    pub async fn open_with(path: &str, options: &DatabaseOptions) -> Result<Self, StorageError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release before
        // returning SQLITE_BUSY. Concurrent ingestion loops contend on the single writer.
        let connect_options = SqliteConnectOptions::from_str(&url)?
            .pragma("busy_timeout", "5000")
            .foreign_keys(true);

        let in_memory = path == ":memory:";
        let max_connections = if in_memory {
            1
        } else {
            options.max_connections.max(1)
        };

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(options.acquire_timeout);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(connect_options).await?;

        let db = Self { pool };
        db.migrate()
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        tracing::info!(path = %path, max_connections = max_connections, "Database connection established");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Timestamps are unix seconds (UTC). link is the dedup key and must be non-empty.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                content TEXT NOT NULL,
                author TEXT NOT NULL,
                published_at INTEGER NOT NULL,
                source TEXT NOT NULL,
                link TEXT NOT NULL UNIQUE CHECK (link <> ''),
                category TEXT,
                created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER)),
                updated_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_published ON news(published_at DESC, id DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // Composite indexes for the equality filters combined with default ordering
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_category_published ON news(category, published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_author_published ON news(author, published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Release all pooled connections.
    ///
    /// Safe to call more than once; later calls only log. Any operation on
    /// a closed database fails with [`StorageError::Database`].
    pub async fn close(&self) {
        if self.pool.is_closed() {
            tracing::debug!("Database already closed");
            return;
        }
        self.pool.close().await;
        tracing::info!("Database connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
