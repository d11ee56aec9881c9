use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::pagination::ValidationError;

// ============================================================================
// Error Types
// ============================================================================

/// Storage errors.
///
/// `NotFound` is kept apart from `Database` so callers can report a missing
/// resource instead of an internal failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Single-entity lookup found no row
    #[error("News with ID {0} not found")]
    NotFound(i64),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Query or transaction failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ============================================================================
// Records
// ============================================================================

/// Internal row type for news queries (used by sqlx FromRow).
/// Converts to [`NewsRecord`] via `into_record()`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NewsDbRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub published_at: i64,
    pub source: String,
    pub link: String,
    pub category: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NewsDbRow {
    pub(crate) fn into_record(self) -> NewsRecord {
        NewsRecord {
            id: self.id,
            title: self.title,
            description: self.description,
            content: self.content,
            author: self.author,
            published_at: from_unix(self.published_at),
            source: self.source,
            link: self.link,
            category: self.category,
            created_at: from_unix(self.created_at),
            updated_at: from_unix(self.updated_at),
        }
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// A stored news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub link: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Filtering
// ============================================================================

/// Result ordering for [`NewsFilter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderBy {
    #[default]
    PublishedDesc,
    PublishedAsc,
    TitleAsc,
    TitleDesc,
}

impl OrderBy {
    /// SQL `ORDER BY` body. `id` breaks ties so pages never overlap.
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            OrderBy::PublishedDesc => "published_at DESC, id DESC",
            OrderBy::PublishedAsc => "published_at ASC, id ASC",
            OrderBy::TitleAsc => "title ASC, id ASC",
            OrderBy::TitleDesc => "title DESC, id DESC",
        }
    }
}

impl FromStr for OrderBy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "published_at desc" | "published_at" | "-published_at" | "newest" => {
                Ok(OrderBy::PublishedDesc)
            }
            "published_at asc" | "+published_at" | "oldest" => Ok(OrderBy::PublishedAsc),
            "title" | "title asc" => Ok(OrderBy::TitleAsc),
            "title desc" | "-title" => Ok(OrderBy::TitleDesc),
            other => Err(ValidationError::UnknownOrdering(other.to_string())),
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderBy::PublishedDesc => "published_at desc",
            OrderBy::PublishedAsc => "published_at asc",
            OrderBy::TitleAsc => "title asc",
            OrderBy::TitleDesc => "title desc",
        };
        f.write_str(name)
    }
}

/// Query constraints for news listing.
///
/// Every field is optional; `None` places no constraint on that dimension.
/// `limit` and `offset` only apply to result queries, never to counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsFilter {
    pub category: Option<String>,
    pub author: Option<String>,
    /// Matches the calendar day (UTC) of `published_at`
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Defaults to newest first
    pub order_by: Option<OrderBy>,
}

impl NewsFilter {
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn with_order(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }
}
