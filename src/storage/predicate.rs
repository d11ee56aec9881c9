//! Structured WHERE clauses shared by count and result queries.
//!
//! A [`Predicate`] is built once from a [`NewsFilter`] and rendered into a
//! [`QueryBuilder`] by [`Predicate::push_where`]. Count and listing queries
//! both go through that single function, so the conditions they apply can
//! not drift apart.

use chrono::{Days, NaiveDate};
use sqlx::{QueryBuilder, Sqlite};

use super::types::NewsFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Column {
    Category,
    Author,
    PublishedAt,
}

impl Column {
    fn as_sql(self) -> &'static str {
        match self {
            Column::Category => "category",
            Column::Author => "author",
            Column::PublishedAt => "published_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Clause {
    /// `column = value`
    Eq(Column, String),
    /// Timestamp column falls on the given UTC calendar day
    DayEq(Column, NaiveDate),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub(crate) fn from_filter(filter: &NewsFilter) -> Self {
        let mut clauses = Vec::new();

        if let Some(category) = &filter.category {
            clauses.push(Clause::Eq(Column::Category, category.clone()));
        }
        if let Some(author) = &filter.author {
            clauses.push(Clause::Eq(Column::Author, author.clone()));
        }
        if let Some(date) = filter.date {
            clauses.push(Clause::DayEq(Column::PublishedAt, date));
        }

        Self { clauses }
    }

    #[cfg(test)]
    pub(crate) fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Append ` WHERE ...` (or nothing for an empty predicate) to `builder`.
    pub(crate) fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        for (idx, clause) in self.clauses.iter().enumerate() {
            builder.push(if idx == 0 { " WHERE " } else { " AND " });

            match clause {
                Clause::Eq(column, value) => {
                    builder.push(column.as_sql());
                    builder.push(" = ");
                    builder.push_bind(value.clone());
                }
                Clause::DayEq(column, day) => {
                    // Half-open range keeps idx_news_published usable
                    let (start, end) = day_bounds(*day);
                    builder.push(column.as_sql());
                    builder.push(" >= ");
                    builder.push_bind(start);
                    builder.push(" AND ");
                    builder.push(column.as_sql());
                    builder.push(" < ");
                    builder.push_bind(end);
                }
            }
        }
    }
}

/// Unix-second bounds `[start, end)` of a UTC calendar day.
fn day_bounds(day: NaiveDate) -> (i64, i64) {
    let start = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    let end = day
        .checked_add_days(Days::new(1))
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .map(|next| next.and_utc().timestamp())
        .unwrap_or(i64::MAX);
    (start.timestamp(), end)
}
