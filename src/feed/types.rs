use chrono::{DateTime, Utc};

/// A single entry of a parsed feed.
///
/// Only items with a parseable publication date and a non-empty link are
/// ever constructed by the parser; `link` is the deduplication key used by
/// storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub author: Option<String>,
    pub category: Option<String>,
}

/// One fetched-and-parsed syndication document.
///
/// Lives for a single ingestion cycle and is never persisted as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<Item>,
}

impl Feed {
    /// Name recorded as the `source` of every stored item.
    ///
    /// Falls back to the channel link for feeds without a title.
    pub fn source_name(&self) -> &str {
        if self.title.is_empty() {
            &self.link
        } else {
            &self.title
        }
    }
}
