mod news;
mod predicate;
mod repository;
mod schema;
mod types;

pub use repository::NewsRepository;
pub use schema::{Database, DatabaseOptions};
pub use types::{NewsFilter, NewsRecord, OrderBy, StorageError};
