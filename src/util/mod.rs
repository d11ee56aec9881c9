//! Shared helpers.
//!
//! - **URL validation**: scheme and host checks for configured feed sources

mod url_validator;

pub use url_validator::{validate_source_url, HostPolicy, UrlValidationError};
