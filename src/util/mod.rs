//! Shared utilities: URL validation and base-relative resolution.

mod url;

pub use url::{resolve_entry_url, validate_url, UrlValidationError};
