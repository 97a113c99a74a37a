use std::path::PathBuf;

use crate::config::Category;

/// Errors from shard store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An essential lookup found nothing under the key.
    #[error("object not found in {category}: {key}")]
    ObjectNotFound { category: Category, key: String },

    /// The configuration has no layout for the requested category.
    #[error("category {0} is not configured")]
    UnconfiguredCategory(Category),

    /// A hash-table or sequential index file is malformed.
    #[error("corrupt table {}: {reason}", path.display())]
    CorruptTable { path: PathBuf, reason: String },

    /// The archive configuration is invalid or cannot be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error from the underlying files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn not_found(category: Category, key: &[u8]) -> Self {
        Self::ObjectNotFound {
            category,
            key: display_key(key),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptTable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Binary object keys render as hex, identifier keys as text.
fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => hex::encode(key),
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
