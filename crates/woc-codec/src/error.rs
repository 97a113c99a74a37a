//! Error types for the codec crate.

/// Errors produced while decoding archive values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The frame header or the compressed payload is corrupted.
    #[error("corrupt data: {0}")]
    CorruptData(String),
}

/// Convenience alias for codec results.
pub type CodecResult<T> = Result<T, CodecError>;
