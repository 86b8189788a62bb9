//! Error types for dictionary loading

use thiserror::Error;

/// Dictionary operation result type
pub type DictionaryResult<T> = Result<T, DictionaryError>;

/// Errors raised while loading a filename dictionary
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// Record cut off by the end of the stream
    #[error("dictionary truncated at offset {offset}")]
    Truncated {
        /// Offset of the incomplete record
        offset: u64,
    },

    /// Name is not valid UTF-8 or its length prefix is malformed
    #[error("invalid name for hash {hash:016x}: {reason}")]
    InvalidName {
        /// Hash the name belongs to
        hash: u64,
        /// Detailed description
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
