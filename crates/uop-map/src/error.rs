//! Error types for map transcoding

use thiserror::Error;
use uop_formats::PackageError;

/// Map operation result type
pub type MapResult<T> = Result<T, MapError>;

/// Errors raised while reading map inputs or transcoding a map package
#[derive(Debug, Error)]
pub enum MapError {
    /// Map dimensions cannot describe a grid of 64x64 macro blocks
    #[error("invalid map dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        /// Width read from the package
        width: i32,
        /// Height read from the package
        height: i32,
        /// Detailed description
        reason: &'static str,
    },

    /// Package lacks the metadata files at the start of its first block
    #[error("missing map metadata: {reason}")]
    MissingMetadata {
        /// Detailed description
        reason: String,
    },

    /// Remap table could not be parsed
    #[error("invalid remap table: {reason}")]
    InvalidRemap {
        /// Detailed description
        reason: String,
    },

    /// Package error
    #[error("package error: {0}")]
    Package(#[from] PackageError),

    /// Binary read error
    #[error("binary format error: {0}")]
    BinRw(#[from] binrw::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
