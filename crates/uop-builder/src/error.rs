//! Error types for the command-line tool.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use uop_formats::{DictionaryError, PackageError};
use uop_map::MapError;

/// Builder result type
pub type BuilderResult<T> = Result<T, BuilderError>;

/// Input a command needs before it touches anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Package file
    Package,
    /// Legacy tile grid
    Map,
    /// Legacy statics index
    Index,
    /// Legacy statics data
    Statics,
    /// Radar colour table
    Radar,
    /// Export or import directory
    Directory,
    /// Filename dictionary
    Dictionary,
    /// Remap table
    Remap,
}

impl Input {
    /// Exit code reserved for this input being missing, if any
    pub fn exit_code(self) -> Option<u8> {
        match self {
            Self::Package => Some(1),
            Self::Map | Self::Directory => Some(2),
            Self::Index => Some(3),
            Self::Statics => Some(4),
            Self::Radar => Some(5),
            Self::Dictionary | Self::Remap => None,
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Package => "package",
            Self::Map => "map",
            Self::Index => "index",
            Self::Statics => "statics",
            Self::Radar => "radar",
            Self::Directory => "directory",
            Self::Dictionary => "dictionary",
            Self::Remap => "remap table",
        };
        f.write_str(name)
    }
}

/// Errors raised by builder commands
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Required input does not exist
    #[error("Invalid {input} path: {}", path.display())]
    MissingInput {
        /// Which input is missing
        input: Input,
        /// Path that was given
        path: PathBuf,
    },

    /// Timestamp file holds something other than unix seconds
    #[error("Invalid stamp file {}: {reason}", path.display())]
    InvalidStamp {
        /// Stamp file path
        path: PathBuf,
        /// Detailed description
        reason: String,
    },

    /// Package error
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Map error
    #[error(transparent)]
    Map(#[from] MapError),

    /// Dictionary error
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuilderError {
    /// Process exit code, using `failure` for errors without a reserved code
    pub fn exit_code(&self, failure: u8) -> u8 {
        match self {
            Self::MissingInput { input, .. } => input.exit_code().unwrap_or(failure),
            _ => failure,
        }
    }
}
