//! Error types for package operations

use thiserror::Error;

/// Package operation result type
pub type PackageResult<T> = Result<T, PackageError>;

/// Errors raised while reading, building or rewriting a package
#[derive(Debug, Error)]
pub enum PackageError {
    /// Stream does not start with the package signature
    #[error("invalid package magic: expected [4D 59 50 00], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Header field out of range
    #[error("invalid package header: {reason}")]
    InvalidHeader {
        /// Detailed description of the invalid field
        reason: String,
    },

    /// File table slot holds values that cannot describe a file
    #[error("invalid file entry {block}.{file}: {reason}")]
    InvalidEntry {
        /// Block id of the entry
        block: usize,
        /// File id within the block
        file: usize,
        /// Detailed description of the invalid field
        reason: String,
    },

    /// Block chain points back at a block header already visited
    #[error("block chain loops back to offset {offset:#x}")]
    BlockCycle {
        /// Offset of the block header visited twice
        offset: u64,
    },

    /// Block declares more files than the table slot budget allows
    #[error("block {block} declares {count} files but only {max} slots are reserved")]
    TooManyFiles {
        /// Block id
        block: usize,
        /// File count read from the block header
        count: u32,
        /// Slots reserved per block
        max: u32,
    },

    /// Payload does not fit the 32-bit size fields of a file slot
    #[error("payload of file {block}.{file} is {size} bytes, which exceeds the slot limit")]
    PayloadTooLarge {
        /// Block id
        block: usize,
        /// File id within the block
        file: usize,
        /// Offending size
        size: u64,
    },

    /// Transform wrote bytes into the sink and then declined the file
    #[error("transform declined file {block}.{file} after writing {written} bytes")]
    DeclinedAfterWrite {
        /// Block id
        block: usize,
        /// File id within the block
        file: usize,
        /// Bytes already accepted by the sink
        written: u64,
    },

    /// Transform reported a different byte count than it wrote
    #[error("transform reported {reported} bytes for file {block}.{file} but wrote {written}")]
    ReplacedSizeMismatch {
        /// Block id
        block: usize,
        /// File id within the block
        file: usize,
        /// Byte count carried by the outcome
        reported: u64,
        /// Bytes actually accepted by the sink
        written: u64,
    },

    /// Transform failed while producing a payload
    #[error("transform failed on file {block}.{file}: {source}")]
    Transform {
        /// Block id
        block: usize,
        /// File id within the block
        file: usize,
        /// Error raised by the transform
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Binary read/write error
    #[error("binary format error: {0}")]
    BinRw(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackageError {
    /// Check if this error means the stream is not a well-formed package
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic(_)
                | Self::InvalidHeader { .. }
                | Self::InvalidEntry { .. }
                | Self::BlockCycle { .. }
                | Self::TooManyFiles { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PackageError::InvalidMagic(*b"BLTE");
        assert_eq!(
            err.to_string(),
            "invalid package magic: expected [4D 59 50 00], got [42, 4C, 54, 45]"
        );

        let err = PackageError::DeclinedAfterWrite {
            block: 1,
            file: 7,
            written: 12,
        };
        assert_eq!(
            err.to_string(),
            "transform declined file 1.7 after writing 12 bytes"
        );
    }

    #[test]
    fn test_format_classification() {
        assert!(PackageError::BlockCycle { offset: 0x200 }.is_format_error());
        assert!(!PackageError::Io(std::io::Error::other("disk")).is_format_error());
    }
}
