//! Fixed-size package structures
//!
//! All multi-byte fields are little-endian.
//!
//! ```text
//! Package header (28 bytes, then zero padding up to block_offset)
//! +--------------------+---------+
//! | magic "MYP\0"      | 4 bytes |
//! | version            | i32     |
//! | misc               | u32     |
//! | block_offset       | i64     |
//! | max_files_per_block| i32     |
//! | file_count         | i32     |
//! +--------------------+---------+
//!
//! Block header (12 bytes)          File slot (34 bytes)
//! +-------------------+-----+      +------------------+-----+
//! | file_count        | i32 |      | data_offset      | i64 |
//! | next_block_offset | i64 |      | data_header_size | i32 |
//! +-------------------+-----+      | compressed_size  | i32 |
//!                                  | decompressed_size| i32 |
//!                                  | name_hash        | u64 |
//!                                  | header_hash      | u32 |
//!                                  | compressed_flag  | i16 |
//!                                  +------------------+-----+
//! ```

use binrw::{BinRead, BinWrite};

use super::error::{PackageError, PackageResult};

/// Signature at the start of every package
pub const PACKAGE_MAGIC: [u8; 4] = *b"MYP\0";

/// Size of the fixed package header in bytes
pub const PACKAGE_HEADER_SIZE: u64 = 28;

/// Size of a block header in bytes
pub const BLOCK_HEADER_SIZE: u64 = 12;

/// Size of one file table slot in bytes
pub const FILE_SLOT_SIZE: u64 = 34;

/// Package header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct PackageHeader {
    /// Signature, `MYP\0` for valid packages
    pub magic: [u8; 4],
    /// Format version
    pub version: i32,
    /// Opaque vendor field, carried through unchanged
    pub misc: u32,
    /// Absolute offset of the first block header
    pub block_offset: i64,
    /// Table slots reserved in every block
    pub max_files_per_block: i32,
    /// Total number of files across all blocks
    pub file_count: i32,
}

impl PackageHeader {
    /// Create a header with the package signature
    pub fn new(
        version: i32,
        misc: u32,
        block_offset: u64,
        max_files_per_block: u32,
        file_count: u32,
    ) -> PackageResult<Self> {
        let header = Self {
            magic: PACKAGE_MAGIC,
            version,
            misc,
            block_offset: i64::try_from(block_offset).map_err(|_| PackageError::InvalidHeader {
                reason: format!("block offset {block_offset} out of range"),
            })?,
            max_files_per_block: i32::try_from(max_files_per_block).map_err(|_| {
                PackageError::InvalidHeader {
                    reason: format!("{max_files_per_block} slots per block out of range"),
                }
            })?,
            file_count: i32::try_from(file_count).map_err(|_| PackageError::InvalidHeader {
                reason: format!("file count {file_count} out of range"),
            })?,
        };

        header.validate()?;
        Ok(header)
    }

    /// Validate signature and field ranges
    pub fn validate(&self) -> PackageResult<()> {
        if self.magic != PACKAGE_MAGIC {
            return Err(PackageError::InvalidMagic(self.magic));
        }

        if self.block_offset < PACKAGE_HEADER_SIZE as i64 {
            return Err(PackageError::InvalidHeader {
                reason: format!(
                    "block offset {} overlaps the {PACKAGE_HEADER_SIZE}-byte header",
                    self.block_offset
                ),
            });
        }

        if self.max_files_per_block <= 0 {
            return Err(PackageError::InvalidHeader {
                reason: format!("{} slots per block", self.max_files_per_block),
            });
        }

        if self.file_count < 0 {
            return Err(PackageError::InvalidHeader {
                reason: format!("negative file count {}", self.file_count),
            });
        }

        Ok(())
    }
}

/// Header at the start of every block
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct BlockHeader {
    /// Files stored in this block
    pub file_count: i32,
    /// Absolute offset of the next block header, 0 for the last block
    pub next_block_offset: i64,
}

/// Raw file table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct FileSlot {
    /// Absolute offset of the data header
    pub data_offset: i64,
    /// Size of the opaque data header preceding the payload
    pub data_header_size: i32,
    /// Stored payload size
    pub compressed_size: i32,
    /// Logical payload size
    pub decompressed_size: i32,
    /// Hash of the file name
    pub name_hash: u64,
    /// Checksum of the data header
    pub header_hash: u32,
    /// Positive when the payload is zlib-compressed
    pub compressed_flag: i16,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::BinWriterExt;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = PackageHeader::new(5, 0xFD23_EC43, 0x200, 100, 3).unwrap();

        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&header).unwrap();
        let bytes = cursor.into_inner();

        assert_eq!(bytes.len() as u64, PACKAGE_HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"MYP\0");
        assert_eq!(&bytes[12..20], &0x200i64.to_le_bytes());

        let parsed = PackageHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_slot_layout() {
        let slot = FileSlot {
            data_offset: 0x1234,
            data_header_size: 12,
            compressed_size: 100,
            decompressed_size: 200,
            name_hash: 0xDEAD_BEEF_0000_0001,
            header_hash: 7,
            compressed_flag: 1,
        };

        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&slot).unwrap();
        let bytes = cursor.into_inner();

        assert_eq!(bytes.len() as u64, FILE_SLOT_SIZE);
        assert_eq!(&bytes[32..34], &1i16.to_le_bytes());
    }

    #[test]
    fn test_header_validation() {
        let mut header = PackageHeader::new(5, 0, 0x200, 100, 0).unwrap();
        header.block_offset = 8;
        assert!(header.validate().is_err());

        header.block_offset = 0x200;
        header.max_files_per_block = 0;
        assert!(header.validate().is_err());

        header.max_files_per_block = 100;
        header.magic = *b"BLTE";
        assert!(matches!(
            header.validate(),
            Err(PackageError::InvalidMagic(_))
        ));
    }
}
