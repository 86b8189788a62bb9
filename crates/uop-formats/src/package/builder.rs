//! Package construction

use std::io::{Seek, SeekFrom, Write};

use binrw::BinWrite;
use flate2::write::ZlibEncoder;
use tracing::debug;

use super::compression::rewrite_level;
use super::entry::FileEntry;
use super::error::{PackageError, PackageResult};
use super::header::{BlockHeader, FileSlot, PackageHeader};
use super::{Block, Package};

/// Format version written by default
pub const DEFAULT_VERSION: i32 = 5;

/// Vendor field written by default
pub const DEFAULT_MISC: u32 = 0xFD23_EC43;

/// First block offset written by default
pub const DEFAULT_BLOCK_OFFSET: u64 = 0x200;

/// A file to be stored by [`PackageBuilder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    /// Hash of the file name
    pub name_hash: u64,
    /// Checksum recorded for the data header
    pub header_hash: u32,
    /// Opaque bytes stored before the payload
    pub data_header: Vec<u8>,
    /// Logical payload
    pub payload: Vec<u8>,
    /// Store the payload zlib-compressed
    pub compressed: bool,
}

impl PackageFile {
    /// Uncompressed file with no data header
    pub fn new(name_hash: u64, payload: Vec<u8>) -> Self {
        Self {
            name_hash,
            header_hash: 0,
            data_header: Vec::new(),
            payload,
            compressed: false,
        }
    }

    /// Store the payload compressed
    #[must_use]
    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Set the opaque data header
    #[must_use]
    pub fn with_data_header(mut self, data_header: Vec<u8>) -> Self {
        self.data_header = data_header;
        self
    }

    /// Set the data header checksum
    #[must_use]
    pub fn with_header_hash(mut self, header_hash: u32) -> Self {
        self.header_hash = header_hash;
        self
    }
}

/// Builder for new packages
///
/// Files are laid out in order, `max_files_per_block` to a block, using the
/// same layout a rewrite produces.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    version: i32,
    misc: u32,
    block_offset: u64,
    max_files_per_block: u32,
    files: Vec<PackageFile>,
}

impl PackageBuilder {
    /// Create a builder reserving `max_files_per_block` slots per block
    pub fn new(max_files_per_block: u32) -> Self {
        Self {
            version: DEFAULT_VERSION,
            misc: DEFAULT_MISC,
            block_offset: DEFAULT_BLOCK_OFFSET,
            max_files_per_block,
            files: Vec::new(),
        }
    }

    /// Set the format version
    #[must_use]
    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Set the vendor field
    #[must_use]
    pub fn misc(mut self, misc: u32) -> Self {
        self.misc = misc;
        self
    }

    /// Set the offset of the first block
    #[must_use]
    pub fn block_offset(mut self, block_offset: u64) -> Self {
        self.block_offset = block_offset;
        self
    }

    /// Append a file
    #[must_use]
    pub fn add_file(mut self, file: PackageFile) -> Self {
        self.files.push(file);
        self
    }

    /// Write the package and return its model
    pub fn build<W: Write + Seek>(self, writer: &mut W) -> PackageResult<Package> {
        let file_count = u32::try_from(self.files.len()).map_err(|_| {
            PackageError::InvalidHeader {
                reason: format!("{} files do not fit a package", self.files.len()),
            }
        })?;
        let header = PackageHeader::new(
            self.version,
            self.misc,
            self.block_offset,
            self.max_files_per_block,
            file_count,
        )?;

        let mut package = Package::from_header(header);
        package.write_header(writer)?;

        let max = self.max_files_per_block as usize;
        let mut chunks: Vec<&[PackageFile]> = self.files.chunks(max).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }

        let block_count = chunks.len();
        let mut offset = self.block_offset;

        for (id, files) in chunks.into_iter().enumerate() {
            let mut block = Block {
                id,
                header_offset: offset,
                file_count: files.len() as u32,
                next_block_offset: 0,
            };

            writer.seek(SeekFrom::Start(block.data_offset(self.max_files_per_block)))?;
            let mut cursor = block.data_offset(self.max_files_per_block);
            let mut slots = vec![FileSlot::default(); max];

            for (file_id, file) in files.iter().enumerate() {
                let stored = if file.compressed {
                    let mut encoder = ZlibEncoder::new(Vec::new(), rewrite_level());
                    encoder.write_all(&file.payload)?;
                    encoder.finish()?
                } else {
                    file.payload.clone()
                };

                writer.write_all(&file.data_header)?;
                writer.write_all(&stored)?;

                let mut entry = FileEntry {
                    block_id: id,
                    file_id,
                    data_offset: cursor,
                    data_header_size: 0,
                    compressed_size: 0,
                    decompressed_size: 0,
                    name_hash: file.name_hash,
                    header_hash: file.header_hash,
                    compressed: file.compressed,
                };
                entry.data_header_size = u32::try_from(file.data_header.len()).map_err(|_| {
                    PackageError::PayloadTooLarge {
                        block: id,
                        file: file_id,
                        size: file.data_header.len() as u64,
                    }
                })?;
                entry.set_payload_sizes(stored.len() as u64, file.payload.len() as u64)?;

                cursor += entry.stored_size();
                slots[file_id] = entry.to_slot();
                package.entries.push(entry);
            }

            if id + 1 < block_count {
                block.next_block_offset = cursor;
            }

            writer.seek(SeekFrom::Start(block.header_offset))?;
            BlockHeader {
                file_count: block.file_count as i32,
                next_block_offset: block.next_block_offset as i64,
            }
            .write(writer)?;
            slots.write_le(writer)?;

            debug!(
                "Built block {} with {} files at {:#x}",
                id, block.file_count, block.header_offset
            );

            package.blocks.push(block);
            offset = cursor;
        }

        writer.seek(SeekFrom::Start(offset))?;
        writer.flush()?;
        package.reindex();

        Ok(package)
    }
}
