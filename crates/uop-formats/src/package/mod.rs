//! MYP package container
//!
//! A package is a small header followed by a singly linked chain of blocks.
//! Every block reserves a fixed number of 34-byte file slots, then stores
//! the data of its files back to back:
//!
//! ```text
//! [header][padding] [block hdr][slot 0..max][data 0][data 1]... [block hdr]...
//!                    │                                           ▲
//!                    └──────────── next_block_offset ────────────┘
//! ```
//!
//! Each file's data is an opaque data header followed by a payload that is
//! either stored raw or zlib-compressed.
//!
//! # Reading
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use uop_formats::package::Package;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = BufReader::new(File::open("facet0.uop")?);
//! let mut package = Package::open(&mut reader)?;
//!
//! let blocks = package.blocks(&mut reader).collect::<Result<Vec<_>, _>>()?;
//! for block in blocks {
//!     let files = package.files(&mut reader, block).collect::<Result<Vec<_>, _>>()?;
//!     for file in files {
//!         let payload = file.read_payload(&mut reader, false)?;
//!         println!("{}: {} bytes", file.fallback_name(), payload.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Rewriting
//!
//! [`Package::rewrite`] streams the package into a new stream and lets a
//! [`Transform`] replace payloads on the way. See the [`rewrite`] module.

mod block;
mod builder;
pub mod compression;
mod entry;
mod error;
mod header;
pub mod rewrite;

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite};
use tracing::debug;

pub use block::Block;
pub use builder::{PackageBuilder, PackageFile};
pub use compression::{PayloadReader, PayloadSink};
pub use entry::FileEntry;
pub use error::{PackageError, PackageResult};
pub use header::{
    BLOCK_HEADER_SIZE, BlockHeader, FILE_SLOT_SIZE, FileSlot, PACKAGE_HEADER_SIZE, PACKAGE_MAGIC,
    PackageHeader,
};
pub use rewrite::{CopyAll, FileContext, FnTransform, Outcome, RewriteSummary, Transform};

/// In-memory model of a package
///
/// Blocks and entries are loaded lazily and kept in arenas, indexed by the
/// stream offset they were read from.
#[derive(Debug, Clone)]
pub struct Package {
    header: PackageHeader,
    blocks: Vec<Block>,
    // table offset -> index into `blocks`
    block_lookup: HashMap<u64, usize>,
    entries: Vec<FileEntry>,
    // (block id, slot offset) -> index into `entries`
    entry_lookup: HashMap<(usize, u64), usize>,
}

impl Package {
    /// Read and validate the package header
    pub fn open<R: Read + Seek>(reader: &mut R) -> PackageResult<Self> {
        reader.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != PACKAGE_MAGIC {
            return Err(PackageError::InvalidMagic(magic));
        }

        reader.seek(SeekFrom::Start(0))?;
        let header = PackageHeader::read(reader)?;
        header.validate()?;

        debug!(
            "Opened package v{} with {} files, {} slots per block",
            header.version, header.file_count, header.max_files_per_block
        );

        Ok(Self::from_header(header))
    }

    /// Model for a package with the given header and nothing loaded yet
    pub fn from_header(header: PackageHeader) -> Self {
        Self {
            header,
            blocks: Vec::new(),
            block_lookup: HashMap::new(),
            entries: Vec::new(),
            entry_lookup: HashMap::new(),
        }
    }

    /// Package header
    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// Format version
    pub fn version(&self) -> i32 {
        self.header.version
    }

    /// Opaque vendor field
    pub fn misc(&self) -> u32 {
        self.header.misc
    }

    /// Absolute offset of the first block header
    pub fn block_offset(&self) -> u64 {
        self.header.block_offset as u64
    }

    /// Table slots reserved in every block
    pub fn max_files_per_block(&self) -> u32 {
        self.header.max_files_per_block as u32
    }

    /// Total number of files declared by the header
    pub fn file_count(&self) -> u32 {
        self.header.file_count as u32
    }

    /// Iterate the block chain, starting at the first block
    pub fn blocks<'p, 'r, R: Read + Seek>(&'p mut self, reader: &'r mut R) -> Blocks<'p, 'r, R> {
        let first = self.block_offset();
        Blocks {
            package: self,
            reader,
            next: Some(first),
            id: 0,
            visited: HashSet::new(),
        }
    }

    /// Iterate the files of `block`
    pub fn files<'p, 'r, R: Read + Seek>(
        &'p mut self,
        reader: &'r mut R,
        block: Block,
    ) -> Files<'p, 'r, R> {
        Files {
            package: self,
            reader,
            block,
            next_file: 0,
        }
    }

    /// Entries loaded so far, in load order
    pub fn loaded_entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Blocks loaded so far, in chain order
    pub fn loaded_blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Write the package header and zero padding up to the first block
    pub fn write_header<W: Write + Seek>(&self, writer: &mut W) -> PackageResult<()> {
        writer.seek(SeekFrom::Start(0))?;
        self.header.write(writer)?;

        let padding = self.block_offset().saturating_sub(PACKAGE_HEADER_SIZE);
        std::io::copy(&mut std::io::repeat(0).take(padding), writer)?;
        Ok(())
    }

    /// Load the block whose header sits at `header_offset`
    pub(crate) fn load_block<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        header_offset: u64,
        id: usize,
    ) -> PackageResult<Block> {
        let table_offset = header_offset + BLOCK_HEADER_SIZE;
        if let Some(&index) = self.block_lookup.get(&table_offset) {
            return Ok(self.blocks[index]);
        }

        reader.seek(SeekFrom::Start(header_offset))?;
        let header = BlockHeader::read(reader)?;

        let file_count = u32::try_from(header.file_count).map_err(|_| PackageError::InvalidHeader {
            reason: format!("block {id} has negative file count {}", header.file_count),
        })?;
        let next_block_offset =
            u64::try_from(header.next_block_offset).map_err(|_| PackageError::InvalidHeader {
                reason: format!(
                    "block {id} has negative next offset {}",
                    header.next_block_offset
                ),
            })?;

        let max = self.max_files_per_block();
        if file_count > max {
            return Err(PackageError::TooManyFiles {
                block: id,
                count: file_count,
                max,
            });
        }

        let block = Block {
            id,
            header_offset,
            file_count,
            next_block_offset,
        };

        self.block_lookup.insert(table_offset, self.blocks.len());
        self.blocks.push(block);
        Ok(block)
    }

    /// Load the entry stored in slot `file_id` of `block`, returning its arena index
    pub(crate) fn load_entry<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        block: &Block,
        file_id: usize,
    ) -> PackageResult<usize> {
        let slot_offset = block.slot_offset(file_id);
        if let Some(&index) = self.entry_lookup.get(&(block.id, slot_offset)) {
            return Ok(index);
        }

        reader.seek(SeekFrom::Start(slot_offset))?;
        let slot = FileSlot::read(reader)?;
        let entry = FileEntry::from_slot(block.id, file_id, &slot)?;

        let index = self.entries.len();
        self.entry_lookup.insert((block.id, slot_offset), index);
        self.entries.push(entry);
        Ok(index)
    }

    /// Rebuild the offset lookups after blocks and entries moved
    pub(crate) fn reindex(&mut self) {
        self.block_lookup = self
            .blocks
            .iter()
            .enumerate()
            .map(|(index, block)| (block.table_offset(), index))
            .collect();

        let blocks: HashMap<usize, Block> = self.blocks.iter().map(|b| (b.id, *b)).collect();
        self.entry_lookup = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                blocks
                    .get(&entry.block_id)
                    .map(|block| ((entry.block_id, block.slot_offset(entry.file_id)), index))
            })
            .collect();
    }
}

/// Lazy iterator over the block chain
pub struct Blocks<'p, 'r, R> {
    package: &'p mut Package,
    reader: &'r mut R,
    next: Option<u64>,
    id: usize,
    visited: HashSet<u64>,
}

impl<R: Read + Seek> Iterator for Blocks<'_, '_, R> {
    type Item = PackageResult<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.take()?;

        if !self.visited.insert(offset) {
            return Some(Err(PackageError::BlockCycle { offset }));
        }

        match self.package.load_block(self.reader, offset, self.id) {
            Ok(block) => {
                self.id += 1;
                self.next = (!block.is_last()).then_some(block.next_block_offset);
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Lazy iterator over the files of one block
pub struct Files<'p, 'r, R> {
    package: &'p mut Package,
    reader: &'r mut R,
    block: Block,
    next_file: usize,
}

impl<R: Read + Seek> Iterator for Files<'_, '_, R> {
    type Item = PackageResult<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_file >= self.block.file_count as usize {
            return None;
        }

        let file_id = self.next_file;
        self.next_file += 1;

        Some(
            self.package
                .load_entry(self.reader, &self.block, file_id)
                .map(|index| self.package.entries[index].clone()),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.block.file_count as usize).saturating_sub(self.next_file);
        (remaining, Some(remaining))
    }
}
