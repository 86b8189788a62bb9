//! File entries and payload access

use std::io::{self, Read, Seek, SeekFrom, Write};

use super::compression::PayloadReader;
use super::error::{PackageError, PackageResult};
use super::header::FileSlot;

/// Largest size a slot can record
const MAX_SLOT_SIZE: u64 = i32::MAX as u64;

/// Descriptor of one file stored in a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Block the file belongs to
    pub block_id: usize,
    /// Position of the file inside its block
    pub file_id: usize,
    /// Absolute offset of the data header
    pub data_offset: u64,
    /// Size of the opaque data header
    pub data_header_size: u32,
    /// Stored payload size
    pub compressed_size: u32,
    /// Logical payload size
    pub decompressed_size: u32,
    /// Hash of the file name
    pub name_hash: u64,
    /// Checksum of the data header
    pub header_hash: u32,
    /// Whether the payload is zlib-compressed
    pub compressed: bool,
}

impl FileEntry {
    /// Build an entry from a raw table slot
    pub fn from_slot(block_id: usize, file_id: usize, slot: &FileSlot) -> PackageResult<Self> {
        let invalid = |reason: String| PackageError::InvalidEntry {
            block: block_id,
            file: file_id,
            reason,
        };

        let data_offset = u64::try_from(slot.data_offset)
            .map_err(|_| invalid(format!("negative data offset {}", slot.data_offset)))?;
        let data_header_size = u32::try_from(slot.data_header_size)
            .map_err(|_| invalid(format!("negative header size {}", slot.data_header_size)))?;
        let compressed_size = u32::try_from(slot.compressed_size)
            .map_err(|_| invalid(format!("negative stored size {}", slot.compressed_size)))?;
        let decompressed_size = u32::try_from(slot.decompressed_size).map_err(|_| {
            invalid(format!("negative logical size {}", slot.decompressed_size))
        })?;

        Ok(Self {
            block_id,
            file_id,
            data_offset,
            data_header_size,
            compressed_size,
            decompressed_size,
            name_hash: slot.name_hash,
            header_hash: slot.header_hash,
            compressed: slot.compressed_flag > 0,
        })
    }

    /// Raw table slot for this entry
    pub fn to_slot(&self) -> FileSlot {
        FileSlot {
            data_offset: self.data_offset as i64,
            data_header_size: self.data_header_size as i32,
            compressed_size: self.compressed_size as i32,
            decompressed_size: self.decompressed_size as i32,
            name_hash: self.name_hash,
            header_hash: self.header_hash,
            compressed_flag: i16::from(self.compressed),
        }
    }

    /// Absolute offset of the payload
    pub fn payload_offset(&self) -> u64 {
        self.data_offset + u64::from(self.data_header_size)
    }

    /// Bytes occupied by data header and stored payload
    pub fn stored_size(&self) -> u64 {
        u64::from(self.data_header_size) + u64::from(self.compressed_size)
    }

    /// Name used when no dictionary entry exists
    pub fn fallback_name(&self) -> String {
        format!("{}.{}.dat", self.block_id, self.file_id)
    }

    /// Record new payload sizes after a rewrite
    pub fn set_payload_sizes(&mut self, compressed: u64, decompressed: u64) -> PackageResult<()> {
        for size in [compressed, decompressed] {
            if size > MAX_SLOT_SIZE {
                return Err(PackageError::PayloadTooLarge {
                    block: self.block_id,
                    file: self.file_id,
                    size,
                });
            }
        }

        self.compressed_size = compressed as u32;
        self.decompressed_size = decompressed as u32;
        Ok(())
    }

    /// Read the opaque data header
    pub fn read_header<R: Read + Seek>(&self, reader: &mut R) -> PackageResult<Vec<u8>> {
        reader.seek(SeekFrom::Start(self.data_offset))?;
        let mut header = vec![0u8; self.data_header_size as usize];
        reader.read_exact(&mut header)?;
        Ok(header)
    }

    /// Open a reader over the payload
    ///
    /// Compressed payloads are inflated unless `raw` is set, in which case the
    /// stored bytes are returned as they are.
    pub fn payload_reader<'r, R: Read + Seek>(
        &self,
        reader: &'r mut R,
        raw: bool,
    ) -> PackageResult<PayloadReader<'r, R>> {
        reader.seek(SeekFrom::Start(self.payload_offset()))?;
        Ok(PayloadReader::new(
            reader,
            u64::from(self.compressed_size),
            u64::from(self.decompressed_size),
            self.compressed && !raw,
        ))
    }

    /// Read the whole payload into memory
    pub fn read_payload<R: Read + Seek>(&self, reader: &mut R, raw: bool) -> PackageResult<Vec<u8>> {
        let mut payload = Vec::with_capacity(if self.compressed && !raw {
            self.decompressed_size as usize
        } else {
            self.compressed_size as usize
        });
        self.payload_reader(reader, raw)?.read_to_end(&mut payload)?;
        Ok(payload)
    }

    /// Stream the payload into `sink`, returning the bytes copied
    pub fn copy_payload<R: Read + Seek, W: Write>(
        &self,
        reader: &mut R,
        sink: &mut W,
        raw: bool,
    ) -> PackageResult<u64> {
        let mut payload = self.payload_reader(reader, raw)?;
        Ok(io::copy(&mut payload, sink)?)
    }
}

/// Copy exactly `length` bytes between streams through `buffer`
pub(crate) fn copy_exact<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    mut length: u64,
    buffer: &mut [u8],
) -> io::Result<()> {
    while length > 0 {
        let size = buffer.len().min(usize::try_from(length).unwrap_or(usize::MAX));
        reader.read_exact(&mut buffer[..size])?;
        writer.write_all(&buffer[..size])?;
        length -= size as u64;
    }

    Ok(())
}
