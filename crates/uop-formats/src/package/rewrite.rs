//! Streaming package rewrite
//!
//! [`Package::rewrite`] copies a package into a fresh stream block by block.
//! For every file a [`Transform`] decides whether the payload is copied
//! verbatim or replaced by bytes it writes into a sink. Replaced payloads
//! keep the entry's compression mode; compressed files are deflated on the
//! fly at [`rewrite_level`](super::compression::rewrite_level).
//!
//! Offsets in the output are recomputed as data is written, so each block is
//! laid out as header, reserved table and data with the next block starting
//! right after the last byte of data.

use std::convert::Infallible;
use std::error::Error;
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;

use binrw::BinWrite;
use tracing::{debug, info};

use super::compression::{COPY_BUFFER_SIZE, PayloadSink};
use super::entry::{FileEntry, copy_exact};
use super::error::{PackageError, PackageResult};
use super::header::{BlockHeader, FileSlot};
use super::{Block, Package};

/// What a transform did with a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was written; the stored bytes are copied unchanged
    Copied,
    /// A new payload of this many logical bytes was written to the sink
    Replaced(u64),
}

/// File handed to a transform
#[derive(Debug, Clone, Copy)]
pub struct FileContext<'a> {
    /// Block id
    pub block_id: usize,
    /// File id within the block
    pub file_id: usize,
    /// Entry as stored in the source package
    pub entry: &'a FileEntry,
}

/// Per-file payload transformation
///
/// A transform either writes a complete replacement payload into the sink and
/// returns [`Outcome::Replaced`] with the number of bytes written, or writes
/// nothing and returns [`Outcome::Copied`]. Declining after writing is an
/// error.
pub trait Transform {
    /// Error raised by the transform
    type Error: Error + Send + Sync + 'static;

    /// Produce the payload for one file
    fn apply(&mut self, sink: &mut dyn Write, file: FileContext<'_>)
    -> Result<Outcome, Self::Error>;
}

impl<T: Transform + ?Sized> Transform for &mut T {
    type Error = T::Error;

    fn apply(
        &mut self,
        sink: &mut dyn Write,
        file: FileContext<'_>,
    ) -> Result<Outcome, Self::Error> {
        (**self).apply(sink, file)
    }
}

/// Transform that keeps every file
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyAll;

impl Transform for CopyAll {
    type Error = Infallible;

    fn apply(&mut self, _: &mut dyn Write, _: FileContext<'_>) -> Result<Outcome, Infallible> {
        Ok(Outcome::Copied)
    }
}

/// Transform backed by a closure, see [`from_fn`]
pub struct FnTransform<F, E> {
    f: F,
    _error: PhantomData<fn() -> E>,
}

/// Build a transform from a closure
pub fn from_fn<F, E>(f: F) -> FnTransform<F, E>
where
    F: FnMut(&mut dyn Write, FileContext<'_>) -> Result<Outcome, E>,
    E: Error + Send + Sync + 'static,
{
    FnTransform {
        f,
        _error: PhantomData,
    }
}

impl<F, E> Transform for FnTransform<F, E>
where
    F: FnMut(&mut dyn Write, FileContext<'_>) -> Result<Outcome, E>,
    E: Error + Send + Sync + 'static,
{
    type Error = E;

    fn apply(&mut self, sink: &mut dyn Write, file: FileContext<'_>) -> Result<Outcome, E> {
        (self.f)(sink, file)
    }
}

/// Totals of a completed rewrite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Blocks written
    pub blocks: usize,
    /// Files written
    pub files: usize,
    /// Files whose payload was replaced
    pub replaced: usize,
    /// Total length of the output stream
    pub bytes_written: u64,
}

impl Package {
    /// Rewrite the package from `reader` into `writer`
    ///
    /// `writer` should be empty; the output is written from offset 0 and the
    /// stream is left positioned at its end. On success the in-memory model
    /// describes the new stream.
    pub fn rewrite<R, W, T>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
        mut transform: T,
    ) -> PackageResult<RewriteSummary>
    where
        R: Read + Seek,
        W: Write + Seek,
        T: Transform,
    {
        let chain = self.blocks(reader).collect::<PackageResult<Vec<_>>>()?;
        info!("Rewriting package with {} blocks", chain.len());

        self.write_header(writer)?;

        let mut summary = RewriteSummary::default();
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut block_offset = self.block_offset();

        for block in chain {
            let end = self.rewrite_block(
                reader,
                writer,
                &mut transform,
                block,
                block_offset,
                &mut buffer,
                &mut summary,
            )?;
            summary.blocks += 1;
            block_offset = end;
        }

        writer.seek(SeekFrom::Start(block_offset))?;
        writer.flush()?;
        summary.bytes_written = block_offset;

        self.reindex();

        info!(
            "Rewrote {} files in {} blocks ({} replaced), {} bytes",
            summary.files, summary.blocks, summary.replaced, summary.bytes_written
        );
        Ok(summary)
    }

    /// Write one block at `new_offset` and return the offset right after its data
    #[allow(clippy::too_many_arguments)]
    fn rewrite_block<R, W, T>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
        transform: &mut T,
        block: Block,
        new_offset: u64,
        buffer: &mut [u8],
        summary: &mut RewriteSummary,
    ) -> PackageResult<u64>
    where
        R: Read + Seek,
        W: Write + Seek,
        T: Transform,
    {
        let max_files = self.max_files_per_block();
        let handles = (0..block.file_count as usize)
            .map(|file_id| self.load_entry(reader, &block, file_id))
            .collect::<PackageResult<Vec<_>>>()?;

        debug!(
            "Block {}: {} files, {:#x} -> {:#x}",
            block.id, block.file_count, block.header_offset, new_offset
        );

        let mut moved = Block {
            header_offset: new_offset,
            ..block
        };

        // Placeholder next pointer, patched once the data end is known
        writer.seek(SeekFrom::Start(new_offset))?;
        BlockHeader {
            file_count: block.file_count as i32,
            next_block_offset: 0,
        }
        .write(writer)?;

        let empty = FileSlot::default();
        for _ in 0..max_files {
            empty.write(writer)?;
        }

        let mut cursor = moved.data_offset(max_files);

        for handle in handles {
            let mut entry = self.entries[handle].clone();
            let replaced =
                rewrite_file(reader, writer, transform, &mut entry, cursor, buffer)?;

            writer.seek(SeekFrom::Start(moved.slot_offset(entry.file_id)))?;
            entry.to_slot().write(writer)?;

            cursor = entry.data_offset + entry.stored_size();
            summary.files += 1;
            if replaced {
                summary.replaced += 1;
            }
            self.entries[handle] = entry;
        }

        moved.next_block_offset = if block.is_last() { 0 } else { cursor };
        writer.seek(SeekFrom::Start(new_offset + 4))?;
        (moved.next_block_offset as i64).write_le(writer)?;

        if let Some(slot) = self
            .blocks
            .iter_mut()
            .find(|b| b.id == block.id && b.header_offset == block.header_offset)
        {
            *slot = moved;
        }

        Ok(cursor)
    }
}

/// Write the data of one file at `offset`, updating `entry` to the new layout
///
/// Returns whether the payload was replaced.
fn rewrite_file<R, W, T>(
    reader: &mut R,
    writer: &mut W,
    transform: &mut T,
    entry: &mut FileEntry,
    offset: u64,
    buffer: &mut [u8],
) -> PackageResult<bool>
where
    R: Read + Seek,
    W: Write + Seek,
    T: Transform,
{
    let (block, file) = (entry.block_id, entry.file_id);

    writer.seek(SeekFrom::Start(offset))?;
    reader.seek(SeekFrom::Start(entry.data_offset))?;
    copy_exact(reader, writer, u64::from(entry.data_header_size), buffer)?;

    let payload_start = offset + u64::from(entry.data_header_size);
    let source = entry.clone();
    let context = FileContext {
        block_id: block,
        file_id: file,
        entry: &source,
    };

    let mut sink = if entry.compressed {
        PayloadSink::deflate(writer)
    } else {
        PayloadSink::raw(writer)
    };

    let outcome = transform.apply(&mut sink, context);

    let replaced = match outcome {
        Err(e) => {
            sink.abandon();
            return Err(PackageError::Transform {
                block,
                file,
                source: Box::new(e),
            });
        }
        Ok(Outcome::Copied) => {
            let written = sink.bytes_in();
            sink.abandon();
            if written > 0 {
                return Err(PackageError::DeclinedAfterWrite {
                    block,
                    file,
                    written,
                });
            }

            reader.seek(SeekFrom::Start(source.payload_offset()))?;
            copy_exact(reader, writer, u64::from(source.compressed_size), buffer)?;
            false
        }
        Ok(Outcome::Replaced(reported)) => {
            let written = sink.finish()?;
            if reported != written {
                return Err(PackageError::ReplacedSizeMismatch {
                    block,
                    file,
                    reported,
                    written,
                });
            }

            let stored = writer.stream_position()? - payload_start;
            // Raw payloads have no separate logical size
            let logical = if entry.compressed { written } else { stored };
            entry.set_payload_sizes(stored, logical)?;
            true
        }
    };

    entry.data_offset = offset;
    Ok(replaced)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::package::{PackageBuilder, PackageFile};
    use pretty_assertions::assert_eq;
    use std::io::{self, Cursor};

    fn build(files: Vec<PackageFile>, max: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        let mut builder = PackageBuilder::new(max);
        for file in files {
            builder = builder.add_file(file);
        }
        builder.build(&mut out).unwrap();
        out.into_inner()
    }

    fn rewrite<T: Transform>(source: &[u8], transform: T) -> PackageResult<(Vec<u8>, Package)> {
        let mut reader = Cursor::new(source.to_vec());
        let mut package = Package::open(&mut reader)?;
        let mut writer = Cursor::new(Vec::new());
        package.rewrite(&mut reader, &mut writer, transform)?;
        Ok((writer.into_inner(), package))
    }

    fn payloads(data: &[u8]) -> Vec<Vec<u8>> {
        let mut reader = Cursor::new(data.to_vec());
        let mut package = Package::open(&mut reader).unwrap();
        let blocks = package
            .blocks(&mut reader)
            .collect::<PackageResult<Vec<_>>>()
            .unwrap();
        let mut out = Vec::new();
        for block in blocks {
            let files = package
                .files(&mut reader, block)
                .collect::<PackageResult<Vec<_>>>()
                .unwrap();
            for file in files {
                out.push(file.read_payload(&mut reader, false).unwrap());
            }
        }
        out
    }

    #[test]
    fn test_copy_all_is_identity() {
        let source = build(
            vec![
                PackageFile::new(1, b"alpha".to_vec()).with_data_header(vec![1, 2]),
                PackageFile::new(2, vec![7; 300]).compressed(),
                PackageFile::new(3, Vec::new()),
            ],
            2,
        );

        let (output, _) = rewrite(&source, CopyAll).unwrap();
        assert_eq!(output, source);
    }

    #[test]
    fn test_replace_uncompressed_payload() {
        let source = build(
            vec![
                PackageFile::new(1, b"short".to_vec()),
                PackageFile::new(2, b"kept".to_vec()),
            ],
            4,
        );

        let transform = from_fn(|sink: &mut dyn Write, file: FileContext<'_>| {
            if file.file_id == 0 {
                sink.write_all(b"a much longer payload")?;
                Ok::<_, io::Error>(Outcome::Replaced(21))
            } else {
                Ok(Outcome::Copied)
            }
        });

        let (output, package) = rewrite(&source, transform).unwrap();
        assert_eq!(
            payloads(&output),
            vec![b"a much longer payload".to_vec(), b"kept".to_vec()]
        );

        let entries = package.loaded_entries();
        assert_eq!(entries[0].compressed_size, 21);
        assert_eq!(entries[0].decompressed_size, 21);
        assert_eq!(entries[1].data_offset, entries[0].data_offset + 21);
    }

    #[test]
    fn test_replace_compressed_payload() {
        let source = build(vec![PackageFile::new(9, vec![0; 64]).compressed()], 1);

        let replacement = vec![5u8; 4096];
        let expected = replacement.clone();
        let transform = from_fn(move |sink: &mut dyn Write, _: FileContext<'_>| {
            sink.write_all(&replacement)?;
            Ok::<_, io::Error>(Outcome::Replaced(4096))
        });

        let (output, package) = rewrite(&source, transform).unwrap();
        let entry = &package.loaded_entries()[0];
        assert!(entry.compressed);
        assert_eq!(entry.decompressed_size, 4096);
        assert!(entry.compressed_size < 4096);
        assert_eq!(payloads(&output), vec![expected]);
    }

    #[test]
    fn test_decline_after_write_is_error() {
        let source = build(vec![PackageFile::new(1, b"data".to_vec())], 1);
        let transform = from_fn(|sink: &mut dyn Write, _: FileContext<'_>| {
            sink.write_all(b"oops")?;
            Ok::<_, io::Error>(Outcome::Copied)
        });

        assert!(matches!(
            rewrite(&source, transform),
            Err(PackageError::DeclinedAfterWrite { written: 4, .. })
        ));
    }

    #[test]
    fn test_size_mismatch_is_error() {
        let source = build(vec![PackageFile::new(1, b"data".to_vec())], 1);
        let transform = from_fn(|sink: &mut dyn Write, _: FileContext<'_>| {
            sink.write_all(b"abc")?;
            Ok::<_, io::Error>(Outcome::Replaced(10))
        });

        assert!(matches!(
            rewrite(&source, transform),
            Err(PackageError::ReplacedSizeMismatch {
                reported: 10,
                written: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_transform_error_is_wrapped() {
        let source = build(vec![PackageFile::new(1, b"data".to_vec())], 1);
        let transform = from_fn(|_: &mut dyn Write, _: FileContext<'_>| {
            Err::<Outcome, _>(io::Error::other("boom"))
        });

        let err = rewrite(&source, transform).unwrap_err();
        assert!(matches!(err, PackageError::Transform { block: 0, file: 0, .. }));
    }

    #[test]
    fn test_next_pointers_follow_data() {
        let source = build(
            (0..5)
                .map(|i| PackageFile::new(i, vec![i as u8; 10]))
                .collect(),
            2,
        );

        let transform = from_fn(|sink: &mut dyn Write, file: FileContext<'_>| {
            let payload = vec![0xAB; 50 + file.file_id];
            sink.write_all(&payload)?;
            Ok::<_, io::Error>(Outcome::Replaced(payload.len() as u64))
        });

        let (output, package) = rewrite(&source, transform).unwrap();
        let blocks = package.loaded_blocks();
        assert_eq!(blocks.len(), 3);

        for pair in blocks.windows(2) {
            let last_entry = package
                .loaded_entries()
                .iter()
                .filter(|e| e.block_id == pair[0].id)
                .max_by_key(|e| e.file_id)
                .unwrap();
            assert_eq!(
                pair[0].next_block_offset,
                last_entry.data_offset + last_entry.stored_size()
            );
            assert_eq!(pair[0].next_block_offset, pair[1].header_offset);
        }
        assert!(blocks[2].is_last());

        let last = package.loaded_entries().last().unwrap();
        assert_eq!(output.len() as u64, last.data_offset + last.stored_size());
    }
}
