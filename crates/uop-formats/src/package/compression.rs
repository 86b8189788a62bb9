//! Payload compression adapter
//!
//! Each payload in a package is independently zlib-compressed or stored raw.
//! [`PayloadReader`] hides the difference when reading, [`PayloadSink`] when
//! writing a new payload during a rewrite.

use std::io::{self, Read, Take, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

/// Size of the transfer buffer used for verbatim copies
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Compression level used when re-encoding payloads
pub fn rewrite_level() -> Compression {
    Compression::fast()
}

/// Reader over a single payload
pub enum PayloadReader<'r, R: Read> {
    /// Stored bytes, exactly `compressed_size` of them
    Raw(Take<&'r mut R>),
    /// Inflated bytes, at most `decompressed_size` of them
    Inflate(Take<ZlibDecoder<Take<&'r mut R>>>),
}

impl<'r, R: Read> PayloadReader<'r, R> {
    /// Wrap a reader positioned at the start of a payload
    pub fn new(
        reader: &'r mut R,
        compressed_size: u64,
        decompressed_size: u64,
        inflate: bool,
    ) -> Self {
        let stored = reader.take(compressed_size);
        if inflate {
            Self::Inflate(ZlibDecoder::new(stored).take(decompressed_size))
        } else {
            Self::Raw(stored)
        }
    }
}

impl<R: Read> Read for PayloadReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Raw(inner) => inner.read(buf),
            Self::Inflate(inner) => inner.read(buf),
        }
    }
}

enum SinkState<'w, W: Write> {
    Raw(&'w mut W),
    // Encoder is created on first write so an untouched sink emits nothing
    Pending(&'w mut W),
    Deflate(ZlibEncoder<&'w mut W>),
}

/// Destination for a transformed payload
///
/// Counts the logical bytes it accepts. For compressed files the bytes are
/// deflated on the fly straight into the destination stream.
pub struct PayloadSink<'w, W: Write> {
    state: Option<SinkState<'w, W>>,
    accepted: u64,
}

impl<'w, W: Write> PayloadSink<'w, W> {
    /// Sink that stores bytes as written
    pub fn raw(writer: &'w mut W) -> Self {
        Self {
            state: Some(SinkState::Raw(writer)),
            accepted: 0,
        }
    }

    /// Sink that zlib-compresses bytes at the rewrite level
    pub fn deflate(writer: &'w mut W) -> Self {
        Self {
            state: Some(SinkState::Pending(writer)),
            accepted: 0,
        }
    }

    /// Logical bytes accepted so far
    pub fn bytes_in(&self) -> u64 {
        self.accepted
    }

    /// Whether this sink compresses what it receives
    pub fn is_compressing(&self) -> bool {
        !matches!(self.state, Some(SinkState::Raw(_)))
    }

    /// Close the sink and return the logical payload size
    ///
    /// A compressing sink always produces a complete zlib stream, even for an
    /// empty payload. The returned size is the encoder's total input count.
    pub fn finish(self) -> io::Result<u64> {
        match self.state {
            Some(SinkState::Raw(writer)) => {
                writer.flush()?;
                Ok(self.accepted)
            }
            Some(SinkState::Pending(writer)) => {
                let encoder = ZlibEncoder::new(writer, rewrite_level());
                encoder.finish()?.flush()?;
                Ok(0)
            }
            Some(SinkState::Deflate(mut encoder)) => {
                encoder.try_finish()?;
                let total_in = encoder.total_in();
                encoder.finish()?.flush()?;
                Ok(total_in)
            }
            None => Err(closed()),
        }
    }

    /// Drop the sink without completing a stream
    ///
    /// Writes nothing when no bytes were accepted.
    pub fn abandon(self) {
        drop(self.state);
    }

    fn activate(&mut self) {
        if matches!(self.state, Some(SinkState::Pending(_))) {
            if let Some(SinkState::Pending(writer)) = self.state.take() {
                self.state = Some(SinkState::Deflate(ZlibEncoder::new(writer, rewrite_level())));
            }
        }
    }
}

fn closed() -> io::Error {
    io::Error::other("payload sink is closed")
}

impl<W: Write> Write for PayloadSink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.activate();
        let written = match self.state.as_mut() {
            Some(SinkState::Raw(writer)) => writer.write(buf)?,
            Some(SinkState::Deflate(encoder)) => encoder.write(buf)?,
            Some(SinkState::Pending(_)) | None => return Err(closed()),
        };

        self.accepted += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.state.as_mut() {
            Some(SinkState::Raw(writer) | SinkState::Pending(writer)) => writer.flush(),
            Some(SinkState::Deflate(encoder)) => encoder.flush(),
            None => Err(closed()),
        }
    }
}
