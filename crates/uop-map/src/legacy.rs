//! Legacy MUL map sources
//!
//! A legacy map is spread over four files:
//!
//! - tile grid (`map*.mul`): 8x8 sub-blocks of a 4-byte header and 64 cells
//!   of `(u16 tile id, i8 altitude)`
//! - statics index (`staidx*.mul`): one 12-byte record per sub-block,
//!   `(i32 offset, i32 length, i32 unused)`, offset -1 for no statics
//! - statics data (`statics*.mul`): 7-byte records
//!   `(u16 tile id, u8 x, u8 y, i8 altitude, u16 unknown)`
//! - radar colours (`radarcol.mul`): statics hues are the u16 at
//!   `0x4000 + tile id`

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use binrw::BinRead;
use memmap2::{Mmap, MmapOptions};
use tracing::{debug, warn};

use crate::coords::{LEGACY_TILE_SIZE, legacy_block_to_coordinates, legacy_tile_offset};
use crate::error::MapResult;

/// Size of a statics index record
pub const STATICS_INDEX_RECORD_SIZE: u64 = 12;

/// Size of a statics data record
pub const STATICS_RECORD_SIZE: u64 = 7;

/// Offset of the statics hue table in the radar colour file
pub const RADAR_STATICS_OFFSET: u64 = 0x4000;

/// Seekable legacy input, either memory-mapped or fully in memory
#[derive(Debug)]
pub enum MulStream {
    /// Whole file loaded into memory
    Memory(Cursor<Vec<u8>>),
    /// Read-only mapping of the file
    Mapped(Cursor<Mmap>),
}

impl MulStream {
    /// Open a file, loading it into memory when `in_memory` is set and
    /// mapping it otherwise
    pub fn open(path: impl AsRef<Path>, in_memory: bool) -> io::Result<Self> {
        let path = path.as_ref();
        if in_memory {
            return Ok(Self::Memory(Cursor::new(std::fs::read(path)?)));
        }

        let file = File::open(path)?;
        // Zero-length files cannot be mapped
        if file.metadata()?.len() == 0 {
            return Ok(Self::from_bytes(Vec::new()));
        }

        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self::Mapped(Cursor::new(mmap)))
    }

    /// Stream over bytes already in memory
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::Memory(Cursor::new(data))
    }

    /// Total stream length
    pub fn len(&self) -> io::Result<u64> {
        match self {
            Self::Memory(cursor) => Ok(cursor.get_ref().len() as u64),
            Self::Mapped(cursor) => Ok(cursor.get_ref().len() as u64),
        }
    }

    /// Whether the stream is empty
    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read exactly `buf.len()` bytes at `offset`
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
}

impl Read for MulStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Memory(cursor) => cursor.read(buf),
            Self::Mapped(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for MulStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Memory(cursor) => cursor.seek(pos),
            Self::Mapped(cursor) => cursor.seek(pos),
        }
    }
}

/// Paths of the four legacy inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPaths {
    /// Tile grid
    pub map: PathBuf,
    /// Statics index
    pub index: PathBuf,
    /// Statics data
    pub statics: PathBuf,
    /// Radar colours
    pub radar: PathBuf,
}

/// Terrain cell of the legacy grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyTile {
    /// Tile id
    pub id: u16,
    /// Altitude
    pub altitude: i8,
}

/// Static object placed on a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticTile {
    /// Tile id
    pub id: u16,
    /// Altitude
    pub altitude: i8,
    /// Opaque field carried from the statics record
    pub unknown: u16,
    /// Hue from the radar colour table
    pub hue: u16,
}

/// Statics of one legacy sub-block, grouped by map coordinates in read order
pub type BlockStatics = HashMap<(u32, u32), Vec<StaticTile>>;

#[derive(Debug, BinRead)]
#[br(little)]
struct StaticsIndexRecord {
    offset: i32,
    length: i32,
    _unused: i32,
}

#[derive(Debug, BinRead)]
#[br(little)]
struct StaticsRecord {
    id: u16,
    x: u8,
    y: u8,
    altitude: i8,
    unknown: u16,
}

/// The four legacy inputs of one map
#[derive(Debug)]
pub struct LegacySources {
    map: MulStream,
    map_len: u64,
    index: MulStream,
    index_len: u64,
    statics: MulStream,
    radar: MulStream,
    radar_len: u64,
}

impl LegacySources {
    /// Wrap already opened streams
    pub fn new(
        map: MulStream,
        index: MulStream,
        statics: MulStream,
        radar: MulStream,
    ) -> io::Result<Self> {
        Ok(Self {
            map_len: map.len()?,
            index_len: index.len()?,
            radar_len: radar.len()?,
            map,
            index,
            statics,
            radar,
        })
    }

    /// Open the four files, loading them into memory when `in_memory` is set
    pub fn open(paths: &LegacyPaths, in_memory: bool) -> io::Result<Self> {
        debug!(
            "Opening legacy map {} ({})",
            paths.map.display(),
            if in_memory { "in memory" } else { "mapped" }
        );
        Self::new(
            MulStream::open(&paths.map, in_memory)?,
            MulStream::open(&paths.index, in_memory)?,
            MulStream::open(&paths.statics, in_memory)?,
            MulStream::open(&paths.radar, in_memory)?,
        )
    }

    /// Sources backed by in-memory buffers
    pub fn from_bytes(
        map: Vec<u8>,
        index: Vec<u8>,
        statics: Vec<u8>,
        radar: Vec<u8>,
    ) -> io::Result<Self> {
        Self::new(
            MulStream::from_bytes(map),
            MulStream::from_bytes(index),
            MulStream::from_bytes(statics),
            MulStream::from_bytes(radar),
        )
    }

    /// Length of the tile grid stream
    pub fn map_len(&self) -> u64 {
        self.map_len
    }

    /// Cell `index` of sub-block `block`, `None` when it lies beyond the grid stream
    pub fn tile(&mut self, block: u32, index: u32) -> io::Result<Option<LegacyTile>> {
        let offset = legacy_tile_offset(block, index);
        if offset + LEGACY_TILE_SIZE > self.map_len {
            return Ok(None);
        }

        let mut cell = [0u8; 3];
        self.map.read_at(offset, &mut cell)?;
        Ok(Some(LegacyTile {
            id: u16::from_le_bytes([cell[0], cell[1]]),
            altitude: cell[2] as i8,
        }))
    }

    /// Radar hue for a statics tile id, 0 when outside the table
    pub fn hue(&mut self, id: u16) -> io::Result<u16> {
        let offset = RADAR_STATICS_OFFSET + u64::from(id);
        if offset + 2 > self.radar_len {
            return Ok(0);
        }

        let mut hue = [0u8; 2];
        self.radar.read_at(offset, &mut hue)?;
        Ok(u16::from_le_bytes(hue))
    }

    /// All statics of sub-block `block`, keyed by map coordinates
    pub fn block_statics(&mut self, block: u32, height: u32) -> MapResult<BlockStatics> {
        let mut statics = BlockStatics::new();

        let record_offset = u64::from(block) * STATICS_INDEX_RECORD_SIZE;
        if record_offset + STATICS_INDEX_RECORD_SIZE > self.index_len {
            return Ok(statics);
        }

        self.index.seek(SeekFrom::Start(record_offset))?;
        let record = StaticsIndexRecord::read(&mut self.index)?;
        if record.offset == -1 {
            return Ok(statics);
        }

        let (Ok(start), Ok(length)) = (u64::try_from(record.offset), u64::try_from(record.length))
        else {
            warn!(
                "Statics index for block {block} has invalid range {}+{}",
                record.offset, record.length
            );
            return Ok(statics);
        };

        if length % STATICS_RECORD_SIZE != 0 {
            warn!("Statics length {length} of block {block} is not a multiple of {STATICS_RECORD_SIZE}");
        }

        self.statics.seek(SeekFrom::Start(start))?;
        for _ in 0..length / STATICS_RECORD_SIZE {
            let record = StaticsRecord::read(&mut self.statics)?;
            let hue = self.hue(record.id)?;
            let position = u32::from(record.x) + 8 * u32::from(record.y);
            let coordinates = legacy_block_to_coordinates(block, position, height);

            statics.entry(coordinates).or_default().push(StaticTile {
                id: record.id,
                altitude: record.altitude,
                unknown: record.unknown,
                hue,
            });
        }

        Ok(statics)
    }
}
