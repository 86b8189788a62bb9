//! Legacy map to packaged map transcoder
//!
//! Every file of a map package except the metadata at `(0, 0)` holds one
//! 64x64 macro block. File `f` of block `b` is macro block
//! `100 * b + f - 1`. The transcoder implements [`Transform`] and
//! synthesizes each macro block from the legacy sources, ignoring whatever
//! the file held before.
//!
//! A macro block is a sequence of records, one tile at a time in raster
//! order, closed by two zero bytes:
//!
//! ```text
//! tile       u8 facet, u16 block id (first tile) | u8 0, u8 0 (other tiles)
//!            i8 altitude, u16 graphic, u8 flag, u8 id low, u8 id high
//! delimiter  u8 count (first only), u8 direction, i8 altitude,
//!            u16 graphic, u8 flag
//! static     u8 0, u8 count (first only), u16 id, u16 unknown,
//!            i8 altitude, u16 hue
//! ```
//!
//! Delimiters describe the neighboring tile across a macro block edge and
//! follow the tile they belong to, as do the statics placed on it.
//!
//! Transcoding stops at the first tile that lies beyond the legacy grid: that
//! file and every later one are copied unchanged.

use std::collections::HashMap;
use std::io::Write;

use tracing::{debug, info};
use uop_formats::package::{FileContext, Outcome, Transform};

use crate::coords::{
    MACRO_BLOCK_SIZE, TILES_PER_MACRO_BLOCK, coordinates_to_legacy_block,
    macro_block_to_coordinates,
};
use crate::error::{MapError, MapResult};
use crate::legacy::{BlockStatics, LegacySources, LegacyTile};
use crate::metadata::MapMetadata;
use crate::remap::RemapTable;

/// Macro blocks stored per package block
pub const FILES_PER_MAP_BLOCK: usize = 100;

/// Initial capacity of the render buffer
const TYPICAL_BLOCK_SIZE: usize = TILES_PER_MACRO_BLOCK as usize * 8 + 4096;

/// Neighbor a delimiter record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// x - 1
    West = 0,
    /// x - 1, y - 1
    NorthWest = 1,
    /// y - 1
    North = 2,
    /// x + 1
    East = 3,
    /// x + 1, y + 1
    SouthEast = 4,
    /// y + 1
    South = 5,
    /// x - 1, y + 1
    SouthWest = 6,
    /// x + 1, y - 1
    NorthEast = 7,
}

impl Direction {
    /// Emission order of delimiter records
    pub const ORDER: [Self; 8] = [
        Self::West,
        Self::NorthWest,
        Self::North,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::NorthEast,
    ];

    /// Coordinate offset of the neighbor
    pub fn offset(self) -> (i64, i64) {
        match self {
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::NorthEast => (1, -1),
        }
    }

    /// Whether a tile at `(x, y)` gets a delimiter toward this neighbor
    pub fn applies(self, x: u32, y: u32) -> bool {
        let west = x % MACRO_BLOCK_SIZE == 0;
        let north = y % MACRO_BLOCK_SIZE == 0;
        let east = (x + 1) % MACRO_BLOCK_SIZE == 0;
        let south = (y + 1) % MACRO_BLOCK_SIZE == 0;

        match self {
            Self::West => west,
            Self::NorthWest => west && north,
            Self::North => north,
            Self::East => east,
            Self::SouthEast => east && south,
            Self::South => south,
            Self::SouthWest => west && south,
            Self::NorthEast => north && east,
        }
    }
}

/// Macro block id stored in file `file_id` of block `block_id`
///
/// `None` for the metadata file `(0, 0)`.
pub fn map_block_id(block_id: usize, file_id: usize) -> Option<u32> {
    (FILES_PER_MAP_BLOCK * block_id + file_id)
        .checked_sub(1)
        .and_then(|id| u32::try_from(id).ok())
}

type ProgressFn<'a> = Box<dyn FnMut(u8) + Send + 'a>;

/// Transform turning legacy map sources into packaged macro blocks
pub struct MapTranscoder<'a> {
    sources: &'a mut LegacySources,
    remap: &'a RemapTable,
    metadata: MapMetadata,
    progress: Option<ProgressFn<'a>>,
    last_progress: Option<u8>,
    buffer: Vec<u8>,
    exhausted: bool,
    transcoded: usize,
}

impl<'a> MapTranscoder<'a> {
    /// Create a transcoder over `sources` for a map with `metadata`
    pub fn new(
        sources: &'a mut LegacySources,
        remap: &'a RemapTable,
        metadata: MapMetadata,
    ) -> Self {
        Self {
            sources,
            remap,
            metadata,
            progress: None,
            last_progress: None,
            buffer: Vec::with_capacity(TYPICAL_BLOCK_SIZE),
            exhausted: false,
            transcoded: 0,
        }
    }

    /// Report completion percentages to `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: impl FnMut(u8) + Send + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Macro blocks written so far
    pub fn transcoded(&self) -> usize {
        self.transcoded
    }

    /// Whether the legacy grid has run out
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Render macro block `id` into the internal buffer
    ///
    /// Returns `false` when a tile lies beyond the legacy grid; the buffer
    /// content is meaningless then.
    pub fn render(&mut self, id: u32) -> MapResult<bool> {
        let height = self.metadata.height;
        let mut statics: HashMap<u32, BlockStatics> = HashMap::new();
        let buffer = &mut self.buffer;
        buffer.clear();

        for k in 0..TILES_PER_MACRO_BLOCK {
            let (x, y) = macro_block_to_coordinates(id, k, height);
            let (legacy_block, legacy_index) = coordinates_to_legacy_block(x, y, height);

            let Some(tile) = self.sources.tile(legacy_block, legacy_index)? else {
                return Ok(false);
            };

            if k == 0 {
                buffer.push(self.metadata.facet);
                buffer.extend_from_slice(&(id as u16).to_le_bytes());
            } else {
                buffer.extend_from_slice(&[0, 0]);
            }
            push_tile(buffer, self.remap, tile);

            push_delimiters(buffer, self.sources, self.remap, &self.metadata, x, y)?;

            if !statics.contains_key(&legacy_block) {
                let loaded = self.sources.block_statics(legacy_block, height)?;
                statics.insert(legacy_block, loaded);
            }
            if let Some(list) = statics.get(&legacy_block).and_then(|s| s.get(&(x, y))) {
                for (m, item) in list.iter().enumerate() {
                    buffer.push(0);
                    buffer.push(if m == 0 { list.len() as u8 } else { 0 });
                    buffer.extend_from_slice(&item.id.to_le_bytes());
                    buffer.extend_from_slice(&item.unknown.to_le_bytes());
                    buffer.push(item.altitude as u8);
                    buffer.extend_from_slice(&item.hue.to_le_bytes());
                }
            }
        }

        buffer.extend_from_slice(&[0, 0]);
        Ok(true)
    }

    /// Bytes of the last rendered macro block
    pub fn rendered(&self) -> &[u8] {
        &self.buffer
    }

    fn report_progress(&mut self, id: u32) {
        let total = self.metadata.macro_block_count();
        let percent = if total == 0 {
            100
        } else {
            (100 * (u64::from(id) + 1) / total).min(100) as u8
        };

        if self.last_progress.is_some_and(|last| percent <= last) {
            return;
        }
        self.last_progress = Some(percent);

        if let Some(progress) = self.progress.as_mut() {
            progress(percent);
        }
    }
}

/// Tile fields after the leading two bytes
fn push_tile(buffer: &mut Vec<u8>, remap: &RemapTable, tile: LegacyTile) {
    let (graphic, flag) = remap.resolve(tile.id);
    buffer.push(tile.altitude as u8);
    buffer.extend_from_slice(&graphic.to_le_bytes());
    buffer.push(flag);
    buffer.extend_from_slice(&tile.id.to_le_bytes());
}

/// Delimiter records for the tile at `(x, y)`
///
/// The count of applicable directions goes into the slot of the first
/// applicable direction, so it is lost when that neighbor is skipped.
fn push_delimiters(
    buffer: &mut Vec<u8>,
    sources: &mut LegacySources,
    remap: &RemapTable,
    metadata: &MapMetadata,
    x: u32,
    y: u32,
) -> MapResult<()> {
    let applicable = Direction::ORDER.into_iter().filter(|d| d.applies(x, y));
    let count = applicable.clone().count() as u8;

    for (slot, direction) in applicable.enumerate() {
        let (dx, dy) = direction.offset();
        let (nx, ny) = (i64::from(x) + dx, i64::from(y) + dy);
        if nx < 0 || ny < 0 || nx >= i64::from(metadata.width) || ny >= i64::from(metadata.height)
        {
            continue;
        }

        let (block, index) = coordinates_to_legacy_block(nx as u32, ny as u32, metadata.height);
        let Some(tile) = sources.tile(block, index)? else {
            continue;
        };

        let (graphic, flag) = remap.resolve(tile.id);
        buffer.push(if slot == 0 { count } else { 0 });
        buffer.push(direction as u8);
        buffer.push(tile.altitude as u8);
        buffer.extend_from_slice(&graphic.to_le_bytes());
        buffer.push(flag);
    }

    Ok(())
}

impl Transform for MapTranscoder<'_> {
    type Error = MapError;

    fn apply(&mut self, sink: &mut dyn Write, file: FileContext<'_>) -> MapResult<Outcome> {
        let Some(id) = map_block_id(file.block_id, file.file_id) else {
            return Ok(Outcome::Copied);
        };
        if self.exhausted {
            return Ok(Outcome::Copied);
        }

        if !self.render(id)? {
            self.exhausted = true;
            info!(
                "Legacy map ends before macro block {id}; {} blocks transcoded, remaining files kept",
                self.transcoded
            );
            return Ok(Outcome::Copied);
        }

        sink.write_all(&self.buffer)?;
        self.transcoded += 1;
        debug!(
            "Transcoded macro block {id} ({} bytes) into file {}.{}",
            self.buffer.len(),
            file.block_id,
            file.file_id
        );

        self.report_progress(id);
        Ok(Outcome::Replaced(self.buffer.len() as u64))
    }
}
