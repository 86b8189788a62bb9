//! Legacy tile remap table
//!
//! Maps a legacy terrain tile id to the graphic and flag byte used by the
//! packaged map format. Tiles without an entry resolve to graphic 0, flag 0.
//!
//! Two file formats are accepted:
//!
//! - binary: consecutive 5-byte little-endian records
//!   `(u16 tile, u16 graphic, u8 flag)`
//! - JSON (`.json` extension): `[{"tile": 3, "graphic": 1003, "flag": 0}]`
//!
//! When a tile appears more than once the last record wins.

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use binrw::{BinRead, BinWrite};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MapError, MapResult};

/// Size of a binary remap record
pub const REMAP_RECORD_SIZE: usize = 5;

/// One remap record
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite, Serialize, Deserialize)]
#[brw(little)]
pub struct RemapEntry {
    /// Legacy tile id
    pub tile: u16,
    /// Graphic written to the packaged map
    pub graphic: u16,
    /// Flag byte written to the packaged map
    pub flag: u8,
}

/// Lookup table from legacy tile id to graphic and flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: HashMap<u16, (u16, u8)>,
}

impl RemapTable {
    /// Empty table; every tile resolves to `(0, 0)`
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table, choosing the format from the file extension
    pub fn open(path: impl AsRef<Path>) -> MapResult<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let table = if is_json {
            Self::from_json(data.as_slice())?
        } else {
            Self::from_binary(data.as_slice())?
        };

        debug!("Loaded {} remap entries from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse a table of binary records
    pub fn from_binary<R: Read>(mut reader: R) -> MapResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        if data.len() % REMAP_RECORD_SIZE != 0 {
            return Err(MapError::InvalidRemap {
                reason: format!(
                    "{} bytes is not a whole number of {REMAP_RECORD_SIZE}-byte records",
                    data.len()
                ),
            });
        }

        let mut cursor = Cursor::new(&data);
        let mut table = Self::new();
        for _ in 0..data.len() / REMAP_RECORD_SIZE {
            table.insert(RemapEntry::read(&mut cursor)?);
        }
        Ok(table)
    }

    /// Parse a JSON array of records
    pub fn from_json<R: Read>(reader: R) -> MapResult<Self> {
        let entries: Vec<RemapEntry> = serde_json::from_reader(reader)?;
        Ok(entries.into_iter().collect())
    }

    /// Add or replace the entry for a tile
    pub fn insert(&mut self, entry: RemapEntry) {
        self.entries.insert(entry.tile, (entry.graphic, entry.flag));
    }

    /// Graphic and flag for `tile`, if mapped
    pub fn get(&self, tile: u16) -> Option<(u16, u8)> {
        self.entries.get(&tile).copied()
    }

    /// Graphic and flag for `tile`, `(0, 0)` when unmapped
    pub fn resolve(&self, tile: u16) -> (u16, u8) {
        self.get(tile).unwrap_or_default()
    }

    /// Number of mapped tiles
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tile is mapped
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<RemapEntry> for RemapTable {
    fn from_iter<I: IntoIterator<Item = RemapEntry>>(iter: I) -> Self {
        let mut table = Self::new();
        for entry in iter {
            table.insert(entry);
        }
        table
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::BinWriterExt;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(tile: u16, graphic: u16, flag: u8) -> RemapEntry {
        RemapEntry {
            tile,
            graphic,
            flag,
        }
    }

    #[test]
    fn test_binary_records() {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&entry(3, 0x1234, 7)).unwrap();
        cursor.write_le(&entry(4, 2, 0)).unwrap();
        cursor.write_le(&entry(3, 9, 1)).unwrap();
        let data = cursor.into_inner();
        assert_eq!(&data[..5], &[3, 0, 0x34, 0x12, 7]);

        let table = RemapTable::from_binary(data.as_slice()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(3), Some((9, 1)));
        assert_eq!(table.resolve(4), (2, 0));
        assert_eq!(table.resolve(5), (0, 0));
    }

    #[test]
    fn test_partial_record_rejected() {
        assert!(matches!(
            RemapTable::from_binary(&[1u8, 2, 3][..]),
            Err(MapError::InvalidRemap { .. })
        ));
    }

    #[test]
    fn test_open_by_extension() {
        let dir = TempDir::new().unwrap();

        let json = dir.path().join("remap.json");
        fs::write(&json, r#"[{"tile": 1, "graphic": 100, "flag": 2}]"#).unwrap();
        assert_eq!(RemapTable::open(&json).unwrap().get(1), Some((100, 2)));

        let binary = dir.path().join("remap.bin");
        fs::write(&binary, [1u8, 0, 100, 0, 2]).unwrap();
        assert_eq!(RemapTable::open(&binary).unwrap().get(1), Some((100, 2)));
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(matches!(
            RemapTable::from_json(&b"{\"tile\": 1}"[..]),
            Err(MapError::Json(_))
        ));
    }
}
