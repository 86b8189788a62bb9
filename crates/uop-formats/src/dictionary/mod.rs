//! Filename dictionary
//!
//! Packages only store a 64-bit hash of each file name. A dictionary maps
//! known hashes back to names so files can be exported under readable paths.
//!
//! The on-disk `Dictionary.bin` format is a 4-byte tag and a version byte
//! followed by records until the end of the stream:
//!
//! ```text
//! +-----------+------------------------------------------+
//! | hash      | u64 LE                                   |
//! | has_name  | u8, 1 when a name follows                |
//! | name      | 7-bit varint length, then UTF-8 bytes    |
//! +-----------+------------------------------------------+
//! ```
//!
//! The first record for a hash wins.

mod error;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use tracing::debug;

use crate::package::FileEntry;

pub use error::{DictionaryError, DictionaryResult};

/// Bytes before the first record
const PREAMBLE_SIZE: u64 = 5;

/// Lookup table from name hash to file name
#[derive(Debug, Clone, Default)]
pub struct FileNameDictionary {
    names: HashMap<u64, Option<String>>,
}

impl FileNameDictionary {
    /// Empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dictionary file
    pub fn open(path: impl AsRef<Path>) -> DictionaryResult<Self> {
        let data = fs::read(path.as_ref())?;
        let dictionary = Self::from_bytes(&data)?;
        debug!(
            "Loaded {} names from {}",
            dictionary.len(),
            path.as_ref().display()
        );
        Ok(dictionary)
    }

    /// Parse a dictionary from a reader
    pub fn from_reader<R: Read>(mut reader: R) -> DictionaryResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Parse a dictionary from its serialized bytes
    pub fn from_bytes(data: &[u8]) -> DictionaryResult<Self> {
        let len = data.len() as u64;
        if len < PREAMBLE_SIZE {
            return Err(DictionaryError::Truncated { offset: 0 });
        }

        let mut cursor = Cursor::new(data);
        cursor.set_position(PREAMBLE_SIZE);

        let mut dictionary = Self::new();
        while cursor.position() < len {
            let offset = cursor.position();
            let truncated = |_| DictionaryError::Truncated { offset };

            let mut hash = [0u8; 8];
            cursor.read_exact(&mut hash).map_err(truncated)?;
            let hash = u64::from_le_bytes(hash);

            let mut flag = [0u8; 1];
            cursor.read_exact(&mut flag).map_err(truncated)?;

            let name = if flag[0] == 1 {
                Some(read_name(&mut cursor, hash, offset)?)
            } else {
                None
            };

            if let Entry::Vacant(slot) = dictionary.names.entry(hash) {
                slot.insert(name);
            }
        }

        Ok(dictionary)
    }

    /// Add a name unless the hash is already known
    pub fn insert(&mut self, hash: u64, name: impl Into<String>) {
        self.names.entry(hash).or_insert_with(|| Some(name.into()));
    }

    /// Name for `hash`, if one is known and non-empty
    pub fn get(&self, hash: u64) -> Option<&str> {
        self.names
            .get(&hash)
            .and_then(Option::as_deref)
            .filter(|name| !name.is_empty())
    }

    /// Name for a package entry, falling back to `"{block}.{file}.dat"`
    pub fn file_name(&self, entry: &FileEntry) -> String {
        self.get(entry.name_hash)
            .map_or_else(|| entry.fallback_name(), str::to_owned)
    }

    /// Number of hashes known, with or without a name
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no hashes are known
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Read a string with a 7-bit varint length prefix
fn read_name(cursor: &mut Cursor<&[u8]>, hash: u64, offset: u64) -> DictionaryResult<String> {
    let mut length: u64 = 0;
    let mut shift = 0;
    loop {
        let mut byte = [0u8; 1];
        cursor
            .read_exact(&mut byte)
            .map_err(|_| DictionaryError::Truncated { offset })?;

        length |= u64::from(byte[0] & 0x7F) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }

        shift += 7;
        if shift > 28 {
            return Err(DictionaryError::InvalidName {
                hash,
                reason: "length prefix longer than 5 bytes".to_string(),
            });
        }
    }

    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    if length > remaining {
        return Err(DictionaryError::Truncated { offset });
    }

    let mut bytes = vec![0u8; length as usize];
    cursor
        .read_exact(&mut bytes)
        .map_err(|_| DictionaryError::Truncated { offset })?;

    String::from_utf8(bytes).map_err(|e| DictionaryError::InvalidName {
        hash,
        reason: e.to_string(),
    })
}
