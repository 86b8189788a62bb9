//! Transcoder from legacy MUL maps to packaged MYP map blocks
//!
#![allow(clippy::cast_possible_wrap)] // Altitudes are signed bytes on disk
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
//! The legacy client stores a facet as a grid of 8x8 sub-blocks plus a
//! statics index, statics data and a radar colour table. The packaged format
//! stores 64x64 macro blocks, each one file of a MYP package, with boundary
//! delimiters and statics inlined after their tile.
//!
//! [`import_map`] reads the map dimensions from the package, then rewrites it
//! with a [`MapTranscoder`] that synthesizes every macro block.
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use uop_map::{LegacyPaths, LegacySources, RemapTable, import_map};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let paths = LegacyPaths {
//!     map: "map0.mul".into(),
//!     index: "staidx0.mul".into(),
//!     statics: "statics0.mul".into(),
//!     radar: "radarcol.mul".into(),
//! };
//! let mut sources = LegacySources::open(&paths, false)?;
//! let remap = RemapTable::open("remap.json")?;
//!
//! let mut reader = BufReader::new(File::open("facet0.old.uop")?);
//! let mut writer = File::create("facet0.uop")?;
//! let summary = import_map(&mut reader, &mut writer, &mut sources, &remap, |p| {
//!     println!("{p}%");
//! })?;
//! println!("{} macro blocks", summary.macro_blocks);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod coords;
mod error;
mod import;
pub mod legacy;
pub mod metadata;
pub mod remap;
pub mod transcoder;

pub use error::{MapError, MapResult};
pub use import::{MapImportSummary, import_map};
pub use legacy::{LegacyPaths, LegacySources, MulStream};
pub use metadata::MapMetadata;
pub use remap::{RemapEntry, RemapTable};
pub use transcoder::{Direction, FILES_PER_MAP_BLOCK, MapTranscoder};
