//! Whole-map import

use std::io::{Read, Seek, Write};

use tracing::info;
use uop_formats::package::{Package, RewriteSummary};

use crate::error::MapResult;
use crate::legacy::LegacySources;
use crate::metadata::MapMetadata;
use crate::remap::RemapTable;
use crate::transcoder::MapTranscoder;

/// Result of a map import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapImportSummary {
    /// Metadata read from the package
    pub metadata: MapMetadata,
    /// Macro blocks synthesized from the legacy sources
    pub macro_blocks: usize,
    /// Totals of the underlying rewrite
    pub rewrite: RewriteSummary,
}

/// Rewrite the map package in `reader` into `writer`, replacing every macro
/// block with one transcoded from `sources`
pub fn import_map<R, W>(
    reader: &mut R,
    writer: &mut W,
    sources: &mut LegacySources,
    remap: &RemapTable,
    progress: impl FnMut(u8) + Send,
) -> MapResult<MapImportSummary>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut package = Package::open(reader)?;
    let metadata = MapMetadata::read(&mut package, reader)?;
    info!(
        "Importing facet {} map of {}x{} ({} macro blocks)",
        metadata.facet,
        metadata.width,
        metadata.height,
        metadata.macro_block_count()
    );

    let mut transcoder = MapTranscoder::new(sources, remap, metadata).with_progress(progress);
    let rewrite = package.rewrite(reader, writer, &mut transcoder)?;
    let macro_blocks = transcoder.transcoded();

    info!("Imported {macro_blocks} macro blocks");
    Ok(MapImportSummary {
        metadata,
        macro_blocks,
        rewrite,
    })
}
