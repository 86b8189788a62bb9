//! Map dimensions and facet stored in a map package
//!
//! The first two files of the first block hold the metadata:
//! file 0 is `(i32 height, i32 width)`, file 1 starts with the facet id.

use std::io::{Read, Seek};

use tracing::debug;
use uop_formats::package::Package;
use uop_formats::PackageResult;

use crate::coords::{MACRO_BLOCK_SIZE, TILES_PER_MACRO_BLOCK};
use crate::error::{MapError, MapResult};

/// Dimensions and facet of a map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapMetadata {
    /// Width in tiles
    pub width: u32,
    /// Height in tiles, a multiple of 64
    pub height: u32,
    /// Facet id
    pub facet: u8,
}

impl MapMetadata {
    /// Validate dimensions as stored on disk
    pub fn new(width: i32, height: i32, facet: u8) -> MapResult<Self> {
        let invalid = |reason| MapError::InvalidDimensions {
            width,
            height,
            reason,
        };

        if width <= 0 || height <= 0 {
            return Err(invalid("dimensions must be positive"));
        }
        if height as u32 % MACRO_BLOCK_SIZE != 0 {
            return Err(invalid("height must be a multiple of 64"));
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
            facet,
        })
    }

    /// Read the metadata files of a map package
    pub fn read<R: Read + Seek>(package: &mut Package, reader: &mut R) -> MapResult<Self> {
        let first = package
            .blocks(reader)
            .next()
            .ok_or_else(|| MapError::MissingMetadata {
                reason: "package has no blocks".to_string(),
            })??;

        let files = package
            .files(reader, first)
            .take(2)
            .collect::<PackageResult<Vec<_>>>()?;
        let [dimensions, facet] = files.as_slice() else {
            return Err(MapError::MissingMetadata {
                reason: format!("first block holds {} files, expected 2", files.len()),
            });
        };

        let dimensions = dimensions.read_payload(reader, false)?;
        let &[h0, h1, h2, h3, w0, w1, w2, w3, ..] = dimensions.as_slice() else {
            return Err(MapError::MissingMetadata {
                reason: format!("dimensions file holds {} bytes", dimensions.len()),
            });
        };

        let facet = facet.read_payload(reader, false)?;
        let Some(&facet) = facet.first() else {
            return Err(MapError::MissingMetadata {
                reason: "facet file is empty".to_string(),
            });
        };

        let metadata = Self::new(
            i32::from_le_bytes([w0, w1, w2, w3]),
            i32::from_le_bytes([h0, h1, h2, h3]),
            facet,
        )?;
        debug!(
            "Map facet {} is {}x{}",
            metadata.facet, metadata.width, metadata.height
        );
        Ok(metadata)
    }

    /// Number of 64x64 macro blocks covering the map
    pub fn macro_block_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) / u64::from(TILES_PER_MACRO_BLOCK)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use uop_formats::package::{PackageBuilder, PackageFile};

    fn package_with(files: Vec<PackageFile>) -> Cursor<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        let mut builder = PackageBuilder::new(100);
        for file in files {
            builder = builder.add_file(file);
        }
        builder.build(&mut out).unwrap();
        Cursor::new(out.into_inner())
    }

    fn dimensions(height: i32, width: i32) -> Vec<u8> {
        let mut out = height.to_le_bytes().to_vec();
        out.extend_from_slice(&width.to_le_bytes());
        out
    }

    #[test]
    fn test_read_metadata() {
        let mut reader = package_with(vec![
            PackageFile::new(1, dimensions(4096, 7168)).compressed(),
            PackageFile::new(2, vec![3, 0xFF]),
        ]);
        let mut package = Package::open(&mut reader).unwrap();

        let metadata = MapMetadata::read(&mut package, &mut reader).unwrap();
        assert_eq!(
            metadata,
            MapMetadata {
                width: 7168,
                height: 4096,
                facet: 3
            }
        );
        assert_eq!(metadata.macro_block_count(), 7168 * 4096 / 4096);
    }

    #[test]
    fn test_missing_facet_file() {
        let mut reader = package_with(vec![PackageFile::new(1, dimensions(64, 64))]);
        let mut package = Package::open(&mut reader).unwrap();
        assert!(matches!(
            MapMetadata::read(&mut package, &mut reader),
            Err(MapError::MissingMetadata { .. })
        ));
    }

    #[test]
    fn test_dimension_validation() {
        assert!(MapMetadata::new(64, 64, 0).is_ok());
        assert!(MapMetadata::new(0, 64, 0).is_err());
        assert!(MapMetadata::new(64, -64, 0).is_err());
        assert!(matches!(
            MapMetadata::new(64, 100, 0),
            Err(MapError::InvalidDimensions { height: 100, .. })
        ));
    }
}
