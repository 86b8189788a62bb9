//! End-to-end map imports on synthetic packages
//!
//! Each test builds a map package the way the client ships it (metadata in
//! files 0 and 1 of block 0, one compressed file per macro block) together
//! with legacy sources, then runs a full import and reads the result back.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::io::Cursor;

use pretty_assertions::assert_eq;
use uop_formats::package::{Package, PackageBuilder, PackageFile, PackageResult};
use uop_map::coords::{coordinates_to_legacy_block, legacy_tile_offset};
use uop_map::{LegacySources, MapError, RemapEntry, RemapTable, import_map};

/// Map package whose metadata describes `width`x`height` and which holds
/// `macro_blocks` placeholder files after it
fn map_package(width: i32, height: i32, facet: u8, macro_blocks: usize) -> Vec<u8> {
    let mut dimensions = height.to_le_bytes().to_vec();
    dimensions.extend_from_slice(&width.to_le_bytes());

    let mut builder = PackageBuilder::new(100)
        .add_file(PackageFile::new(0xD1, dimensions).with_data_header(vec![0xEE; 6]))
        .add_file(PackageFile::new(0xD2, vec![facet]));
    // File 1 doubles as macro block 0
    for i in 1..macro_blocks {
        builder = builder.add_file(PackageFile::new(0x100 + i as u64, vec![0xCC; 32]).compressed());
    }

    let mut out = Cursor::new(Vec::new());
    builder.build(&mut out).unwrap();
    out.into_inner()
}

/// Legacy grid where every tile has id `tile` and altitude `altitude`
fn uniform_grid(width: u32, height: u32, tile: u16, altitude: i8) -> Vec<u8> {
    let blocks = (width / 8) * (height / 8);
    let mut map = vec![0u8; blocks as usize * 196];
    for x in 0..width {
        for y in 0..height {
            let (block, index) = coordinates_to_legacy_block(x, y, height);
            let offset = legacy_tile_offset(block, index) as usize;
            map[offset..offset + 2].copy_from_slice(&tile.to_le_bytes());
            map[offset + 2] = altitude as u8;
        }
    }
    map
}

fn payloads(data: Vec<u8>) -> Vec<Vec<u8>> {
    let mut reader = Cursor::new(data);
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
fn single_block_map() {
    let source = map_package(64, 64, 0, 1);
    let mut sources =
        LegacySources::from_bytes(uniform_grid(64, 64, 3, 5), Vec::new(), Vec::new(), Vec::new())
            .unwrap();
    let remap: RemapTable = [RemapEntry {
        tile: 3,
        graphic: 1003,
        flag: 0,
    }]
    .into_iter()
    .collect();

    let mut progress = Vec::new();
    let mut reader = Cursor::new(source.clone());
    let mut writer = Cursor::new(Vec::new());
    let summary = import_map(&mut reader, &mut writer, &mut sources, &remap, |p| {
        progress.push(p);
    })
    .unwrap();

    assert_eq!(summary.macro_blocks, 1);
    assert_eq!(summary.metadata.facet, 0);
    assert_eq!(progress, vec![100]);

    let output = writer.into_inner();
    let files = payloads(output.clone());
    assert_eq!(files[0], payloads(source.clone())[0]);

    let block = &files[1];
    assert_eq!(block.len(), 9 + 4095 * 8 + 2);
    assert_eq!(&block[..9], &[0, 0, 0, 5, 0xEB, 0x03, 0, 3, 0]);
    assert_eq!(&block[9..17], &[0, 0, 5, 0xEB, 0x03, 0, 3, 0]);
    assert_eq!(&block[block.len() - 2..], &[0, 0]);

    // The metadata file keeps its data header
    let mut reader = Cursor::new(output);
    let mut package = Package::open(&mut reader).unwrap();
    let first = package.blocks(&mut reader).next().unwrap().unwrap();
    let entry = package.files(&mut reader, first).next().unwrap().unwrap();
    assert_eq!(entry.read_header(&mut reader).unwrap(), vec![0xEE; 6]);
}

#[test]
fn two_block_map_with_delimiters() {
    let source = map_package(128, 64, 1, 2);
    let mut sources =
        LegacySources::from_bytes(uniform_grid(128, 64, 7, -2), Vec::new(), Vec::new(), Vec::new())
            .unwrap();

    let mut progress = Vec::new();
    let mut reader = Cursor::new(source);
    let mut writer = Cursor::new(Vec::new());
    let summary = import_map(
        &mut reader,
        &mut writer,
        &mut sources,
        &RemapTable::new(),
        |p| progress.push(p),
    )
    .unwrap();

    assert_eq!(summary.macro_blocks, 2);
    assert_eq!(progress, vec![50, 100]);

    let files = payloads(writer.into_inner());
    // Each block has one shared 64-tile column edge with one delimiter per tile
    for block in &files[1..] {
        assert_eq!(block.len(), 9 + 4095 * 8 + 64 * 6 + 2);
    }

    // Second block starts with facet and macro block id 1
    assert_eq!(&files[2][..3], &[1, 1, 0]);
    // Its first tile (64, 0) has W, NW and N applicable; only the west
    // neighbor (63, 0) exists and its record carries the count of all three
    assert_eq!(&files[2][9..15], &[3, 0, 0xFE, 0, 0, 0]);
}

#[test]
fn short_legacy_grid_keeps_remaining_files() {
    // Metadata claims two macro blocks, the legacy grid only covers one
    let source = map_package(128, 64, 0, 2);
    let mut sources =
        LegacySources::from_bytes(uniform_grid(64, 64, 1, 0), Vec::new(), Vec::new(), Vec::new())
            .unwrap();

    let mut reader = Cursor::new(source.clone());
    let mut writer = Cursor::new(Vec::new());
    let summary =
        import_map(&mut reader, &mut writer, &mut sources, &RemapTable::new(), |_| {}).unwrap();

    assert_eq!(summary.macro_blocks, 1);
    assert_eq!(summary.rewrite.replaced, 1);

    let files = payloads(writer.into_inner());
    assert_eq!(files[2], vec![0xCC; 32]);
    assert_eq!(files[2], payloads(source)[2]);
}

#[test]
fn invalid_dimensions_abort_before_writing() {
    let source = map_package(64, 100, 0, 1);
    let mut sources =
        LegacySources::from_bytes(Vec::new(), Vec::new(), Vec::new(), Vec::new()).unwrap();

    let mut reader = Cursor::new(source);
    let mut writer = Cursor::new(Vec::new());
    let err = import_map(&mut reader, &mut writer, &mut sources, &RemapTable::new(), |_| {})
        .unwrap_err();

    assert!(matches!(err, MapError::InvalidDimensions { .. }));
    assert!(writer.into_inner().is_empty());
}
