//! Coordinate mapping between the two map layouts
//!
//! Both layouts are column-major: blocks run down a column of the map before
//! moving to the next one. The packaged layout uses 64x64 macro blocks whose
//! positions are also column-major. The legacy layout uses 8x8 sub-blocks
//! whose cells are row-major.
//!
//! Every function takes the map height, which must be a positive multiple
//! of 64.

/// Edge length of a macro block in tiles
pub const MACRO_BLOCK_SIZE: u32 = 64;

/// Tiles in one macro block
pub const TILES_PER_MACRO_BLOCK: u32 = MACRO_BLOCK_SIZE * MACRO_BLOCK_SIZE;

/// Edge length of a legacy sub-block in tiles
pub const LEGACY_BLOCK_SIZE: u32 = 8;

/// Bytes of header before the cells of a legacy sub-block
pub const LEGACY_BLOCK_HEADER_SIZE: u64 = 4;

/// Bytes per legacy cell: u16 tile id and i8 altitude
pub const LEGACY_TILE_SIZE: u64 = 3;

/// Map coordinates of position `index` of macro block `block`
pub fn macro_block_to_coordinates(block: u32, index: u32, height: u32) -> (u32, u32) {
    let block_height = height / MACRO_BLOCK_SIZE;
    let x = block / block_height * MACRO_BLOCK_SIZE + index / MACRO_BLOCK_SIZE;
    let y = block % block_height * MACRO_BLOCK_SIZE + index % MACRO_BLOCK_SIZE;
    (x, y)
}

/// Map coordinates of cell `index` of legacy sub-block `block`
pub fn legacy_block_to_coordinates(block: u32, index: u32, height: u32) -> (u32, u32) {
    let block_height = height / LEGACY_BLOCK_SIZE;
    let x = block / block_height * LEGACY_BLOCK_SIZE + index % LEGACY_BLOCK_SIZE;
    let y = block % block_height * LEGACY_BLOCK_SIZE + index / LEGACY_BLOCK_SIZE;
    (x, y)
}

/// Legacy sub-block and cell index holding map coordinates `(x, y)`
pub fn coordinates_to_legacy_block(x: u32, y: u32, height: u32) -> (u32, u32) {
    let block_height = height / LEGACY_BLOCK_SIZE;
    let block = x / LEGACY_BLOCK_SIZE * block_height + y / LEGACY_BLOCK_SIZE;
    let index = (y % LEGACY_BLOCK_SIZE) * LEGACY_BLOCK_SIZE + x % LEGACY_BLOCK_SIZE;
    (block, index)
}

/// Byte offset of a legacy cell in the tile grid stream
///
/// Each sub-block is a 4-byte header and 64 three-byte cells. The extra 4
/// bytes skip the header of the block being addressed.
pub fn legacy_tile_offset(block: u32, index: u32) -> u64 {
    let block = u64::from(block);
    block * LEGACY_BLOCK_HEADER_SIZE
        + LEGACY_BLOCK_HEADER_SIZE
        + block * u64::from(LEGACY_BLOCK_SIZE * LEGACY_BLOCK_SIZE) * LEGACY_TILE_SIZE
        + u64::from(index) * LEGACY_TILE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_macro_block_layout() {
        // 128 tall: two macro blocks per column
        assert_eq!(macro_block_to_coordinates(0, 0, 128), (0, 0));
        assert_eq!(macro_block_to_coordinates(0, 1, 128), (0, 1));
        assert_eq!(macro_block_to_coordinates(0, 64, 128), (1, 0));
        assert_eq!(macro_block_to_coordinates(1, 0, 128), (0, 64));
        assert_eq!(macro_block_to_coordinates(2, 4095, 128), (127, 63));
    }

    #[test]
    fn test_legacy_layout() {
        assert_eq!(coordinates_to_legacy_block(0, 0, 64), (0, 0));
        assert_eq!(coordinates_to_legacy_block(1, 0, 64), (0, 1));
        assert_eq!(coordinates_to_legacy_block(0, 1, 64), (0, 8));
        assert_eq!(coordinates_to_legacy_block(0, 8, 64), (1, 0));
        assert_eq!(coordinates_to_legacy_block(8, 0, 64), (8, 0));
        assert_eq!(legacy_block_to_coordinates(9, 10, 64), (10, 9));
    }

    #[test]
    fn test_legacy_tile_offset() {
        assert_eq!(legacy_tile_offset(0, 0), 4);
        assert_eq!(legacy_tile_offset(0, 63), 4 + 63 * 3);
        assert_eq!(legacy_tile_offset(1, 0), 196 + 4);
        assert_eq!(legacy_tile_offset(2, 5), 2 * 196 + 4 + 15);
    }

    #[test]
    fn test_macro_block_covers_each_tile_once() {
        let seen: HashSet<_> = (0..TILES_PER_MACRO_BLOCK)
            .map(|k| macro_block_to_coordinates(3, k, 128))
            .collect();
        assert_eq!(seen.len(), TILES_PER_MACRO_BLOCK as usize);
        assert!(seen.iter().all(|&(x, y)| (64..128).contains(&x) && (64..128).contains(&y)));
    }

    proptest! {
        /// Legacy block addressing is a bijection over the map
        #[test]
        fn legacy_inverse_law(
            columns in 1u32..64,
            rows in 1u32..64,
            fx in 0.0f64..1.0,
            fy in 0.0f64..1.0,
        ) {
            let height = rows * MACRO_BLOCK_SIZE;
            let width = columns * MACRO_BLOCK_SIZE;
            let x = (fx * f64::from(width)) as u32;
            let y = (fy * f64::from(height)) as u32;

            let (block, index) = coordinates_to_legacy_block(x, y, height);
            prop_assert!(index < LEGACY_BLOCK_SIZE * LEGACY_BLOCK_SIZE);
            prop_assert_eq!(legacy_block_to_coordinates(block, index, height), (x, y));
        }

        /// Macro block positions land inside the map
        #[test]
        fn macro_block_in_bounds(
            columns in 1u32..16,
            rows in 1u32..16,
            block_seed in any::<u32>(),
            index in 0u32..TILES_PER_MACRO_BLOCK,
        ) {
            let height = rows * MACRO_BLOCK_SIZE;
            let width = columns * MACRO_BLOCK_SIZE;
            let block = block_seed % (rows * columns);

            let (x, y) = macro_block_to_coordinates(block, index, height);
            prop_assert!(x < width && y < height);
        }
    }
}
