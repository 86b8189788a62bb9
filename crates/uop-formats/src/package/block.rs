//! Blocks of the file table chain

use super::header::{BLOCK_HEADER_SIZE, FILE_SLOT_SIZE};

/// One node of the block chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Zero-based position in the chain
    pub id: usize,
    /// Absolute offset of the 12-byte block header
    pub header_offset: u64,
    /// Files stored in the block
    pub file_count: u32,
    /// Absolute offset of the next block header, 0 for the last block
    pub next_block_offset: u64,
}

impl Block {
    /// Absolute offset of the file table
    pub fn table_offset(&self) -> u64 {
        self.header_offset + BLOCK_HEADER_SIZE
    }

    /// Absolute offset of the slot for `file_id`
    pub fn slot_offset(&self, file_id: usize) -> u64 {
        self.table_offset() + file_id as u64 * FILE_SLOT_SIZE
    }

    /// Offset where file data begins, right after the reserved table
    pub fn data_offset(&self, max_files_per_block: u32) -> u64 {
        self.table_offset() + u64::from(max_files_per_block) * FILE_SLOT_SIZE
    }

    /// Whether this block terminates the chain
    pub fn is_last(&self) -> bool {
        self.next_block_offset == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_geometry() {
        let block = Block {
            id: 0,
            header_offset: 0x200,
            file_count: 2,
            next_block_offset: 0,
        };

        assert_eq!(block.table_offset(), 0x20C);
        assert_eq!(block.slot_offset(1), 0x20C + 34);
        assert_eq!(block.data_offset(100), 0x20C + 3400);
        assert!(block.is_last());
    }
}
