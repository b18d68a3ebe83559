//! Block allocation table
//!
//! One [`BlockKind`] tag per block. Allocation is deterministic first-fit so
//! the same sequence of operations always yields the same layout.

use crate::error::{FatError, Result};
use serde::{Deserialize, Serialize};

/// Index of a block in the image
pub type BlockId = u32;

/// Allocation state of a block
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Free block
    Empty = 0,
    /// Filesystem header and block map (always block 0)
    Metadata = 1,
    /// Per-file metadata record
    FileEntry = 2,
    /// File content
    FileData = 3,
}

impl BlockKind {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(BlockKind::Empty),
            1 => Ok(BlockKind::Metadata),
            2 => Ok(BlockKind::FileEntry),
            3 => Ok(BlockKind::FileData),
            _ => Err(FatError::CorruptImage(format!(
                "unknown block tag {}",
                value
            ))),
        }
    }
}

/// Block map allocator
///
/// Block 0 is reserved as [`BlockKind::Metadata`] for the lifetime of the
/// map and can never be freed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockMap {
    /// Tag per block, indexed by block ID
    kinds: Vec<BlockKind>,

    /// Number of Empty entries
    free_blocks: usize,
}

impl BlockMap {
    /// Create a map with every block free except block 0
    pub fn new(block_count: u32) -> Self {
        let mut kinds = vec![BlockKind::Empty; block_count as usize];
        if let Some(first) = kinds.first_mut() {
            *first = BlockKind::Metadata;
        }
        let free_blocks = kinds.iter().filter(|&&k| k == BlockKind::Empty).count();

        BlockMap { kinds, free_blocks }
    }

    /// Rebuild a map from stored tags
    pub fn from_kinds(kinds: Vec<BlockKind>) -> Result<Self> {
        if kinds.first() != Some(&BlockKind::Metadata) {
            return Err(FatError::CorruptImage(
                "block 0 is not tagged as filesystem metadata".to_string(),
            ));
        }

        if let Some(pos) = kinds.iter().skip(1).position(|&k| k == BlockKind::Metadata) {
            return Err(FatError::CorruptImage(format!(
                "block {} is tagged as filesystem metadata",
                pos + 1
            )));
        }

        let free_blocks = kinds.iter().filter(|&&k| k == BlockKind::Empty).count();
        Ok(BlockMap { kinds, free_blocks })
    }

    /// First Empty block, if any
    pub fn find_free_block(&self) -> Option<BlockId> {
        self.kinds
            .iter()
            .position(|&k| k == BlockKind::Empty)
            .map(|idx| idx as BlockId)
    }

    /// Reserve the first Empty block as `kind`
    pub fn allocate(&mut self, kind: BlockKind) -> Result<BlockId> {
        let block_id = self.find_free_block().ok_or(FatError::OutOfSpace)?;
        self.kinds[block_id as usize] = kind;
        self.free_blocks -= 1;

        tracing::trace!("Allocated block {} as {:?}", block_id, kind);
        Ok(block_id)
    }

    /// Mark a block Empty
    ///
    /// The caller must already have removed the block from any file chain.
    pub fn free(&mut self, block_id: BlockId) -> Result<()> {
        if block_id == 0 || block_id as usize >= self.kinds.len() {
            return Err(FatError::InvalidBlockId(block_id));
        }

        let slot = &mut self.kinds[block_id as usize];
        if *slot == BlockKind::Empty {
            tracing::warn!("Double-free detected for block {}", block_id);
            return Ok(());
        }

        *slot = BlockKind::Empty;
        self.free_blocks += 1;
        Ok(())
    }

    pub fn kind(&self, block_id: BlockId) -> Option<BlockKind> {
        self.kinds.get(block_id as usize).copied()
    }

    /// Total number of blocks tracked
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Number of Empty blocks
    pub fn free_blocks(&self) -> usize {
        self.free_blocks
    }

    pub fn used_blocks(&self) -> usize {
        self.kinds.len() - self.free_blocks
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, BlockKind)> + '_ {
        self.kinds
            .iter()
            .enumerate()
            .map(|(idx, &kind)| (idx as BlockId, kind))
    }

    pub fn as_slice(&self) -> &[BlockKind] {
        &self.kinds
    }

    /// Tags as stored on disk, one byte per block
    pub fn to_bytes(&self) -> Vec<u8> {
        self.kinds.iter().map(|&k| k as u8).collect()
    }

    /// Parse on-disk tags
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let kinds = bytes
            .iter()
            .map(|&b| BlockKind::from_u8(b))
            .collect::<Result<Vec<_>>>()?;
        Self::from_kinds(kinds)
    }
}
