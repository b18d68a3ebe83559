//! File metadata structures

use crate::allocator::BlockId;
use crate::handle::HandleId;
use serde::Serialize;
use std::collections::BTreeSet;

/// A file in the file table
///
/// `block_ids[0]` is the file's metadata block; the rest are data blocks in
/// logical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Unique file name
    pub name: String,

    /// Bytes written so far
    pub size: u64,

    /// Metadata block followed by data blocks
    pub block_ids: Vec<BlockId>,

    /// Handles currently open on this file
    #[serde(skip)]
    pub open_handles: BTreeSet<HandleId>,

    /// The single write handle, if one is open
    #[serde(skip)]
    pub writer: Option<HandleId>,
}

impl FileEntry {
    /// Create an empty file whose chain holds only its metadata block
    pub fn new(name: impl Into<String>, metadata_block_id: BlockId) -> Self {
        FileEntry {
            name: name.into(),
            size: 0,
            block_ids: vec![metadata_block_id],
            open_handles: BTreeSet::new(),
            writer: None,
        }
    }

    pub fn metadata_block_id(&self) -> BlockId {
        self.block_ids[0]
    }

    /// Data blocks in logical order
    pub fn data_blocks(&self) -> &[BlockId] {
        &self.block_ids[1..]
    }

    /// Bytes the current chain can hold
    pub fn capacity(&self, block_size: u32) -> u64 {
        self.data_blocks().len() as u64 * block_size as u64
    }

    pub fn is_open(&self) -> bool {
        !self.open_handles.is_empty()
    }
}
