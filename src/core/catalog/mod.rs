//! File table
//!
//! Flat, name-keyed set of files. Every block a file owns is obtained from and
//! returned to the [`BlockMap`].

pub mod metadata;

pub use metadata::FileEntry;

use crate::allocator::{BlockKind, BlockMap};
use crate::codec::NAME_FIELD_LEN;
use crate::error::{FatError, Result};
use std::collections::BTreeMap;

/// Default upper bound on file name length in bytes
pub const DEFAULT_MAX_NAME_LEN: usize = NAME_FIELD_LEN;

/// Reject name limits the on-disk name field cannot hold
pub fn check_max_name_len(max_name_len: usize) -> Result<()> {
    if max_name_len == 0 || max_name_len > NAME_FIELD_LEN {
        return Err(FatError::InvalidConfig(format!(
            "name length limit {} is outside 1..={}",
            max_name_len, NAME_FIELD_LEN
        )));
    }
    Ok(())
}

/// File table
#[derive(Debug, Clone)]
pub struct Catalog {
    files: BTreeMap<String, FileEntry>,
    max_name_len: usize,
}

impl Catalog {
    pub fn new(max_name_len: usize) -> Self {
        Catalog {
            files: BTreeMap::new(),
            max_name_len,
        }
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    fn validate_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.contains('\0') {
            return Err(FatError::InvalidName(name.to_string()));
        }

        if name.len() > self.max_name_len {
            return Err(FatError::NameTooLong {
                len: name.len(),
                max: self.max_name_len,
            });
        }

        Ok(())
    }

    /// Create an empty file, reserving its metadata block
    pub fn create(&mut self, name: &str, blocks: &mut BlockMap) -> Result<&mut FileEntry> {
        if self.files.contains_key(name) {
            return Err(FatError::AlreadyExists(name.to_string()));
        }
        self.validate_name(name)?;

        let metadata_block = blocks.allocate(BlockKind::FileEntry)?;
        tracing::debug!("Created file '{}' with metadata block {}", name, metadata_block);

        Ok(self
            .files
            .entry(name.to_string())
            .or_insert(FileEntry::new(name, metadata_block)))
    }

    /// Register a file reconstructed from an image
    pub(crate) fn insert_loaded(&mut self, file: FileEntry) -> Result<()> {
        if self.files.contains_key(&file.name) {
            return Err(FatError::CorruptImage(format!(
                "duplicate file name '{}'",
                file.name
            )));
        }
        self.files.insert(file.name.clone(), file);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&FileEntry> {
        self.files.get(name)
    }

    pub(crate) fn find_mut(&mut self, name: &str) -> Option<&mut FileEntry> {
        self.files.get_mut(name)
    }

    /// Delete a file and release its chain
    ///
    /// Data blocks are freed before the metadata block.
    pub fn delete(&mut self, name: &str, blocks: &mut BlockMap) -> Result<FileEntry> {
        let file = self
            .files
            .get(name)
            .ok_or_else(|| FatError::NotFound(name.to_string()))?;

        if file.is_open() {
            return Err(FatError::FileInUse(name.to_string()));
        }

        let file = self
            .files
            .remove(name)
            .ok_or_else(|| FatError::NotFound(name.to_string()))?;

        for &block_id in file.data_blocks() {
            blocks.free(block_id)?;
        }
        blocks.free(file.metadata_block_id())?;

        tracing::debug!(
            "Deleted file '{}', released {} blocks",
            name,
            file.block_ids.len()
        );
        Ok(file)
    }

    pub fn size_of(&self, name: &str) -> Result<u64> {
        self.files
            .get(name)
            .map(|f| f.size)
            .ok_or_else(|| FatError::NotFound(name.to_string()))
    }

    /// File names in sorted order
    pub fn list(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NAME_LEN)
    }
}
