//! Open file handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of an open handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub(crate) u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Access mode of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    Read,
    /// Append mode: the cursor starts at the end of the file
    Write,
}

impl OpenMode {
    pub fn is_write(&self) -> bool {
        matches!(self, OpenMode::Write)
    }
}

/// Cursor bound to one file
///
/// Refers to its file by name; the filesystem resolves it through the file
/// table on every call, so a handle never aliases file state directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenHandle {
    /// Name of the file this handle is bound to
    pub file: String,

    /// Logical byte offset, `0 <= position <= file.size`
    pub position: u64,

    pub mode: OpenMode,
}

impl OpenHandle {
    pub fn new(file: impl Into<String>, position: u64, mode: OpenMode) -> Self {
        OpenHandle {
            file: file.into(),
            position,
            mode,
        }
    }
}

/// Split a logical position into (data block index, byte offset in block)
///
/// The index counts data blocks only; the file's metadata block is excluded.
pub fn locate(position: u64, block_size: u32) -> (usize, usize) {
    let block_size = block_size as u64;
    ((position / block_size) as usize, (position % block_size) as usize)
}
