//! Read-only export of filesystem state
//!
//! A snapshot copies geometry, the block map, every file chain and every open
//! handle at one instant. Rendering is left to the caller; [`FsSnapshot::to_json`]
//! covers the common case.

use crate::allocator::{BlockId, BlockKind};
use crate::error::Result;
use crate::handle::{HandleId, OpenMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsSnapshot {
    pub block_size: u32,
    pub block_count: u32,
    pub free_blocks: usize,
    pub block_map: Vec<BlockKind>,
    /// Files in name order
    pub files: Vec<FileSnapshot>,
    /// Open handles in the order they were opened
    pub handles: Vec<HandleSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub name: String,
    pub size: u64,
    pub block_ids: Vec<BlockId>,
    pub open_handles: Vec<HandleId>,
    pub writer: Option<HandleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleSnapshot {
    pub id: HandleId,
    pub file: String,
    pub position: u64,
    pub mode: OpenMode,
}

impl FsSnapshot {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn file(&self, name: &str) -> Option<&FileSnapshot> {
        self.files.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let snapshot = FsSnapshot {
            block_size: 32,
            block_count: 4,
            free_blocks: 1,
            block_map: vec![
                BlockKind::Metadata,
                BlockKind::FileEntry,
                BlockKind::FileData,
                BlockKind::Empty,
            ],
            files: vec![FileSnapshot {
                name: "log".to_string(),
                size: 5,
                block_ids: vec![1, 2],
                open_handles: vec![HandleId(3)],
                writer: Some(HandleId(3)),
            }],
            handles: vec![HandleSnapshot {
                id: HandleId(3),
                file: "log".to_string(),
                position: 5,
                mode: OpenMode::Write,
            }],
        };

        let json = snapshot.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["block_map"][2], "FileData");
        assert_eq!(value["files"][0]["block_ids"], serde_json::json!([1, 2]));
        assert_eq!(value["handles"][0]["mode"], "Write");

        let parsed: FsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
        assert!(parsed.file("log").is_some());
        assert!(parsed.file("missing").is_none());
    }
}
