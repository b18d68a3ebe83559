use crate::handle::HandleId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FatError {
    #[error("Out of space: no free blocks available")]
    OutOfSpace,

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Handle is not open: {0}")]
    NotOpen(HandleId),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("File name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("File already has an open write handle: {0}")]
    WriteConflict(String),

    #[error("File has open handles: {0}")]
    FileInUse(String),

    #[error("Seek out of range: position {requested} outside 0..={size}")]
    OutOfRange { requested: i64, size: u64 },

    #[error("Handle was not opened for writing")]
    NotWritable,

    #[error("Handle position is past the end of the file")]
    NotReadable,

    #[error("Invalid block ID: {0}")]
    InvalidBlockId(u32),

    #[error("Metadata for '{name}' needs {needed} bytes but a block holds {block_size}")]
    MetadataOverflow {
        name: String,
        needed: usize,
        block_size: u32,
    },

    #[error("Invalid filesystem configuration: {0}")]
    InvalidConfig(String),

    #[error("Corrupt filesystem image: {0}")]
    CorruptImage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FatError>;
