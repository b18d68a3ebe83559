//! # minifat - FAT-style virtual filesystem in a single file
//!
//! `minifat` stores a flat set of files inside one image file. The image is
//! divided into fixed-size blocks:
//!
//! - **Block map** recording whether each block is free, filesystem metadata,
//!   a file record, or file content
//! - **File table** of uniquely named files, each owning a chain of blocks
//! - **Handles** with independent cursors that stripe reads and writes across
//!   a file's non-contiguous chain
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use minifat::{create_filesystem, load_filesystem, OpenMode, Result};
//!
//! # fn main() -> Result<()> {
//! let mut fs = create_filesystem("disk.img", 512, 128)?;
//!
//! let h = fs.open("notes.txt", OpenMode::Write)?;
//! fs.write(h, b"Hello, World!")?;
//! fs.close_handle(h)?;
//! fs.close()?;
//!
//! let mut fs = load_filesystem("disk.img")?;
//! let h = fs.open("notes.txt", OpenMode::Read)?;
//! assert_eq!(fs.read(h, 64)?, b"Hello, World!");
//! # Ok(())
//! # }
//! ```
//!
//! ## Builder
//!
//! ```rust,no_run
//! use minifat::{FileSystemBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! let fs = FileSystemBuilder::new()
//!     .block_size(1024)
//!     .block_count(256)
//!     .max_name_len(32)
//!     .path("/data/disk.img")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core resolve
#[allow(unused_imports)]
pub(crate) use crate::core::{
    allocator, catalog, codec, config, error, filesystem, handle, header, io, snapshot,
};

pub use crate::core::{
    allocator::{BlockId, BlockKind, BlockMap},
    catalog::{FileEntry, DEFAULT_MAX_NAME_LEN},
    config::FsConfig,
    error::{FatError, Result},
    filesystem::{create_filesystem, load_filesystem, FileSystem, FsStats},
    handle::{HandleId, OpenMode},
    header::Header,
    io::{DiskImage, MemoryImage, Storage},
    shared::SharedFileSystem,
    snapshot::{FileSnapshot, FsSnapshot, HandleSnapshot},
};

use std::path::PathBuf;
use tracing::info;

/// Builder for customizing filesystem creation
///
/// Starts from [`FsConfig::default`]; every setting is checked when the
/// filesystem is built.
///
/// # Examples
///
/// ```rust,no_run
/// use minifat::{FileSystemBuilder, FsConfig};
///
/// # fn main() -> minifat::Result<()> {
/// let config = FsConfig::from_file("minifat.toml")?;
/// let fs = FileSystemBuilder::from_config(config).build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileSystemBuilder {
    config: FsConfig,
}

impl FileSystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: FsConfig) -> Self {
        FileSystemBuilder { config }
    }

    pub fn block_size(mut self, block_size: u32) -> Self {
        self.config.block_size = block_size;
        self
    }

    pub fn block_count(mut self, block_count: u32) -> Self {
        self.config.block_count = block_count;
        self
    }

    /// Longest accepted file name in bytes
    pub fn max_name_len(mut self, max_name_len: usize) -> Self {
        self.config.max_name_len = max_name_len;
        self
    }

    /// Image location, required by [`build`](Self::build) and [`open`](Self::open)
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.path = Some(path.into());
        self
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    fn require_path(&self) -> Result<PathBuf> {
        self.config
            .path
            .clone()
            .ok_or_else(|| FatError::InvalidConfig("path must be set".to_string()))
    }

    /// Create a new disk-backed filesystem, truncating any existing image
    pub fn build(self) -> Result<FileSystem> {
        self.config.check()?;
        let path = self.require_path()?;

        info!(
            "Building filesystem at {} ({} x {} bytes)",
            path.display(),
            self.config.block_count,
            self.config.block_size
        );
        FileSystem::create_with(path, self.config.header(), self.config.max_name_len)
    }

    /// Load an existing image with this builder's name limit
    ///
    /// Geometry always comes from the image header.
    pub fn open(self) -> Result<FileSystem> {
        let path = self.require_path()?;
        FileSystem::load_with(path, self.config.max_name_len)
    }

    /// Create a filesystem held entirely in memory
    pub fn build_in_memory(self) -> Result<FileSystem<MemoryImage>> {
        self.config.check()?;
        FileSystem::format(
            MemoryImage::default(),
            self.config.header(),
            self.config.max_name_len,
        )
    }

    /// Create a disk-backed filesystem wrapped for use across threads
    pub fn build_shared(self) -> Result<SharedFileSystem> {
        Ok(SharedFileSystem::new(self.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_and_reopens() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("built.img");

        let mut fs = FileSystemBuilder::new()
            .block_size(128)
            .block_count(32)
            .path(&path)
            .build()?;
        let h = fs.open("a.txt", OpenMode::Write)?;
        fs.write(h, b"built")?;
        fs.close()?;

        let mut fs = FileSystemBuilder::new().path(&path).open()?;
        assert_eq!(fs.header(), &Header::new(128, 32));
        let h = fs.open("a.txt", OpenMode::Read)?;
        assert_eq!(fs.read(h, 10)?, b"built");

        Ok(())
    }

    #[test]
    fn test_builder_requires_path() {
        assert!(matches!(
            FileSystemBuilder::new().build(),
            Err(FatError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_builder_rejects_bad_geometry() {
        let result = FileSystemBuilder::new()
            .block_size(32)
            .block_count(64)
            .build_in_memory();
        assert!(matches!(result, Err(FatError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_name_limit() -> Result<()> {
        let mut fs = FileSystemBuilder::new().max_name_len(4).build_in_memory()?;

        assert!(matches!(
            fs.create_file("too-long"),
            Err(FatError::NameTooLong { len: 8, max: 4 })
        ));
        fs.create_file("ok")?;
        assert_eq!(fs.max_name_len(), 4);

        Ok(())
    }

    #[test]
    fn test_builder_from_toml() -> Result<()> {
        let config = FsConfig::from_toml_str("block_size = 256\nblock_count = 100")?;
        let fs = FileSystemBuilder::from_config(config).build_in_memory()?;

        let stats = fs.stats();
        assert_eq!(stats.block_size, 256);
        assert_eq!(stats.block_count, 100);
        assert_eq!(stats.free_blocks, 99);

        Ok(())
    }

    #[test]
    fn test_builder_shared() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fs = FileSystemBuilder::new()
            .path(temp_dir.path().join("shared.img"))
            .build_shared()?;

        let other = fs.clone();
        other.create_file("from-clone")?;
        assert_eq!(fs.list_files(), vec!["from-clone".to_string()]);

        Ok(())
    }
}
