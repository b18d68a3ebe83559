//! Filesystem configuration
//!
//! Geometry and limits, loadable from TOML:
//!
//! ```toml
//! block_size = 512
//! block_count = 256
//! max_name_len = 32
//! path = "disk.img"
//! ```

use crate::catalog::{check_max_name_len, DEFAULT_MAX_NAME_LEN};
use crate::error::{FatError, Result};
use crate::header::Header;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use validator::Validate;

pub const DEFAULT_BLOCK_SIZE: u32 = 512;
pub const DEFAULT_BLOCK_COUNT: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct FsConfig {
    #[serde(default = "default_block_size")]
    #[validate(range(min = 48))]
    pub block_size: u32,

    #[serde(default = "default_block_count")]
    #[validate(range(min = 2))]
    pub block_count: u32,

    #[serde(default = "default_max_name_len")]
    #[validate(range(min = 1, max = 32))]
    pub max_name_len: usize,

    /// Image location; required only for disk-backed filesystems
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

fn default_block_count() -> u32 {
    DEFAULT_BLOCK_COUNT
}

fn default_max_name_len() -> usize {
    DEFAULT_MAX_NAME_LEN
}

impl Default for FsConfig {
    fn default() -> Self {
        FsConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            path: None,
        }
    }
}

impl FsConfig {
    /// Parse and check a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: FsConfig = toml::from_str(source)?;
        config.check()?;
        Ok(config)
    }

    /// Parse and check a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded config from {}", path.as_ref().display());
        Self::from_toml_str(&source)
    }

    /// Field ranges plus the geometry rules of [`Header::validate`]
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| FatError::InvalidConfig(e.to_string()))?;
        check_max_name_len(self.max_name_len)?;
        self.header().validate()
    }

    pub fn header(&self) -> Header {
        Header::new(self.block_size, self.block_count)
    }
}
