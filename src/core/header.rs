use crate::codec::record_len;
use crate::error::{FatError, Result};

/// Size of the fixed header at the start of block 0
pub const HEADER_SIZE: usize = 8;

/// Smallest block size accepted for an image: one file record holding its
/// metadata block id and a full-width name
pub const MIN_BLOCK_SIZE: u32 = record_len(1) as u32;

/// Block 0 plus at least one block for files
pub const MIN_BLOCK_COUNT: u32 = 2;

/// Filesystem header (start of block 0)
///
/// Records the geometry the image was created with. The block map follows
/// immediately after, one tag byte per block, and must also fit inside
/// block 0.
///
/// ```text
/// offset 0: block_count (u32 LE)
/// offset 4: block_size  (u32 LE)
/// offset 8: block_map[0..block_count)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Total number of blocks in the image
    pub block_count: u32,

    /// Block size in bytes
    pub block_size: u32,
}

impl Header {
    pub fn new(block_size: u32, block_count: u32) -> Self {
        Header {
            block_count,
            block_size,
        }
    }

    /// Validate the geometry
    pub fn validate(&self) -> Result<()> {
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(FatError::InvalidConfig(format!(
                "block size {} is below the minimum of {}",
                self.block_size, MIN_BLOCK_SIZE
            )));
        }

        if self.block_count < MIN_BLOCK_COUNT {
            return Err(FatError::InvalidConfig(format!(
                "block count {} is below the minimum of {}",
                self.block_count, MIN_BLOCK_COUNT
            )));
        }

        // File sizes are stored as u32
        if self.image_len() > u32::MAX as u64 {
            return Err(FatError::InvalidConfig(format!(
                "image of {} bytes exceeds the 4 GiB limit",
                self.image_len()
            )));
        }

        // Header and block map share block 0
        let needed = HEADER_SIZE as u64 + self.block_count as u64;
        if needed > self.block_size as u64 {
            return Err(FatError::InvalidConfig(format!(
                "block map for {} blocks needs {} bytes but block 0 holds {}",
                self.block_count, needed, self.block_size
            )));
        }

        Ok(())
    }

    /// Total image size in bytes
    pub fn image_len(&self) -> u64 {
        self.block_size as u64 * self.block_count as u64
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.block_count.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.block_size.to_le_bytes());
        bytes
    }

    /// Deserialize and validate a header read from an image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FatError::CorruptImage(format!(
                "header needs {} bytes, image has {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let header = Header {
            block_count: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            block_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        };

        header.validate().map_err(|e| match e {
            FatError::InvalidConfig(msg) => FatError::CorruptImage(msg),
            other => other,
        })?;

        Ok(header)
    }
}
