//! Backing storage for filesystem images
//!
//! [`Storage`] is the byte-addressable medium (a host file or a memory
//! buffer). [`BlockStore`] layers fixed-size block addressing on top of it.

use crate::error::{FatError, Result};
use crate::header::Header;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Linear byte medium holding a filesystem image
pub trait Storage {
    /// Fill `buf` with the bytes starting at `offset`
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write all of `data` starting at `offset`
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Current length of the medium in bytes
    fn byte_len(&mut self) -> Result<u64>;

    /// Grow or shrink the medium
    fn set_byte_len(&mut self, len: u64) -> Result<()>;

    /// Flush buffered writes to durable storage
    fn sync(&mut self) -> Result<()>;
}

/// Disk-backed filesystem image
#[derive(Debug)]
pub struct DiskImage {
    file: File,
    path: PathBuf,
}

impl DiskImage {
    /// Create (or truncate) an image file of exactly `len` bytes
    pub fn create<P: AsRef<Path>>(path: P, len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(len)?;

        Ok(DiskImage {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open an existing image file for reading and writing
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        Ok(DiskImage {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for DiskImage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn byte_len(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_byte_len(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// In-memory filesystem image
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    bytes: Vec<u8>,
}

impl MemoryImage {
    /// Zero-filled image of `len` bytes
    pub fn new(len: usize) -> Self {
        MemoryImage {
            bytes: vec![0u8; len],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        MemoryImage { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Storage for MemoryImage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start.checked_add(buf.len()).filter(|&end| end <= self.bytes.len());
        match end {
            Some(end) => {
                buf.copy_from_slice(&self.bytes[start..end]);
                Ok(())
            }
            None => Err(FatError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read past end of memory image",
            ))),
        }
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn byte_len(&mut self) -> Result<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn set_byte_len(&mut self, len: u64) -> Result<()> {
        self.bytes.resize(len as usize, 0);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Fixed-size block access over a [`Storage`]
#[derive(Debug)]
pub struct BlockStore<S> {
    storage: S,
    block_size: u32,
    block_count: u32,
}

impl<S: Storage> BlockStore<S> {
    pub fn new(storage: S, header: &Header) -> Self {
        BlockStore {
            storage,
            block_size: header.block_size,
            block_count: header.block_count,
        }
    }

    /// Byte offset of `offset` inside `block_id`, after bounds checks
    fn locate(&self, block_id: u32, offset: usize, len: usize) -> Result<u64> {
        if block_id >= self.block_count {
            return Err(FatError::InvalidBlockId(block_id));
        }

        if offset + len > self.block_size as usize {
            return Err(FatError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "{} bytes at offset {} overrun block of {} bytes",
                    len, offset, self.block_size
                ),
            )));
        }

        Ok(block_id as u64 * self.block_size as u64 + offset as u64)
    }

    /// Read `buf.len()` bytes from inside one block
    pub fn read_in_block(&mut self, block_id: u32, offset: usize, buf: &mut [u8]) -> Result<()> {
        let position = self.locate(block_id, offset, buf.len())?;
        self.storage.read_at(position, buf)
    }

    /// Write `data` inside one block
    pub fn write_in_block(&mut self, block_id: u32, offset: usize, data: &[u8]) -> Result<()> {
        let position = self.locate(block_id, offset, data.len())?;
        self.storage.write_at(position, data)
    }

    /// Read a whole block
    pub fn read_block(&mut self, block_id: u32) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; self.block_size as usize];
        self.read_in_block(block_id, 0, &mut buffer)?;
        Ok(buffer)
    }

    /// Overwrite a whole block, zero-padding short data
    pub fn write_block(&mut self, block_id: u32, data: &[u8]) -> Result<()> {
        if data.len() > self.block_size as usize {
            return Err(FatError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "block data must be at most {} bytes, got {}",
                    self.block_size,
                    data.len()
                ),
            )));
        }

        let mut buffer = vec![0u8; self.block_size as usize];
        buffer[..data.len()].copy_from_slice(data);
        self.write_in_block(block_id, 0, &buffer)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.storage.sync()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_disk_image_create_sizes_file() {
        let temp = NamedTempFile::new().unwrap();
        let mut image = DiskImage::create(temp.path(), 4096).unwrap();
        assert_eq!(image.byte_len().unwrap(), 4096);
        assert_eq!(image.path(), temp.path());
    }

    #[test]
    fn test_disk_image_write_and_reopen() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();

        {
            let mut image = DiskImage::create(&path, 1024).unwrap();
            image.write_at(100, b"Hello").unwrap();
            image.sync().unwrap();
        }

        let mut image = DiskImage::open(&path).unwrap();
        let mut buf = [0u8; 5];
        image.read_at(100, &mut buf).unwrap();
        assert_eq!(&buf, b"Hello");
    }

    #[test]
    fn test_binary_data_with_nul_bytes() {
        let mut image = MemoryImage::new(64);
        let data = [1u8, 0, 2, 0, 0, 3];
        image.write_at(10, &data).unwrap();

        let mut buf = [0xFFu8; 6];
        image.read_at(10, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_memory_image_read_past_end() {
        let mut image = MemoryImage::new(16);
        let mut buf = [0u8; 8];
        assert!(matches!(image.read_at(12, &mut buf), Err(FatError::Io(_))));
    }

    #[test]
    fn test_block_store_addressing() {
        let header = Header::new(32, 4);
        let mut store = BlockStore::new(MemoryImage::new(128), &header);

        store.write_in_block(2, 4, b"abc").unwrap();
        assert_eq!(&store.storage().as_bytes()[68..71], b"abc");

        let mut buf = [0u8; 3];
        store.read_in_block(2, 4, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn test_block_store_rejects_overrun() {
        let header = Header::new(32, 4);
        let mut store = BlockStore::new(MemoryImage::new(128), &header);

        assert!(store.write_in_block(1, 30, b"abc").is_err());
        assert!(matches!(
            store.write_in_block(4, 0, b"a"),
            Err(FatError::InvalidBlockId(4))
        ));
    }

    #[test]
    fn test_write_block_pads_with_zeros() {
        let header = Header::new(16, 2);
        let mut store = BlockStore::new(MemoryImage::from_bytes(vec![0xAA; 32]), &header);

        store.write_block(1, b"xy").unwrap();
        let block = store.read_block(1).unwrap();
        assert_eq!(&block[..2], b"xy");
        assert!(block[2..].iter().all(|&b| b == 0));
    }
}
