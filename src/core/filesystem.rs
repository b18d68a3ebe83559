//! Main filesystem API
//!
//! Ties the block map, the file table and the open-handle table to a block
//! store. Handles address file content through each file's chain: a logical
//! position maps to data block `position / block_size` and offset
//! `position % block_size`.

use crate::allocator::{BlockId, BlockKind, BlockMap};
use crate::catalog::{check_max_name_len, Catalog, FileEntry, DEFAULT_MAX_NAME_LEN};
use crate::codec;
use crate::error::{FatError, Result};
use crate::handle::{locate, HandleId, OpenHandle, OpenMode};
use crate::header::Header;
use crate::io::{BlockStore, DiskImage, Storage};
use crate::snapshot::{FileSnapshot, FsSnapshot, HandleSnapshot};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Virtual filesystem stored in a single image
#[derive(Debug)]
pub struct FileSystem<S: Storage = DiskImage> {
    /// Image geometry
    header: Header,

    /// Block allocation table
    blocks: BlockMap,

    /// File table
    catalog: Catalog,

    /// Open handles, keyed (and ordered) by id
    handles: BTreeMap<HandleId, OpenHandle>,

    next_handle: u64,

    store: BlockStore<S>,
}

/// Create a disk-backed filesystem at `path`
///
/// Any existing file at `path` is truncated.
pub fn create_filesystem<P: AsRef<Path>>(
    path: P,
    block_size: u32,
    block_count: u32,
) -> Result<FileSystem> {
    FileSystem::create(path, block_size, block_count)
}

/// Load a disk-backed filesystem from `path`
pub fn load_filesystem<P: AsRef<Path>>(path: P) -> Result<FileSystem> {
    FileSystem::load(path)
}

impl FileSystem<DiskImage> {
    pub fn create<P: AsRef<Path>>(path: P, block_size: u32, block_count: u32) -> Result<Self> {
        Self::create_with(
            path,
            Header::new(block_size, block_count),
            DEFAULT_MAX_NAME_LEN,
        )
    }

    /// Create with an explicit name length limit
    pub fn create_with<P: AsRef<Path>>(
        path: P,
        header: Header,
        max_name_len: usize,
    ) -> Result<Self> {
        // Validate before touching the host file
        header.validate()?;
        check_max_name_len(max_name_len)?;
        let image = DiskImage::create(path.as_ref(), header.image_len())?;
        tracing::info!("Creating filesystem at {}", path.as_ref().display());
        Self::format(image, header, max_name_len)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, DEFAULT_MAX_NAME_LEN)
    }

    pub fn load_with<P: AsRef<Path>>(path: P, max_name_len: usize) -> Result<Self> {
        tracing::info!("Loading filesystem from {}", path.as_ref().display());
        Self::load_from(DiskImage::open(path)?, max_name_len)
    }

    pub fn path(&self) -> &Path {
        self.store.storage().path()
    }
}

impl<S: Storage> FileSystem<S> {
    /// Lay out an empty filesystem on `storage`
    ///
    /// Sizes the medium to the full image and writes the header and block map,
    /// so the result is immediately loadable.
    pub fn format(mut storage: S, header: Header, max_name_len: usize) -> Result<Self> {
        header.validate()?;
        check_max_name_len(max_name_len)?;
        storage.set_byte_len(header.image_len())?;

        let mut fs = FileSystem {
            header,
            blocks: BlockMap::new(header.block_count),
            catalog: Catalog::new(max_name_len),
            handles: BTreeMap::new(),
            next_handle: 1,
            store: BlockStore::new(storage, &header),
        };
        fs.save()?;

        tracing::info!(
            "Formatted filesystem: {} blocks of {} bytes",
            header.block_count,
            header.block_size
        );
        Ok(fs)
    }

    /// Rebuild a filesystem from an existing image
    pub fn load_from(storage: S, max_name_len: usize) -> Result<Self> {
        check_max_name_len(max_name_len)?;
        let image = codec::load_image(storage)?;

        let mut catalog = Catalog::new(max_name_len);
        for file in image.files {
            catalog.insert_loaded(file)?;
        }

        let fs = FileSystem {
            header: image.header,
            blocks: image.blocks,
            catalog,
            handles: BTreeMap::new(),
            next_handle: 1,
            store: image.store,
        };

        let orphans = fs.orphaned_blocks();
        if !orphans.is_empty() {
            tracing::warn!(
                "{} blocks are allocated but not part of any file: {:?}",
                orphans.len(),
                orphans
            );
        }

        tracing::info!(
            "Loaded filesystem: {} files, {} of {} blocks free",
            fs.catalog.len(),
            fs.blocks.free_blocks(),
            fs.header.block_count
        );
        Ok(fs)
    }

    /// Persist header, block map and file records
    pub fn save(&mut self) -> Result<()> {
        codec::save_image(&mut self.store, &self.header, &self.blocks, &self.catalog)?;
        tracing::debug!("Saved filesystem with {} files", self.catalog.len());
        Ok(())
    }

    /// Save and release the filesystem
    pub fn close(mut self) -> Result<()> {
        self.save()
    }

    /// Save and hand back the underlying storage
    pub fn into_storage(mut self) -> Result<S> {
        self.save()?;
        Ok(self.store.into_storage())
    }

    /// Create an empty file
    pub fn create_file(&mut self, name: &str) -> Result<()> {
        self.catalog.create(name, &mut self.blocks)?;
        Ok(())
    }

    /// Open a handle on `name`
    ///
    /// Write mode creates a missing file and positions the cursor at the end
    /// of the file. A file has either one write handle or any number of read
    /// handles open, never both.
    pub fn open(&mut self, name: &str, mode: OpenMode) -> Result<HandleId> {
        if self.catalog.find(name).is_none() {
            if !mode.is_write() {
                return Err(FatError::NotFound(name.to_string()));
            }
            self.catalog.create(name, &mut self.blocks)?;
        }

        let file = self
            .catalog
            .find_mut(name)
            .ok_or_else(|| FatError::NotFound(name.to_string()))?;

        let conflict = match mode {
            OpenMode::Read => file.writer.is_some(),
            OpenMode::Write => file.is_open(),
        };
        if conflict {
            return Err(FatError::WriteConflict(name.to_string()));
        }

        let id = HandleId(self.next_handle);
        self.next_handle += 1;

        let position = match mode {
            OpenMode::Read => 0,
            OpenMode::Write => file.size,
        };

        file.open_handles.insert(id);
        if mode.is_write() {
            file.writer = Some(id);
        }
        self.handles.insert(id, OpenHandle::new(name, position, mode));

        tracing::debug!("Opened '{}' for {:?} as handle {}", name, mode, id);
        Ok(id)
    }

    /// Close a handle
    pub fn close_handle(&mut self, id: HandleId) -> Result<()> {
        let handle = self.handles.remove(&id).ok_or(FatError::NotOpen(id))?;

        if let Some(file) = self.catalog.find_mut(&handle.file) {
            file.open_handles.remove(&id);
            if file.writer == Some(id) {
                file.writer = None;
            }
        }

        tracing::debug!("Closed handle {} on '{}'", id, handle.file);
        Ok(())
    }

    fn handle(&self, id: HandleId) -> Result<&OpenHandle> {
        self.handles.get(&id).ok_or(FatError::NotOpen(id))
    }

    fn handle_file(&self, handle: &OpenHandle) -> Result<&FileEntry> {
        self.catalog
            .find(&handle.file)
            .ok_or_else(|| FatError::NotFound(handle.file.clone()))
    }

    fn set_position(&mut self, id: HandleId, position: u64) {
        if let Some(handle) = self.handles.get_mut(&id) {
            handle.position = position;
        }
    }

    /// Bytes between the cursor and the end of the file
    fn readable_len(&self, id: HandleId) -> Result<u64> {
        let handle = self.handle(id)?;
        let file = self.handle_file(handle)?;

        if handle.position > file.size {
            return Err(FatError::NotReadable);
        }
        Ok(file.size - handle.position)
    }

    /// Read up to `max_len` bytes from the cursor
    ///
    /// Returns fewer bytes at end of file. Legal in both modes.
    pub fn read(&mut self, id: HandleId, max_len: usize) -> Result<Vec<u8>> {
        let len = self.readable_len(id)?.min(max_len as u64) as usize;
        let mut buffer = vec![0u8; len];
        let read = self.read_into(id, &mut buffer)?;
        buffer.truncate(read);
        Ok(buffer)
    }

    /// Read into `buf`, returning the number of bytes copied
    pub fn read_into(&mut self, id: HandleId, buf: &mut [u8]) -> Result<usize> {
        let to_read = self.readable_len(id)?.min(buf.len() as u64) as usize;
        let block_size = self.header.block_size;

        let handle = self.handle(id)?;
        let start = handle.position;
        let file = self
            .catalog
            .find(&handle.file)
            .ok_or_else(|| FatError::NotFound(handle.file.clone()))?;

        let mut position = start;
        let mut done = 0;
        while done < to_read {
            let (index, offset) = locate(position, block_size);
            let block_id = *file.data_blocks().get(index).ok_or_else(|| {
                FatError::CorruptImage(format!(
                    "file '{}' has no data block for offset {}",
                    file.name, position
                ))
            })?;

            let chunk = (block_size as usize - offset).min(to_read - done);
            self.store
                .read_in_block(block_id, offset, &mut buf[done..done + chunk])?;

            done += chunk;
            position += chunk as u64;
        }

        self.set_position(id, position);
        Ok(done)
    }

    /// Write `data` at the cursor
    ///
    /// Data blocks are allocated only when the cursor reaches the end of the
    /// chain. A chain never grows past what its metadata record can list. If
    /// either the image or the record fills up part way, the bytes already
    /// written stay in the file and the short count is returned; `OutOfSpace`
    /// is returned only when nothing could be written.
    pub fn write(&mut self, id: HandleId, data: &[u8]) -> Result<usize> {
        let handle = self.handle(id)?;
        if !handle.mode.is_write() {
            return Err(FatError::NotWritable);
        }
        let name = handle.file.clone();
        let start = handle.position;
        let block_size = self.header.block_size;
        let max_chain = codec::max_chain_len(block_size);

        let file = self
            .catalog
            .find_mut(&name)
            .ok_or_else(|| FatError::NotFound(name.clone()))?;

        let mut position = start;
        let mut written = 0;
        let mut outcome = Ok(());

        while written < data.len() {
            let (index, offset) = locate(position, block_size);
            let block_id = match file.data_blocks().get(index) {
                Some(&block_id) => block_id,
                None if file.block_ids.len() >= max_chain => {
                    tracing::debug!(
                        "'{}' reached the {}-block chain limit",
                        name,
                        max_chain
                    );
                    outcome = Err(FatError::OutOfSpace);
                    break;
                }
                None => match self.blocks.allocate(BlockKind::FileData) {
                    Ok(block_id) => {
                        file.block_ids.push(block_id);
                        block_id
                    }
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                },
            };

            let chunk = (block_size as usize - offset).min(data.len() - written);
            if let Err(e) = self
                .store
                .write_in_block(block_id, offset, &data[written..written + chunk])
            {
                outcome = Err(e);
                break;
            }

            written += chunk;
            position += chunk as u64;
            file.size = file.size.max(position);
        }

        self.set_position(id, position);

        match outcome {
            Ok(()) => Ok(written),
            Err(FatError::OutOfSpace) if written > 0 => {
                tracing::warn!(
                    "Short write to '{}': {} of {} bytes, no space left",
                    name,
                    written,
                    data.len()
                );
                Ok(written)
            }
            Err(e) => Err(e),
        }
    }

    /// Move the cursor
    ///
    /// `offset` is relative to the start of the file when `from_start` is set,
    /// otherwise to the current position. Returns the new position.
    pub fn seek(&mut self, id: HandleId, offset: i64, from_start: bool) -> Result<u64> {
        let handle = self.handle(id)?;
        let size = self.handle_file(handle)?.size;

        let base = if from_start { 0 } else { handle.position };
        let target = i64::try_from(base).ok().and_then(|b| b.checked_add(offset));

        match target {
            Some(t) if t >= 0 && t as u64 <= size => {
                self.set_position(id, t as u64);
                Ok(t as u64)
            }
            _ => Err(FatError::OutOfRange {
                requested: target.unwrap_or(offset),
                size,
            }),
        }
    }

    /// Discard all content of the file behind a write handle
    pub fn truncate(&mut self, id: HandleId) -> Result<()> {
        let handle = self.handle(id)?;
        if !handle.mode.is_write() {
            return Err(FatError::NotWritable);
        }
        let name = handle.file.clone();

        let file = self
            .catalog
            .find_mut(&name)
            .ok_or_else(|| FatError::NotFound(name.clone()))?;

        let released: Vec<BlockId> = file.block_ids.drain(1..).collect();
        file.size = 0;
        for &block_id in &released {
            self.blocks.free(block_id)?;
        }
        self.set_position(id, 0);

        tracing::debug!("Truncated '{}', released {} blocks", name, released.len());
        Ok(())
    }

    /// Delete a file with no open handles
    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.catalog.delete(name, &mut self.blocks)?;
        Ok(())
    }

    pub fn size_of(&self, name: &str) -> Result<u64> {
        self.catalog.size_of(name)
    }

    /// File names in sorted order
    pub fn list_files(&self) -> Vec<String> {
        self.catalog.list()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.catalog.find(name).is_some()
    }

    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.catalog.find(name)
    }

    pub fn position(&self, id: HandleId) -> Result<u64> {
        Ok(self.handle(id)?.position)
    }

    pub fn mode(&self, id: HandleId) -> Result<OpenMode> {
        Ok(self.handle(id)?.mode)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn block_map(&self) -> &BlockMap {
        &self.blocks
    }

    pub fn max_name_len(&self) -> usize {
        self.catalog.max_name_len()
    }

    pub fn storage(&self) -> &S {
        self.store.storage()
    }

    /// Allocated blocks that no file chain references
    pub fn orphaned_blocks(&self) -> Vec<BlockId> {
        let referenced: HashSet<BlockId> = self
            .catalog
            .iter()
            .flat_map(|f| f.block_ids.iter().copied())
            .collect();

        self.blocks
            .iter()
            .filter(|&(id, kind)| {
                matches!(kind, BlockKind::FileEntry | BlockKind::FileData)
                    && !referenced.contains(&id)
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Free every orphaned block, returning how many were released
    pub fn reclaim_orphans(&mut self) -> Result<usize> {
        let orphans = self.orphaned_blocks();
        for &block_id in &orphans {
            self.blocks.free(block_id)?;
        }

        if !orphans.is_empty() {
            tracing::info!("Reclaimed {} orphaned blocks", orphans.len());
        }
        Ok(orphans.len())
    }

    /// Get filesystem statistics
    pub fn stats(&self) -> FsStats {
        FsStats {
            block_size: self.header.block_size,
            block_count: self.header.block_count,
            free_blocks: self.blocks.free_blocks(),
            used_blocks: self.blocks.used_blocks(),
            file_count: self.catalog.len(),
            open_handles: self.handles.len(),
            bytes_stored: self.catalog.iter().map(|f| f.size).sum(),
        }
    }

    /// Copy of the current in-memory state
    pub fn snapshot(&self) -> FsSnapshot {
        FsSnapshot {
            block_size: self.header.block_size,
            block_count: self.header.block_count,
            free_blocks: self.blocks.free_blocks(),
            block_map: self.blocks.as_slice().to_vec(),
            files: self
                .catalog
                .iter()
                .map(|f| FileSnapshot {
                    name: f.name.clone(),
                    size: f.size,
                    block_ids: f.block_ids.clone(),
                    open_handles: f.open_handles.iter().copied().collect(),
                    writer: f.writer,
                })
                .collect(),
            handles: self
                .handles
                .iter()
                .map(|(&id, h)| HandleSnapshot {
                    id,
                    file: h.file.clone(),
                    position: h.position,
                    mode: h.mode,
                })
                .collect(),
        }
    }
}

/// Filesystem statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsStats {
    pub block_size: u32,
    pub block_count: u32,
    pub free_blocks: usize,
    pub used_blocks: usize,
    pub file_count: usize,
    pub open_handles: usize,
    /// Sum of file sizes
    pub bytes_stored: u64,
}
