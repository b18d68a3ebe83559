//! On-disk encoding of filesystem metadata
//!
//! All integers are little-endian `u32`.
//!
//! ```text
//! Block 0:
//!   block_count, block_size, block_map tags (1 byte each)
//!
//! Each FileEntry block:
//!   size, name_length, block_id_count,
//!   block_ids[block_id_count],
//!   name field (NAME_FIELD_LEN bytes, zero padded), zero padding to end of block
//! ```
//!
//! The record of a file therefore grows by four bytes per block in its chain,
//! and [`max_chain_len`] bounds how long a chain can get.
//!
//! File content is never copied here; data blocks are written in place by
//! the handle engine.

use crate::allocator::{BlockId, BlockKind, BlockMap};
use crate::catalog::{Catalog, FileEntry};
use crate::error::{FatError, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::io::{BlockStore, Storage};
use std::collections::HashSet;

/// Fixed part of a file record: size, name_length, block_id_count
const RECORD_FIXED_LEN: usize = 12;

/// Width of the name field at the end of every record
pub const NAME_FIELD_LEN: usize = 32;

/// Bytes needed to store a record with `block_id_count` chain entries
pub const fn record_len(block_id_count: usize) -> usize {
    RECORD_FIXED_LEN + block_id_count * 4 + NAME_FIELD_LEN
}

/// Longest chain (metadata block included) whose record fits in one block
pub fn max_chain_len(block_size: u32) -> usize {
    (block_size as usize).saturating_sub(RECORD_FIXED_LEN + NAME_FIELD_LEN) / 4
}

/// Serialize a file's metadata record
pub fn encode_record(file: &FileEntry, block_size: u32) -> Result<Vec<u8>> {
    let needed = record_len(file.block_ids.len());
    if file.name.len() > NAME_FIELD_LEN {
        return Err(FatError::NameTooLong {
            len: file.name.len(),
            max: NAME_FIELD_LEN,
        });
    }
    if needed > block_size as usize {
        return Err(FatError::MetadataOverflow {
            name: file.name.clone(),
            needed,
            block_size,
        });
    }

    // Header::validate caps the image at 4 GiB, so size fits in u32
    let size = u32::try_from(file.size).map_err(|_| FatError::MetadataOverflow {
        name: file.name.clone(),
        needed,
        block_size,
    })?;

    let mut bytes = Vec::with_capacity(needed);
    bytes.extend_from_slice(&size.to_le_bytes());
    bytes.extend_from_slice(&(file.name.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&(file.block_ids.len() as u32).to_le_bytes());
    for &block_id in &file.block_ids {
        bytes.extend_from_slice(&block_id.to_le_bytes());
    }
    bytes.extend_from_slice(file.name.as_bytes());
    bytes.resize(needed, 0);

    Ok(bytes)
}

/// Little-endian u32 at `offset`, or `None` past the end of `bytes`
fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let field = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}

/// Parse the record stored in `block_id`
///
/// Only checks that the record is self-consistent within its block; chain
/// validation against the block map happens in [`load_image`].
pub fn decode_record(block_id: BlockId, block: &[u8]) -> Result<FileEntry> {
    let truncated = |what: &str| {
        FatError::CorruptImage(format!(
            "file record in block {} truncated at {}",
            block_id, what
        ))
    };

    let size = read_u32(block, 0).ok_or_else(|| truncated("size"))?;
    let name_len = read_u32(block, 4).ok_or_else(|| truncated("name length"))? as usize;
    let id_count = read_u32(block, 8).ok_or_else(|| truncated("block count"))? as usize;

    if name_len > NAME_FIELD_LEN {
        return Err(FatError::CorruptImage(format!(
            "file record in block {} has a {}-byte name, the field holds {}",
            block_id, name_len, NAME_FIELD_LEN
        )));
    }

    let needed = id_count
        .checked_mul(4)
        .and_then(|ids| ids.checked_add(RECORD_FIXED_LEN + NAME_FIELD_LEN));
    match needed {
        Some(needed) if needed <= block.len() => {}
        _ => {
            return Err(FatError::CorruptImage(format!(
                "file record in block {} claims {} block ids, \
                 more than a {}-byte block holds",
                block_id,
                id_count,
                block.len()
            )))
        }
    }

    let block_ids = (0..id_count)
        .map(|i| read_u32(block, RECORD_FIXED_LEN + i * 4).ok_or_else(|| truncated("block ids")))
        .collect::<Result<Vec<_>>>()?;

    let name_start = RECORD_FIXED_LEN + id_count * 4;
    let name = std::str::from_utf8(&block[name_start..name_start + name_len])
        .map_err(|_| {
            FatError::CorruptImage(format!("file name in block {} is not UTF-8", block_id))
        })?
        .to_string();

    if name.is_empty() || name.contains('\0') {
        return Err(FatError::CorruptImage(format!(
            "file record in block {} has an invalid name",
            block_id
        )));
    }

    Ok(FileEntry {
        name,
        size: size as u64,
        block_ids,
        open_handles: Default::default(),
        writer: None,
    })
}

/// Write header, block map and every file record
///
/// All records are encoded before anything is written, so a record that does
/// not fit its block leaves the image untouched.
pub fn save_image<S: Storage>(
    store: &mut BlockStore<S>,
    header: &Header,
    blocks: &BlockMap,
    catalog: &Catalog,
) -> Result<()> {
    let records = catalog
        .iter()
        .map(|file| -> Result<(BlockId, Vec<u8>)> {
            Ok((file.metadata_block_id(), encode_record(file, header.block_size)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut superblock = Vec::with_capacity(HEADER_SIZE + blocks.len());
    superblock.extend_from_slice(&header.to_bytes());
    superblock.extend_from_slice(&blocks.to_bytes());
    store.write_in_block(0, 0, &superblock)?;

    for (block_id, record) in &records {
        store.write_block(*block_id, record)?;
    }

    store.sync()
}

/// Metadata decoded from an image
#[derive(Debug)]
pub struct LoadedImage<S> {
    pub header: Header,
    pub blocks: BlockMap,
    pub files: Vec<FileEntry>,
    pub store: BlockStore<S>,
}

/// Decode and validate the metadata of an image
pub fn load_image<S: Storage>(mut storage: S) -> Result<LoadedImage<S>> {
    let image_len = storage.byte_len()?;
    if image_len < HEADER_SIZE as u64 {
        return Err(FatError::CorruptImage(format!(
            "image is only {} bytes",
            image_len
        )));
    }

    let mut raw_header = [0u8; HEADER_SIZE];
    storage.read_at(0, &mut raw_header)?;
    let header = Header::from_bytes(&raw_header)?;

    if image_len < header.image_len() {
        return Err(FatError::CorruptImage(format!(
            "image is {} bytes but header declares {} blocks of {} bytes",
            image_len, header.block_count, header.block_size
        )));
    }

    let mut store = BlockStore::new(storage, &header);
    let block0 = store.read_block(0)?;
    let tags = &block0[HEADER_SIZE..HEADER_SIZE + header.block_count as usize];
    let blocks = BlockMap::from_bytes(tags)?;

    let mut claimed: HashSet<BlockId> = HashSet::new();
    let mut names: HashSet<String> = HashSet::new();
    let mut files = Vec::new();

    let entry_blocks: Vec<BlockId> = blocks
        .iter()
        .filter(|&(_, kind)| kind == BlockKind::FileEntry)
        .map(|(id, _)| id)
        .collect();

    for block_id in entry_blocks {
        let file = decode_record(block_id, &store.read_block(block_id)?)?;
        validate_chain(&file, block_id, &header, &blocks, &mut claimed)?;

        if !names.insert(file.name.clone()) {
            return Err(FatError::CorruptImage(format!(
                "duplicate file name '{}'",
                file.name
            )));
        }
        files.push(file);
    }

    Ok(LoadedImage {
        header,
        blocks,
        files,
        store,
    })
}

fn validate_chain(
    file: &FileEntry,
    record_block: BlockId,
    header: &Header,
    blocks: &BlockMap,
    claimed: &mut HashSet<BlockId>,
) -> Result<()> {
    let corrupt = |msg: String| FatError::CorruptImage(format!("file '{}': {}", file.name, msg));

    match file.block_ids.first() {
        Some(&first) if first == record_block => {}
        Some(&first) => {
            return Err(corrupt(format!(
                "chain starts at block {} but the record lives in block {}",
                first, record_block
            )))
        }
        None => return Err(corrupt("empty block chain".to_string())),
    }
    claimed.insert(record_block);

    for &block_id in file.data_blocks() {
        match blocks.kind(block_id) {
            Some(BlockKind::FileData) => {}
            Some(kind) => {
                return Err(corrupt(format!(
                    "data block {} is tagged {:?}",
                    block_id, kind
                )))
            }
            None => return Err(corrupt(format!("data block {} is out of range", block_id))),
        }

        if !claimed.insert(block_id) {
            return Err(corrupt(format!(
                "block {} is already used by another chain",
                block_id
            )));
        }
    }

    if file.size > file.capacity(header.block_size) {
        return Err(corrupt(format!(
            "size {} exceeds chain capacity {}",
            file.size,
            file.capacity(header.block_size)
        )));
    }

    Ok(())
}
