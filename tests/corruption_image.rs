//! Image corruption detection tests
//!
//! Damages saved images on disk and verifies loading rejects them instead of
//! trusting the bytes

use minifat::{create_filesystem, load_filesystem, FatError, OpenMode};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BLOCK_SIZE: u64 = 64;

/// Two files: "alpha" = [1, 2, 3], "beta" = [4, 5]
fn build_image(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("disk.img");
    let mut fs = create_filesystem(&path, BLOCK_SIZE as u32, 32).unwrap();

    let h = fs.open("alpha", OpenMode::Write).unwrap();
    fs.write(h, &[b'a'; 100]).unwrap();
    fs.close_handle(h).unwrap();

    let h = fs.open("beta", OpenMode::Write).unwrap();
    fs.write(h, &[b'b'; 10]).unwrap();
    fs.close_handle(h).unwrap();

    fs.close().unwrap();
    path
}

fn patch(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

fn assert_corrupt(path: &Path) {
    match load_filesystem(path) {
        Err(FatError::CorruptImage(_)) => {}
        Err(e) => panic!("expected CorruptImage, got {}", e),
        Ok(_) => panic!("corrupted image loaded"),
    }
}

#[test]
fn test_pristine_image_loads() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    let fs = load_filesystem(&path).unwrap();
    assert_eq!(fs.list_files(), vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(fs.file("alpha").unwrap().block_ids, vec![1, 2, 3]);
    assert_eq!(fs.file("beta").unwrap().block_ids, vec![4, 5]);
}

#[test]
fn test_header_geometry_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    // Declares more blocks than the file holds
    patch(&path, 0, &40u32.to_le_bytes());
    assert_corrupt(&path);
}

#[test]
fn test_header_block_size_zero() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    patch(&path, 4, &0u32.to_le_bytes());
    assert_corrupt(&path);
}

#[test]
fn test_block_map_metadata_tag_elsewhere() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    patch(&path, 8 + 10, &[1]);
    assert_corrupt(&path);
}

#[test]
fn test_data_block_tagged_empty() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    // alpha's second data block
    patch(&path, 8 + 3, &[0]);
    assert_corrupt(&path);
}

#[test]
fn test_chain_references_other_file_record() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    // alpha's first data id -> beta's record block
    patch(&path, BLOCK_SIZE + 16, &4u32.to_le_bytes());
    assert_corrupt(&path);
}

#[test]
fn test_id_count_past_block() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    patch(&path, BLOCK_SIZE + 8, &20u32.to_le_bytes());
    assert_corrupt(&path);
}

#[test]
fn test_duplicate_file_names() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    // Rename "beta" to "alpha": name length 4 -> 5, name bytes after 2 ids
    let beta = 4 * BLOCK_SIZE;
    patch(&path, beta + 4, &5u32.to_le_bytes());
    patch(&path, beta + 20, b"alpha");
    assert_corrupt(&path);
}

#[test]
fn test_non_utf8_name() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    patch(&path, 4 * BLOCK_SIZE + 20, &[0xFF, 0xFE]);
    assert_corrupt(&path);
}

#[test]
fn test_empty_chain() {
    let dir = TempDir::new().unwrap();
    let path = build_image(&dir);

    patch(&path, 4 * BLOCK_SIZE + 8, &0u32.to_le_bytes());
    assert_corrupt(&path);
}

#[test]
fn test_zero_filled_file_is_not_an_image() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("zeros.img");
    std::fs::write(&path, vec![0u8; 4096]).unwrap();

    assert_corrupt(&path);
}

#[test]
fn test_missing_image_is_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_filesystem(dir.path().join("absent.img")),
        Err(FatError::Io(_))
    ));
}
