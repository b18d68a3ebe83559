//! Integration tests across the core modules
//!
//! Tests the interaction between:
//! - Handle engine and block map
//! - Persistence codec and on-disk layout
//! - Load-time validation of damaged images

#[cfg(test)]
mod tests {
    use crate::core::allocator::BlockKind;
    use crate::core::catalog::DEFAULT_MAX_NAME_LEN;
    use crate::core::error::FatError;
    use crate::core::filesystem::FileSystem;
    use crate::core::handle::OpenMode;
    use crate::core::header::Header;
    use crate::core::io::MemoryImage;

    fn image_with_file(data: &[u8]) -> Vec<u8> {
        let mut fs = FileSystem::format(
            MemoryImage::default(),
            Header::new(64, 16),
            DEFAULT_MAX_NAME_LEN,
        )
        .unwrap();

        let h = fs.open("data.bin", OpenMode::Write).unwrap();
        fs.write(h, data).unwrap();
        fs.close_handle(h).unwrap();
        fs.into_storage().unwrap().into_bytes()
    }

    fn load(bytes: Vec<u8>) -> crate::core::error::Result<FileSystem<MemoryImage>> {
        FileSystem::load_from(MemoryImage::from_bytes(bytes), DEFAULT_MAX_NAME_LEN)
    }

    #[test]
    fn test_on_disk_layout() {
        let bytes = image_with_file(&[0x5A; 100]);
        assert_eq!(bytes.len(), 64 * 16);

        // Header
        assert_eq!(&bytes[0..4], &16u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &64u32.to_le_bytes());

        // Block map: metadata, file entry, two data blocks
        assert_eq!(&bytes[8..13], &[1, 2, 3, 3, 0]);

        // File record in block 1
        let record = &bytes[64..128];
        assert_eq!(&record[0..4], &100u32.to_le_bytes());
        assert_eq!(&record[4..8], &8u32.to_le_bytes());
        assert_eq!(&record[8..12], &3u32.to_le_bytes());
        assert_eq!(&record[12..16], &1u32.to_le_bytes());
        assert_eq!(&record[16..20], &2u32.to_le_bytes());
        assert_eq!(&record[20..24], &3u32.to_le_bytes());
        assert_eq!(&record[24..32], b"data.bin");
        // Rest of the 32-byte name field
        assert!(record[32..56].iter().all(|&b| b == 0));

        // Content in blocks 2 and 3
        assert!(bytes[128..228].iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn test_memory_round_trip() {
        let data: Vec<u8> = (0..=255).collect();
        let mut fs = load(image_with_file(&data)).unwrap();

        assert_eq!(fs.list_files(), vec!["data.bin".to_string()]);
        let r = fs.open("data.bin", OpenMode::Read).unwrap();
        assert_eq!(fs.read(r, 1024).unwrap(), data);
    }

    #[test]
    fn test_truncated_image() {
        let mut bytes = image_with_file(b"abc");
        bytes.truncate(64 * 15);
        assert!(matches!(load(bytes), Err(FatError::CorruptImage(_))));

        assert!(matches!(load(vec![0u8; 4]), Err(FatError::CorruptImage(_))));
    }

    #[test]
    fn test_unknown_block_tag() {
        let mut bytes = image_with_file(b"abc");
        bytes[8 + 5] = 9;
        assert!(matches!(load(bytes), Err(FatError::CorruptImage(_))));
    }

    #[test]
    fn test_block_zero_not_metadata() {
        let mut bytes = image_with_file(b"abc");
        bytes[8] = BlockKind::Empty as u8;
        assert!(matches!(load(bytes), Err(FatError::CorruptImage(_))));
    }

    #[test]
    fn test_name_length_past_block() {
        let mut bytes = image_with_file(b"abc");
        bytes[64 + 4..64 + 8].copy_from_slice(&60u32.to_le_bytes());
        assert!(matches!(load(bytes), Err(FatError::CorruptImage(_))));
    }

    #[test]
    fn test_chain_points_at_wrong_kind() {
        let mut bytes = image_with_file(b"abc");
        // Data block id 2 -> 0 (the metadata block)
        bytes[64 + 16..64 + 20].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(load(bytes), Err(FatError::CorruptImage(_))));
    }

    #[test]
    fn test_chain_out_of_range() {
        let mut bytes = image_with_file(b"abc");
        bytes[64 + 16..64 + 20].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(load(bytes), Err(FatError::CorruptImage(_))));
    }

    #[test]
    fn test_size_beyond_capacity() {
        let mut bytes = image_with_file(b"abc");
        bytes[64..68].copy_from_slice(&65u32.to_le_bytes());
        assert!(matches!(load(bytes), Err(FatError::CorruptImage(_))));
    }

    #[test]
    fn test_chain_not_starting_at_record() {
        let mut bytes = image_with_file(b"abc");
        bytes[64 + 12..64 + 16].copy_from_slice(&5u32.to_le_bytes());
        assert!(matches!(load(bytes), Err(FatError::CorruptImage(_))));
    }

    #[test]
    fn test_shared_block_between_files() {
        let mut fs = FileSystem::format(
            MemoryImage::default(),
            Header::new(64, 16),
            DEFAULT_MAX_NAME_LEN,
        )
        .unwrap();
        for name in ["a", "b"] {
            let h = fs.open(name, OpenMode::Write).unwrap();
            fs.write(h, b"x").unwrap();
            fs.close_handle(h).unwrap();
        }
        // a = [1, 2], b = [3, 4]
        let mut bytes = fs.into_storage().unwrap().into_bytes();
        let b_record = 3 * 64;
        bytes[b_record + 16..b_record + 20].copy_from_slice(&2u32.to_le_bytes());

        assert!(matches!(load(bytes), Err(FatError::CorruptImage(_))));
    }

    #[test]
    fn test_orphan_survives_load_as_warning() {
        let mut bytes = image_with_file(b"abc");
        // Tag an unreferenced block as data
        bytes[8 + 7] = BlockKind::FileData as u8;

        let mut fs = load(bytes).unwrap();
        assert_eq!(fs.orphaned_blocks(), vec![7]);
        assert_eq!(fs.reclaim_orphans().unwrap(), 1);
        assert_eq!(fs.block_map().kind(7), Some(BlockKind::Empty));
    }

    #[test]
    fn test_deleted_file_block_reused() {
        let mut fs = load(image_with_file(b"first")).unwrap();
        fs.delete("data.bin").unwrap();

        let h = fs.open("next.bin", OpenMode::Write).unwrap();
        fs.write(h, b"second").unwrap();
        assert_eq!(fs.file("next.bin").unwrap().block_ids, vec![1, 2]);

        let bytes = fs.into_storage().unwrap().into_bytes();
        let fs = load(bytes).unwrap();
        assert_eq!(fs.list_files(), vec!["next.bin".to_string()]);
        assert_eq!(fs.size_of("next.bin").unwrap(), 6);
    }
}
