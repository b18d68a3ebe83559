#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use minifat::{FileSystem, FileSystemBuilder, MemoryImage, OpenMode};

#[derive(Debug, Arbitrary)]
enum HandleOp {
    Open { name_idx: u8, write: bool },
    Close { handle_idx: u8 },
    Read { handle_idx: u8, len: u16 },
    Write { handle_idx: u8, data: Vec<u8> },
    Seek { handle_idx: u8, offset: i32, from_start: bool },
    Truncate { handle_idx: u8 },
    Delete { name_idx: u8 },
}

// Random operation sequences must never panic or break block map invariants
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let ops: Vec<HandleOp> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let mut fs: FileSystem<MemoryImage> = match FileSystemBuilder::new()
        .block_size(64)
        .block_count(24)
        .build_in_memory()
    {
        Ok(fs) => fs,
        Err(_) => return,
    };

    let mut handles = Vec::new();
    for op in ops.iter().take(200) {
        match op {
            HandleOp::Open { name_idx, write } => {
                let mode = if *write { OpenMode::Write } else { OpenMode::Read };
                if let Ok(h) = fs.open(&format!("f{}", name_idx % 8), mode) {
                    handles.push(h);
                }
            }
            HandleOp::Close { handle_idx } => {
                if !handles.is_empty() {
                    let h = handles.remove(*handle_idx as usize % handles.len());
                    let _ = fs.close_handle(h);
                }
            }
            HandleOp::Read { handle_idx, len } => {
                if let Some(&h) = handles.get(*handle_idx as usize % handles.len().max(1)) {
                    let _ = fs.read(h, *len as usize);
                }
            }
            HandleOp::Write { handle_idx, data } => {
                if let Some(&h) = handles.get(*handle_idx as usize % handles.len().max(1)) {
                    let _ = fs.write(h, data);
                }
            }
            HandleOp::Seek { handle_idx, offset, from_start } => {
                if let Some(&h) = handles.get(*handle_idx as usize % handles.len().max(1)) {
                    let _ = fs.seek(h, *offset as i64, *from_start);
                }
            }
            HandleOp::Truncate { handle_idx } => {
                if let Some(&h) = handles.get(*handle_idx as usize % handles.len().max(1)) {
                    let _ = fs.truncate(h);
                }
            }
            HandleOp::Delete { name_idx } => {
                let _ = fs.delete(&format!("f{}", name_idx % 8));
            }
        }
    }

    let snapshot = fs.snapshot();
    let mut seen = std::collections::HashSet::new();
    for file in &snapshot.files {
        assert!(file.size <= (file.block_ids.len() as u64 - 1) * 64);
        if file.writer.is_some() {
            assert_eq!(file.open_handles.len(), 1, "writer shares '{}'", file.name);
        }
        for &id in &file.block_ids {
            assert!(seen.insert(id), "block {} in two chains", id);
        }
    }
    assert!(fs.orphaned_blocks().is_empty());

    // Every state reachable through the API can be persisted
    assert!(fs.into_storage().is_ok());
});
