#![no_main]
use libfuzzer_sys::fuzz_target;
use minifat::{FileSystem, MemoryImage, OpenMode, DEFAULT_MAX_NAME_LEN};

// Arbitrary bytes must load cleanly or fail with an error, never panic
fuzz_target!(|input: &[u8]| {
    let image = MemoryImage::from_bytes(input.to_vec());
    let mut fs = match FileSystem::load_from(image, DEFAULT_MAX_NAME_LEN) {
        Ok(fs) => fs,
        Err(_) => return,
    };

    // Every file in a loaded image is fully readable
    for name in fs.list_files() {
        let size = fs.size_of(&name).unwrap_or(0);
        if let Ok(h) = fs.open(&name, OpenMode::Read) {
            let data = fs.read(h, size as usize).unwrap_or_default();
            assert_eq!(data.len() as u64, size);
            let _ = fs.close_handle(h);
        }
    }
    let _ = fs.save();
});
