#![no_main]
use huffpack::{ArchiveLoader, CodecRegistry, MemorySource};
use libfuzzer_sys::fuzz_target;
use std::io::Read;
use std::sync::Arc;

// Arbitrary containers must load or fail cleanly, and so must every file in them
fuzz_target!(|data: &[u8]| {
    let archive = match ArchiveLoader::default().load(Arc::new(MemorySource::new(data.to_vec()))) {
        Ok(archive) => archive,
        Err(_) => return,
    };

    let registry = CodecRegistry::default();
    for file in archive.all_files() {
        if let Ok(mut stream) = file.decoded_stream(&registry) {
            let mut sink = Vec::new();
            let _ = (&mut stream).take(1 << 20).read_to_end(&mut sink);
        }
    }
});
