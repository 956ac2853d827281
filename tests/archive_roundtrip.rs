//! Archive save/load round trips
//!
//! Builds archives on disk and in memory, saves them, loads them back and
//! checks every file decodes to its original bytes.

use huffpack::codec::{HUFFMAN_CODEC_ID, NONE_CODEC_ID};
use huffpack::{
    Archive, ArchiveFile, ArchiveLoader, ArchiveSaver, CodecRegistry, MemorySource,
    PipelineConfig, StreamSource,
};
use std::fs;
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper: pending in-memory file
fn memory_file(name: &str, data: &[u8], codec_id: u64) -> ArchiveFile {
    ArchiveFile::pending(
        name,
        data.len() as u64,
        codec_id,
        Arc::new(MemorySource::new(data.to_vec())),
    )
}

/// Helper: save to a byte vector and load it back
fn save_and_load(archive: &Archive) -> Archive {
    let mut bytes = Vec::new();
    ArchiveSaver::default().save(archive, &mut bytes).unwrap();
    let container: Arc<dyn StreamSource> = Arc::new(MemorySource::new(bytes));
    ArchiveLoader::default().load(container).unwrap()
}

fn decoded(file: &ArchiveFile) -> Vec<u8> {
    let mut out = Vec::new();
    file.decoded_stream(&CodecRegistry::default())
        .unwrap()
        .read_to_end(&mut out)
        .unwrap();
    out
}

#[test]
fn test_single_huffman_file() {
    let mut archive = Archive::new();
    let root = archive.root();
    archive.add_file(root, memory_file("a.txt", b"aaaa", HUFFMAN_CODEC_ID));

    let loaded = save_and_load(&archive);
    let file = loaded.directory(loaded.root()).file("a.txt").unwrap();
    assert_eq!(file.size(), 4);
    assert_eq!(file.codec_id(), HUFFMAN_CODEC_ID);
    assert!(!file.is_pending());
    assert_eq!(decoded(file), b"aaaa");
}

#[test]
fn test_nested_tree_with_mixed_files() {
    let text = b"the quick brown fox jumps over the lazy dog\n".repeat(200);
    let binary: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 256) as u8).collect();

    let mut archive = Archive::new();
    let root = archive.root();
    let docs = archive.add_directory(root, "docs");
    let deep = archive.add_directory(docs, "deep");
    let bin = archive.add_directory(root, "bin");
    archive.add_file(root, memory_file("readme", b"hello", NONE_CODEC_ID));
    archive.add_file(docs, memory_file("fox.txt", &text, HUFFMAN_CODEC_ID));
    archive.add_file(deep, memory_file("empty.txt", b"", HUFFMAN_CODEC_ID));
    archive.add_file(deep, memory_file("zzz", &[b'z'; 3000], HUFFMAN_CODEC_ID));
    archive.add_file(bin, memory_file("blob", &binary, HUFFMAN_CODEC_ID));
    archive.add_file(bin, memory_file("raw", &binary, NONE_CODEC_ID));

    let loaded = save_and_load(&archive);
    assert_eq!(loaded.size(), archive.size());

    let root = loaded.root();
    let docs = loaded.find_directory(root, "docs").unwrap();
    let deep = loaded.find_directory(docs, "deep").unwrap();
    let bin = loaded.find_directory(root, "bin").unwrap();

    assert_eq!(loaded.path_of(deep), "docs/deep");
    assert_eq!(decoded(loaded.directory(root).file("readme").unwrap()), b"hello");
    assert_eq!(decoded(loaded.directory(docs).file("fox.txt").unwrap()), text);
    assert_eq!(decoded(loaded.directory(deep).file("empty.txt").unwrap()), b"");
    assert_eq!(decoded(loaded.directory(deep).file("zzz").unwrap()), vec![b'z'; 3000]);
    assert_eq!(decoded(loaded.directory(bin).file("blob").unwrap()), binary);
    assert_eq!(decoded(loaded.directory(bin).file("raw").unwrap()), binary);
}

#[test]
fn test_order_preserved() {
    let mut archive = Archive::new();
    let root = archive.root();
    for name in ["zeta", "alpha", "mid"] {
        archive.add_directory(root, name);
        let file_name = format!("{}.txt", name);
        archive.add_file(root, memory_file(&file_name, name.as_bytes(), HUFFMAN_CODEC_ID));
    }

    let loaded = save_and_load(&archive);
    let dir = loaded.directory(loaded.root());
    let dirs: Vec<_> = dir
        .subdirectories()
        .iter()
        .map(|&id| loaded.directory(id).name())
        .collect();
    let files: Vec<_> = dir.files().iter().map(|f| f.name()).collect();
    assert_eq!(dirs, vec!["zeta", "alpha", "mid"]);
    assert_eq!(files, vec!["zeta.txt", "alpha.txt", "mid.txt"]);
}

#[test]
fn test_resave_loaded_archive() {
    let mut archive = Archive::new();
    let root = archive.root();
    archive.add_file(root, memory_file("one", b"first file", HUFFMAN_CODEC_ID));

    // Mix loaded (coded) and newly added (pending) files
    let mut loaded = save_and_load(&archive);
    let root = loaded.root();
    loaded.add_file(root, memory_file("two", b"second file", NONE_CODEC_ID));

    let reloaded = save_and_load(&loaded);
    let dir = reloaded.directory(reloaded.root());
    assert_eq!(decoded(dir.file("one").unwrap()), b"first file");
    assert_eq!(decoded(dir.file("two").unwrap()), b"second file");
}

#[test]
fn test_disk_round_trip() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    fs::create_dir_all(input.join("nested/inner")).unwrap();
    fs::write(input.join("a.txt"), b"aaaa").unwrap();
    fs::write(input.join("nested/b.bin"), [0x01u8, 0x1B, 0x00, 0xFF].repeat(500)).unwrap();
    fs::write(input.join("nested/inner/empty"), b"").unwrap();

    let config = PipelineConfig::default().with_chunk_size(1024);
    let mut archive = Archive::new();
    let root = archive.root();
    archive
        .add_path(root, &input, HUFFMAN_CODEC_ID, &config)
        .unwrap();

    let container = temp.path().join("input.hpk");
    let registry = CodecRegistry::new(&config);
    ArchiveSaver::new(registry.clone())
        .with_config(config.clone())
        .unwrap()
        .save_to_path(&archive, &container)
        .unwrap();

    let loaded = ArchiveLoader::new(config)
        .unwrap()
        .load_path(&container)
        .unwrap();
    let out = temp.path().join("out");
    loaded.extract_all(&out, &registry).unwrap();

    assert_eq!(fs::read(out.join("input/a.txt")).unwrap(), b"aaaa");
    assert_eq!(
        fs::read(out.join("input/nested/b.bin")).unwrap(),
        [0x01u8, 0x1B, 0x00, 0xFF].repeat(500)
    );
    assert_eq!(fs::read(out.join("input/nested/inner/empty")).unwrap(), b"");
}

#[test]
fn test_save_over_own_container() {
    let temp = TempDir::new().unwrap();
    let container = temp.path().join("self.hpk");

    let mut archive = Archive::new();
    let root = archive.root();
    archive.add_file(root, memory_file("kept", b"kept across saves", HUFFMAN_CODEC_ID));
    ArchiveSaver::default()
        .save_to_path(&archive, &container)
        .unwrap();

    let mut loaded = ArchiveLoader::default().load_path(&container).unwrap();
    let root = loaded.root();
    loaded.add_file(root, memory_file("added", b"new", HUFFMAN_CODEC_ID));
    ArchiveSaver::default()
        .save_to_path(&loaded, &container)
        .unwrap();

    let reloaded = ArchiveLoader::default().load_path(&container).unwrap();
    let dir = reloaded.directory(reloaded.root());
    assert_eq!(decoded(dir.file("kept").unwrap()), b"kept across saves");
    assert_eq!(decoded(dir.file("added").unwrap()), b"new");
}

#[test]
fn test_listing_after_load() {
    let mut archive = Archive::new();
    let root = archive.root();
    let docs = archive.add_directory(root, "docs");
    archive.add_file(docs, memory_file("a.txt", b"aaaa", HUFFMAN_CODEC_ID));

    let loaded = save_and_load(&archive);
    let entries = loaded.entries(&CodecRegistry::default());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].path, "docs/a.txt");
    assert_eq!(entries[1].codec_name.as_deref(), Some("Huffman"));
    assert_eq!(
        loaded.all_files()[0].describe(&CodecRegistry::default()),
        "File[a.txt, 4B, Huffman]"
    );
}

#[test]
fn test_file_filled_after_adding_keeps_its_data() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("notes.txt");
    fs::write(&input, b"").unwrap();

    let config = PipelineConfig::default();
    let mut archive = Archive::new();
    let root = archive.root();
    archive
        .add_path(root, &input, HUFFMAN_CODEC_ID, &config)
        .unwrap();
    fs::write(&input, "important data").unwrap();

    let container = temp.path().join("notes.hpk");
    ArchiveSaver::default()
        .save_to_path(&archive, &container)
        .unwrap();
    let loaded = ArchiveLoader::default().load_path(&container).unwrap();
    let out = temp.path().join("out");
    loaded
        .extract_all(&out, &CodecRegistry::default())
        .unwrap();

    assert_eq!(fs::read(out.join("notes.txt")).unwrap(), b"important data");
    assert_eq!(loaded.all_files()[0].size(), 14);
}

#[test]
fn test_grown_file_header_size_matches_content() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("log");
    fs::write(&input, b"abc").unwrap();

    let config = PipelineConfig::default();
    for codec_id in [HUFFMAN_CODEC_ID, NONE_CODEC_ID] {
        let mut archive = Archive::new();
        let root = archive.root();
        archive.add_path(root, &input, codec_id, &config).unwrap();
        assert_eq!(archive.size(), 3);
        fs::write(&input, b"abcdefgh").unwrap();

        let loaded = save_and_load(&archive);
        let file = loaded.all_files()[0];
        let content = decoded(file);
        assert_eq!(content, b"abcdefgh");
        assert_eq!(file.size(), content.len() as u64);
        fs::write(&input, b"abc").unwrap();
    }
}

#[test]
fn test_emptied_file_saves_as_empty() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("scratch");
    fs::write(&input, b"temporary").unwrap();

    let mut archive = Archive::new();
    let root = archive.root();
    archive
        .add_path(root, &input, HUFFMAN_CODEC_ID, &PipelineConfig::default())
        .unwrap();
    fs::write(&input, b"").unwrap();

    let loaded = save_and_load(&archive);
    let file = loaded.all_files()[0];
    assert_eq!(file.size(), 0);
    assert!(decoded(file).is_empty());
}
