use super::{Archive, DirId};
use crate::codec::CodecRegistry;
use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crate::framing::EscapingWriter;
use crate::header::{self, FileRecord, HeaderEntry, MAGIC};
use std::collections::HashSet;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Writes an [`Archive`] as a container
#[derive(Debug, Clone, Default)]
pub struct ArchiveSaver {
    registry: CodecRegistry,
    config: PipelineConfig,
}

/// Logical placement of one file's coded bytes and its measured size
#[derive(Debug, Clone, Copy)]
struct Extent {
    offset: u64,
    length: u64,
    size: u64,
}

impl ArchiveSaver {
    pub fn new(registry: CodecRegistry) -> Self {
        ArchiveSaver {
            registry,
            config: PipelineConfig::default(),
        }
    }

    /// Use `config` for buffering; fails if it does not validate
    pub fn with_config(mut self, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Write the container for `archive` to `out`
    pub fn save<W: Write>(&self, archive: &Archive, out: W) -> Result<()> {
        check_names(archive, archive.root())?;

        let mut writer =
            EscapingWriter::new(BufWriter::with_capacity(self.config.buffer_size, out));
        writer.write_all(&MAGIC)?;

        let files = archive.all_files();
        let mut extents = Vec::with_capacity(files.len());
        for file in files {
            let offset = writer.logical_position();
            let (mut stream, counter) = file.measured_coded_stream(&self.registry)?;
            io::copy(&mut stream, &mut writer).map_err(ArchiveError::from_stream)?;
            let length = writer.logical_position() - offset;
            let size = counter.map_or(file.size(), |counter| counter.count());
            if size != file.size() {
                debug!(
                    "{:?} changed since it was added: {} bytes, now {}",
                    file.name(),
                    file.size(),
                    size
                );
            }
            debug!(
                "Stored {:?}: {} bytes coded to {} at offset {}",
                file.name(),
                size,
                length,
                offset
            );
            extents.push(Extent {
                offset,
                length,
                size,
            });
        }

        writer.write_marker()?;
        let mut extents = extents.into_iter();
        write_directory(archive, archive.root(), &mut extents, &mut writer)?;

        writer.into_inner().flush()?;
        info!("Saved {} files", archive.file_count());
        Ok(())
    }

    /// Save to `path` through a temporary file in the same directory
    ///
    /// The destination is replaced only once the whole container has been
    /// written, so an archive may be saved over the container it was loaded
    /// from. Files of the saved archive still point at the old layout; load
    /// the new container before reading from it again.
    pub fn save_to_path<P: AsRef<Path>>(&self, archive: &Archive, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        info!("Saving archive to {:?}", path);

        let mut temp = NamedTempFile::new_in(dir).map_err(|source| {
            ArchiveError::GenerationFailure {
                resource: dir.display().to_string(),
                source,
            }
        })?;
        self.save(archive, temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| ArchiveError::Io(e.error))?;
        Ok(())
    }
}

/// Every name must fit the header and be unique within its directory
fn check_names(archive: &Archive, id: DirId) -> Result<()> {
    let dir = archive.directory(id);
    let mut seen = HashSet::new();
    let subdirectories = dir.subdirectories().iter().map(|&sub| archive.directory(sub).name());
    for name in subdirectories.chain(dir.files().iter().map(|f| f.name())) {
        header::validate_name(name)?;
        if !seen.insert(name) {
            return Err(ArchiveError::InvalidName(format!(
                "{:?} appears twice in {:?}",
                name,
                archive.path_of(id)
            )));
        }
    }
    for &sub in dir.subdirectories() {
        check_names(archive, sub)?;
    }
    Ok(())
}

fn write_directory<W: Write>(
    archive: &Archive,
    id: DirId,
    extents: &mut impl Iterator<Item = Extent>,
    out: &mut W,
) -> Result<()> {
    let dir = archive.directory(id);
    for &sub in dir.subdirectories() {
        HeaderEntry::DirStart(archive.directory(sub).name().to_string()).write_to(out)?;
        write_directory(archive, sub, extents, out)?;
        HeaderEntry::DirEnd.write_to(out)?;
    }
    for file in dir.files() {
        let extent = extents.next().ok_or_else(|| {
            ArchiveError::MalformedArchive("archive changed while saving".into())
        })?;
        HeaderEntry::File(FileRecord {
            codec_id: file.codec_id(),
            size: extent.size,
            offset: extent.offset,
            length: extent.length,
            name: file.name().to_string(),
        })
        .write_to(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveFile, ArchiveLoader};
    use crate::codec::{HUFFMAN_CODEC_ID, NONE_CODEC_ID};
    use crate::source::{MemorySource, StreamSource};
    use std::io::Read;
    use std::sync::Arc;

    fn file(name: &str, data: &[u8], codec_id: u64) -> ArchiveFile {
        ArchiveFile::pending(
            name,
            data.len() as u64,
            codec_id,
            Arc::new(MemorySource::new(data.to_vec())),
        )
    }

    #[test]
    fn test_first_body_byte_at_offset_eight() {
        let mut archive = Archive::new();
        let root = archive.root();
        archive.add_file(root, file("raw", b"xyz", NONE_CODEC_ID));

        let mut bytes = Vec::new();
        ArchiveSaver::default().save(&archive, &mut bytes).unwrap();

        assert_eq!(&bytes[..8], &MAGIC);
        assert_eq!(&bytes[8..11], b"xyz");
        assert_eq!(bytes[11], 0x01);

        let mut header = &bytes[12..];
        match HeaderEntry::read_from(&mut header).unwrap() {
            Some(HeaderEntry::File(record)) => {
                assert_eq!(record.offset, 8);
                assert_eq!(record.length, 3);
                assert_eq!(record.size, 3);
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_escaped_body_round_trip() {
        let data = [0x01u8, 0x1B, 0x01, 0x00, 0x1B];
        let mut archive = Archive::new();
        let root = archive.root();
        archive.add_file(root, file("reserved", &data, NONE_CODEC_ID));
        archive.add_file(root, file("after", b"tail", HUFFMAN_CODEC_ID));

        let mut bytes = Vec::new();
        ArchiveSaver::default().save(&archive, &mut bytes).unwrap();
        let source: Arc<dyn StreamSource> = Arc::new(MemorySource::new(bytes));
        let loaded = ArchiveLoader::default().load(source).unwrap();

        let registry = CodecRegistry::default();
        let mut out = Vec::new();
        let files = loaded.all_files();
        files[0]
            .decoded_stream(&registry)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);

        out.clear();
        files[1]
            .decoded_stream(&registry)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"tail");
    }

    #[test]
    fn test_overlong_name_fails_before_writing() {
        let mut archive = Archive::new();
        let root = archive.root();
        archive.add_file(root, file(&"x".repeat(70_000), b"data", NONE_CODEC_ID));

        let mut bytes = Vec::new();
        let result = ArchiveSaver::default().save(&archive, &mut bytes);
        assert!(matches!(result, Err(ArchiveError::InvalidName(_))));
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_unknown_codec_aborts_save() {
        let mut archive = Archive::new();
        let root = archive.root();
        archive.add_file(root, file("odd", b"data", 0xABCD));

        let result = ArchiveSaver::default().save(&archive, io::sink());
        assert!(matches!(result, Err(ArchiveError::UnknownCodec(0xABCD))));
    }

    #[test]
    fn test_header_records_measured_size() {
        let mut archive = Archive::new();
        let root = archive.root();
        archive.add_file(
            root,
            ArchiveFile::pending(
                "stale",
                2,
                NONE_CODEC_ID,
                Arc::new(MemorySource::new(b"longer now".to_vec())),
            ),
        );

        let mut bytes = Vec::new();
        ArchiveSaver::default().save(&archive, &mut bytes).unwrap();
        let loaded = ArchiveLoader::default()
            .load(Arc::new(MemorySource::new(bytes)))
            .unwrap();
        assert_eq!(loaded.all_files()[0].size(), 10);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut archive = Archive::new();
        let root = archive.root();
        archive.add_file(root, file("twin", b"one", NONE_CODEC_ID));
        archive.add_file(root, file("twin", b"two", NONE_CODEC_ID));

        let mut bytes = Vec::new();
        let result = ArchiveSaver::default().save(&archive, &mut bytes);
        assert!(matches!(result, Err(ArchiveError::InvalidName(_))));
        assert!(bytes.is_empty());

        let mut archive = Archive::new();
        archive.add_directory(root, "twin");
        archive.add_file(root, file("twin", b"one", NONE_CODEC_ID));
        let result = ArchiveSaver::default().save(&archive, io::sink());
        assert!(matches!(result, Err(ArchiveError::InvalidName(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let zero_buffer = PipelineConfig::default().with_buffer_size(0);
        assert!(matches!(
            ArchiveSaver::default().with_config(zero_buffer),
            Err(ArchiveError::Config(_))
        ));
        assert!(ArchiveSaver::default()
            .with_config(PipelineConfig::default().with_buffer_size(1))
            .is_ok());
    }
}
