use super::{Archive, ArchiveFile, DirId};
use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crate::framing::EscapingReader;
use crate::header::{HeaderEntry, MAGIC};
use crate::source::{FileSource, StreamSource};
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Rebuilds an [`Archive`] from a container's header
///
/// Only the header is parsed. File data stays in the container and is read
/// through fresh streams when a file is extracted or re-saved.
#[derive(Debug, Clone, Default)]
pub struct ArchiveLoader {
    config: PipelineConfig,
}

impl ArchiveLoader {
    /// Loader using `config` for buffering; fails if it does not validate
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(ArchiveLoader { config })
    }

    /// Load the container at `path`
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<Archive> {
        let source = FileSource::with_config(path, &self.config);
        info!("Loading archive {:?}", source.path());
        self.load(Arc::new(source))
    }

    /// Load a container from any repeatable source
    pub fn load(&self, container: Arc<dyn StreamSource>) -> Result<Archive> {
        let mut raw = container.open()?;

        let mut magic = [0u8; 8];
        raw.read_exact(&mut magic).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                ArchiveError::MalformedArchive("container shorter than its magic".into())
            }
            _ => ArchiveError::from_stream(e),
        })?;
        if magic != MAGIC {
            return Err(ArchiveError::MalformedArchive(format!(
                "bad magic {:#018x}",
                u64::from_be_bytes(magic)
            )));
        }

        let mut reader = EscapingReader::new(BufReader::with_capacity(self.config.buffer_size, raw));
        if !reader.skip_after_marker()? {
            return Err(ArchiveError::MalformedArchive(
                "no header marker after the body".into(),
            ));
        }

        let mut archive = Archive::new();
        let mut cursor = archive.root();
        let mut files = 0usize;
        while let Some(entry) = HeaderEntry::read_from(&mut reader)? {
            match entry {
                HeaderEntry::DirStart(name) => {
                    debug!("Directory {:?} under {:?}", name, archive.path_of(cursor));
                    check_unique(&archive, cursor, &name)?;
                    cursor = archive.add_directory(cursor, name);
                }
                HeaderEntry::DirEnd => {
                    cursor = archive.parent(cursor).ok_or_else(|| {
                        ArchiveError::MalformedArchive(
                            "directory end without a matching start".into(),
                        )
                    })?;
                }
                HeaderEntry::File(record) => {
                    debug!(
                        "File {:?}: {} bytes at offset {} ({} coded)",
                        record.name, record.size, record.offset, record.length
                    );
                    check_unique(&archive, cursor, &record.name)?;
                    let file = ArchiveFile::coded(
                        record.name,
                        record.size,
                        record.codec_id,
                        Arc::clone(&container),
                        record.offset,
                        record.length,
                        &self.config,
                    );
                    archive.add_file(cursor, file);
                    files += 1;
                }
            }
        }

        if cursor != archive.root() {
            return Err(ArchiveError::MalformedArchive(format!(
                "header ended inside directory {:?}",
                archive.path_of(cursor)
            )));
        }

        info!("Loaded {} files ({} bytes)", files, archive.size());
        Ok(archive)
    }
}

fn check_unique(archive: &Archive, dir: DirId, name: &str) -> Result<()> {
    if archive.contains_name(dir, name) {
        return Err(ArchiveError::MalformedArchive(format!(
            "{:?} appears twice in {:?}",
            name,
            archive.path_of(dir)
        )));
    }
    Ok(())
}
