//! Moving files between the host filesystem and an archive

use super::{Archive, ArchiveFile, DirId};
use crate::codec::CodecRegistry;
use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crate::source::FileSource;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

fn generation_failure(path: &Path, source: io::Error) -> ArchiveError {
    ArchiveError::GenerationFailure {
        resource: path.display().to_string(),
        source,
    }
}

fn final_component(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ArchiveError::InvalidName(format!("{:?} has no UTF-8 file name", path))
        })
}

/// Reject names that would escape the extraction directory
pub fn check_extract_name(name: &str) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(ArchiveError::InvalidName(format!(
            "{:?} cannot be extracted",
            name
        )));
    }
    Ok(())
}

impl ArchiveFile {
    /// Pending file for the regular file at `path`
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        codec_id: u64,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| generation_failure(path, e))?;
        let name = final_component(path)?;
        Ok(ArchiveFile::pending(
            name,
            metadata.len(),
            codec_id,
            Arc::new(FileSource::with_config(path, config)),
        ))
    }
}

impl Archive {
    /// Add a file or a whole directory tree from disk under `dir`
    ///
    /// Directory entries are added in name order. Anything that is neither
    /// a regular file nor a directory is skipped.
    pub fn add_path<P: AsRef<Path>>(
        &mut self,
        dir: DirId,
        path: P,
        codec_id: u64,
        config: &PipelineConfig,
    ) -> Result<()> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| generation_failure(path, e))?;

        if metadata.is_file() {
            debug!("Adding file {:?}", path);
            let file = ArchiveFile::from_path(path, codec_id, config)?;
            self.add_file(dir, file);
        } else if metadata.is_dir() {
            debug!("Adding directory {:?}", path);
            let sub = self.add_directory(dir, final_component(path)?);
            let mut children = fs::read_dir(path)
                .map_err(|e| generation_failure(path, e))?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<io::Result<Vec<PathBuf>>>()
                .map_err(|e| generation_failure(path, e))?;
            children.sort();
            for child in children {
                self.add_path(sub, child, codec_id, config)?;
            }
        } else {
            debug!("Skipping {:?}: not a file or directory", path);
        }
        Ok(())
    }

    /// Decode `file` into `dest_dir`, returning the written path
    pub fn extract_file<P: AsRef<Path>>(
        &self,
        file: &ArchiveFile,
        dest_dir: P,
        registry: &CodecRegistry,
    ) -> Result<PathBuf> {
        check_extract_name(file.name())?;
        let dest_dir = dest_dir.as_ref();
        fs::create_dir_all(dest_dir)?;

        let target = dest_dir.join(file.name());
        let mut stream = file.decoded_stream(registry)?;
        let mut out = BufWriter::new(File::create(&target)?);
        let written = io::copy(&mut stream, &mut out).map_err(ArchiveError::from_stream)?;
        out.flush()?;

        debug!("Extracted {:?} ({} bytes)", target, written);
        Ok(target)
    }

    /// Extract the contents of `dir` into `dest_dir`, recursively
    ///
    /// Fails with [`ArchiveError::InvalidName`] before writing anything for
    /// a directory whose entries share a name, since they would land on the
    /// same path.
    pub fn extract_directory<P: AsRef<Path>>(
        &self,
        dir: DirId,
        dest_dir: P,
        registry: &CodecRegistry,
    ) -> Result<()> {
        let dest_dir = dest_dir.as_ref();
        let directory = self.directory(dir);
        let mut seen = HashSet::new();
        let subdirectories = directory
            .subdirectories()
            .iter()
            .map(|&sub| self.directory(sub).name());
        for name in subdirectories.chain(directory.files().iter().map(|f| f.name())) {
            if !seen.insert(name) {
                return Err(ArchiveError::InvalidName(format!(
                    "{:?} appears twice in {:?}",
                    name,
                    self.path_of(dir)
                )));
            }
        }
        fs::create_dir_all(dest_dir)?;

        for &sub in directory.subdirectories() {
            let name = self.directory(sub).name();
            check_extract_name(name)?;
            self.extract_directory(sub, dest_dir.join(name), registry)?;
        }
        for file in directory.files() {
            self.extract_file(file, dest_dir, registry)?;
        }
        Ok(())
    }

    /// Extract the whole archive into `dest_dir`
    pub fn extract_all<P: AsRef<Path>>(&self, dest_dir: P, registry: &CodecRegistry) -> Result<()> {
        let dest_dir = dest_dir.as_ref();
        info!("Extracting {} files to {:?}", self.file_count(), dest_dir);
        self.extract_directory(self.root(), dest_dir, registry)
    }
}
