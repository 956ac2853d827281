//! In-memory archive model
//!
//! An [`Archive`] is a tree of [`Directory`] nodes kept in an arena and
//! addressed by [`DirId`]. Each directory owns its files in insertion order;
//! subdirectories are referenced by id, and every directory except the root
//! knows its parent.
//!
//! Files never hold open resources. A file loaded from a container carries a
//! [`SegmentSource`] pointing at its coded bytes; a file added from outside
//! carries the source of its raw bytes and is coded when the archive is
//! saved.

pub mod entry;
pub mod fs;
pub mod loader;
pub mod saver;

pub use entry::Entry;
pub use loader::ArchiveLoader;
pub use saver::ArchiveSaver;

use crate::codec::{Codec, CodecRegistry};
use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crate::source::{ByteStream, CountingSource, SegmentSource, StreamSource};
use std::fmt;
use std::io;
use std::sync::Arc;

/// Name given to the root directory of every archive
pub const ROOT_NAME: &str = "root_directory";

/// Handle to a directory inside one [`Archive`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirId(usize);

/// A directory node
#[derive(Debug, Clone)]
pub struct Directory {
    name: String,
    parent: Option<DirId>,
    files: Vec<ArchiveFile>,
    subdirectories: Vec<DirId>,
    detached: bool,
}

impl Directory {
    fn new(name: String, parent: Option<DirId>) -> Self {
        Directory {
            name,
            parent,
            files: Vec::new(),
            subdirectories: Vec::new(),
            detached: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<DirId> {
        self.parent
    }

    pub fn files(&self) -> &[ArchiveFile] {
        &self.files
    }

    pub fn subdirectories(&self) -> &[DirId] {
        &self.subdirectories
    }

    pub fn file(&self, name: &str) -> Option<&ArchiveFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Whether this directory was removed from its parent
    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

/// Where a file's bytes come from
#[derive(Debug, Clone)]
pub enum Storage {
    /// Coded bytes inside a loaded container
    Coded { segment: Arc<SegmentSource> },
    /// Raw bytes outside any container, coded on save
    Pending { source: Arc<dyn StreamSource> },
}

/// A file entry
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    name: String,
    size: u64,
    codec_id: u64,
    storage: Storage,
}

impl ArchiveFile {
    /// File whose coded bytes live at `offset`/`length` in `container`
    pub fn coded(
        name: impl Into<String>,
        size: u64,
        codec_id: u64,
        container: Arc<dyn StreamSource>,
        offset: u64,
        length: u64,
        config: &PipelineConfig,
    ) -> Self {
        ArchiveFile {
            name: name.into(),
            size,
            codec_id,
            storage: Storage::Coded {
                segment: Arc::new(SegmentSource::new(container, offset, length, config)),
            },
        }
    }

    /// File whose raw bytes come from `source` and get coded with `codec_id`
    pub fn pending(
        name: impl Into<String>,
        size: u64,
        codec_id: u64,
        source: Arc<dyn StreamSource>,
    ) -> Self {
        ArchiveFile {
            name: name.into(),
            size,
            codec_id,
            storage: Storage::Pending { source },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncoded size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn codec_id(&self) -> u64 {
        self.codec_id
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.storage, Storage::Pending { .. })
    }

    /// Stream of this file's bytes in coded form
    ///
    /// The codec is resolved before anything is opened, so an unknown codec
    /// fails without I/O. A pending source that turns out to be empty when
    /// read yields an empty stream, whatever size was declared for it.
    pub fn coded_stream(&self, registry: &CodecRegistry) -> Result<ByteStream> {
        let codec = registry.lookup(self.codec_id)?;
        match &self.storage {
            Storage::Coded { segment } => segment.open(),
            Storage::Pending { source } => encode_or_empty(codec.as_ref(), Arc::clone(source)),
        }
    }

    /// Like [`coded_stream`](Self::coded_stream), also counting the raw bytes
    /// a pending file feeds its codec
    ///
    /// The counter is `None` for coded files, whose size comes from the
    /// container header.
    pub(crate) fn measured_coded_stream(
        &self,
        registry: &CodecRegistry,
    ) -> Result<(ByteStream, Option<Arc<CountingSource>>)> {
        let codec = registry.lookup(self.codec_id)?;
        match &self.storage {
            Storage::Coded { segment } => Ok((segment.open()?, None)),
            Storage::Pending { source } => {
                let counted = Arc::new(CountingSource::new(Arc::clone(source)));
                let stream =
                    encode_or_empty(codec.as_ref(), counted.clone() as Arc<dyn StreamSource>)?;
                Ok((stream, Some(counted)))
            }
        }
    }

    /// Stream of this file's original bytes
    pub fn decoded_stream(&self, registry: &CodecRegistry) -> Result<ByteStream> {
        let codec = registry.lookup(self.codec_id)?;
        match &self.storage {
            // No coded bytes means nothing was stored.
            Storage::Coded { segment } if segment.length() == 0 => Ok(Box::new(io::empty())),
            Storage::Coded { segment } => codec.decode(segment.clone() as Arc<dyn StreamSource>),
            Storage::Pending { source } => source.open(),
        }
    }

    /// `File[<name>, <size>B, <codec name>]`
    pub fn describe(&self, registry: &CodecRegistry) -> String {
        FileDisplay {
            file: self,
            codec: registry.name_of(self.codec_id),
        }
        .to_string()
    }
}

fn encode_or_empty(codec: &dyn Codec, source: Arc<dyn StreamSource>) -> Result<ByteStream> {
    match codec.encode(source) {
        Err(ArchiveError::EmptyInput) => Ok(Box::new(io::empty())),
        other => other,
    }
}

struct FileDisplay<'a> {
    file: &'a ArchiveFile,
    codec: Option<&'static str>,
}

impl fmt::Display for FileDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File[{}, {}B, {}]",
            self.file.name,
            self.file.size,
            self.codec.unwrap_or("unknown codec")
        )
    }
}

/// Directory tree of an archive
#[derive(Debug, Clone)]
pub struct Archive {
    directories: Vec<Directory>,
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive {
    /// Empty archive with only the root directory
    pub fn new() -> Self {
        Archive {
            directories: vec![Directory::new(ROOT_NAME.to_string(), None)],
        }
    }

    pub fn root(&self) -> DirId {
        DirId(0)
    }

    /// Look up a directory
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this archive.
    pub fn directory(&self, id: DirId) -> &Directory {
        &self.directories[id.0]
    }

    fn directory_mut(&mut self, id: DirId) -> &mut Directory {
        &mut self.directories[id.0]
    }

    /// Create a subdirectory of `parent` and return its id
    pub fn add_directory(&mut self, parent: DirId, name: impl Into<String>) -> DirId {
        let id = DirId(self.directories.len());
        self.directories.push(Directory::new(name.into(), Some(parent)));
        self.directory_mut(parent).subdirectories.push(id);
        id
    }

    /// Detach `child` from `parent`; returns false if it was not a child
    ///
    /// The detached directory and everything below it become unreachable
    /// from the root. The child keeps its parent link, so the root stays the
    /// only directory without one; use [`is_attached`](Self::is_attached) to
    /// tell whether an id is still part of the tree.
    pub fn remove_directory(&mut self, parent: DirId, child: DirId) -> bool {
        let subdirectories = &mut self.directory_mut(parent).subdirectories;
        match subdirectories.iter().position(|&id| id == child) {
            Some(index) => {
                subdirectories.remove(index);
                self.directory_mut(child).detached = true;
                true
            }
            None => false,
        }
    }

    /// Whether `id` is still reachable from the root
    pub fn is_attached(&self, id: DirId) -> bool {
        let mut current = id;
        loop {
            let dir = self.directory(current);
            if dir.detached {
                return false;
            }
            match dir.parent {
                Some(parent) => current = parent,
                None => return true,
            }
        }
    }

    /// Whether `dir` already holds a file or subdirectory called `name`
    pub fn contains_name(&self, dir: DirId, name: &str) -> bool {
        let dir = self.directory(dir);
        dir.file(name).is_some()
            || dir
                .subdirectories
                .iter()
                .any(|&sub| self.directory(sub).name == name)
    }

    pub fn add_file(&mut self, dir: DirId, file: ArchiveFile) {
        self.directory_mut(dir).files.push(file);
    }

    /// Remove the first file called `name` from `dir`
    pub fn remove_file(&mut self, dir: DirId, name: &str) -> Option<ArchiveFile> {
        let files = &mut self.directory_mut(dir).files;
        let index = files.iter().position(|f| f.name == name)?;
        Some(files.remove(index))
    }

    /// Find a direct subdirectory of `parent` by name
    pub fn find_directory(&self, parent: DirId, name: &str) -> Option<DirId> {
        self.directory(parent)
            .subdirectories
            .iter()
            .copied()
            .find(|&id| self.directory(id).name == name)
    }

    pub fn parent(&self, id: DirId) -> Option<DirId> {
        self.directory(id).parent
    }

    /// Slash-separated path of `id` below the root; empty for the root
    ///
    /// A detached directory reports the path it had when it was removed.
    pub fn path_of(&self, id: DirId) -> String {
        let mut names = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            names.push(self.directory(current).name.as_str());
            current = parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Sum of file sizes under `id`, recursively
    pub fn directory_size(&self, id: DirId) -> u64 {
        let dir = self.directory(id);
        let own: u64 = dir.files.iter().map(|f| f.size).sum();
        own + dir
            .subdirectories
            .iter()
            .map(|&sub| self.directory_size(sub))
            .sum::<u64>()
    }

    /// Total uncoded size of every file
    pub fn size(&self) -> u64 {
        self.directory_size(self.root())
    }

    /// Every file, subdirectories first, in the order the container stores them
    pub fn all_files(&self) -> Vec<&ArchiveFile> {
        let mut files = Vec::new();
        self.collect_files(self.root(), &mut files);
        files
    }

    fn collect_files<'a>(&'a self, id: DirId, out: &mut Vec<&'a ArchiveFile>) {
        let dir = self.directory(id);
        for &sub in &dir.subdirectories {
            self.collect_files(sub, out);
        }
        out.extend(dir.files.iter());
    }

    pub fn file_count(&self) -> usize {
        self.all_files().len()
    }
}
