//! Stream factories
//!
//! A [`StreamSource`] produces a *fresh* readable stream every time it is
//! opened. Codecs that need two passes over their input (the Huffman coder
//! tallies frequencies first) simply open the source twice, and archive files
//! can regenerate their bytes whenever a save or extraction asks for them.

use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crate::framing::EscapingReader;
use crate::segment::Segment;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Readable byte stream handed out by sources and codecs
pub type ByteStream = Box<dyn Read + Send>;

/// Repeatable producer of readable byte streams
pub trait StreamSource: Send + Sync + fmt::Debug {
    /// Open a new stream positioned at the start of the resource
    ///
    /// Fails with [`ArchiveError::GenerationFailure`] when the resource
    /// cannot be opened.
    fn open(&self) -> Result<ByteStream>;
}

/// Source backed by a file on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    buffer_size: usize,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_config(path, &PipelineConfig::default())
    }

    pub fn with_config<P: AsRef<Path>>(path: P, config: &PipelineConfig) -> Self {
        FileSource {
            path: path.as_ref().to_path_buf(),
            buffer_size: config.buffer_size.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StreamSource for FileSource {
    fn open(&self) -> Result<ByteStream> {
        debug!("Opening {:?}", self.path);
        let file = File::open(&self.path).map_err(|source| ArchiveError::GenerationFailure {
            resource: self.path.display().to_string(),
            source,
        })?;
        Ok(Box::new(BufReader::with_capacity(self.buffer_size, file)))
    }
}

/// Source backed by shared in-memory bytes
#[derive(Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        MemorySource { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("len", &self.data.len())
            .finish()
    }
}

impl StreamSource for MemorySource {
    fn open(&self) -> Result<ByteStream> {
        Ok(Box::new(SharedCursor {
            data: Arc::clone(&self.data),
            pos: 0,
        }))
    }
}

struct SharedCursor {
    data: Arc<[u8]>,
    pos: usize,
}

impl Read for SharedCursor {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Source for one file's coded bytes inside a container
///
/// Opens the container, removes the framing escapes and exposes the
/// `length` logical bytes found at `offset`.
#[derive(Debug, Clone)]
pub struct SegmentSource {
    container: Arc<dyn StreamSource>,
    offset: u64,
    length: u64,
    buffer_size: usize,
}

impl SegmentSource {
    pub fn new(
        container: Arc<dyn StreamSource>,
        offset: u64,
        length: u64,
        config: &PipelineConfig,
    ) -> Self {
        SegmentSource {
            container,
            offset,
            length,
            // An empty BufReader buffer reads as end of stream.
            buffer_size: config.buffer_size.max(1),
        }
    }

    /// Number of coded bytes in the segment
    pub fn length(&self) -> u64 {
        self.length
    }
}

impl StreamSource for SegmentSource {
    fn open(&self) -> Result<ByteStream> {
        let raw = BufReader::with_capacity(self.buffer_size, self.container.open()?);
        Ok(Box::new(Segment::new(
            EscapingReader::new(raw),
            self.offset,
            self.length,
        )))
    }
}

/// Source that counts the bytes its latest stream has yielded
///
/// Each [`open`](StreamSource::open) resets the count, so after a two-pass
/// codec finishes, [`count`](CountingSource::count) holds the size of the
/// final pass.
#[derive(Debug)]
pub struct CountingSource {
    inner: Arc<dyn StreamSource>,
    count: Arc<AtomicU64>,
}

impl CountingSource {
    pub fn new(inner: Arc<dyn StreamSource>) -> Self {
        CountingSource {
            inner,
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bytes read from the most recently opened stream
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl StreamSource for CountingSource {
    fn open(&self) -> Result<ByteStream> {
        let inner = self.inner.open()?;
        self.count.store(0, Ordering::SeqCst);
        Ok(Box::new(CountingReader {
            inner,
            count: Arc::clone(&self.count),
        }))
    }
}

struct CountingReader {
    inner: ByteStream,
    count: Arc<AtomicU64>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::SeqCst);
        Ok(n)
    }
}
