//! # huffpack - Huffman-coded archive containers
//!
//! `huffpack` stores a directory tree of files in a single container. Each
//! file is coded with a pluggable codec (Huffman or passthrough), and all
//! coding runs as a streaming pipeline so neither input nor output is ever
//! held in memory in full.
//!
//! - **Lazy containers**: loading parses only the header; file data is read
//!   on demand through fresh streams
//! - **Streaming codecs**: each encode/decode runs on a producer thread behind
//!   a bounded pipe
//! - **Atomic saves**: an archive can be saved over the container it came from
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use huffpack::{Archive, ArchiveLoader, ArchiveSaver, CodecRegistry, PipelineConfig, Result};
//! use huffpack::codec::HUFFMAN_CODEC_ID;
//!
//! # fn main() -> Result<()> {
//! let config = PipelineConfig::default();
//!
//! // Build an archive from files on disk
//! let mut archive = Archive::new();
//! let root = archive.root();
//! archive.add_path(root, "notes", HUFFMAN_CODEC_ID, &config)?;
//!
//! // Save it
//! let saver = ArchiveSaver::new(CodecRegistry::new(&config));
//! saver.save_to_path(&archive, "notes.hpk")?;
//!
//! // Load it back and extract everything
//! let loaded = ArchiveLoader::new(config)?.load_path("notes.hpk")?;
//! loaded.extract_all("restored", saver.registry())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Container Layout
//!
//! See [`header`] for the byte layout and [`huffman`] for the coded stream.

pub mod core;

// Re-export core modules so crate:: paths in core resolve
pub use crate::core::{
    archive, bitio, codec, config, error, framing, header, huffman, pipe, segment, source,
};

pub use crate::core::{
    archive::{Archive, ArchiveFile, ArchiveLoader, ArchiveSaver, DirId, Directory, Entry, Storage},
    codec::{Codec, CodecRegistry, NoneCodec},
    config::PipelineConfig,
    error::{ArchiveError, Result},
    huffman::HuffmanCodec,
    source::{ByteStream, CountingSource, FileSource, MemorySource, SegmentSource, StreamSource},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
