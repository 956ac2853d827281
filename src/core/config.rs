//! Streaming pipeline configuration
//!
//! Controls the buffer sizes used when reading sources and containers, and the
//! shape of the bounded pipe between codec producer threads and their readers.
//!
//! ```toml
//! buffer_size = 65536
//! chunk_size = 65536
//! pipe_capacity = 16
//! ```

use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default read/write buffer size (64 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default size of a single chunk sent through the pipe (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default number of chunks the pipe holds before the producer blocks
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of buffered readers/writers wrapped around sources and sinks
    pub buffer_size: usize,

    /// Bytes accumulated by a producer before a chunk is sent to the reader
    pub chunk_size: usize,

    /// Maximum number of in-flight chunks per pipe
    ///
    /// Memory held by one pipe is bounded by `chunk_size * (pipe_capacity + 2)`.
    pub pipe_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            buffer_size: DEFAULT_BUFFER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML text, filling missing keys with defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| ArchiveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            ArchiveError::GenerationFailure {
                resource: path.as_ref().display().to_string(),
                source,
            }
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate all fields
    ///
    /// Every size must be non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(ArchiveError::Config("buffer_size must be non-zero".into()));
        }
        if self.chunk_size == 0 {
            return Err(ArchiveError::Config("chunk_size must be non-zero".into()));
        }
        if self.pipe_capacity == 0 {
            return Err(ArchiveError::Config("pipe_capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Set the buffer size
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the pipe capacity
    pub fn with_pipe_capacity(mut self, pipe_capacity: usize) -> Self {
        self.pipe_capacity = pipe_capacity;
        self
    }
}
