//! Huffman codec
//!
//! Coded stream layout:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ tree words (u64 BE, post-order)          │
//! │ terminator (u64 0)                       │
//! ├──────────────────────────────────────────┤
//! │ payload bits, MSB-first, zero-padded     │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The root frequency equals the number of original bytes, so the decoder
//! knows exactly when to stop and ignores pad bits. A tree with a single leaf
//! acts as a run-length record: no payload bits are written and the decoder
//! repeats the leaf's byte `frequency` times.
//!
//! Both directions run on a producer thread feeding a bounded pipe (see
//! [`crate::pipe`]), so neither the coded nor the decoded form of a file is
//! ever held in memory in full.

pub mod coder;
pub mod decoder;
pub mod tree;

pub use coder::HuffmanCoder;
pub use decoder::HuffmanDecoder;
pub use tree::{Code, FrequencyTable, HuffmanTree, Node};

use crate::codec::{Codec, HUFFMAN_CODEC_ID};
use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crate::source::{ByteStream, StreamSource};
use std::io;
use std::sync::Arc;

pub(crate) const CODEC_NAME: &str = "huffman";

/// The Huffman codec as registered in a [`crate::codec::CodecRegistry`]
#[derive(Debug, Clone, Default)]
pub struct HuffmanCodec {
    coder: HuffmanCoder,
    decoder: HuffmanDecoder,
}

impl HuffmanCodec {
    pub fn new(config: PipelineConfig) -> Self {
        HuffmanCodec {
            coder: HuffmanCoder::new(config.clone()),
            decoder: HuffmanDecoder::new(config),
        }
    }
}

impl Codec for HuffmanCodec {
    fn id(&self) -> u64 {
        HUFFMAN_CODEC_ID
    }

    fn name(&self) -> &'static str {
        "Huffman"
    }

    fn encode(&self, source: Arc<dyn StreamSource>) -> Result<ByteStream> {
        Ok(Box::new(self.coder.encode(source)?))
    }

    fn decode(&self, source: Arc<dyn StreamSource>) -> Result<ByteStream> {
        Ok(Box::new(self.decoder.decode(source)?))
    }
}

/// Classify an I/O error raised while coding
///
/// Typed errors carried through nested streams keep their type; plain I/O
/// errors become codec failures.
pub(crate) fn stream_failure(err: io::Error) -> ArchiveError {
    match ArchiveError::from_stream(err) {
        ArchiveError::Io(io_err) => ArchiveError::codec_failure(CODEC_NAME, io_err),
        other => other,
    }
}

/// Encode a byte slice synchronously
///
/// Fails with [`ArchiveError::EmptyInput`] for an empty slice.
pub fn encode_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let tree = HuffmanTree::from_bytes(data).ok_or(ArchiveError::EmptyInput)?;
    let mut out = Vec::new();
    coder::encode_payload(&tree, data, &mut out)?;
    Ok(out)
}

/// Decode a complete coded buffer synchronously
pub fn decode_bytes(coded: &[u8]) -> Result<Vec<u8>> {
    let mut input = coded;
    let tree = HuffmanTree::read_from(&mut input)?;
    let mut out = Vec::with_capacity(tree.total().min(1 << 20) as usize);
    decoder::decode_payload(&tree, input, &mut out)?;
    Ok(out)
}
