use super::tree::{HuffmanTree, Node};
use super::{stream_failure, CODEC_NAME};
use crate::bitio::BitReader;
use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crate::pipe::{self, PipeReader};
use crate::source::StreamSource;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

const RUN_BLOCK: usize = 64 * 1024;

/// Huffman decoder
#[derive(Debug, Clone, Default)]
pub struct HuffmanDecoder {
    config: PipelineConfig,
}

impl HuffmanDecoder {
    pub fn new(config: PipelineConfig) -> Self {
        HuffmanDecoder { config }
    }

    /// Parse the tree from `source` and start decoding the payload
    ///
    /// A corrupt tree is reported here as [`ArchiveError::MalformedArchive`];
    /// payload problems surface as read errors on the returned stream.
    pub fn decode(&self, source: Arc<dyn StreamSource>) -> Result<PipeReader> {
        let mut input = source.open()?;
        let tree = HuffmanTree::read_from(&mut input)?;
        debug!("Huffman tree parsed: {} bytes to decode", tree.total());

        pipe::spawn("huffman-decode", &self.config, move |out| {
            decode_payload(&tree, input, out)
        })
    }
}

/// Walk payload bits through `tree`, writing exactly `tree.total()` bytes
pub(crate) fn decode_payload<R: Read, W: Write>(
    tree: &HuffmanTree,
    input: R,
    mut out: W,
) -> Result<()> {
    let total = tree.total();
    let root = tree.root();

    if let Node::Leaf { byte, .. } = root {
        let block = [*byte; RUN_BLOCK];
        let mut left = total;
        while left > 0 {
            let n = left.min(RUN_BLOCK as u64) as usize;
            out.write_all(&block[..n]).map_err(stream_failure)?;
            left -= n as u64;
        }
        return out.flush().map_err(stream_failure);
    }

    let mut bits = BitReader::new(input);
    let mut staged = Vec::with_capacity(RUN_BLOCK);
    let mut produced = 0u64;
    let mut node = root;
    while produced < total {
        let bit = match bits.read_bit().map_err(stream_failure)? {
            Some(bit) => bit,
            None => {
                // Hand over what was decoded before reporting the truncation.
                out.write_all(&staged).map_err(stream_failure)?;
                return Err(ArchiveError::codec_failure(
                    CODEC_NAME,
                    format!(
                        "coded stream ended after {} of {} bytes",
                        produced + staged.len() as u64,
                        total
                    ),
                ));
            }
        };

        if let Node::Internal { left, right, .. } = node {
            node = if bit { &**left } else { &**right };
        }
        if let Node::Leaf { byte, .. } = node {
            staged.push(*byte);
            node = root;
            if staged.len() == RUN_BLOCK || produced + staged.len() as u64 == total {
                out.write_all(&staged).map_err(stream_failure)?;
                produced += staged.len() as u64;
                staged.clear();
            }
        }
    }
    out.flush().map_err(stream_failure)
}
