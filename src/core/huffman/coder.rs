use super::tree::{FrequencyTable, HuffmanTree};
use super::{stream_failure, CODEC_NAME};
use crate::bitio::BitWriter;
use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crate::pipe::{self, PipeReader};
use crate::source::StreamSource;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::debug;

/// Huffman encoder
///
/// Opens its source twice: the first pass tallies byte frequencies, the
/// second feeds the producer thread that writes the tree and payload.
#[derive(Debug, Clone, Default)]
pub struct HuffmanCoder {
    config: PipelineConfig,
}

impl HuffmanCoder {
    pub fn new(config: PipelineConfig) -> Self {
        HuffmanCoder { config }
    }

    /// Start encoding `source`; returns as soon as the tree is built
    pub fn encode(&self, source: Arc<dyn StreamSource>) -> Result<PipeReader> {
        let table = FrequencyTable::from_reader(source.open()?).map_err(stream_failure)?;
        let tree = HuffmanTree::from_frequencies(&table).ok_or(ArchiveError::EmptyInput)?;
        debug!(
            "Huffman tree built: {} bytes, {} distinct values",
            tree.total(),
            table.distinct()
        );

        let input = source.open()?;
        pipe::spawn("huffman-encode", &self.config, move |out| {
            encode_payload(&tree, input, out)
        })
    }
}

/// Write the serialized tree followed by the bit-packed codes of `input`
///
/// `input` must yield exactly the bytes the tree was built from.
pub(crate) fn encode_payload<R: Read, W: Write>(
    tree: &HuffmanTree,
    mut input: R,
    mut out: W,
) -> Result<()> {
    tree.write_to(&mut out).map_err(stream_failure)?;

    let codes = tree.codes();
    let mut bits = BitWriter::new(out);
    let mut buffer = vec![0u8; 64 * 1024];
    let mut consumed = 0u64;
    loop {
        let n = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(stream_failure(e)),
        };
        for &byte in &buffer[..n] {
            let code = codes[byte as usize].as_ref().ok_or_else(|| {
                ArchiveError::codec_failure(
                    CODEC_NAME,
                    format!("byte {:#04x} not in tree; source changed between passes", byte),
                )
            })?;
            bits.write_code(code).map_err(stream_failure)?;
        }
        consumed += n as u64;
    }

    if consumed != tree.total() {
        return Err(ArchiveError::codec_failure(
            CODEC_NAME,
            format!(
                "source yielded {} bytes on the second pass, expected {}",
                consumed,
                tree.total()
            ),
        ));
    }

    bits.finish().map_err(stream_failure)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ByteStream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that returns different content on every open
    #[derive(Debug, Default)]
    struct ShrinkingSource {
        opened: AtomicUsize,
    }

    impl StreamSource for ShrinkingSource {
        fn open(&self) -> Result<ByteStream> {
            let n = self.opened.fetch_add(1, Ordering::SeqCst);
            let data = vec![b'q'; 100 - n * 10];
            Ok(Box::new(io::Cursor::new(data)))
        }
    }

    #[test]
    fn test_header_then_payload() {
        let mut out = Vec::new();
        let tree = HuffmanTree::from_bytes(b"ab").unwrap();
        encode_payload(&tree, &b"ab"[..], &mut out).unwrap();

        // leaf a, leaf b, root, terminator, then one payload byte
        assert_eq!(out.len(), 4 * 8 + 1);
        // a = 1, b = 0 -> 10 padded
        assert_eq!(out[32], 0b1000_0000);
    }

    #[test]
    fn test_single_symbol_has_no_payload() {
        let mut out = Vec::new();
        let tree = HuffmanTree::from_bytes(b"xxxxxxxx").unwrap();
        encode_payload(&tree, &b"xxxxxxxx"[..], &mut out).unwrap();
        assert_eq!(out.len(), 2 * 8);
    }

    #[test]
    fn test_changed_source_fails_stream() {
        let coder = HuffmanCoder::default();
        let mut reader = coder.encode(Arc::new(ShrinkingSource::default())).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(matches!(
            ArchiveError::from_stream(err),
            ArchiveError::CodecFailure { .. }
        ));
    }
}
