//! Codec interface and registry
//!
//! Every file in an archive names the codec that produced its coded bytes by
//! a 64-bit identifier. The registry resolves identifiers to implementations;
//! an unmapped identifier is an [`ArchiveError::UnknownCodec`] and no stream
//! is opened.

use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crate::huffman::HuffmanCodec;
use crate::source::{ByteStream, StreamSource};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identifier of the passthrough codec ("None\0\0\0\0")
pub const NONE_CODEC_ID: u64 = 0x4E6F_6E65_0000_0000;

/// Identifier of the Huffman codec ("\0HUFFMAN")
pub const HUFFMAN_CODEC_ID: u64 = 0x0048_5546_464D_414E;

/// Paired encode/decode capability
pub trait Codec: Send + Sync {
    /// Unique identifier stored in archive headers
    fn id(&self) -> u64;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Produce the coded form of `source`
    fn encode(&self, source: Arc<dyn StreamSource>) -> Result<ByteStream>;

    /// Produce the original bytes from the coded form in `source`
    fn decode(&self, source: Arc<dyn StreamSource>) -> Result<ByteStream>;
}

impl fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#018x})", self.name(), self.id())
    }
}

/// Codec that stores bytes unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneCodec;

impl Codec for NoneCodec {
    fn id(&self) -> u64 {
        NONE_CODEC_ID
    }

    fn name(&self) -> &'static str {
        "No codec"
    }

    fn encode(&self, source: Arc<dyn StreamSource>) -> Result<ByteStream> {
        source.open()
    }

    fn decode(&self, source: Arc<dyn StreamSource>) -> Result<ByteStream> {
        source.open()
    }
}

/// Lookup table from codec identifiers to implementations
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: BTreeMap<u64, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// Registry with no codecs at all
    pub fn empty() -> Self {
        CodecRegistry {
            codecs: BTreeMap::new(),
        }
    }

    /// Registry with the passthrough and Huffman codecs
    pub fn new(config: &PipelineConfig) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(NoneCodec));
        registry.register(Arc::new(HuffmanCodec::new(config.clone())));
        registry
    }

    /// Add (or replace) a codec under its own identifier
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.id(), codec);
    }

    /// Resolve an identifier
    pub fn lookup(&self, id: u64) -> Result<Arc<dyn Codec>> {
        self.codecs
            .get(&id)
            .cloned()
            .ok_or(ArchiveError::UnknownCodec(id))
    }

    /// Resolve a codec by name (case-insensitive)
    ///
    /// Accepts the codec's display name as well as the short aliases
    /// `none` and `huffman`.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Codec>> {
        let wanted = name.to_lowercase();
        let alias = match wanted.as_str() {
            "none" | "store" => Some(NONE_CODEC_ID),
            "huffman" | "huff" => Some(HUFFMAN_CODEC_ID),
            _ => None,
        };
        if let Some(id) = alias {
            if let Ok(codec) = self.lookup(id) {
                return Some(codec);
            }
        }
        self.codecs
            .values()
            .find(|codec| codec.name().to_lowercase() == wanted)
            .cloned()
    }

    /// Display name for an identifier, if known
    pub fn name_of(&self, id: u64) -> Option<&'static str> {
        self.codecs.get(&id).map(|codec| codec.name())
    }

    /// All registered codecs, ordered by identifier
    pub fn codecs(&self) -> impl Iterator<Item = &Arc<dyn Codec>> {
        self.codecs.values()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.codecs.values()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that counts how often it is opened
    #[derive(Debug, Default)]
    struct CountingSource {
        opened: AtomicUsize,
    }

    impl StreamSource for CountingSource {
        fn open(&self) -> Result<ByteStream> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(std::io::empty()))
        }
    }

    #[test]
    fn test_default_codecs() {
        let registry = CodecRegistry::default();
        assert_eq!(registry.lookup(NONE_CODEC_ID).unwrap().name(), "No codec");
        assert_eq!(registry.lookup(HUFFMAN_CODEC_ID).unwrap().name(), "Huffman");
        assert_eq!(registry.codecs().count(), 2);
    }

    #[test]
    fn test_unknown_codec_does_no_io() {
        let registry = CodecRegistry::default();
        let source = Arc::new(CountingSource::default());

        let result = registry
            .lookup(0xDEAD_BEEF)
            .and_then(|codec| codec.decode(source.clone()));

        assert!(matches!(result, Err(ArchiveError::UnknownCodec(0xDEAD_BEEF))));
        assert_eq!(source.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_by_name() {
        let registry = CodecRegistry::default();
        assert_eq!(registry.by_name("HUFFMAN").unwrap().id(), HUFFMAN_CODEC_ID);
        assert_eq!(registry.by_name("none").unwrap().id(), NONE_CODEC_ID);
        assert_eq!(registry.by_name("No codec").unwrap().id(), NONE_CODEC_ID);
        assert!(registry.by_name("lzma").is_none());
    }

    #[test]
    fn test_codec_ids_spell_their_names() {
        assert_eq!(&NONE_CODEC_ID.to_be_bytes()[..4], b"None");
        assert_eq!(&HUFFMAN_CODEC_ID.to_be_bytes()[1..], b"HUFFMAN");
    }
}
