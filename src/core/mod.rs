//! Container format, codecs and streaming plumbing

pub mod archive;
pub mod bitio;
pub mod codec;
pub mod config;
pub mod error;
pub mod framing;
pub mod header;
pub mod huffman;
pub mod pipe;
pub mod segment;
pub mod source;
