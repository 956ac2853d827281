//! Huffman tree construction, code derivation and word serialization
//!
//! # Serialized form
//!
//! The tree is written post-order (children before parent), one big-endian
//! `u64` word per node, followed by an all-zero terminator word:
//!
//! ```text
//! leaf:     1 | frequency (55 bits) | byte (8 bits)
//! internal: 0 | frequency (55 bits) | 0    (8 bits)
//! ```

use crate::error::{ArchiveError, Result};
use bitvec::prelude::*;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::io::{self, Read, Write};

/// Mask applied to frequencies before they are packed into a word
pub const FREQUENCY_MASK: u64 = 0x007F_FFFF_FFFF_FFFF;

const LEAF_FLAG: u64 = 1 << 63;

/// A tree over 256 symbols never has more than 511 nodes.
const MAX_NODES: usize = 2 * 256 - 1;

/// A bit code, first bit first
pub type Code = BitVec<u8, Msb0>;

/// Byte frequency table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u64; 256],
}

impl FrequencyTable {
    pub fn new() -> Self {
        FrequencyTable { counts: [0; 256] }
    }

    /// Tally every byte of `input`
    pub fn from_reader<R: Read>(mut input: R) -> io::Result<Self> {
        let mut table = FrequencyTable::new();
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let n = match input.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            table.add(&buffer[..n]);
        }
        Ok(table)
    }

    pub fn add(&mut self, data: &[u8]) {
        for &byte in data {
            self.counts[byte as usize] += 1;
        }
    }

    pub fn count(&self, byte: u8) -> u64 {
        self.counts[byte as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Number of distinct byte values seen
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&c| c != 0).count()
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Huffman tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf {
        byte: u8,
        frequency: u64,
    },
    Internal {
        left: Box<Node>,
        right: Box<Node>,
        frequency: u64,
    },
}

impl Node {
    pub fn frequency(&self) -> u64 {
        match self {
            Node::Leaf { frequency, .. } | Node::Internal { frequency, .. } => *frequency,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    fn word(&self) -> u64 {
        match self {
            Node::Leaf { byte, frequency } => {
                LEAF_FLAG | (frequency & FREQUENCY_MASK) << 8 | *byte as u64
            }
            Node::Internal { frequency, .. } => (frequency & FREQUENCY_MASK) << 8,
        }
    }
}

/// Priority-queue entry
///
/// Ordered by frequency, then leaves before internal nodes, then byte value
/// (leaves) or creation order (internal nodes).
struct Candidate {
    key: (u64, u8, u64),
    node: Node,
}

impl Candidate {
    fn leaf(byte: u8, frequency: u64) -> Self {
        Candidate {
            key: (frequency, 0, byte as u64),
            node: Node::Leaf { byte, frequency },
        }
    }

    fn internal(left: Node, right: Node, order: u64) -> Self {
        let frequency = left.frequency() + right.frequency();
        Candidate {
            key: (frequency, 1, order),
            node: Node::Internal {
                left: Box::new(left),
                right: Box::new(right),
                frequency,
            },
        }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Huffman tree over byte values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    root: Node,
}

impl HuffmanTree {
    /// Build a tree from byte frequencies
    ///
    /// Returns `None` when every count is zero.
    pub fn from_frequencies(table: &FrequencyTable) -> Option<Self> {
        let mut heap: BinaryHeap<Reverse<Candidate>> = (0..=255u8)
            .filter(|&byte| table.count(byte) != 0)
            .map(|byte| Reverse(Candidate::leaf(byte, table.count(byte))))
            .collect();

        let mut next_order = 0u64;
        loop {
            let Reverse(first) = heap.pop()?;
            let Some(Reverse(second)) = heap.pop() else {
                return Some(HuffmanTree { root: first.node });
            };
            heap.push(Reverse(Candidate::internal(
                first.node,
                second.node,
                next_order,
            )));
            next_order += 1;
        }
    }

    /// Build a tree directly from a byte slice
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let mut table = FrequencyTable::new();
        table.add(data);
        Self::from_frequencies(&table)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of symbols the tree encodes (the original input length)
    pub fn total(&self) -> u64 {
        self.root.frequency()
    }

    /// Derive per-byte codes: `1` for a left edge, `0` for a right edge
    ///
    /// Bytes absent from the tree get `None`. A single-leaf tree assigns its
    /// byte the empty code.
    pub fn codes(&self) -> Vec<Option<Code>> {
        let mut codes = vec![None; 256];
        let mut stack = vec![(&self.root, Code::new())];
        while let Some((node, code)) = stack.pop() {
            match node {
                Node::Leaf { byte, .. } => codes[*byte as usize] = Some(code),
                Node::Internal { left, right, .. } => {
                    let mut right_code = code.clone();
                    right_code.push(false);
                    let mut left_code = code;
                    left_code.push(true);
                    stack.push((&**right, right_code));
                    stack.push((&**left, left_code));
                }
            }
        }
        codes
    }

    /// Post-order node words, without the terminator
    pub fn to_words(&self) -> Vec<u64> {
        let mut words = Vec::new();
        // Iterative post-order: (node, children_done)
        let mut stack = vec![(&self.root, false)];
        while let Some((node, expanded)) = stack.pop() {
            match node {
                Node::Internal { left, right, .. } if !expanded => {
                    stack.push((node, true));
                    stack.push((&**right, false));
                    stack.push((&**left, false));
                }
                _ => words.push(node.word()),
            }
        }
        words
    }

    /// Rebuild a tree from post-order words (terminator excluded)
    pub fn from_words(words: &[u64]) -> Result<Self> {
        if words.len() > MAX_NODES {
            return Err(malformed(format!(
                "tree has {} nodes, at most {} allowed",
                words.len(),
                MAX_NODES
            )));
        }

        let mut stack: Vec<Node> = Vec::with_capacity(words.len());
        for &word in words {
            let frequency = (word >> 8) & FREQUENCY_MASK;
            if word & LEAF_FLAG != 0 {
                stack.push(Node::Leaf {
                    byte: (word & 0xFF) as u8,
                    frequency,
                });
                continue;
            }

            let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                return Err(malformed("internal node without two children"));
            };
            let children = left.frequency().wrapping_add(right.frequency()) & FREQUENCY_MASK;
            if children != frequency {
                return Err(malformed(format!(
                    "internal node frequency {} does not match children ({})",
                    frequency, children
                )));
            }
            stack.push(Node::Internal {
                left: Box::new(left),
                right: Box::new(right),
                frequency,
            });
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(root), true) => Ok(HuffmanTree { root }),
            (None, _) => Err(malformed("empty tree")),
            (Some(_), false) => Err(malformed(format!(
                "inconsistent tree: {} nodes left over",
                stack.len() + 1
            ))),
        }
    }

    /// Write the serialized tree, including the terminator word
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for word in self.to_words() {
            out.write_all(&word.to_be_bytes())?;
        }
        out.write_all(&0u64.to_be_bytes())
    }

    /// Read a serialized tree up to and including its terminator word
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut words = Vec::new();
        loop {
            let mut raw = [0u8; 8];
            input.read_exact(&mut raw).map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => malformed("tree truncated before terminator"),
                _ => ArchiveError::from_stream(e),
            })?;
            let word = u64::from_be_bytes(raw);
            if word == 0 {
                break;
            }
            if words.len() == MAX_NODES {
                return Err(malformed("tree terminator missing"));
            }
            words.push(word);
        }
        Self::from_words(&words)
    }
}

fn malformed(msg: impl Into<String>) -> ArchiveError {
    ArchiveError::MalformedArchive(msg.into())
}
