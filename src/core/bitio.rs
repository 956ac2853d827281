//! Bit-level I/O over byte streams
//!
//! Both directions pack bits MSB-first: the first bit written lands in bit 7
//! of the first byte.
//!
//! # Padding Rules
//! - [`BitWriter::finish`] zero-pads any incomplete final byte, whether 1 or
//!   7 bits are pending.
//! - [`BitReader`] surfaces pad bits like any other bit; the caller knows how
//!   many symbols to decode and stops before reaching them.

use bitvec::prelude::*;
use std::io::{self, Read, Write};

/// Writes bits MSB-first to an underlying writer
///
/// # Invariants
/// - `pending` holds `pending_bits` bits aligned at the MSB
/// - `pending_bits` is always < 8
pub struct BitWriter<W: Write> {
    inner: W,
    pending: u8,
    pending_bits: u8,
    /// Completed bytes waiting to be handed to `inner`
    staged: Vec<u8>,
}

const STAGE_SIZE: usize = 4096;

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        BitWriter {
            inner,
            pending: 0,
            pending_bits: 0,
            staged: Vec::with_capacity(STAGE_SIZE),
        }
    }

    /// Write a single bit
    pub fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        if bit {
            self.pending |= 0x80 >> self.pending_bits;
        }
        self.pending_bits += 1;
        if self.pending_bits == 8 {
            self.push_byte()?;
        }
        Ok(())
    }

    /// Write every bit of `code` in order
    pub fn write_code(&mut self, code: &BitSlice<u8, Msb0>) -> io::Result<()> {
        for bit in code.iter().by_vals() {
            self.write_bit(bit)?;
        }
        Ok(())
    }

    /// Pad the final partial byte with zeros, flush, and return the writer
    pub fn finish(mut self) -> io::Result<W> {
        if self.pending_bits > 0 {
            self.push_byte()?;
        }
        self.inner.write_all(&self.staged)?;
        self.staged.clear();
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn push_byte(&mut self) -> io::Result<()> {
        self.staged.push(self.pending);
        self.pending = 0;
        self.pending_bits = 0;
        if self.staged.len() >= STAGE_SIZE {
            self.inner.write_all(&self.staged)?;
            self.staged.clear();
        }
        Ok(())
    }
}

/// Reads bits MSB-first from an underlying reader
pub struct BitReader<R: Read> {
    inner: R,
    buffer: Box<[u8]>,
    len: usize,
    pos: usize,
    current: u8,
    /// Bits of `current` not yet returned
    bits_left: u8,
}

impl<R: Read> BitReader<R> {
    pub fn new(inner: R) -> Self {
        BitReader {
            inner,
            buffer: vec![0u8; STAGE_SIZE].into_boxed_slice(),
            len: 0,
            pos: 0,
            current: 0,
            bits_left: 0,
        }
    }

    /// Read the next bit, or `None` at end of stream
    pub fn read_bit(&mut self) -> io::Result<Option<bool>> {
        if self.bits_left == 0 {
            match self.next_byte()? {
                Some(byte) => {
                    self.current = byte;
                    self.bits_left = 8;
                }
                None => return Ok(None),
            }
        }
        self.bits_left -= 1;
        Ok(Some((self.current >> self.bits_left) & 1 == 1))
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pos == self.len {
            self.len = loop {
                match self.inner.read(&mut self.buffer) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };
            self.pos = 0;
            if self.len == 0 {
                return Ok(None);
            }
        }
        let byte = self.buffer[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }
}
