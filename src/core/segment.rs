//! Bounded views over logical container streams

use std::io::{self, Read};
use tracing::debug;

/// Reader yielding `length` bytes that start `offset` bytes into `inner`
///
/// Skipping happens eagerly in [`Segment::new`]. If the upstream stream is
/// shorter than `offset` (or fails while skipping) the segment is empty.
pub struct Segment<R: Read> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Segment<R> {
    pub fn new(mut inner: R, offset: u64, length: u64) -> Self {
        let remaining = match io::copy(&mut (&mut inner).take(offset), &mut io::sink()) {
            Ok(skipped) if skipped == offset => length,
            Ok(skipped) => {
                debug!("Segment offset {} past end of stream ({} bytes)", offset, skipped);
                0
            }
            Err(e) => {
                debug!("Segment skip to {} failed: {}", offset, e);
                0
            }
        };

        Segment { inner, remaining }
    }

    /// Bytes still available from this segment (upper bound)
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read> Read for Segment<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let limit = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let read = self.inner.read(&mut buf[..limit])?;
        if read == 0 {
            // Upstream ended early.
            self.remaining = 0;
        } else {
            self.remaining -= read as u64;
        }
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_middle() {
        let data = b"0123456789";
        let mut out = String::new();
        Segment::new(&data[..], 3, 4).read_to_string(&mut out).unwrap();
        assert_eq!(out, "3456");
    }

    #[test]
    fn test_segment_clamped_by_upstream() {
        let data = b"0123456789";
        let mut out = Vec::new();
        Segment::new(&data[..], 8, 100).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"89");
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let data = b"0123";
        let segment = Segment::new(&data[..], 10, 2);
        assert_eq!(segment.remaining(), 0);
    }

    #[test]
    fn test_zero_length() {
        let data = b"0123";
        let mut out = Vec::new();
        Segment::new(&data[..], 1, 0).read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
