//! Escape/marker framing for container streams
//!
//! Two byte values are reserved: a *marker* that delimits structural regions
//! of a container and an *escape* that quotes literal occurrences of either
//! reserved value. Arbitrary payload bytes can therefore sit in front of a
//! marker without ever being mistaken for one.
//!
//! ```text
//! payload:  41 01 42 1B 43
//! escaped:  41 1B 01 42 1B 1B 43
//! ```
//!
//! Positions reported by the writer and offsets consumed by readers are
//! counted in *logical* bytes, i.e. before escaping.

use std::io::{self, BufRead, Read, Write};

/// Marker byte separating the body from the header
pub const MARKER: u8 = 0x01;

/// Escape byte quoting a literal marker or escape
pub const ESCAPE: u8 = 0x1B;

/// Writer that escapes reserved bytes and can emit raw markers
pub struct EscapingWriter<W: Write> {
    inner: W,
    marker: u8,
    escape: u8,
    /// Logical bytes written so far (markers and escapes not counted)
    position: u64,
}

impl<W: Write> EscapingWriter<W> {
    /// Create a writer using the container's reserved bytes
    pub fn new(inner: W) -> Self {
        Self::with_reserved(inner, MARKER, ESCAPE)
    }

    /// Create a writer with custom reserved bytes
    ///
    /// # Panics
    /// Panics if `marker == escape`.
    pub fn with_reserved(inner: W, marker: u8, escape: u8) -> Self {
        assert_ne!(marker, escape, "marker and escape bytes must differ");
        EscapingWriter {
            inner,
            marker,
            escape,
            position: 0,
        }
    }

    /// Emit one unescaped marker byte
    pub fn write_marker(&mut self) -> io::Result<()> {
        self.inner.write_all(&[self.marker])
    }

    /// Number of logical bytes written so far
    pub fn logical_position(&self) -> u64 {
        self.position
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn is_reserved(&self, byte: u8) -> bool {
        byte == self.marker || byte == self.escape
    }
}

impl<W: Write> Write for EscapingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Copy runs of ordinary bytes in one call, quote reserved ones.
        let mut start = 0;
        for (idx, &byte) in buf.iter().enumerate() {
            if self.is_reserved(byte) {
                self.inner.write_all(&buf[start..idx])?;
                self.inner.write_all(&[self.escape, byte])?;
                start = idx + 1;
            }
        }
        self.inner.write_all(&buf[start..])?;
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader that removes escapes and silently drops unescaped markers
pub struct EscapingReader<R: BufRead> {
    inner: R,
    marker: u8,
    escape: u8,
}

impl<R: BufRead> EscapingReader<R> {
    /// Create a reader using the container's reserved bytes
    pub fn new(inner: R) -> Self {
        Self::with_reserved(inner, MARKER, ESCAPE)
    }

    /// Create a reader with custom reserved bytes
    ///
    /// # Panics
    /// Panics if `marker == escape`.
    pub fn with_reserved(inner: R, marker: u8, escape: u8) -> Self {
        assert_ne!(marker, escape, "marker and escape bytes must differ");
        EscapingReader {
            inner,
            marker,
            escape,
        }
    }

    /// Advance past the next unescaped marker
    ///
    /// Returns `Ok(false)` if the stream ends before a marker is found.
    pub fn skip_after_marker(&mut self) -> io::Result<bool> {
        while let Some(byte) = self.next_raw()? {
            if byte == self.escape {
                // The quoted byte is data, whatever its value.
                if self.next_raw()?.is_none() {
                    return Ok(false);
                }
            } else if byte == self.marker {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Unwrap the underlying reader
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn next_raw(&mut self) -> io::Result<Option<u8>> {
        let byte = loop {
            match self.inner.fill_buf() {
                Ok(buf) => break buf.first().copied(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        if byte.is_some() {
            self.inner.consume(1);
        }
        Ok(byte)
    }

    fn next_logical(&mut self) -> io::Result<Option<u8>> {
        while let Some(byte) = self.next_raw()? {
            if byte == self.escape {
                // A dangling escape at end of stream is end of data.
                return self.next_raw();
            }
            if byte != self.marker {
                return Ok(Some(byte));
            }
        }
        Ok(None)
    }
}

impl<R: BufRead> Read for EscapingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.next_logical()? {
                Some(byte) => {
                    buf[filled] = byte;
                    filled += 1;
                }
                None => break,
            }
        }
        Ok(filled)
    }
}

/// Escape a byte slice into a new buffer
pub fn escape_bytes(data: &[u8]) -> Vec<u8> {
    let mut writer = EscapingWriter::new(Vec::with_capacity(data.len()));
    // Writing into a Vec cannot fail.
    let _ = writer.write_all(data);
    writer.into_inner()
}

/// Remove escapes (and stray markers) from a byte slice
pub fn unescape_bytes(data: &[u8]) -> Vec<u8> {
    let mut reader = EscapingReader::new(data);
    let mut out = Vec::with_capacity(data.len());
    // Reading from a slice cannot fail.
    let _ = reader.read_to_end(&mut out);
    out
}
