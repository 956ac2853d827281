//! Container constants and header entry encoding
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Magic: "ARCHIVE\0" (8 bytes)                │
//! ├─────────────────────────────────────────────┤
//! │ Body (escaped)                              │
//! │  - coded bytes of every file, back to back  │
//! ├─────────────────────────────────────────────┤
//! │ Marker 0x01 (unescaped)                     │
//! ├─────────────────────────────────────────────┤
//! │ Header (escaped)                            │
//! │  'D' name <entries> 'E'         directory   │
//! │  'F' codec size offset length name   file   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Integers are big-endian `u64`. Names are a big-endian `u16` byte count
//! followed by UTF-8. File offsets and lengths count logical bytes from the
//! start of the container, so the first body byte sits at offset 8.

use crate::error::{ArchiveError, Result};
use std::io::{self, Read, Write};

pub use crate::framing::{ESCAPE, MARKER};

/// Container magic identifier
pub const MAGIC: [u8; 8] = *b"ARCHIVE\0";

/// Opens a directory entry
pub const DIR_START: u8 = b'D';

/// Closes the innermost open directory entry
pub const DIR_END: u8 = b'E';

/// Introduces a file entry
pub const FILE: u8 = b'F';

/// Longest name that fits the `u16` length prefix
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// File entry as stored in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub codec_id: u64,
    pub size: u64,
    pub offset: u64,
    pub length: u64,
    pub name: String,
}

/// One parsed header token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderEntry {
    DirStart(String),
    DirEnd,
    File(FileRecord),
}

impl HeaderEntry {
    /// Serialize this entry
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        match self {
            HeaderEntry::DirStart(name) => {
                out.write_all(&[DIR_START])?;
                write_name(out, name)
            }
            HeaderEntry::DirEnd => Ok(out.write_all(&[DIR_END])?),
            HeaderEntry::File(record) => {
                out.write_all(&[FILE])?;
                for value in [record.codec_id, record.size, record.offset, record.length] {
                    out.write_all(&value.to_be_bytes())?;
                }
                write_name(out, &record.name)
            }
        }
    }

    /// Read the next entry, or `None` at a clean end of the header
    pub fn read_from<R: Read>(input: &mut R) -> Result<Option<Self>> {
        let mut tag = [0u8; 1];
        loop {
            match input.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ArchiveError::from_stream(e)),
            }
        }

        let entry = match tag[0] {
            DIR_START => HeaderEntry::DirStart(read_name(input)?),
            DIR_END => HeaderEntry::DirEnd,
            FILE => HeaderEntry::File(FileRecord {
                codec_id: read_u64(input)?,
                size: read_u64(input)?,
                offset: read_u64(input)?,
                length: read_u64(input)?,
                name: read_name(input)?,
            }),
            other => {
                return Err(ArchiveError::MalformedArchive(format!(
                    "unknown header tag {:#04x}",
                    other
                )))
            }
        };
        Ok(Some(entry))
    }
}

/// Check that a name can be stored in a header
pub fn validate_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(ArchiveError::InvalidName(format!(
            "name is {} bytes, at most {} allowed",
            name.len(),
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn write_name<W: Write>(out: &mut W, name: &str) -> Result<()> {
    validate_name(name)?;
    out.write_all(&(name.len() as u16).to_be_bytes())?;
    out.write_all(name.as_bytes())?;
    Ok(())
}

fn read_exact_or_malformed<R: Read>(input: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            ArchiveError::MalformedArchive(format!("header truncated inside {}", what))
        }
        _ => ArchiveError::from_stream(e),
    })
}

fn read_u64<R: Read>(input: &mut R) -> Result<u64> {
    let mut raw = [0u8; 8];
    read_exact_or_malformed(input, &mut raw, "file entry")?;
    Ok(u64::from_be_bytes(raw))
}

fn read_name<R: Read>(input: &mut R) -> Result<String> {
    let mut len = [0u8; 2];
    read_exact_or_malformed(input, &mut len, "name length")?;
    let mut raw = vec![0u8; u16::from_be_bytes(len) as usize];
    read_exact_or_malformed(input, &mut raw, "name")?;
    String::from_utf8(raw)
        .map_err(|_| ArchiveError::MalformedArchive("name is not valid UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_has_no_reserved_bytes() {
        assert!(!MAGIC.contains(&MARKER));
        assert!(!MAGIC.contains(&ESCAPE));
        assert_eq!(u64::from_be_bytes(MAGIC), 0x4152_4348_4956_4500);
    }

    #[test]
    fn test_file_entry_layout() {
        let entry = HeaderEntry::File(FileRecord {
            codec_id: 1,
            size: 2,
            offset: 3,
            length: 4,
            name: "a.txt".into(),
        });
        let mut bytes = Vec::new();
        entry.write_to(&mut bytes).unwrap();

        assert_eq!(bytes.len(), 1 + 32 + 2 + 5);
        assert_eq!(bytes[0], b'F');
        assert_eq!(&bytes[1..9], &1u64.to_be_bytes());
        assert_eq!(&bytes[25..33], &4u64.to_be_bytes());
        assert_eq!(&bytes[33..35], &[0, 5]);
        assert_eq!(&bytes[35..], b"a.txt");

        let parsed = HeaderEntry::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(parsed, Some(entry));
    }

    #[test]
    fn test_directory_entries() {
        let mut bytes = Vec::new();
        HeaderEntry::DirStart("docs".into())
            .write_to(&mut bytes)
            .unwrap();
        HeaderEntry::DirEnd.write_to(&mut bytes).unwrap();
        assert_eq!(bytes, b"D\x00\x04docsE");

        let mut input = bytes.as_slice();
        assert_eq!(
            HeaderEntry::read_from(&mut input).unwrap(),
            Some(HeaderEntry::DirStart("docs".into()))
        );
        assert_eq!(
            HeaderEntry::read_from(&mut input).unwrap(),
            Some(HeaderEntry::DirEnd)
        );
        assert_eq!(HeaderEntry::read_from(&mut input).unwrap(), None);
    }

    #[test]
    fn test_unknown_tag() {
        let result = HeaderEntry::read_from(&mut &b"X"[..]);
        assert!(matches!(result, Err(ArchiveError::MalformedArchive(_))));
    }

    #[test]
    fn test_truncated_file_entry() {
        let result = HeaderEntry::read_from(&mut &b"F\x00\x00\x00"[..]);
        assert!(matches!(result, Err(ArchiveError::MalformedArchive(_))));
    }

    #[test]
    fn test_invalid_utf8_name() {
        let result = HeaderEntry::read_from(&mut &b"D\x00\x02\xff\xfe"[..]);
        assert!(matches!(result, Err(ArchiveError::MalformedArchive(_))));
    }

    #[test]
    fn test_overlong_name_rejected() {
        let name = "n".repeat(MAX_NAME_LEN + 1);
        let mut bytes = Vec::new();
        let result = HeaderEntry::DirStart(name).write_to(&mut bytes);
        assert!(matches!(result, Err(ArchiveError::InvalidName(_))));
    }
}
