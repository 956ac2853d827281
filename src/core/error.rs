use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unable to open stream for {resource}: {source}")]
    GenerationFailure {
        resource: String,
        #[source]
        source: io::Error,
    },

    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    #[error("Unknown codec: {0:#018x}")]
    UnknownCodec(u64),

    #[error("Empty input: the encoder was given a zero-length source")]
    EmptyInput,

    #[error("Codec failure in {codec}: {reason}")]
    CodecFailure { codec: &'static str, reason: String },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// Recover a typed error that travelled through an `io::Read`/`io::Write` boundary.
    ///
    /// Producer threads report failures by wrapping an `ArchiveError` inside an
    /// `io::Error`; anything else stays a plain I/O error.
    pub fn from_stream(err: io::Error) -> Self {
        let carries_archive_error = err
            .get_ref()
            .map_or(false, |inner| inner.is::<ArchiveError>());
        if !carries_archive_error {
            return ArchiveError::Io(err);
        }

        let kind = err.kind();
        match err.into_inner() {
            Some(inner) => match inner.downcast::<ArchiveError>() {
                Ok(archive_err) => *archive_err,
                Err(other) => ArchiveError::Io(io::Error::new(kind, other)),
            },
            None => ArchiveError::Io(io::Error::from(kind)),
        }
    }

    /// Wrap this error so it can be returned from an `io::Read` implementation.
    pub fn into_io(self) -> io::Error {
        match self {
            ArchiveError::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }

    pub(crate) fn codec_failure(codec: &'static str, err: impl std::fmt::Display) -> Self {
        ArchiveError::CodecFailure {
            codec,
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_stream_recovers_typed_error() {
        let wrapped = ArchiveError::EmptyInput.into_io();
        assert!(matches!(
            ArchiveError::from_stream(wrapped),
            ArchiveError::EmptyInput
        ));
    }

    #[test]
    fn test_from_stream_keeps_plain_io() {
        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        match ArchiveError::from_stream(err) {
            ArchiveError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_codec_display() {
        let msg = ArchiveError::UnknownCodec(0x2a).to_string();
        assert_eq!(msg, "Unknown codec: 0x000000000000002a");
    }
}
