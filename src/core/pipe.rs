//! Bounded producer/consumer pipe for streaming codecs
//!
//! A codec runs its work on a dedicated thread that writes into a
//! [`PipeWriter`]; the caller gets a [`PipeReader`] back immediately and
//! consumes output while it is being produced.
//!
//! **Design**:
//! - Data travels in chunks of `chunk_size` bytes over a bounded crossbeam
//!   channel of `pipe_capacity` slots; a full channel blocks the producer.
//! - Every stream ends with exactly one terminal frame: `End` on success or
//!   `Failed` carrying the producer's error. A channel that disconnects with
//!   no terminal frame (producer panicked) is reported as a failure too.
//! - Dropping the reader disconnects the channel; the producer's next send
//!   fails with `BrokenPipe` and the thread exits.

use crate::config::PipelineConfig;
use crate::error::{ArchiveError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use std::io::{self, Read, Write};
use std::thread;
use tracing::{debug, warn};

enum Frame {
    Data(Vec<u8>),
    End,
    Failed(ArchiveError),
}

/// Producer side of a pipe
pub struct PipeWriter {
    tx: Sender<Frame>,
    buffer: Vec<u8>,
    chunk_size: usize,
    disconnected: bool,
}

impl PipeWriter {
    fn send_chunk(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.chunk_size));
        self.tx.send(Frame::Data(chunk)).map_err(|_| {
            self.disconnected = true;
            io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped")
        })
    }

    /// Whether the consumer has gone away
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.disconnected {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader dropped",
            ));
        }
        let room = self.chunk_size - self.buffer.len();
        let take = room.min(buf.len());
        self.buffer.extend_from_slice(&buf[..take]);
        if self.buffer.len() == self.chunk_size {
            self.send_chunk()?;
        }
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_chunk()
    }
}

/// Consumer side of a pipe
pub struct PipeReader {
    rx: Receiver<Frame>,
    chunk: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos == self.chunk.len() {
            if self.finished {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Frame::Data(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Ok(Frame::End) => {
                    self.finished = true;
                    return Ok(0);
                }
                Ok(Frame::Failed(err)) => {
                    self.finished = true;
                    return Err(err.into_io());
                }
                Err(_) => {
                    self.finished = true;
                    return Err(ArchiveError::CodecFailure {
                        codec: "pipe",
                        reason: "producer terminated without finishing the stream".into(),
                    }
                    .into_io());
                }
            }
        }

        let available = &self.chunk[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Run `task` on a new thread, returning a reader over what it writes
///
/// The task's `Err` becomes a read error on the returned reader once all data
/// written before the failure has been consumed. Fails with
/// [`ArchiveError::Config`] if `config` has a zero size.
pub fn spawn<F>(name: &str, config: &PipelineConfig, task: F) -> Result<PipeReader>
where
    F: FnOnce(&mut PipeWriter) -> Result<()> + Send + 'static,
{
    config.validate()?;
    let (tx, rx) = channel::bounded(config.pipe_capacity);
    let chunk_size = config.chunk_size;
    let label = name.to_string();

    thread::Builder::new()
        .name(format!("huffpack-{}", name))
        .spawn(move || {
            let mut writer = PipeWriter {
                tx,
                buffer: Vec::with_capacity(chunk_size),
                chunk_size,
                disconnected: false,
            };

            // Buffered bytes go out even when the task failed.
            let outcome = task(&mut writer);
            let flushed = writer.send_chunk();
            let outcome = outcome.and_then(|()| flushed.map_err(ArchiveError::from));
            if writer.is_disconnected() {
                debug!("{}: reader dropped, producer stopping", label);
                return;
            }

            let terminal = match outcome {
                Ok(()) => Frame::End,
                Err(err) => {
                    warn!("{}: producer failed: {}", label, err);
                    Frame::Failed(err)
                }
            };
            if writer.tx.send(terminal).is_err() {
                debug!("{}: reader dropped before end of stream", label);
            }
        })
        .map_err(|e| ArchiveError::codec_failure("pipe", e))?;

    Ok(PipeReader {
        rx,
        chunk: Vec::new(),
        pos: 0,
        finished: false,
    })
}
