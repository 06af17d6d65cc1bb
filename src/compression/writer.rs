//! A blocking `Write` wrapper over the compression handle.
//!
//! `BzWriter` accepts plaintext through the standard `write` call and pushes
//! the framed bitstream into any `io::Write` sink. The stream must be
//! closed with [`BzWriter::finish`]; dropping the writer finishes it on a
//! best-effort basis, swallowing errors the way buffered writers do.

use std::io::{self, Write};

use crate::compression::compress::CompressStream;
use crate::error::{Action, Error, Status};

const CHUNK: usize = 8 * 1024;

/// Compressing writer over a byte sink.
pub struct BzWriter<W: Write> {
    inner: Option<W>,
    strm: CompressStream,
    obuf: Vec<u8>,
    finished: bool,
}

impl<W: Write> BzWriter<W> {
    /// Wrap `sink`, compressing at the given level (1..=9).
    pub fn new(sink: W, level: u32) -> crate::error::Result<Self> {
        Ok(Self {
            inner: Some(sink),
            strm: CompressStream::new(level, 0)?,
            obuf: vec![0; CHUNK],
            finished: false,
        })
    }

    /// Close the stream: compress everything pending, write the stream
    /// footer, flush the sink, and hand it back.
    pub fn finish(mut self) -> crate::error::Result<W> {
        self.finish_internal()?;
        let mut sink = match self.inner.take() {
            Some(sink) => sink,
            None => return Err(Error::Sequence),
        };
        sink.flush()?;
        Ok(sink)
    }

    fn finish_internal(&mut self) -> crate::error::Result<()> {
        if self.finished {
            return Ok(());
        }
        let sink = match self.inner.as_mut() {
            Some(sink) => sink,
            None => return Err(Error::Sequence),
        };
        loop {
            let progress = self.strm.compress(&[], &mut self.obuf, Action::Finish)?;
            sink.write_all(&self.obuf[..progress.produced])?;
            if progress.status == Status::StreamEnd {
                self.finished = true;
                return Ok(());
            }
        }
    }
}

fn to_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

impl<W: Write> Write for BzWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(to_io(Error::Sequence));
        }
        let sink = match self.inner.as_mut() {
            Some(sink) => sink,
            None => return Err(to_io(Error::Sequence)),
        };
        let mut consumed = 0_usize;
        while consumed == 0 && !data.is_empty() {
            let progress = self
                .strm
                .compress(&data[consumed..], &mut self.obuf, Action::Run)
                .map_err(to_io)?;
            sink.write_all(&self.obuf[..progress.produced])?;
            consumed += progress.consumed;
        }
        Ok(consumed)
    }

    /// Flushes the sink only. Compressed data sits on a bit boundary until
    /// the stream is finished, so a mid-stream byte flush cannot force it
    /// out.
    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for BzWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() && !self.finished {
            let _ = self.finish_internal();
        }
    }
}
