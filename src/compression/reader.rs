//! A blocking `Read` wrapper over the decompression handle.
//!
//! `BzReader` pulls compressed bytes from any `io::Read` source and hands
//! plaintext out through the standard `read` call. In multi-stream mode it
//! keeps decoding streams back to back, which is how concatenated `.bz2`
//! files behave. Look-ahead the decoder did not consume is kept (at most
//! [`N_UNUSED`] bytes) and can be retrieved once the stream ends.

use std::io::{self, Read};

use crate::compression::decompress::DecompressStream;
use crate::error::{Error, Status};

/// Most look-ahead bytes the reader holds beyond the end of a stream.
pub const N_UNUSED: usize = 5000;

/// Decompressing reader over a byte source.
pub struct BzReader<R: Read> {
    inner: R,
    strm: DecompressStream,
    small: bool,
    multi: bool,
    buf: Vec<u8>,
    buf_start: usize,
    buf_end: usize,
    source_eof: bool,
    done: bool,
}

impl<R: Read> BzReader<R> {
    /// Wrap `inner`, decoding a single stream.
    pub fn new(inner: R) -> crate::error::Result<Self> {
        Self::with_options(inner, false, false)
    }

    /// Wrap `inner` with the low-memory decoder and/or multi-stream mode.
    pub fn with_options(inner: R, small: bool, multi: bool) -> crate::error::Result<Self> {
        Ok(Self {
            inner,
            strm: DecompressStream::new(small)?,
            small,
            multi,
            buf: vec![0; N_UNUSED],
            buf_start: 0,
            buf_end: 0,
            source_eof: false,
            done: false,
        })
    }

    /// Compressed bytes read from the source but not consumed by the
    /// decoder. Meaningful once `read` has returned 0.
    pub fn unused(&self) -> &[u8] {
        &self.buf[self.buf_start..self.buf_end]
    }

    /// Give back the wrapped source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn refill(&mut self) -> io::Result<()> {
        if self.buf_start == self.buf_end && !self.source_eof {
            self.buf_start = 0;
            self.buf_end = self.inner.read(&mut self.buf)?;
            if self.buf_end == 0 {
                self.source_eof = true;
            }
        }
        Ok(())
    }
}

fn to_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        Error::UnexpectedEof => io::Error::new(io::ErrorKind::UnexpectedEof, err),
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

impl<R: Read> Read for BzReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() || self.done {
            return Ok(0);
        }
        loop {
            self.refill()?;
            let progress = self
                .strm
                .decompress(&self.buf[self.buf_start..self.buf_end], out)
                .map_err(to_io)?;
            self.buf_start += progress.consumed;

            match progress.status {
                Status::StreamEnd => {
                    if self.multi {
                        // Another stream may follow directly; peek ahead.
                        self.refill()?;
                        if self.buf_start < self.buf_end {
                            self.strm = DecompressStream::new(self.small).map_err(to_io)?;
                            if progress.produced > 0 {
                                return Ok(progress.produced);
                            }
                            continue;
                        }
                    }
                    self.done = true;
                    return Ok(progress.produced);
                }
                _ => {
                    if progress.produced > 0 {
                        return Ok(progress.produced);
                    }
                    if self.source_eof && self.buf_start == self.buf_end {
                        // Mid-stream with nothing left to feed it.
                        return Err(to_io(Error::UnexpectedEof));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_source_is_unexpected_eof() {
        let mut r = BzReader::new(io::Cursor::new(Vec::new())).unwrap();
        let mut out = Vec::new();
        let err = r.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn garbage_source_is_invalid_data() {
        let mut r = BzReader::new(io::Cursor::new(b"not a bzip2 stream".to_vec())).unwrap();
        let mut out = Vec::new();
        let err = r.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
