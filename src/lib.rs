//! Streaming core of the Rust version of the standard BZIP2 library.
//!
//! - Provides safe compression and decompression of byte streams in the
//!   bzip2 block-sorting format, bit-exact on the wire.
//! - Stream handles are resumable: input and output move through
//!   caller-supplied windows of any size, and both directions suspend and
//!   resume byte-exactly.
//! - Contains a budget-tracked block sorter with a guaranteed fallback for
//!   sort-hostile data.
//!
//! Compress a buffer in one shot:
//!
//! ```
//! let packed = bzip2_core::compress_bytes(b"some data", 9).unwrap();
//! let plain = bzip2_core::decompress_bytes(&packed).unwrap();
//! assert_eq!(plain, b"some data");
//! ```
//!
//! Or stream through the handles directly; see [`CompressStream`] and
//! [`DecompressStream`]. [`BzReader`] and [`BzWriter`] wrap the handles in
//! the standard `Read`/`Write` traits for blocking byte I/O.

#![warn(rust_2018_idioms)]

pub mod bitstream;
pub mod bwt_algorithms;
pub mod compression;
pub mod error;
pub mod huffman_coding;
pub mod tools;

pub use compression::compress::CompressStream;
pub use compression::decompress::DecompressStream;
pub use compression::reader::{BzReader, N_UNUSED};
pub use compression::writer::BzWriter;
pub use error::{Action, Error, Progress, Result, Status};

/// Sanity checks on the build environment; the format needs 32-bit
/// arithmetic and block-sized addressing.
pub(crate) fn config_check() -> Result<()> {
    if usize::BITS < 32 {
        return Err(Error::Config);
    }
    Ok(())
}

/// Compress a whole buffer into a fresh vec at the given level (1..=9).
pub fn compress_bytes(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut strm = CompressStream::new(level, 0)?;
    let mut out = Vec::new();
    let mut window = vec![0_u8; 64 * 1024];
    let mut consumed = 0_usize;
    loop {
        let p = strm.compress(&data[consumed..], &mut window, Action::Finish)?;
        consumed += p.consumed;
        out.extend_from_slice(&window[..p.produced]);
        if p.status == Status::StreamEnd {
            return Ok(out);
        }
    }
}

/// Decompress a whole buffer into a fresh vec. Trailing bytes after the
/// stream footer are ignored; use [`BzReader`] in multi-stream mode for
/// concatenated streams.
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut strm = DecompressStream::new(false)?;
    let mut out = Vec::new();
    let mut window = vec![0_u8; 64 * 1024];
    let mut consumed = 0_usize;
    loop {
        let p = strm.decompress(&data[consumed..], &mut window)?;
        consumed += p.consumed;
        out.extend_from_slice(&window[..p.produced]);
        match p.status {
            Status::StreamEnd => return Ok(out),
            _ if p.consumed == 0 && p.produced == 0 => return Err(Error::UnexpectedEof),
            _ => {}
        }
    }
}

/// Compress a whole buffer into a caller-supplied buffer. Returns the
/// compressed length, or [`Error::OutbuffFull`] if it does not fit.
pub fn compress_into(data: &[u8], out: &mut [u8], level: u32, work_factor: u32) -> Result<usize> {
    let mut strm = CompressStream::new(level, work_factor)?;
    let mut consumed = 0_usize;
    let mut produced = 0_usize;
    loop {
        let p = strm.compress(&data[consumed..], &mut out[produced..], Action::Finish)?;
        consumed += p.consumed;
        produced += p.produced;
        match p.status {
            Status::StreamEnd => return Ok(produced),
            _ if p.consumed == 0 && p.produced == 0 => return Err(Error::OutbuffFull),
            _ => {}
        }
    }
}

/// Decompress a whole buffer into a caller-supplied buffer. Returns the
/// plaintext length; [`Error::OutbuffFull`] if the buffer is too small,
/// [`Error::UnexpectedEof`] if the stream is truncated.
pub fn decompress_into(data: &[u8], out: &mut [u8], small: bool) -> Result<usize> {
    let mut strm = DecompressStream::new(small)?;
    let mut consumed = 0_usize;
    let mut produced = 0_usize;
    loop {
        let p = strm.decompress(&data[consumed..], &mut out[produced..])?;
        consumed += p.consumed;
        produced += p.produced;
        match p.status {
            Status::StreamEnd => return Ok(produced),
            _ if p.consumed == 0 && p.produced == 0 => {
                if produced == out.len() {
                    return Err(Error::OutbuffFull);
                }
                return Err(Error::UnexpectedEof);
            }
            _ => {}
        }
    }
}
