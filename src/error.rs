//! Status and error types shared by the whole engine.
//!
//! A call on a stream handle either makes progress (one of the `Status`
//! values, carried inside `Progress` along with the cursor movement) or
//! fails with an `Error`. Errors are terminal: once a handle has returned
//! one, every later call on it answers `Error::Sequence`.

use thiserror::Error;

/// What a call to [`crate::CompressStream::compress`] should do with the
/// data it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Consume input and emit compressed data as blocks fill up.
    Run,
    /// Complete the current block and emit it, then hand control back.
    Flush,
    /// Complete all pending blocks and terminate the stream.
    Finish,
}

/// Successful outcome of a stream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Progress was made (or none was possible); supply more input and/or
    /// a fresh output window and call again.
    Ok,
    /// A `Run` call did what it could.
    RunOk,
    /// A `Flush` is still draining; keep calling with `Flush`.
    FlushOk,
    /// A `Finish` is still draining; keep calling with `Finish`.
    FinishOk,
    /// The stream is complete. Only finalisation is valid from here.
    StreamEnd,
}

/// Outcome of one stream call: a status plus how far the input and output
/// cursors moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub status: Status,
    /// Bytes taken from the caller's input window.
    pub consumed: usize,
    /// Bytes placed into the caller's output window.
    pub produced: usize,
}

/// Everything that can go wrong inside the engine or its byte wrappers.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied parameter is out of range.
    #[error("invalid parameter: {0}")]
    Param(&'static str),

    /// The call is not valid in the handle's current state.
    #[error("call not valid in the stream's current state")]
    Sequence,

    /// Working memory for the stream could not be allocated.
    #[error("could not allocate working memory for the stream")]
    Mem,

    /// The compressed stream is structurally corrupt.
    #[error("compressed data is corrupt")]
    Data,

    /// The input does not start with the bzip2 stream magic.
    #[error("not a bzip2 stream (bad magic bytes)")]
    DataMagic,

    /// The source ended in the middle of a compressed stream.
    #[error("compressed stream ended unexpectedly")]
    UnexpectedEof,

    /// A one-shot output buffer was too small for the result.
    #[error("output buffer too small")]
    OutbuffFull,

    /// The build configuration is inconsistent with the format's needs.
    #[error("inconsistent build configuration")]
    Config,

    /// An I/O error from the wrapped source or sink.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
