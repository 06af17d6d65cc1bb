//! Bit-level I/O for the compressed stream.
//!
//! The bzip2 format is a bitstream: blocks are not byte aligned and fields
//! range from single bits to 48-bit magics. The writer packs bits MSB-first
//! into whole bytes and lets the owning stream handle drain those bytes into
//! caller output windows. The reader is an accumulator that pulls bytes from
//! caller input windows on demand; a request it cannot satisfy leaves its
//! state untouched so the same request can be retried after more input
//! arrives.

pub mod bitreader;
pub mod bitwriter;
