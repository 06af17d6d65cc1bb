//! The streaming surfaces: compression and decompression state machines
//! plus the blocking byte wrappers built on top of them.

pub mod compress;
pub mod compress_block;
pub mod decompress;
pub mod reader;
pub mod writer;
