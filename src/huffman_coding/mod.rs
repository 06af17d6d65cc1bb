//! The prefix-code (Huffman) engine.
//!
//! The encode side turns per-group symbol frequencies into length-limited
//! code lengths, refines up to six coding tables against the real data, and
//! writes the delta-coded table descriptions plus the coded symbols. The
//! decode side rebuilds canonical decoding tables (`limit`/`base`/`perm`)
//! from the transmitted lengths.

pub mod decode_tables;
pub mod huffman;
pub mod huffman_code_from_weights;
