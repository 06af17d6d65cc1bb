//! The block-sort engine: the forward Burrows-Wheeler transform.
//!
//! The main path buckets rotations by first byte and finishes each bucket
//! with a multi-key quicksort over a doubled copy of the block, tracking a
//! work budget as it goes. Inputs the quicksort is hostile to (very
//! repetitive data) blow the budget, and the sort falls back to a
//! prefix-doubling rotation sort that is worst-case bounded. Blocks under
//! ten thousand bytes skip straight to the fallback.
//!
//! The inverse transform lives with the decompression state machine, which
//! drives it incrementally.

pub mod block_sort;
pub mod fallback_sort;
