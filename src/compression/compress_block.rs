//! Framing and per-block compression: RLE1 data in, bitstream out.

use log::debug;

use crate::bitstream::bitwriter::BitWriter;
use crate::bwt_algorithms::block_sort::bwt_encode;
use crate::huffman_coding::huffman::huf_encode;
use crate::tools::rle2_mtf::rle2_mtf_encode;

#[allow(clippy::unusual_byte_groupings)]
/// Write the stream header: the magic "BZh" plus the block size digit.
pub fn stream_header(bw: &mut BitWriter, level: u32) {
    bw.out8(b'B');
    bw.out8(b'Z');
    bw.out8(b'h');
    bw.out8(b'0' + level as u8);
}

#[allow(clippy::unusual_byte_groupings)]
/// Write the stream footer: the end-of-stream magic, the combined CRC, and
/// the zero padding out to a byte boundary.
pub fn stream_footer(bw: &mut BitWriter, combined_crc: u32) {
    bw.out24(0x18_177245); // magic bits  1-24
    bw.out24(0x18_385090); // magic bits 25-48
    bw.out32(combined_crc);
    bw.flush();
}

#[allow(clippy::unusual_byte_groupings)]
/// Compress one block of post-RLE1 data onto the bitstream: block magic,
/// CRC, randomised flag, BWT key, then the coded symbol stream.
pub fn compress_block(bw: &mut BitWriter, block: &[u8], block_crc: u32, work_factor: u32) {
    bw.out24(0x18_314159); // magic bits  1-24
    bw.out24(0x18_265359); // magic bits 25-48
    bw.out32(block_crc);
    bw.out24(0x01_000000); // one zero bit: this encoder never randomises

    // The Burrows-Wheeler transform, and the key needed to undo it.
    let (key, bwt_data) = bwt_encode(block, work_factor);
    bw.out24(0x18_000000 | key);

    let mtf = rle2_mtf_encode(&bwt_data);
    huf_encode(bw, &mtf);

    debug!(
        "         {} bytes in block, {} after MTF & RLE2 coding, {} syms in use",
        block.len(),
        mtf.codes.len(),
        mtf.eob + 1,
    );
}
