//! Move-to-front transform and Run-Length-Encoding phase 2, integrated for
//! speed.
//!
//! The move-to-front transform rewards the clustering the BWT produced:
//! recently seen bytes get small indices, so most of the output is made of
//! very small numbers. Runs of index zero are then folded into a compact
//! base-2 encoding using two dedicated symbols, RUNA and RUNB, with the
//! least significant digit first. A non-zero index i is emitted as i+1 to
//! make room for those two, and the block ends with a dedicated EOB symbol.
//!
//! Encoding also returns the frequency table and symbol map the prefix-code
//! stage needs.

use crate::tools::symbol_map::encode_sym_map;

pub const RUNA: u16 = 0;
pub const RUNB: u16 = 1;

/// Widest possible post-MTF alphabet: 256 bytes plus RUNA/RUNB and EOB.
pub const MAX_ALPHA_SIZE: usize = 258;

/// One block's worth of MTF/RLE2 output.
pub struct MtfEncoded {
    pub codes: Vec<u16>,
    pub freqs: [u32; MAX_ALPHA_SIZE],
    pub sym_map: Vec<u16>,
    pub eob: u16,
}

/// Transform a block of BWT data into the symbol stream the prefix-code
/// stage consumes.
pub fn rle2_mtf_encode(block: &[u8]) -> MtfEncoded {
    // Find every byte value present, then build a compact ascending index
    // of just those values. MTF runs over the compact index.
    let mut present = [false; 256];
    for &b in block {
        present[b as usize] = true;
    }
    let mut mtf_index = [0_u8; 256];
    let mut n_in_use = 0_usize;
    for (sym, &used) in present.iter().enumerate() {
        if used {
            mtf_index[n_in_use] = sym as u8;
            n_in_use += 1;
        }
    }

    let eob = n_in_use as u16 + 1;
    let sym_map = encode_sym_map(&present);

    let mut codes = vec![0_u16; block.len() + 1];
    let mut freqs = [0_u32; MAX_ALPHA_SIZE];
    let mut out_idx = 0_usize;
    let mut zeros = 0_usize;

    for byte in block {
        // Every block byte is in the index by construction.
        let mut idx = match mtf_index[..n_in_use].iter().position(|c| c == byte) {
            Some(idx) => idx,
            None => unreachable!(),
        };
        if idx == 0 {
            zeros += 1;
            continue;
        }

        // Not a zero, so any pending zero run goes out first.
        if zeros > 0 {
            write_zero_run(zeros, &mut codes, &mut freqs, &mut out_idx);
            zeros = 0;
        }

        freqs[idx + 1] += 1;
        codes[out_idx] = idx as u16 + 1;
        out_idx += 1;

        // Shift everything in front of this byte up one slot. Doing it in
        // blocks of eight, then four, is measurably faster than one at a
        // time.
        let temp_sym = mtf_index[idx];
        while idx > 7 {
            mtf_index[idx] = mtf_index[idx - 1];
            mtf_index[idx - 1] = mtf_index[idx - 2];
            mtf_index[idx - 2] = mtf_index[idx - 3];
            mtf_index[idx - 3] = mtf_index[idx - 4];
            mtf_index[idx - 4] = mtf_index[idx - 5];
            mtf_index[idx - 5] = mtf_index[idx - 6];
            mtf_index[idx - 6] = mtf_index[idx - 7];
            mtf_index[idx - 7] = mtf_index[idx - 8];
            idx -= 8;
        }
        while idx > 3 {
            mtf_index[idx] = mtf_index[idx - 1];
            mtf_index[idx - 1] = mtf_index[idx - 2];
            mtf_index[idx - 2] = mtf_index[idx - 3];
            mtf_index[idx - 3] = mtf_index[idx - 4];
            idx -= 4;
        }
        while idx > 0 {
            mtf_index[idx] = mtf_index[idx - 1];
            idx -= 1;
        }
        mtf_index[0] = temp_sym;
    }

    // Any zeros still pending at the end of the block.
    if zeros > 0 {
        write_zero_run(zeros, &mut codes, &mut freqs, &mut out_idx);
    }

    codes[out_idx] = eob;
    freqs[eob as usize] += 1;
    out_idx += 1;
    codes.truncate(out_idx);

    MtfEncoded { codes, freqs, sym_map, eob }
}

/// Emit a run of `n` MTF zeros as RUNA/RUNB digits, least significant first.
fn write_zero_run(n: usize, codes: &mut [u16], freqs: &mut [u32; MAX_ALPHA_SIZE], out_idx: &mut usize) {
    let mut n = n - 1;
    loop {
        let digit = (n & 1) as u16; // RUNA or RUNB
        codes[*out_idx] = digit;
        freqs[digit as usize] += 1;
        *out_idx += 1;
        if n < 2 {
            break;
        }
        n = (n - 2) >> 1;
    }
}
