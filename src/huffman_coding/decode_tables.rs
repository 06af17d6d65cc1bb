//! Canonical decoding tables for the prefix-code engine.
//!
//! The decoder never sees the codes themselves, only the per-symbol code
//! lengths. From those it rebuilds the canonical code assignment as three
//! arrays: a code of width `zn` with integer value `zvec` is valid iff
//! `zvec <= limit[zn]`, and then names the symbol `perm[zvec - base[zn]]`.
//! If `zvec` is above the limit the decoder shifts in one more bit and
//! retries at `zn + 1`.

use crate::tools::rle2_mtf::MAX_ALPHA_SIZE;

/// Room for lengths 0..=20 plus the slots the construction peeks past.
pub const MAX_CODE_LEN: usize = 23;

/// Decode tables for one of the up to six coding tables of a block.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    pub limit: [i32; MAX_CODE_LEN],
    pub base: [i32; MAX_CODE_LEN],
    pub perm: [u16; MAX_ALPHA_SIZE],
    pub min_len: u32,
}

/// Build the decode tables from the transmitted code lengths. Lengths must
/// already be validated to 1..=20.
pub fn create_decode_table(len: &[u8]) -> DecodeTable {
    let alpha_size = len.len();
    let min_len = u32::from(len.iter().min().copied().unwrap_or(1));
    let max_len = usize::from(len.iter().max().copied().unwrap_or(1));

    // Symbols in (length, symbol) order; this is the canonical assignment
    // the encoder used.
    let mut perm = [0_u16; MAX_ALPHA_SIZE];
    let mut pp = 0;
    for bits in min_len as usize..=max_len {
        for (sym, &l) in len.iter().enumerate() {
            if l as usize == bits {
                perm[pp] = sym as u16;
                pp += 1;
            }
        }
    }

    // base[bits] counts codes shorter than `bits` once the prefix sum runs.
    let mut base = [0_i32; MAX_CODE_LEN];
    for &l in len.iter().take(alpha_size) {
        base[l as usize + 1] += 1;
    }
    for bits in 1..MAX_CODE_LEN {
        base[bits] += base[bits - 1];
    }

    // limit[bits] is the largest valid code value of that width.
    let mut limit = [0_i32; MAX_CODE_LEN];
    let mut vec = 0_i32;
    for bits in min_len as usize..=max_len {
        vec += base[bits + 1] - base[bits];
        limit[bits] = vec - 1;
        vec <<= 1;
    }
    for bits in min_len as usize + 1..=max_len {
        base[bits] = ((limit[bits - 1] + 1) << 1) - base[bits];
    }

    DecodeTable {
        limit,
        base,
        perm,
        min_len,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Reference decode of one code using the table, driven by a plain bit
    /// iterator.
    fn decode_one(table: &DecodeTable, bits: &mut impl Iterator<Item = u32>) -> Option<u16> {
        let mut zn = table.min_len as usize;
        let mut zvec = 0_i32;
        for _ in 0..zn {
            zvec = (zvec << 1) | bits.next()? as i32;
        }
        loop {
            if zn > 20 {
                return None;
            }
            if zvec <= table.limit[zn] {
                let idx = zvec - table.base[zn];
                if idx < 0 || idx as usize >= MAX_ALPHA_SIZE {
                    return None;
                }
                return Some(table.perm[idx as usize]);
            }
            zn += 1;
            zvec = (zvec << 1) | bits.next()? as i32;
        }
    }

    /// Canonical encoder matching the table construction: codes assigned in
    /// (length, symbol) order.
    fn assign_codes(len: &[u8]) -> Vec<(u32, u32)> {
        let min = *len.iter().min().unwrap() as u32;
        let max = *len.iter().max().unwrap() as u32;
        let mut codes = vec![(0_u32, 0_u32); len.len()];
        let mut vec = 0_u32;
        for bits in min..=max {
            for (sym, &l) in len.iter().enumerate() {
                if l as u32 == bits {
                    codes[sym] = (bits, vec);
                    vec += 1;
                }
            }
            vec <<= 1;
        }
        codes
    }

    #[test]
    fn all_codes_decode_to_their_symbols() {
        let len: [u8; 6] = [2, 2, 3, 3, 3, 3];
        let table = create_decode_table(&len);
        for (sym, &(bits, code)) in assign_codes(&len).iter().enumerate() {
            let mut iter = (0..bits).rev().map(|i| (code >> i) & 1);
            assert_eq!(decode_one(&table, &mut iter), Some(sym as u16));
        }
    }

    #[test]
    fn uneven_lengths() {
        let len: [u8; 5] = [1, 3, 3, 3, 3];
        let table = create_decode_table(&len);
        assert_eq!(table.min_len, 1);
        for (sym, &(bits, code)) in assign_codes(&len).iter().enumerate() {
            let mut iter = (0..bits).rev().map(|i| (code >> i) & 1);
            assert_eq!(decode_one(&table, &mut iter), Some(sym as u16));
        }
    }

    #[test]
    fn uniform_lengths() {
        let len = [4_u8; 16];
        let table = create_decode_table(&len);
        assert_eq!(table.limit[4], 15);
        for code in 0..16_u32 {
            let mut iter = (0..4).rev().map(|i| (code >> i) & 1);
            assert_eq!(decode_one(&table, &mut iter), Some(code as u16));
        }
    }
}
