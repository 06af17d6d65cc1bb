//! Multi-table huffman coding of one block's MTF/RLE2 symbol stream.
//!
//! One table rarely fits a whole block well: the symbol mix drifts as the
//! block goes on. So the block is cut into groups of 50 symbols, between
//! two and six coding tables are seeded by splitting the alphabet's
//! cumulative frequency into equal-cost regions, and then each group is
//! assigned whichever table currently codes it cheapest. The per-table
//! frequencies that assignment produces are used to rebuild the tables,
//! and the whole thing repeats for four iterations. The final assignment
//! is transmitted as the selector list.

use log::debug;

use super::huffman_code_from_weights::improve_code_len_from_weights;
use crate::bitstream::bitwriter::BitWriter;
use crate::tools::rle2_mtf::{MtfEncoded, MAX_ALPHA_SIZE};

/// Symbols per selector group.
pub const GROUP_SIZE: usize = 50;
/// Most coding tables a block may carry.
pub const MAX_TABLES: usize = 6;

/// Refinement passes over the group assignment.
const ITERATIONS: usize = 4;
/// Seed cost of a symbol outside / inside a table's region.
const GREATER_COST: u32 = 15;
const LESSER_COST: u32 = 0;

/// Code the symbol stream of one block onto the bitstream: symbol maps,
/// table count, selectors, table descriptions, then the data itself.
pub fn huf_encode(bw: &mut BitWriter, mtf: &MtfEncoded) {
    let alpha_size = mtf.eob as usize + 1;

    // More data supports more tables.
    let table_count: usize = match mtf.codes.len() {
        0..=199 => 2,
        200..=599 => 3,
        600..=1199 => 4,
        1200..=2399 => 5,
        _ => 6,
    };

    let mut tables = init_tables(&mtf.freqs, table_count, alpha_size);

    let selector_count = (mtf.codes.len() + GROUP_SIZE - 1) / GROUP_SIZE;
    let mut selectors = vec![0_usize; selector_count];

    /*
    The seeded tables only say which slice of the alphabet each table
    favours. Testing them against the real groups, then rebuilding each
    table from the frequencies of the groups it won, converges quickly;
    four passes is the long-standing sweet spot.
    */
    for iter in 0..ITERATIONS {
        let mut favorites = [0_usize; MAX_TABLES];
        let mut total_cost = 0_u64;
        let mut rfreq = [[0_u32; MAX_ALPHA_SIZE]; MAX_TABLES];

        for (i, chunk) in mtf.codes.chunks(GROUP_SIZE).enumerate() {
            // Which table codes this group of 50 cheapest?
            let mut cost = [0_u32; MAX_TABLES];
            for &symbol in chunk {
                for (t, c) in cost.iter_mut().enumerate().take(table_count) {
                    *c += tables[t][symbol as usize];
                }
            }
            let mut bt = 0_usize;
            for t in 1..table_count {
                if cost[t] < cost[bt] {
                    bt = t;
                }
            }
            total_cost += cost[bt] as u64;
            favorites[bt] += 1;

            // The winning table accumulates this group's frequencies for
            // the rebuild below.
            for &symbol in chunk {
                rfreq[bt][symbol as usize] += 1;
            }
            if iter == ITERATIONS - 1 {
                selectors[i] = bt;
            }
        }

        debug!(
            " pass {}: best cost is {}, grp uses are {:?}",
            iter + 1,
            total_cost / 8,
            &favorites[..table_count]
        );

        for t in 0..table_count {
            improve_code_len_from_weights(&mut tables[t], &rfreq[t], alpha_size);
        }
    }

    // Symbol maps: 16 bit index plus one 16 bit word per used group.
    for word in &mtf.sym_map {
        bw.out16(*word);
    }

    // 3 bit table count, then 15 bit selector count.
    bw.out24((3 << 24) | table_count as u32);
    bw.out24((15 << 24) | selector_count as u32);

    /*
    Selectors tell the decoder which table decodes each 50 symbol group.
    They are written after a move-to-front of the table numbers, in unary:
    an MTF index of k becomes k ones and a terminating zero.
    */
    let mut table_idx = [0_usize, 1, 2, 3, 4, 5];
    for sel in &selectors {
        let mut idx = 0;
        while table_idx[idx] != *sel {
            idx += 1;
        }
        bw.out24(((idx as u32 + 1) << 24) | ((1_u32 << (idx + 1)) - 2));
        while idx > 0 {
            table_idx[idx] = table_idx[idx - 1];
            idx -= 1;
        }
        table_idx[0] = *sel;
    }

    /*
    The lengths are final now, so each table's canonical codes can be
    assigned: walk the lengths in ascending (length, symbol) order handing
    out consecutive code values, shifting left once per length step. The
    decoder rebuilds exactly this assignment from the lengths alone.

    Each code is stored ready for the BitWriter: width in the top byte,
    code value in the low bits.
    */
    let mut out_codes = vec![[0_u32; MAX_ALPHA_SIZE]; table_count];
    for (t, table) in tables.iter().enumerate().take(table_count) {
        let lens = &table[..alpha_size];
        let min = lens.iter().min().copied().unwrap_or(1);
        let max = lens.iter().max().copied().unwrap_or(1);

        let mut code = 0_u32;
        for bits in min..=max {
            for (sym, &l) in lens.iter().enumerate() {
                if l == bits {
                    out_codes[t][sym] = (bits << 24) | code;
                    code += 1;
                }
            }
            code <<= 1;
        }

        // The table itself goes out as a 5 bit starting length followed,
        // per symbol, by +-1 steps ("10" / "11") and a closing zero bit.
        let mut curr = lens[0];
        bw.out24((5 << 24) | curr);
        for &l in lens {
            while curr < l {
                bw.out24(0x02_000002);
                curr += 1;
            }
            while curr > l {
                bw.out24(0x02_000003);
                curr -= 1;
            }
            bw.out24(0x01_000000);
        }
    }

    // And finally the data, coded 50 symbols at a time by the selected
    // table.
    for (chunk, &sel) in mtf.codes.chunks(GROUP_SIZE).zip(&selectors) {
        for &symbol in chunk {
            bw.out24(out_codes[sel][symbol as usize]);
        }
    }
}

/// Seed 2-6 coding tables by splitting the alphabet's cumulative frequency
/// into roughly equal-cost contiguous regions. Symbols inside a table's
/// region get a low seed cost, everything else a high one; the refinement
/// loop takes it from there.
fn init_tables(
    freqs: &[u32; MAX_ALPHA_SIZE],
    table_count: usize,
    alpha_size: usize,
) -> [[u32; MAX_ALPHA_SIZE]; MAX_TABLES] {
    let mut tables = [[GREATER_COST; MAX_ALPHA_SIZE]; MAX_TABLES];

    let mut rem_f: i64 = freqs[..alpha_size].iter().map(|&f| f as i64).sum();
    let mut gs = 0_isize;
    let mut n_part = table_count;

    while n_part > 0 {
        let t_freq = rem_f / n_part as i64;
        let mut ge = gs - 1;
        let mut a_freq = 0_i64;
        while a_freq < t_freq && ge < alpha_size as isize - 1 {
            ge += 1;
            a_freq += freqs[ge as usize] as i64;
        }

        // Alternate which side of the boundary gets the straddling symbol,
        // otherwise the later tables starve on skewed data.
        if ge > gs && n_part != table_count && n_part != 1 && (table_count - n_part) % 2 == 1 {
            a_freq -= freqs[ge as usize] as i64;
            ge -= 1;
        }

        let row = &mut tables[n_part - 1];
        for (v, cost) in row.iter_mut().enumerate().take(alpha_size) {
            *cost = if v as isize >= gs && v as isize <= ge {
                LESSER_COST
            } else {
                GREATER_COST
            };
        }

        n_part -= 1;
        gs = ge + 1;
        rem_f -= a_freq;
    }
    tables
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn seeded_regions_partition_the_alphabet() {
        let mut freqs = [0_u32; MAX_ALPHA_SIZE];
        for f in freqs.iter_mut().take(30) {
            *f = 10;
        }
        let tables = init_tables(&freqs, 6, 30);
        for sym in 0..30 {
            let owners = (0..6).filter(|&t| tables[t][sym] == LESSER_COST).count();
            assert_eq!(owners, 1, "symbol {} owned by {} tables", sym, owners);
        }
    }

    #[test]
    fn skewed_frequencies_still_split() {
        // A very heavy head should not leave every later region empty.
        let mut freqs = [0_u32; MAX_ALPHA_SIZE];
        freqs[0] = 1000;
        for f in freqs.iter_mut().take(20).skip(1) {
            *f = 1;
        }
        let tables = init_tables(&freqs, 3, 20);
        let owned: Vec<usize> = (0..3)
            .map(|t| (0..20).filter(|&s| tables[t][s] == LESSER_COST).count())
            .collect();
        assert_eq!(owned.iter().sum::<usize>(), 20);
        // The heavy symbol sits alone in the last-filled table.
        assert_eq!(tables[2][0], LESSER_COST);
        assert_eq!(owned[2], 1);
    }
}
