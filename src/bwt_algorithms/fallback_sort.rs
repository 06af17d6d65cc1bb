//! Guaranteed rotation sort for data the main sort gives up on.
//!
//! Prefix doubling: start from single-byte ranks, then repeatedly sort by
//! the pair (rank of self, rank of the rotation k positions later) and
//! re-rank, doubling k each pass. Indexing is cyclic, so rotations (not
//! suffixes) come out ordered, wraparound included. At most log2(n) sort
//! passes, each O(n log n), whatever the data looks like.

use rayon::prelude::*;

/// Threshold above which the per-pass sorts run in parallel.
const PAR_SORT_MIN: usize = 40_000;

/// Sort all rotations of `data`, returning the rotation start indices in
/// lexicographic order of the rotations.
pub fn fallback_sort(data: &[u8]) -> Vec<u32> {
    let n = data.len();
    let mut index: Vec<u32> = (0..n as u32).collect();
    if n < 2 {
        return index;
    }

    let mut rank: Vec<u32> = data.iter().map(|&b| b as u32).collect();
    let mut next_rank: Vec<u32> = vec![0; n];
    let mut k = 1_usize;

    loop {
        {
            let rank = &rank;
            let key = |i: &u32| {
                let i = *i as usize;
                (rank[i], rank[(i + k) % n])
            };
            if n >= PAR_SORT_MIN {
                index.par_sort_unstable_by_key(key);
            } else {
                index.sort_unstable_by_key(key);
            }
        }

        // Re-rank: equal (pair) keys share a rank, so ties keep shrinking.
        next_rank[index[0] as usize] = 0;
        let mut r = 0_u32;
        for w in 1..n {
            let prev = index[w - 1] as usize;
            let curr = index[w] as usize;
            let pair_prev = (rank[prev], rank[(prev + k) % n]);
            let pair_curr = (rank[curr], rank[(curr + k) % n]);
            if pair_curr != pair_prev {
                r += 1;
            }
            next_rank[curr] = r;
        }
        std::mem::swap(&mut rank, &mut next_rank);

        // All ranks distinct: fully ordered. Ranks that never separate
        // mean identical rotations, whose mutual order does not matter.
        if r as usize == n - 1 || k >= n {
            break;
        }
        k <<= 1;
    }
    index
}
