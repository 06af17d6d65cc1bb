//! Main entry into the BWT sorting system.
//!
//! Rotations are bucketed by their first byte with a counting pass, then
//! each bucket is finished by a multi-key quicksort (median-of-three
//! pivoting, insertion sort on small ranges) that looks at one byte of
//! rotation depth at a time over a doubled copy of the block. The sort
//! charges every byte it inspects against a budget scaled by the caller's
//! work factor; repetitive data drains the budget and the caller reruns the
//! block through the worst-case-bounded fallback instead.

use log::{debug, warn};

use super::fallback_sort::fallback_sort;
use crate::tools::freq_count::freqs;

/// Blocks shorter than this go straight to the fallback sort; the setup
/// cost of the main sort is not worth it.
const MAIN_SORT_MIN: usize = 10_000;

/// Ranges shorter than this are insertion sorted.
const SMALL_RANGE: usize = 20;

/// The main sort ran out of budget; the caller should use the fallback.
struct SortExhausted;

/// Burrows-Wheeler transform of one block. Returns the index of the
/// original rotation in the sorted order, and the transformed data (the
/// last column of the sorted rotation matrix).
pub fn bwt_encode(data: &[u8], work_factor: u32) -> (u32, Vec<u8>) {
    let n = data.len();
    if n == 0 {
        return (0, Vec::new());
    }

    let index = if n < MAIN_SORT_MIN {
        fallback_sort(data)
    } else {
        let wf = work_factor.clamp(1, 250) as i64;
        // Budget in bytes inspected. The default work factor of 30 clears
        // ordinary text and random data many times over while still
        // tripping quickly on sort-hostile blocks.
        let budget = n as i64 * wf * 8;
        match main_sort(data, budget) {
            Ok(index) => index,
            Err(SortExhausted) => {
                warn!("    too repetitive; using fallback sorting algorithm");
                fallback_sort(data)
            }
        }
    };

    let mut key = 0_u32;
    let mut bwt = vec![0_u8; n];
    for (i, &p) in index.iter().enumerate() {
        if p == 0 {
            key = i as u32;
            bwt[i] = data[n - 1];
        } else {
            bwt[i] = data[p as usize - 1];
        }
    }
    debug!("         bwt of {} bytes, original rotation at {}", n, key);
    (key, bwt)
}

/// Radix-plus-quicksort over the rotation indices. `Err` means the budget
/// ran dry part way; the partial order in that case is garbage.
fn main_sort(data: &[u8], mut budget: i64) -> Result<Vec<u32>, SortExhausted> {
    let n = data.len();

    // Doubling the block lets any rotation be read as a flat n-byte slice.
    let mut d2 = Vec::with_capacity(2 * n);
    d2.extend_from_slice(data);
    d2.extend_from_slice(data);

    // Counting sort on the first byte builds the buckets.
    let freq = freqs(data);
    let mut counts = [0_usize; 257];
    for b in 0..256 {
        counts[b + 1] = counts[b] + freq[b] as usize;
    }
    let mut index = vec![0_u32; n];
    let mut cursor = counts;
    for (i, &b) in data.iter().enumerate() {
        index[cursor[b as usize]] = i as u32;
        cursor[b as usize] += 1;
    }

    // Each bucket already agrees on byte 0; sort within from depth 1.
    for b in 0..256 {
        let (lo, hi) = (counts[b], counts[b + 1]);
        if hi - lo > 1 {
            mkqs(&mut index[lo..hi], &d2, n, 1, &mut budget)?;
        }
    }
    Ok(index)
}

/// Multi-key quicksort of one bucket, iterative with an explicit work
/// stack. `depth` is how many leading bytes the whole range is already
/// known to share.
fn mkqs(
    index: &mut [u32],
    d2: &[u8],
    n: usize,
    depth: usize,
    budget: &mut i64,
) -> Result<(), SortExhausted> {
    let mut stack: Vec<(usize, usize, usize)> = vec![(0, index.len(), depth)];

    while let Some((lo, hi, depth)) = stack.pop() {
        if hi - lo <= 1 {
            continue;
        }
        // A range still together at full depth is a set of identical
        // rotations; any order will do.
        if depth >= n {
            continue;
        }
        if hi - lo < SMALL_RANGE {
            insertion_sort(&mut index[lo..hi], d2, n, depth, budget)?;
            continue;
        }

        let pivot = median3(
            d2[index[lo] as usize + depth],
            d2[index[lo + (hi - lo) / 2] as usize + depth],
            d2[index[hi - 1] as usize + depth],
        );

        // Three-way partition on the byte at `depth`.
        let mut lt = lo;
        let mut gt = hi;
        let mut i = lo;
        while i < gt {
            let c = d2[index[i] as usize + depth];
            if c < pivot {
                index.swap(lt, i);
                lt += 1;
                i += 1;
            } else if c > pivot {
                gt -= 1;
                index.swap(i, gt);
            } else {
                i += 1;
            }
        }

        *budget -= (hi - lo) as i64;
        if *budget < 0 {
            return Err(SortExhausted);
        }

        stack.push((lo, lt, depth));
        stack.push((lt, gt, depth + 1));
        stack.push((gt, hi, depth));
    }
    Ok(())
}

/// Insertion sort comparing whole rotations from `depth` on, charging every
/// byte examined to the budget.
fn insertion_sort(
    index: &mut [u32],
    d2: &[u8],
    n: usize,
    depth: usize,
    budget: &mut i64,
) -> Result<(), SortExhausted> {
    for i in 1..index.len() {
        let mut j = i;
        while j > 0 {
            let a = index[j - 1] as usize;
            let b = index[j] as usize;
            if rot_le(&d2[a + depth..a + n], &d2[b + depth..b + n], budget) {
                break;
            }
            index.swap(j - 1, j);
            j -= 1;
        }
        if *budget < 0 {
            return Err(SortExhausted);
        }
    }
    Ok(())
}

/// Is rotation tail `a` <= rotation tail `b`?
#[inline]
fn rot_le(a: &[u8], b: &[u8], budget: &mut i64) -> bool {
    let mut k = 0;
    while k < a.len() && a[k] == b[k] {
        k += 1;
    }
    *budget -= k as i64 + 1;
    k == a.len() || a[k] <= b[k]
}

#[inline]
fn median3(a: u8, b: u8, c: u8) -> u8 {
    a.max(b).min(a.min(b).max(c))
}

#[cfg(test)]
mod test {
    use super::*;

    fn naive_rotation_sort(data: &[u8]) -> Vec<u32> {
        let n = data.len();
        let doubled = [data, data].concat();
        let mut index: Vec<u32> = (0..n as u32).collect();
        index.sort_by(|&a, &b| {
            doubled[a as usize..a as usize + n].cmp(&doubled[b as usize..b as usize + n])
        });
        index
    }

    /// Simple pseudo-random bytes, fixed seed.
    fn noise(len: usize) -> Vec<u8> {
        let mut x = 0x2545_f491_u32;
        (0..len)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                (x >> 8) as u8
            })
            .collect()
    }

    #[test]
    fn banana_bwt() {
        // Sorted rotations of "banana": abanan..., anaban..., ananab...,
        // banana, nabana..., nanaba... -> last column "nnbaaa", key 3.
        let (key, bwt) = bwt_encode(b"banana", 30);
        assert_eq!(bwt, b"nnbaaa");
        assert_eq!(key, 3);
    }

    #[test]
    fn main_sort_matches_naive_on_noise() {
        let data = noise(12_000);
        let got = main_sort(&data, i64::MAX).unwrap_or_else(|_| panic!("budget"));
        assert_eq!(got, naive_rotation_sort(&data));
    }

    #[test]
    fn main_sort_matches_fallback() {
        let mut data = noise(15_000);
        // Splice in some structure so depths actually recurse.
        for chunk in data.chunks_mut(100) {
            let n = 20.min(chunk.len());
            chunk[..n].fill(b'q');
        }
        let main = main_sort(&data, i64::MAX).unwrap_or_else(|_| panic!("budget"));
        assert_eq!(main, fallback_sort(&data));
    }

    #[test]
    fn budget_trips_on_repetitive_data() {
        let data = vec![b'A'; 20_000];
        assert!(main_sort(&data, 20_000 * 30).is_err());
    }

    #[test]
    fn encode_handles_single_byte() {
        let (key, bwt) = bwt_encode(b"z", 30);
        assert_eq!((key, bwt.as_slice()), (0, &b"z"[..]));
    }
}
