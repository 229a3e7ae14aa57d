//! In-place exclusive prefix sum.

use rayon::prelude::*;

/// Below this length the fork overhead outweighs the scan itself.
const PARALLEL_CUTOFF: usize = 1024;

/// Replace `count[0..n]` with its exclusive prefix sum and write the total
/// into `count[n]`, where `n = count.len() - 1` (the last input entry is
/// unused). The parallel path is a two-pass blocked scan over a static
/// block partition, so the result is identical for any thread count.
pub fn cumsum(count: &mut [i64], nthreads: usize) {
    debug_assert!(!count.is_empty());
    let n = count.len() - 1;

    if nthreads <= 1 || n < PARALLEL_CUTOFF {
        let mut sum = 0i64;
        for w in &mut count[..n] {
            let t = *w;
            *w = sum;
            sum += t;
        }
        count[n] = sum;
        return;
    }

    let blocksize = n.div_ceil(nthreads.min(n));

    // pass 1: per-block totals, then a serial exclusive scan of the totals
    let mut block_start: Vec<i64> = count[..n]
        .par_chunks(blocksize)
        .map(|block| block.iter().sum())
        .collect();
    let mut total = 0i64;
    for b in &mut block_start {
        let t = *b;
        *b = total;
        total += t;
    }

    // pass 2: scan each block from its start offset
    count[..n]
        .par_chunks_mut(blocksize)
        .zip(block_start.par_iter())
        .for_each(|(block, &base)| {
            let mut sum = base;
            for w in block {
                let t = *w;
                *w = sum;
                sum += t;
            }
        });
    count[n] = total;
}
