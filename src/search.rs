//! Binary searches over monotone index arrays.

/// Advance the running cursor `k` to the largest index in `[k, pright]` with
/// `cwork[k] <= work`, narrowing `pright` along the way. `cwork` must be
/// non-decreasing and `cwork[k] <= work` must already hold on entry (after a
/// prefix sum `cwork[0] = 0`, so a cursor starting at 0 always qualifies).
/// Successive calls with growing targets reuse the cursor, so a full
/// partition costs O(ntasks log n) without rescanning from the left.
pub fn trim_bin_search(work: i64, cwork: &[i64], k: &mut i64, pright: &mut i64) {
    debug_assert!(cwork[*k as usize] <= work);
    while *k < *pright {
        let pmiddle = *k + (*pright - *k + 1) / 2;
        if cwork[pmiddle as usize] <= work {
            *k = pmiddle;
        } else {
            *pright = pmiddle - 1;
        }
    }
}

/// First position in `[p_start, p_end)` whose entry is >= `row`, or `p_end`
/// if there is none. An absent range (`p_start = -1`) stays -1.
pub fn binary_search_row(indices: &[i64], p_start: i64, p_end: i64, row: i64) -> i64 {
    if p_start < 0 {
        return -1;
    }
    let (mut lo, mut hi) = (p_start, p_end);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if indices[mid as usize] < row {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}
