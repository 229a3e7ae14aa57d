// SPDX-License-Identifier: Apache-2.0
//
// This file is based on the SuiteSparse:GraphBLAS slicer by
// Timothy A. Davis.
//
// SuiteSparse:GraphBLAS, Copyright (c) 2017-2019, Timothy A. Davis.
// All Rights Reserved.
//
// Modifications/porting for this project:
// Copyright (c) 2025 the bramble authors

//! Split one output vector between two aligned sparse input vectors.

use crate::search::binary_search_row;

/// Cut the row universe `[0, vlen)` between the sorted vectors
/// `ai[pa_start..pa_end)` and `bi[pb_start..pb_end)`.
///
/// Returns `(i, pa, pb)` such that every entry before `pa` (resp. `pb`) has
/// row < `i` and every entry at or after it has row >= `i`, choosing the
/// smallest `i` whose remaining work `(pa_end - pa) + (pb_end - pb)` is at
/// most `target_work`. Smallest-`i` selection ties consecutive cuts to
/// disjoint half-open row ranges.
///
/// An absent vector is passed as the range `(-1, -1)`; its cut pointer stays
/// -1 and it contributes no work, reducing this to a one-vector split.
pub fn slice_vector(
    ai: &[i64],
    pa_start: i64,
    pa_end: i64,
    bi: &[i64],
    pb_start: i64,
    pb_end: i64,
    vlen: i64,
    target_work: i64,
) -> (i64, i64, i64) {
    debug_assert!(pa_start <= pa_end);
    debug_assert!(pb_start <= pb_end);
    debug_assert!(target_work >= 0);

    let remaining = |p_end: i64, p: i64| if p < 0 { 0 } else { p_end - p };

    // bisect for the smallest cut whose suffix work fits the target; the
    // suffix work is non-increasing in the cut row
    let mut ileft = 0i64;
    let mut iright = vlen;
    while ileft < iright {
        let imid = (ileft + iright) / 2;
        let pa = binary_search_row(ai, pa_start, pa_end, imid);
        let pb = binary_search_row(bi, pb_start, pb_end, imid);
        let work = remaining(pa_end, pa) + remaining(pb_end, pb);
        if work > target_work {
            ileft = imid + 1;
        } else {
            iright = imid;
        }
    }

    let i = ileft;
    let pa = binary_search_row(ai, pa_start, pa_end, i);
    let pb = binary_search_row(bi, pb_start, pb_end, i);
    (i, pa, pb)
}
