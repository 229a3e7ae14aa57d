// SPDX-License-Identifier: Apache-2.0
//
// This file is based on the SuiteSparse:GraphBLAS subassign methods by
// Timothy A. Davis.
//
// SuiteSparse:GraphBLAS, Copyright (c) 2017-2019, Timothy A. Davis.
// All Rights Reserved.
//
// Modifications/porting for this project:
// Copyright (c) 2025 the bramble authors

//! Deferred deletion by row-index flipping.
//!
//! A stored entry is deleted in place by flipping its row index to a
//! negative tombstone; readers skip flipped entries and a later compaction
//! removes them. The flip is its own inverse and never lands on -1, so it
//! cannot collide with the absent-vector sentinel.

use crate::context::Context;
use crate::matrix::SparseMatrix;

use rayon::prelude::*;

/// Negation about -1: maps a non-negative index to a value below -1.
pub const fn flip(i: i64) -> i64 {
    -i - 2
}

/// A flipped (deleted) row index.
pub const fn is_zombie(i: i64) -> bool {
    i < -1
}

pub const fn unflip(i: i64) -> i64 {
    if is_zombie(i) { flip(i) } else { i }
}

/// Raw cursor into C's row indices for the scatter below.
#[derive(Clone, Copy)]
struct RowIndexPtr(*mut i64);

// SAFETY: only used by `subassign_zombie`, whose back-pointers address
// pairwise-distinct positions of the underlying array.
unsafe impl Send for RowIndexPtr {}
unsafe impl Sync for RowIndexPtr {}

/// C(I,J)<!,replace> = empty, using the shadow matrix S: every entry of C
/// addressed through S becomes a zombie. S's value array holds back-pointers
/// into C's row indices; `nzombies` on C is raised by the number of newly
/// flipped entries. Time is O(nnz(S)); no allocation; never fails.
///
/// C must not be jumbled. S may be jumbled, and may reference entries that
/// are already zombies (those are left alone).
pub fn subassign_zombie<T>(c: &mut SparseMatrix<T>, s: &SparseMatrix<i64>, ctx: &Context) {
    debug_assert!(!c.jumbled, "C must be unjumbled");

    let snz = s.nnz() as usize;
    let sx: &[i64] = &s.x;
    let ci: &mut [i64] = &mut c.i;
    debug_assert!(sx.iter().all(|&pc| (pc as usize) < ci.len()));

    let nthreads = ctx.nthreads(snz, ctx.chunk);
    let nzombies: i64;

    if nthreads == 1 {
        let mut local = 0;
        for &pc in &sx[..snz] {
            let i = ci[pc as usize];
            if !is_zombie(i) {
                ci[pc as usize] = flip(i);
                local += 1;
            }
        }
        nzombies = local;
    } else {
        let ci_ptr = RowIndexPtr(ci.as_mut_ptr());
        nzombies = sx[..snz]
            .par_iter()
            .map(|&pc| {
                let ptr = ci_ptr;
                // SAFETY: S is a structural subset of C(I,J) built by a
                // sort-free subref, so distinct pS hold distinct pc and the
                // writes never alias. pc is in bounds (asserted above).
                unsafe {
                    let slot = ptr.0.add(pc as usize);
                    let i = *slot;
                    if !is_zombie(i) {
                        *slot = flip(i);
                        1
                    } else {
                        0
                    }
                }
            })
            .sum();
    }

    c.nzombies += nzombies;
}
