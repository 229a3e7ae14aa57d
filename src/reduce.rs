// SPDX-License-Identifier: Apache-2.0
//
// This file is based on the SuiteSparse:GraphBLAS reduction kernels by
// Timothy A. Davis.
//
// SuiteSparse:GraphBLAS, Copyright (c) 2017-2019, Timothy A. Davis.
// All Rights Reserved.
//
// Modifications/porting for this project:
// Copyright (c) 2025 the bramble authors

//! Reduce a matrix to a scalar under an additive monoid.

use rayon::prelude::*;

use crate::context::Context;
use crate::matrix::SparseMatrix;
use crate::ops::Monoid;
use crate::zombie::is_zombie;

fn reduce_block<M: Monoid>(ax: &[M::T], ai: &[i64], check_zombies: bool) -> M::T {
    let mut s = M::IDENTITY;
    for (p, &v) in ax.iter().enumerate() {
        if check_zombies && is_zombie(ai[p]) {
            continue;
        }
        s = M::reduce(s, v);
        if let Some(terminal) = M::TERMINAL {
            if s == terminal {
                break;
            }
        }
    }
    s
}

/// Fold every live entry of `a` with the monoid. Zombies are skipped; an
/// empty matrix reduces to the identity. Each thread folds a static block
/// and stops early if it reaches the monoid's terminal value.
pub fn reduce_to_scalar<M: Monoid>(a: &SparseMatrix<M::T>, ctx: &Context) -> M::T {
    let anz = a.nnz() as usize;
    let check_zombies = a.nzombies > 0;
    let nthreads = ctx.nthreads(anz, ctx.chunk);

    if nthreads == 1 {
        return reduce_block::<M>(&a.x[..anz], &a.i, check_zombies);
    }

    let blocksize = anz.div_ceil(nthreads);
    a.x[..anz]
        .par_chunks(blocksize)
        .zip(a.i[..anz].par_chunks(blocksize))
        .map(|(ax, ai)| reduce_block::<M>(ax, ai, check_zombies))
        .reduce(|| M::IDENTITY, |s, w| M::reduce(s, w))
}
