// SPDX-License-Identifier: Apache-2.0
//
// This file is based on the SuiteSparse:GraphBLAS unary apply kernels by
// Timothy A. Davis.
//
// SuiteSparse:GraphBLAS, Copyright (c) 2017-2019, Timothy A. Davis.
// All Rights Reserved.
//
// Modifications/porting for this project:
// Copyright (c) 2025 the bramble authors

//! Apply a unary operator over a value array, `cx[p] = op(ax[p])`.

use rayon::prelude::*;

use crate::context::Context;
use crate::ops::UnaryOp;

/// The pattern is untouched by a unary apply, so only the values move; the
/// caller pairs the result with the existing pattern (zombies keep their
/// values until compaction, exactly as the input did).
pub fn apply_unary<Op>(ax: &[Op::X], ctx: &Context) -> Vec<Op::Z>
where
    Op: UnaryOp,
    Op::X: Sync,
    Op::Z: Send,
{
    if ctx.nthreads(ax.len(), ctx.chunk) == 1 {
        ax.iter().map(|&x| Op::apply(x)).collect()
    } else {
        ax.par_iter().map(|&x| Op::apply(x)).collect()
    }
}
