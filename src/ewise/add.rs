// SPDX-License-Identifier: Apache-2.0
//
// This file is based on the SuiteSparse:GraphBLAS element-wise methods by
// Timothy A. Davis.
//
// SuiteSparse:GraphBLAS, Copyright (c) 2017-2019, Timothy A. Davis.
// All Rights Reserved.
//
// Modifications/porting for this project:
// Copyright (c) 2025 the bramble authors

//! Element-wise union `C = A + B` over the scheduled task list.
//!
//! The pattern of C is the set union of the input patterns; entries present
//! in both inputs combine with the binary operator. Planning, counting and
//! filling are separate phases: tasks only ever write disjoint output
//! ranges, so the fill runs in parallel over plain split-off slices.

use rayon::prelude::*;

use crate::context::Context;
use crate::error::Error;
use crate::ewise::slice::ewise_slice;
use crate::matrix::SparseMatrix;
use crate::ops::BinaryOp;

/// Number of union entries of two sorted row-index ranges.
fn union_count(ai: &[i64], bi: &[i64]) -> i64 {
    let (mut pa, mut pb) = (0, 0);
    let mut n = 0i64;
    while pa < ai.len() && pb < bi.len() {
        match ai[pa].cmp(&bi[pb]) {
            std::cmp::Ordering::Less => pa += 1,
            std::cmp::Ordering::Greater => pb += 1,
            std::cmp::Ordering::Equal => {
                pa += 1;
                pb += 1;
            }
        }
        n += 1;
    }
    n + (ai.len() - pa) as i64 + (bi.len() - pb) as i64
}

/// Merge two sorted vector ranges into the output, combining collisions
/// with `Op`. Returns the number of entries written.
fn merge_into<T, Op>(
    ai: &[i64],
    ax: &[T],
    bi: &[i64],
    bx: &[T],
    ci: &mut [i64],
    cx: &mut [T],
) -> usize
where
    T: Copy,
    Op: BinaryOp<X = T, Y = T, Z = T>,
{
    let (mut pa, mut pb, mut pc) = (0, 0, 0);
    while pa < ai.len() && pb < bi.len() {
        match ai[pa].cmp(&bi[pb]) {
            std::cmp::Ordering::Less => {
                ci[pc] = ai[pa];
                cx[pc] = ax[pa];
                pa += 1;
            }
            std::cmp::Ordering::Greater => {
                ci[pc] = bi[pb];
                cx[pc] = bx[pb];
                pb += 1;
            }
            std::cmp::Ordering::Equal => {
                ci[pc] = ai[pa];
                cx[pc] = Op::apply(ax[pa], bx[pb]);
                pa += 1;
                pb += 1;
            }
        }
        pc += 1;
    }
    while pa < ai.len() {
        ci[pc] = ai[pa];
        cx[pc] = ax[pa];
        pa += 1;
        pc += 1;
    }
    while pb < bi.len() {
        ci[pc] = bi[pb];
        cx[pc] = bx[pb];
        pb += 1;
        pc += 1;
    }
    pc
}

/// One task's share of the fill, bound to its disjoint output slice.
enum Job<'a, T> {
    Coarse {
        kfirst: i64,
        klast: i64,
        ci: &'a mut [i64],
        cx: &'a mut [T],
    },
    Fine {
        pa: std::ops::Range<usize>,
        pb: std::ops::Range<usize>,
        ci: &'a mut [i64],
        cx: &'a mut [T],
    },
}

/// `C = A + B` for standard, unjumbled, zombie-free inputs of equal shape.
///
/// The planner handles all matrix representations; this kernel keeps to the
/// standard one (hypersparse union needs the pattern-map builder of the
/// container layer). The only errors are a shape mismatch and out-of-memory
/// from planning.
pub fn ewise_add<T, Op>(
    a: &SparseMatrix<T>,
    b: &SparseMatrix<T>,
    ctx: &Context,
) -> Result<SparseMatrix<T>, Error>
where
    T: Copy + Default + Send + Sync,
    Op: BinaryOp<X = T, Y = T, Z = T>,
{
    debug_assert!(!a.is_hyper() && !a.is_slice && !a.jumbled && a.nzombies == 0);
    debug_assert!(!b.is_hyper() && !b.is_slice && !b.jumbled && b.nzombies == 0);
    if a.vlen != b.vlen || a.nvec != b.nvec {
        return Err(Error::DimensionMismatch {
            a_vlen: a.vlen,
            a_nvec: a.nvec,
            b_vlen: b.vlen,
            b_nvec: b.nvec,
        });
    }

    let cnvec = a.nvec;
    let mut plan = ewise_slice(a, b, cnvec, None, None, None, ctx)?;

    //--------------------------------------------------------------------
    // count the union pattern per output vector
    //--------------------------------------------------------------------

    let mut cp = vec![0i64; cnvec as usize + 1];
    let vector_count = |k: usize| {
        let (ai, _) = a.vector(k as i64);
        let (bi, _) = b.vector(k as i64);
        union_count(ai, bi)
    };
    let pattern_work = (a.nnz() + b.nnz()) as usize;
    if ctx.nthreads(pattern_work, ctx.chunk) == 1 {
        for k in 0..cnvec as usize {
            cp[k] = vector_count(k);
        }
    } else {
        cp[..cnvec as usize]
            .par_iter_mut()
            .enumerate()
            .for_each(|(k, c)| *c = vector_count(k));
    }
    crate::cumsum::cumsum(&mut cp, ctx.nthreads_max);
    let cnz = cp[cnvec as usize] as usize;

    //--------------------------------------------------------------------
    // resolve each task's output offset and length
    //--------------------------------------------------------------------

    let ntasks = plan.ntasks();
    let tlen: Vec<usize> = (0..ntasks)
        .into_par_iter()
        .map(|t| {
            let task = *plan.slot(t);
            if task.is_fine() {
                let next = *plan.slot(t + 1);
                union_count(
                    &a.i[task.pa as usize..next.pa as usize],
                    &b.i[task.pb as usize..next.pb as usize],
                ) as usize
            } else {
                (cp[task.klast as usize + 1] - cp[task.kfirst as usize]) as usize
            }
        })
        .collect();

    let mut t = 0;
    while t < ntasks {
        let task = *plan.slot(t);
        if !task.is_fine() {
            plan.set_pc(t, cp[task.kfirst as usize]);
            t += 1;
        } else {
            let k = task.kfirst;
            let mut offset = cp[k as usize];
            while t < ntasks && plan.slot(t).is_fine() && plan.slot(t).kfirst == k {
                plan.set_pc(t, offset);
                offset += tlen[t] as i64;
                t += 1;
            }
            debug_assert_eq!(offset, cp[k as usize + 1]);
        }
    }

    //--------------------------------------------------------------------
    // fill the tasks' disjoint output ranges in parallel
    //--------------------------------------------------------------------

    let mut ci = vec![0i64; cnz];
    let mut cx = vec![T::default(); cnz];
    let mut jobs = Vec::with_capacity(ntasks);
    {
        let mut ci_rest: &mut [i64] = &mut ci;
        let mut cx_rest: &mut [T] = &mut cx;
        for t in 0..ntasks {
            let (ci_part, ci_tail) = ci_rest.split_at_mut(tlen[t]);
            let (cx_part, cx_tail) = cx_rest.split_at_mut(tlen[t]);
            ci_rest = ci_tail;
            cx_rest = cx_tail;
            let task = *plan.slot(t);
            jobs.push(if task.is_fine() {
                let next = *plan.slot(t + 1);
                Job::Fine {
                    pa: task.pa as usize..next.pa as usize,
                    pb: task.pb as usize..next.pb as usize,
                    ci: ci_part,
                    cx: cx_part,
                }
            } else {
                Job::Coarse {
                    kfirst: task.kfirst,
                    klast: task.klast,
                    ci: ci_part,
                    cx: cx_part,
                }
            });
        }
        debug_assert!(ci_rest.is_empty());
    }

    jobs.into_par_iter().for_each(|job| match job {
        Job::Coarse {
            kfirst,
            klast,
            ci,
            cx,
        } => {
            let mut off = 0;
            for k in kfirst..=klast {
                let (ai, ax) = a.vector(k);
                let (bi, bx) = b.vector(k);
                off += merge_into::<T, Op>(ai, ax, bi, bx, &mut ci[off..], &mut cx[off..]);
            }
            debug_assert_eq!(off, ci.len());
        }
        Job::Fine { pa, pb, ci, cx } => {
            let n = merge_into::<T, Op>(
                &a.i[pa.clone()],
                &a.x[pa],
                &b.i[pb.clone()],
                &b.x[pb],
                ci,
                cx,
            );
            debug_assert_eq!(n, ci.len());
        }
    });

    Ok(SparseMatrix::standard(a.vlen, cp, ci, cx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{PlusF64, PlusI64};

    /// reference single-threaded union
    fn naive_add(a: &SparseMatrix<i64>, b: &SparseMatrix<i64>) -> SparseMatrix<i64> {
        let ctx = Context::new(1);
        ewise_add::<i64, PlusI64>(a, b, &ctx).unwrap()
    }

    #[test]
    fn union_of_disjoint_patterns() {
        // A = entries at rows {0, 2}, B = entry at row 1, single column
        let a = SparseMatrix::standard(4, vec![0, 2], vec![0, 2], vec![10i64, 30]);
        let b = SparseMatrix::standard(4, vec![0, 1], vec![1], vec![20i64]);
        let ctx = Context::new(2);

        let c = ewise_add::<i64, PlusI64>(&a, &b, &ctx).unwrap();
        assert_eq!(c.p, vec![0, 3]);
        assert_eq!(c.i, vec![0, 1, 2]);
        assert_eq!(c.x, vec![10, 20, 30]);
        assert!(c.check_invariants().is_ok());
    }

    #[test]
    fn collisions_combine_with_the_operator() {
        let a = SparseMatrix::diagonal(5, 1.5f64);
        let b = SparseMatrix::diagonal(5, 2.0f64);
        let ctx = Context::new(4);

        let c = ewise_add::<f64, PlusF64>(&a, &b, &ctx).unwrap();
        assert_eq!(c.nnz(), 5);
        assert!(c.x.iter().all(|&v| v == 3.5));
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let a = SparseMatrix::diagonal(4, 0i64);
        let b = SparseMatrix::diagonal(5, 0i64);
        let ctx = Context::new(1);
        assert!(matches!(
            ewise_add::<i64, PlusI64>(&a, &b, &ctx),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn empty_inputs_make_an_empty_output() {
        let a = SparseMatrix::standard(6, vec![0, 0, 0], vec![], Vec::<i64>::new());
        let b = a.clone();
        let ctx = Context::new(4);
        let c = ewise_add::<i64, PlusI64>(&a, &b, &ctx).unwrap();
        assert_eq!(c.nnz(), 0);
        assert_eq!(c.p, vec![0, 0, 0]);
    }

    /// deterministic scattered pattern
    fn scatter_matrix(vlen: i64, nvec: i64, stride: i64, seed: i64) -> SparseMatrix<i64> {
        let mut p = vec![0i64];
        let mut i = Vec::new();
        let mut x = Vec::new();
        for k in 0..nvec {
            let mut row = (seed + k * 3) % stride;
            while row < vlen {
                i.push(row);
                x.push(row * 100 + k + seed);
                row += stride + (k % 5);
            }
            p.push(i.len() as i64);
        }
        SparseMatrix::standard(vlen, p, i, x)
    }

    #[test]
    fn parallel_fill_matches_the_serial_result() {
        let a = scatter_matrix(3000, 40, 7, 1);
        let b = scatter_matrix(3000, 40, 11, 5);
        let expected = naive_add(&a, &b);

        for nthreads in [2, 4, 16] {
            let ctx = Context::new(nthreads);
            let c = ewise_add::<i64, PlusI64>(&a, &b, &ctx).unwrap();
            assert_eq!(c.p, expected.p, "nthreads = {nthreads}");
            assert_eq!(c.i, expected.i);
            assert_eq!(c.x, expected.x);
            assert!(c.check_invariants().is_ok());
        }
    }

    #[test]
    fn fine_task_groups_assemble_a_heavy_vector() {
        // one tall column forces the planner into fine tasks
        let n = 60_000i64;
        let a = SparseMatrix::standard(
            n,
            vec![0, n / 2],
            (0..n).step_by(2).collect(),
            (0..n / 2).collect(),
        );
        let b = SparseMatrix::standard(
            n,
            vec![0, n / 3],
            (0..n).step_by(3).collect(),
            (0..n / 3).collect(),
        );
        let expected = naive_add(&a, &b);

        let ctx = Context::new(8);
        let plan = ewise_slice(&a, &b, 1, None, None, None, &ctx).unwrap();
        assert!(plan.tasks().iter().any(|t| t.is_fine()));

        let c = ewise_add::<i64, PlusI64>(&a, &b, &ctx).unwrap();
        assert_eq!(c.p, expected.p);
        assert_eq!(c.i, expected.i);
        assert_eq!(c.x, expected.x);
    }
}
