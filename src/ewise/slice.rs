// SPDX-License-Identifier: Apache-2.0
//
// This file is based on the SuiteSparse:GraphBLAS element-wise scheduler by
// Timothy A. Davis.
//
// SuiteSparse:GraphBLAS, Copyright (c) 2017-2019, Timothy A. Davis.
// All Rights Reserved.
//
// Modifications/porting for this project:
// Copyright (c) 2025 the bramble authors

//! Task construction for element-wise operations `C = op(A, B)`.
//!
//! The planner estimates per-output-vector work from the input patterns
//! alone (the mask, if any, is ignored), slices the output into coarse tasks
//! of roughly equal estimated work, and promotes any vector heavy enough to
//! dominate a task into a run of fine tasks split at row cuts.

use rayon::prelude::*;

use crate::context::Context;
use crate::cumsum::cumsum;
use crate::error::Error;
use crate::ewise::task::TaskList;
use crate::matrix::SparseMatrix;
use crate::memory::TrackedVec;
use crate::search::trim_bin_search;
use crate::slice_vector::slice_vector;

/// Smallest worthwhile task, in estimated work units.
const MIN_TASK_SIZE: i64 = 4096;

/// Oversubscription factor: tasks per thread the coarse partition aims for.
const TASKS_PER_THREAD: i64 = 32;

/// Stored-vector index in an input matching output vector `k` of column `j`:
/// through the explicit mapping when one was built, directly when the
/// output hyperlist aliases the input's, else by column (input is standard).
/// -1 when the input has no matching vector.
fn resolve_vector(map: Option<&[i64]>, ch_aliases_h: bool, k: i64, j: i64) -> i64 {
    if let Some(map) = map {
        map[k as usize]
    } else if ch_aliases_h {
        k
    } else {
        j
    }
}

/// Construct the tasks that compute an element-wise `C = op(A, B)`.
///
/// `cnvec` is the number of output vectors; `ch` is C's hyperlist when C is
/// hypersparse (it may alias `A.h` or `B.h`, which is detected and
/// exploited); `c_to_a` / `c_to_b` map output vectors to stored vectors of
/// the inputs, with -1 for vectors absent from that input, and may be None
/// when the input is standard or its hyperlist is aliased.
///
/// On success the returned list covers `[0, cnvec)` exactly once with
/// coarse tasks and contiguous fine-task groups. The only error is
/// [`Error::OutOfMemory`], after which no workspace remains allocated.
pub fn ewise_slice<TA, TB>(
    a: &SparseMatrix<TA>,
    b: &SparseMatrix<TB>,
    cnvec: i64,
    ch: Option<&[i64]>,
    c_to_a: Option<&[i64]>,
    c_to_b: Option<&[i64]>,
    ctx: &Context,
) -> Result<TaskList, Error> {
    debug_assert!(cnvec >= 0);
    debug_assert!(ch.is_none_or(|ch| ch.len() == cnvec as usize));
    debug_assert!(c_to_a.is_none_or(|m| m.len() == cnvec as usize));
    debug_assert!(c_to_b.is_none_or(|m| m.len() == cnvec as usize));

    let nthreads = ctx.nthreads_max.max(1);

    // initial list; fine tasks can grow it later
    let ntasks0 = if nthreads == 1 { 1 } else { 20 * nthreads };
    let mut task_list = TaskList::with_capacity(&ctx.mem, ntasks0)?;

    //--------------------------------------------------------------------
    // quick return for an empty output or a single thread
    //--------------------------------------------------------------------

    if cnvec == 0 || nthreads == 1 {
        if cnvec > 0 {
            task_list.push_coarse(0, cnvec - 1);
        }
        return Ok(task_list);
    }

    let vlen = a.vlen;
    let a_nvec = a.nvec;
    let b_nvec = b.nvec;
    let ap: &[i64] = &a.p;
    let ai: &[i64] = &a.i;
    let bp: &[i64] = &b.p;
    let bi: &[i64] = &b.i;

    // C's hyperlist may be a shallow copy of an input's
    let ch_is_ah = match (ch, a.h.as_deref()) {
        (Some(ch), Some(ah)) => std::ptr::eq(ch.as_ptr(), ah.as_ptr()),
        _ => false,
    };
    let ch_is_bh = match (ch, b.h.as_deref()) {
        (Some(ch), Some(bh)) => std::ptr::eq(ch.as_ptr(), bh.as_ptr()),
        _ => false,
    };
    debug_assert!(c_to_a.is_some() || ch_is_ah || !(a.is_hyper() || a.is_slice));
    debug_assert!(c_to_b.is_some() || ch_is_bh || !(b.is_hyper() || b.is_slice));

    //--------------------------------------------------------------------
    // estimate the work for each vector of C
    //--------------------------------------------------------------------

    let mut cwork =
        TrackedVec::<i64>::alloc(&ctx.mem, cnvec as usize + 1).ok_or(Error::OutOfMemory)?;

    // structural only: charge one unit even to empty vectors so they are
    // never invisible to the coarse partition
    let vector_work = |k: i64| -> i64 {
        let j = match ch {
            Some(ch) => ch[k as usize],
            None => k,
        };
        let ka = resolve_vector(c_to_a, ch_is_ah, k, j);
        let kb = resolve_vector(c_to_b, ch_is_bh, k, j);
        debug_assert!(ka >= -1 && ka < a_nvec);
        debug_assert!(kb >= -1 && kb < b_nvec);
        let aknz = if ka < 0 {
            0
        } else {
            ap[ka as usize + 1] - ap[ka as usize]
        };
        let bknz = if kb < 0 {
            0
        } else {
            bp[kb as usize + 1] - bp[kb as usize]
        };
        aknz + bknz + 1
    };

    if ctx.nthreads(cnvec as usize, MIN_TASK_SIZE as usize) == 1 {
        for k in 0..cnvec {
            cwork[k as usize] = vector_work(k);
        }
    } else {
        cwork[..cnvec as usize]
            .par_iter_mut()
            .enumerate()
            .for_each(|(k, w)| *w = vector_work(k as i64));
    }

    cumsum(&mut cwork, nthreads);
    let total_work = cwork[cnvec as usize];

    //--------------------------------------------------------------------
    // choose the target task size and slice the work into coarse tasks
    //--------------------------------------------------------------------

    let target = (total_work / (TASKS_PER_THREAD * nthreads as i64)).max(MIN_TASK_SIZE);
    let ntasks1 = (total_work / target).max(1) as usize;

    let mut coarse = vec![0i64; ntasks1 + 1];
    let mut k = 0i64;
    for (t, c) in coarse.iter_mut().enumerate().take(ntasks1).skip(1) {
        let work = t as i64 * target;
        let mut pright = cnvec;
        trim_bin_search(work, &cwork, &mut k, &mut pright);
        *c = k;
    }
    coarse[ntasks1] = cnvec;

    //--------------------------------------------------------------------
    // construct all tasks, both coarse and fine
    //--------------------------------------------------------------------

    for t in 0..ntasks1 {
        let k = coarse[t];
        let klast = coarse[t + 1] - 1;

        if k >= cnvec {
            // all tasks have been constructed
            break;
        } else if k < klast {
            // a coarse task of two or more whole vectors
            task_list.reserve(task_list.ntasks() + 1)?;
            task_list.push_coarse(k, klast);
        } else {
            // this slice holds at most one vector, k; claim k here and strip
            // it from every following slice that still starts on it
            for c in coarse[t..ntasks1].iter_mut() {
                if *c == k {
                    *c = k + 1;
                } else {
                    break;
                }
            }

            let j = match ch {
                Some(ch) => ch[k as usize],
                None => k,
            };
            let ka = resolve_vector(c_to_a, ch_is_ah, k, j);
            let kb = resolve_vector(c_to_b, ch_is_bh, k, j);
            let (pa_start, pa_end) = if ka < 0 {
                (-1, -1)
            } else {
                (ap[ka as usize], ap[ka as usize + 1])
            };
            let (pb_start, pb_end) = if kb < 0 {
                (-1, -1)
            } else {
                (bp[kb as usize], bp[kb as usize + 1])
            };

            let ckwork = cwork[k as usize + 1] - cwork[k as usize];
            let nfine = (ckwork / target).max(1) as usize;
            task_list.reserve(task_list.ntasks() + nfine)?;

            if nfine == 1 {
                // not worth splitting: one coarse task for all of vector k
                task_list.push_coarse(k, k);
            } else {
                // slice vector k into nfine fine tasks; each cut leaves the
                // remaining share of the vector's work after it
                task_list.push_fine(k, pa_start, pb_start);
                for tfine in 1..nfine {
                    let target_work = ((nfine - tfine) as i64 * ckwork) / nfine as i64;
                    let (_i, pa, pb) = slice_vector(
                        ai,
                        pa_start,
                        pa_end,
                        bi,
                        pb_start,
                        pb_end,
                        vlen,
                        target_work,
                    );
                    task_list.push_fine(k, pa, pb);
                }
                task_list.write_end(pa_end, pb_end);
            }
        }
    }

    Ok(task_list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ewise::task::Task;
    use crate::memory::Memory;
    use rstest::rstest;

    /// Every output vector is owned by exactly one coarse task or one
    /// contiguous fine group, and fine pointers are monotone with correct
    /// group ends.
    fn check_task_invariants<TA, TB>(
        list: &TaskList,
        a: &SparseMatrix<TA>,
        b: &SparseMatrix<TB>,
        cnvec: i64,
    ) {
        let mut covered = vec![0u32; cnvec as usize];
        let tasks = list.tasks();
        let mut t = 0;
        while t < tasks.len() {
            let task = tasks[t];
            if !task.is_fine() {
                assert!(task.klast >= task.kfirst);
                for k in task.kfirst..=task.klast {
                    covered[k as usize] += 1;
                }
                t += 1;
                continue;
            }

            // a fine group: all tasks for the same vector, contiguous
            let k = task.kfirst;
            covered[k as usize] += 1;
            let group_start = t;
            while t < tasks.len() && tasks[t].is_fine() && tasks[t].kfirst == k {
                t += 1;
            }
            assert!(t - group_start >= 2, "a fine group has at least two cuts");

            let (pa_end, pb_end) = (list.slot(t).pa, list.slot(t).pb);
            assert_eq!(pa_end, a.p[k as usize + 1]);
            assert_eq!(pb_end, b.p[k as usize + 1]);
            for w in group_start..t - 1 {
                assert!(tasks[w].pa <= tasks[w + 1].pa);
                assert!(tasks[w].pb <= tasks[w + 1].pb);
            }
            assert!(tasks[t - 1].pa <= pa_end);
            assert!(tasks[t - 1].pb <= pb_end);
        }
        assert!(covered.iter().all(|&c| c == 1), "coverage: {covered:?}");
    }

    #[test]
    fn single_thread_yields_one_coarse_task() {
        let a = SparseMatrix::diagonal(4, 1.0f64);
        let b = SparseMatrix::diagonal(4, 1.0f64);
        let ctx = Context::new(1);

        let list = ewise_slice(&a, &b, 4, None, None, None, &ctx).unwrap();
        assert_eq!(list.ntasks(), 1);
        let t = list.tasks()[0];
        assert_eq!((t.kfirst, t.klast), (0, 3));
    }

    #[test]
    fn empty_output_yields_no_tasks() {
        let a = SparseMatrix::standard(0, vec![0], vec![], Vec::<f64>::new());
        let b = a.clone();
        let ctx = Context::new(4);

        let list = ewise_slice(&a, &b, 0, None, None, None, &ctx).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn small_parallel_problem_collapses_to_one_coarse_task() {
        // total work 3000 is under the floor, so one task covers everything
        let a = SparseMatrix::diagonal(1000, 1.0f64);
        let b = SparseMatrix::diagonal(1000, 1.0f64);
        let ctx = Context::new(4);

        let list = ewise_slice(&a, &b, 1000, None, None, None, &ctx).unwrap();
        assert_eq!(list.ntasks(), 1);
        let t = list.tasks()[0];
        assert_eq!((t.kfirst, t.klast), (0, 999));
        check_task_invariants(&list, &a, &b, 1000);
    }

    #[test]
    fn heavy_single_vector_is_split_into_fine_tasks() {
        let n = 100_000i64;
        let a = SparseMatrix::standard(n, vec![0, n], (0..n).collect(), vec![1.0f64; n as usize]);
        let b = a.clone();
        let ctx = Context::new(4);

        let list = ewise_slice(&a, &b, 1, None, None, None, &ctx).unwrap();
        // work 200001, target 4096: 48 fine tasks
        assert_eq!(list.ntasks(), 48);
        assert!(list.tasks().iter().all(|t| t.is_fine() && t.kfirst == 0));
        assert_eq!(list.tasks()[0], Task {
            kfirst: 0,
            klast: -1,
            pa: 0,
            pb: 0,
            pc: i64::MIN,
        });
        assert_eq!(list.slot(48).pa, n);
        assert_eq!(list.slot(48).pb, n);

        // each slice carries a bounded share of the vector's work
        for t in 0..48 {
            let work =
                (list.slot(t + 1).pa - list.slot(t).pa) + (list.slot(t + 1).pb - list.slot(t).pb);
            assert!(work <= 2 * 4096, "task {t} holds {work}");
        }
        check_task_invariants(&list, &a, &b, 1);
    }

    #[rstest]
    #[case::wide(5000, 4)]
    #[case::wide_many_threads(5000, 16)]
    #[case::tall_and_narrow(40, 8)]
    fn varying_vector_sizes_cover_the_output(#[case] cnvec: i64, #[case] nthreads: usize) {
        // vector k holds k % 173 entries, so some slices are heavy
        let mut p = vec![0i64];
        let mut i = Vec::new();
        for k in 0..cnvec {
            let len = k % 173;
            for r in 0..len {
                i.push(r * 2);
            }
            p.push(i.len() as i64);
        }
        let nnz = i.len();
        let a = SparseMatrix::standard(1024, p, i, vec![0u8; nnz]);
        let b = SparseMatrix::standard(
            1024,
            (0..=cnvec).collect(),
            (0..cnvec).map(|k| k % 1024).collect(),
            vec![0u8; cnvec as usize],
        );
        let ctx = Context::new(nthreads);

        let list = ewise_slice(&a, &b, cnvec, None, None, None, &ctx).unwrap();
        check_task_invariants(&list, &a, &b, cnvec);
    }

    #[test]
    fn heavy_vector_among_light_ones_mixes_coarse_and_fine() {
        let cnvec = 100i64;
        let heavy = 17usize;
        let vlen = 50_000i64;

        let mut p = vec![0i64];
        let mut i = Vec::new();
        for k in 0..cnvec as usize {
            if k == heavy {
                i.extend(0..vlen);
            } else {
                i.push((k as i64) % vlen);
            }
            p.push(i.len() as i64);
        }
        let nnz = i.len();
        let a = SparseMatrix::standard(vlen, p, i, vec![0u8; nnz]);
        let b = SparseMatrix::standard(
            vlen,
            (0..=cnvec).collect(),
            (0..cnvec).collect(),
            vec![0u8; cnvec as usize],
        );
        let ctx = Context::new(4);

        let list = ewise_slice(&a, &b, cnvec, None, None, None, &ctx).unwrap();
        let fine: Vec<_> = list.tasks().iter().filter(|t| t.is_fine()).collect();
        assert!(fine.len() >= 2, "vector {heavy} should be subdivided");
        assert!(fine.iter().all(|t| t.kfirst == heavy as i64));
        assert!(list.tasks().iter().any(|t| !t.is_fine()));
        check_task_invariants(&list, &a, &b, cnvec);
    }

    #[test]
    fn hypersparse_inputs_resolve_through_the_mappings() {
        // A is hypersparse with vectors at columns {1, 5, 6}; B is standard
        let a = SparseMatrix::hypersparse(
            8,
            vec![1, 5, 6],
            vec![0, 2, 3, 7],
            vec![0, 4, 2, 0, 1, 3, 6],
            vec![0i32; 7],
        );
        let b = SparseMatrix::diagonal(8, 0i32);
        // C spans all 8 columns
        let c_to_a: Vec<i64> = vec![-1, 0, -1, -1, -1, 1, 2, -1];
        let ctx = Context::new(4);

        let list = ewise_slice(&a, &b, 8, None, Some(&c_to_a), None, &ctx).unwrap();
        check_task_invariants(&list, &a, &b, 8);
    }

    #[test]
    fn aliased_hyperlist_is_used_directly() {
        // A and C share the same hyperlist storage
        let a = SparseMatrix::hypersparse(
            100,
            vec![3, 9],
            vec![0, 4, 6],
            vec![0, 1, 5, 9, 2, 7],
            vec![0u8; 6],
        );
        let b = SparseMatrix::hypersparse(
            100,
            vec![3, 9],
            vec![0, 1, 2],
            vec![8, 8],
            vec![0u8; 2],
        );
        let ah = a.h.as_deref().unwrap();
        let c_to_b: Vec<i64> = vec![0, 1];
        let ctx = Context::new(2);

        let list = ewise_slice(&a, &b, 2, Some(ah), None, Some(&c_to_b), &ctx).unwrap();
        check_task_invariants(&list, &a, &b, 2);
    }

    #[test]
    fn planner_failure_frees_all_workspace() {
        let mem = Memory::new();
        mem.set_tracking(true);
        let ctx = Context::with_memory(4, mem.clone());
        let a = SparseMatrix::diagonal(64, 0u8);
        let b = SparseMatrix::diagonal(64, 0u8);

        // fail each allocation in turn; the planner must leak nothing
        for fail_at in 1..=2 {
            mem.set_debug(true);
            mem.set_debug_count(fail_at);
            let r = ewise_slice(&a, &b, 64, None, None, None, &ctx);
            assert!(matches!(r, Err(Error::OutOfMemory)), "fail_at {fail_at}");
            assert_eq!(mem.nmalloc(), 0);
            assert_eq!(mem.inuse(), 0);
            mem.set_debug(false);
        }

        // and with no injected failure the same plan succeeds
        let list = ewise_slice(&a, &b, 64, None, None, None, &ctx).unwrap();
        check_task_invariants(&list, &a, &b, 64);
        drop(list);
        assert_eq!(mem.nmalloc(), 0);
        assert_eq!(mem.inuse(), 0);
    }
}
