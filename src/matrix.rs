use crate::error::MatrixError;
use crate::zombie::{is_zombie, unflip};

/// Sparse matrix stored by vector (CSC when column-major).
///
/// Three representations share the container:
/// - standard: stored vector k is column k, `h` is absent;
/// - hypersparse: `h[k]` is the column of stored vector k, so empty columns
///   consume no storage;
/// - slice: a contiguous hyperlist-free view, stored vector k is column
///   `hfirst + k`.
///
/// Vector k occupies `i[p[k]..p[k+1]]` and the same range of `x`. Row
/// indices are strictly increasing within a vector unless `jumbled`; a
/// negative (flipped) row index marks a zombie entry awaiting compaction.
#[derive(Debug, Clone)]
pub struct SparseMatrix<T> {
    /// length of each vector (row dimension)
    pub vlen: i64,
    /// number of stored vectors
    pub nvec: i64,
    /// vector pointers, len nvec + 1
    pub p: Vec<i64>,
    /// row indices, len nnz
    pub i: Vec<i64>,
    /// values, len nnz; opaque to the scheduling layer
    pub x: Vec<T>,
    /// hyperlist, present only for the hypersparse representation
    pub h: Option<Vec<i64>>,
    /// first column of a slice view
    pub hfirst: i64,
    pub is_slice: bool,
    /// per-vector row order unspecified
    pub jumbled: bool,
    /// number of flipped entries in `i`
    pub nzombies: i64,
}

impl<T> SparseMatrix<T> {
    pub fn standard(vlen: i64, p: Vec<i64>, i: Vec<i64>, x: Vec<T>) -> Self {
        let nvec = p.len() as i64 - 1;
        Self {
            vlen,
            nvec,
            p,
            i,
            x,
            h: None,
            hfirst: 0,
            is_slice: false,
            jumbled: false,
            nzombies: 0,
        }
    }

    pub fn hypersparse(vlen: i64, h: Vec<i64>, p: Vec<i64>, i: Vec<i64>, x: Vec<T>) -> Self {
        let mut m = Self::standard(vlen, p, i, x);
        m.h = Some(h);
        m
    }

    pub fn nnz(&self) -> i64 {
        self.p.last().copied().unwrap_or(0)
    }

    pub fn is_hyper(&self) -> bool {
        self.h.is_some() && !self.is_slice
    }

    /// Column held by stored vector k under the current representation.
    pub fn vector_column(&self, k: i64) -> i64 {
        if self.is_slice {
            self.hfirst + k
        } else {
            match &self.h {
                Some(h) => h[k as usize],
                None => k,
            }
        }
    }

    /// Half-open pointer range of stored vector k.
    pub fn vector_range(&self, k: i64) -> (i64, i64) {
        (self.p[k as usize], self.p[k as usize + 1])
    }

    /// Row indices and values of stored vector k.
    pub fn vector(&self, k: i64) -> (&[i64], &[T]) {
        let (start, end) = self.vector_range(k);
        (
            &self.i[start as usize..end as usize],
            &self.x[start as usize..end as usize],
        )
    }

    pub fn check_invariants(&self) -> Result<(), MatrixError> {
        let nvec = self.nvec.max(0) as usize;
        if self.p.len() != nvec + 1 {
            return Err(MatrixError::InvalidPointersLength {
                expected: nvec + 1,
                actual: self.p.len(),
            });
        }
        if self.p[0] != 0 {
            return Err(MatrixError::InvalidPointers {
                k: 0,
                expected: 0,
                actual: self.p[0],
            });
        }
        if *self.p.last().unwrap() != self.i.len() as i64 {
            return Err(MatrixError::InvalidPointers {
                k: self.nvec,
                expected: self.i.len() as i64,
                actual: *self.p.last().unwrap(),
            });
        }
        if self.i.len() != self.x.len() {
            return Err(MatrixError::IndicesValuesMismatch {
                row_indices: self.i.len(),
                values: self.x.len(),
            });
        }
        if let Some(h) = &self.h {
            if h.len() != nvec {
                return Err(MatrixError::InvalidHyperlistLength {
                    expected: nvec,
                    actual: h.len(),
                });
            }
        }

        let mut zombies = 0i64;
        for k in 0..self.nvec {
            let (start, end) = self.vector_range(k);
            if start > end || end > self.i.len() as i64 {
                return Err(MatrixError::InvalidPointers {
                    k,
                    expected: start,
                    actual: end,
                });
            }
            let mut prev: Option<i64> = None;
            for &i in &self.i[start as usize..end as usize] {
                if is_zombie(i) {
                    zombies += 1;
                }
                let row = unflip(i);
                if row < 0 || row >= self.vlen {
                    return Err(MatrixError::OutOfBoundsIndex {
                        index: row,
                        max: self.vlen,
                    });
                }
                if !self.jumbled {
                    if let Some(prev) = prev {
                        if row <= prev {
                            return Err(MatrixError::RowsNotStrictlyIncreasing {
                                k,
                                prev,
                                next: row,
                            });
                        }
                    }
                    prev = Some(row);
                }
            }
        }
        if zombies != self.nzombies {
            return Err(MatrixError::ZombieCountMismatch {
                recorded: self.nzombies,
                found: zombies,
            });
        }
        Ok(())
    }
}

impl<T: Clone> SparseMatrix<T> {
    /// n-by-n diagonal matrix, every diagonal entry set to `value`.
    pub fn diagonal(n: i64, value: T) -> Self {
        Self::standard(
            n,
            (0..=n).collect(),
            (0..n).collect(),
            vec![value; n as usize],
        )
    }
}
