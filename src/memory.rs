// SPDX-License-Identifier: Apache-2.0
//
// This file is based on the SuiteSparse:GraphBLAS memory wrapper by
// Timothy A. Davis.
//
// SuiteSparse:GraphBLAS, Copyright (c) 2017-2019, Timothy A. Davis.
// All Rights Reserved.
//
// Modifications/porting for this project:
// Copyright (c) 2025 the bramble authors

//! Tracked allocation with overflow-safe sizing and deterministic fault
//! injection.
//!
//! Every workspace the scheduling layer owns goes through a [`Memory`]
//! handle. With tracking enabled the handle counts live allocations and live
//! bytes, and an armed debug countdown forces the Nth allocation to fail, so
//! tests can walk every out-of-memory path of a caller deterministically.

use std::mem::size_of;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Largest allocation operand and largest valid index (2^60).
pub const INDEX_MAX: u64 = 1 << 60;

#[derive(Debug, Default)]
struct MemoryState {
    /// fault injection armed
    debug: bool,
    /// allocations remaining before a forced failure
    debug_count: i64,
    /// live allocation count
    nmalloc: i64,
    /// live bytes
    inuse: i64,
}

#[derive(Debug, Default)]
struct Inner {
    tracking: AtomicBool,
    state: Mutex<MemoryState>,
}

/// Allocator handle. Clones share one set of counters; the accounting
/// critical section is never held across a real allocation.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    inner: Arc<Inner>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable allocation tracking. Off by default; production use
    /// pays only an atomic load per call.
    pub fn set_tracking(&self, on: bool) {
        self.inner.tracking.store(on, Ordering::Relaxed);
    }

    pub fn tracking(&self) -> bool {
        self.inner.tracking.load(Ordering::Relaxed)
    }

    /// Arm or disarm the pretend-to-fail countdown. Only read when tracking
    /// is enabled.
    pub fn set_debug(&self, on: bool) {
        self.inner.state.lock().debug = on;
    }

    /// With debug armed, the `n`th allocation from now fails.
    pub fn set_debug_count(&self, n: i64) {
        self.inner.state.lock().debug_count = n;
    }

    /// Number of outstanding tracked allocations.
    pub fn nmalloc(&self) -> i64 {
        self.inner.state.lock().nmalloc
    }

    /// Bytes held by outstanding tracked allocations.
    pub fn inuse(&self) -> i64 {
        self.inner.state.lock().inuse
    }

    /// Clamp the operands and compute the byte size by a checked multiply.
    /// None on overflow or an operand above [`INDEX_MAX`].
    fn checked_size(nitems: usize, size_of_item: usize) -> Option<(usize, usize)> {
        let nitems = nitems.max(1);
        let size_of_item = size_of_item.max(1);
        if nitems as u64 > INDEX_MAX || size_of_item as u64 > INDEX_MAX {
            return None;
        }
        nitems.checked_mul(size_of_item)?;
        Some((nitems, size_of_item))
    }

    fn alloc_raw<T: Clone + Default>(nitems: usize) -> Option<Vec<T>> {
        let mut buf = Vec::new();
        if buf.try_reserve_exact(nitems).is_err() {
            return None;
        }
        buf.resize(nitems, T::default());
        Some(buf)
    }

    /// Allocate `nitems` of `T` (at least one). None on overflow, injected
    /// failure, or allocation failure.
    fn alloc<T: Clone + Default>(&self, nitems: usize) -> Option<Vec<T>> {
        let (nitems, size_of_item) = Self::checked_size(nitems, size_of::<T>())?;

        if !self.tracking() {
            return Self::alloc_raw(nitems);
        }

        // brutal memory debug: pretend to fail when the countdown runs out
        let pretend_to_fail = {
            let mut st = self.inner.state.lock();
            if st.debug {
                st.debug_count -= 1;
                st.debug_count <= 0
            } else {
                false
            }
        };
        if pretend_to_fail {
            return None;
        }

        let buf = Self::alloc_raw::<T>(nitems)?;
        {
            let mut st = self.inner.state.lock();
            st.nmalloc += 1;
            st.inuse += (nitems * size_of_item) as i64;
        }
        Some(buf)
    }

    /// The inverse accounting of [`Memory::alloc`].
    fn free_accounting(&self, nitems: usize, size_of_item: usize) {
        if !self.tracking() {
            return;
        }
        let Some((nitems, size_of_item)) = Self::checked_size(nitems, size_of_item) else {
            return;
        };
        let mut st = self.inner.state.lock();
        st.nmalloc -= 1;
        st.inuse -= (nitems * size_of_item) as i64;
    }
}

/// An owned, accounted buffer: the RAII face of alloc / realloc / free.
/// Dropping it performs the free-side accounting, so every early-error path
/// of a caller releases its partial workspaces.
#[derive(Debug)]
pub struct TrackedVec<T> {
    buf: Vec<T>,
    /// accounted item count (clamped to at least 1)
    nitems: usize,
    mem: Memory,
}

impl<T: Clone + Default> TrackedVec<T> {
    /// None on overflow, injected failure, or allocation failure.
    pub fn alloc(mem: &Memory, nitems: usize) -> Option<Self> {
        let nitems = nitems.max(1);
        let buf = mem.alloc::<T>(nitems)?;
        Some(Self {
            buf,
            nitems,
            mem: mem.clone(),
        })
    }

    /// Resize by allocate-copy-free. On failure the old contents remain
    /// valid and false is returned.
    pub fn realloc(&mut self, new_nitems: usize) -> bool {
        let new_nitems = new_nitems.max(1);
        if new_nitems == self.nitems {
            return true;
        }
        let Some(mut fresh) = self.mem.alloc::<T>(new_nitems) else {
            return false;
        };
        let keep = self.buf.len().min(fresh.len());
        fresh[..keep].clone_from_slice(&self.buf[..keep]);
        self.buf = fresh;
        self.mem.free_accounting(self.nitems, size_of::<T>());
        self.nitems = new_nitems;
        true
    }
}

impl<T> Drop for TrackedVec<T> {
    fn drop(&mut self) {
        self.mem.free_accounting(self.nitems, size_of::<T>());
    }
}

impl<T> Deref for TrackedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.buf
    }
}

impl<T> DerefMut for TrackedVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.buf
    }
}
