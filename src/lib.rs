//! Scheduling and memory core of a sparse linear-algebra engine over
//! user-defined algebraic structures.
//!
//! The centerpiece is the element-wise task planner [`ewise_slice`]: given
//! two sparse inputs and the output's vector map, it balances the output
//! across coarse whole-vector tasks and fine row-range tasks by estimated
//! work. Around it sit the pieces the planner and its callers rely on: the
//! tracked allocator in [`memory`] (live-byte accounting and deterministic
//! out-of-memory injection), the zombie tombstone scheme in [`zombie`] used
//! by masked subassignment, and the operator capability traits in [`ops`]
//! that kernels like [`ewise_add`], [`reduce_to_scalar`] and [`apply_unary`]
//! are generic over.
//!
//! Parallel regions are bulk fork-join with static block partitions; all
//! synchronization sits at region boundaries, and nothing allocates inside
//! a parallel region.

pub mod apply;
pub mod context;
pub mod cumsum;
pub mod error;
pub mod ewise;
pub mod matrix;
pub mod memory;
pub mod ops;
pub mod reduce;
pub mod search;
pub mod slice_vector;
pub mod zombie;

pub use apply::apply_unary;
pub use context::Context;
pub use cumsum::cumsum;
pub use error::{Error, MatrixError};
pub use ewise::{Task, TaskList, ewise_add, ewise_slice};
pub use matrix::SparseMatrix;
pub use memory::{INDEX_MAX, Memory, TrackedVec};
pub use reduce::reduce_to_scalar;
pub use slice_vector::slice_vector;
pub use zombie::{flip, is_zombie, subassign_zombie, unflip};
