use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("out of memory")]
    OutOfMemory,

    #[error("dimension mismatch: {a_vlen}x{a_nvec} vs {b_vlen}x{b_nvec}")]
    DimensionMismatch {
        a_vlen: i64,
        a_nvec: i64,
        b_vlen: i64,
        b_nvec: i64,
    },

    #[error("unknown operator: {0}")]
    UnknownOp(String),

    #[error("unknown operator type: {0}")]
    UnknownType(String),

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("invalid vector pointers length: {expected} (actual: {actual})")]
    InvalidPointersLength { expected: usize, actual: usize },

    #[error("invalid vector pointers at {k} (expected: {expected}, actual: {actual})")]
    InvalidPointers { k: i64, expected: i64, actual: i64 },

    #[error("out of bounds row index: {index} (max: {max})")]
    OutOfBoundsIndex { index: i64, max: i64 },

    #[error("rows not strictly increasing in vector {k}: {prev} then {next}")]
    RowsNotStrictlyIncreasing { k: i64, prev: i64, next: i64 },

    #[error("row indices and values length mismatch: {row_indices} vs {values}")]
    IndicesValuesMismatch { row_indices: usize, values: usize },

    #[error("invalid hyperlist length: {expected} (actual: {actual})")]
    InvalidHyperlistLength { expected: usize, actual: usize },

    #[error("zombie count mismatch: recorded {recorded}, found {found}")]
    ZombieCountMismatch { recorded: i64, found: i64 },
}
