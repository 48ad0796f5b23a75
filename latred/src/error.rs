//! Errors of the reduction kernels and the lattice operations.
//!
//! Running out of the node budget in the branch-and-bound search is not an
//! error. The search simply reports that it did not complete.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("dimension {dim} exceeds the reserved capacity {max_dim}")]
    DimensionTooLarge { dim: usize, max_dim: usize },

    /// A squared Gram-Schmidt or Cholesky length that should be positive
    /// isn't. The rows are (numerically) linearly dependent.
    #[error("numerically degenerate basis at row {row}")]
    NumericDegeneracy { row: usize },

    #[error("too much loss of precision in size reduction")]
    PrecisionLoss,

    #[error("overflow in the working type")]
    Overflow,

    /// An invariant of the block reduction was broken.
    #[error("internal error: {0}")]
    Internal(&'static str),

    #[error("element is not invertible modulo the modulus")]
    NotInvertible,

    #[error("m times the inverse transpose of the basis is not integral")]
    NotDual,

    #[error("basis and dual basis do not satisfy V * W^T = m * I")]
    DualMismatch,
}

pub type Result<T> = std::result::Result<T, Error>;
