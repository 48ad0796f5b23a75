//! Reduction of integer lattice bases and the search for shortest vectors.
//!
//! Lattices are [`IntLattice`]s: an exact basis of `BigInt` rows, optionally
//! together with its m-dual basis which every row operation keeps in sync.
//! The reduction kernels ([`lll()`] and [`bkz()`]) approximate the
//! Gram-Schmidt data in a [`lattice::WorkingType`] chosen by
//! [`Precision`]. The [`Reducer`] adds the pairwise (Dieter) reduction,
//! Minkowski reduction and a branch-and-bound search for a shortest vector.
//!
//! Rank-1 lattices, e.g. the lattices of multiple recursive generators in
//! Korobov form, are built by [`Rank1Lattice`], general lattices from
//! generating sets by [`construction`].

pub mod bb;
pub mod bkz;
pub mod config;
pub mod construction;
pub mod error;
pub mod gram_schmidt;
pub mod lattice;
pub mod lll;
pub mod matrix;
pub mod rank1;
pub mod reducer;
pub mod rings;
pub mod vector;

pub use bkz::{BkzStats, bkz};
pub use config::{BbParams, MAX_PRE_RED, NormType, Precision, ReductionParams};
pub use error::{Error, Result};
pub use lattice::IntLattice;
pub use lll::{LllOutcome, lll};
pub use rank1::Rank1Lattice;
pub use reducer::Reducer;
