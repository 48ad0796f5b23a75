//! Parameters of the reduction kernels and the branch-and-bound search.

use crate::error::{Error, Result};

/// Maximal number of modifications in one pairwise (Dieter) pre-reduction.
pub const MAX_PRE_RED: u64 = 1_000_000;

/// The number type the reduction kernels approximate the Gram-Schmidt data
/// with. The basis itself is always exact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Precision {
    /// [`crate::rings::F64`].
    #[default]
    Double,
    /// [`crate::rings::XF64`], doubles with a 64-bit exponent.
    Extended,
    /// [`crate::rings::Q`], exact rationals.
    Arbitrary,
}

/// The norm used to measure vector lengths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NormType {
    /// Sum of absolute values.
    L1,
    /// Euclidean norm.
    #[default]
    L2,
}

/// Parameters of the LLL and BKZ kernels.
#[derive(Clone, Debug, PartialEq)]
pub struct ReductionParams {
    /// The reduction factor `δ` of the Lovász condition, in `[0.5, 1)`.
    pub delta: f64,

    /// Depth of deep insertions. 0 disables them.
    pub deep: usize,

    /// Block size of BKZ. `None` runs plain LLL.
    pub block_size: Option<usize>,

    /// Pruning parameter of the BKZ enumeration. 0 disables pruning.
    pub prune: u32,

    pub precision: Precision,

    /// Number of unproductive size reduction rounds of a row after which the
    /// tolerance of the size reduction is relaxed.
    pub retry_threshold: usize,

    /// Number of swaps without progress after which the Gram-Schmidt data is
    /// recomputed in exact arithmetic.
    pub swap_loop_threshold: usize,
}

impl Default for ReductionParams {
    fn default() -> Self {
        Self {
            delta: 0.99999,
            deep: 0,
            block_size: None,
            prune: 0,
            precision: Precision::Double,
            retry_threshold: 10,
            swap_loop_threshold: 200_000,
        }
    }
}

impl ReductionParams {
    /// LLL with the reduction factor `delta`.
    pub fn lll(delta: f64) -> Self {
        Self {
            delta,
            ..Self::default()
        }
    }

    /// BKZ with the reduction factor `delta` and block size `block_size`.
    pub fn bkz(delta: f64, block_size: usize) -> Self {
        Self {
            delta,
            block_size: Some(block_size),
            ..Self::default()
        }
    }

    pub fn with_deep(mut self, deep: usize) -> Self {
        self.deep = deep;
        self
    }

    pub fn with_prune(mut self, prune: u32) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_retry_threshold(mut self, retry_threshold: usize) -> Self {
        self.retry_threshold = retry_threshold;
        self
    }

    pub fn with_swap_loop_threshold(mut self, swap_loop_threshold: usize) -> Self {
        self.swap_loop_threshold = swap_loop_threshold;
        self
    }

    /// Checks the parameters before any kernel touches the basis.
    pub fn validate(&self) -> Result<()> {
        if !(0.5..1.).contains(&self.delta) {
            return Err(Error::InvalidConfig(format!(
                "reduction factor {} is not in [0.5, 1)",
                self.delta
            )));
        }

        if let Some(beta) = self.block_size {
            if beta < 2 {
                return Err(Error::InvalidConfig(format!(
                    "block size {beta} is smaller than 2"
                )));
            }
        }

        if self.retry_threshold == 0 || self.swap_loop_threshold == 0 {
            return Err(Error::InvalidConfig(
                "retry thresholds have to be positive".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Parameters of the branch-and-bound search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BbParams {
    /// Maximal number of nodes visited by one search.
    pub max_nodes: u64,
}

impl Default for BbParams {
    fn default() -> Self {
        Self {
            max_nodes: 1_000_000_000,
        }
    }
}

#[test]
fn validation() {
    assert!(ReductionParams::default().validate().is_ok());
    assert!(ReductionParams::lll(0.5).validate().is_ok());
    assert!(ReductionParams::bkz(0.99, 2).validate().is_ok());

    for delta in [0.49, 1., 1.5, f64::NAN] {
        let err = ReductionParams::lll(delta).validate();
        assert!(
            matches!(err, Err(Error::InvalidConfig(_))),
            "delta {delta} was accepted"
        );
    }

    assert!(ReductionParams::bkz(0.9, 1).validate().is_err());
    assert!(
        ReductionParams::default()
            .with_retry_threshold(0)
            .validate()
            .is_err()
    );
}
