//! LLL reduction with floating point Gram-Schmidt data.
//!
//! This is the classic Schnorr-Euchner variant: the basis is exact, the
//! orthogonalization is approximated in a [`WorkingType`] and repaired
//! when it turns out to be unreliable. Optionally with deep insertions.

use num_bigint::BigInt;

use crate::config::ReductionParams;
use crate::error::{Error, Result};
use crate::gram_schmidt::GramSchmidt;
use crate::lattice::{IntLattice, WorkingType, WorkingTypeFor};
use crate::rings::{RingElement, Z};

/// Result of a reduction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LllOutcome {
    /// The number of linearly independent rows. The zero rows are at the
    /// bottom of the basis.
    pub rank: usize,

    /// The squared euclidean lengths of the first `rank` rows.
    pub sqlen: Vec<BigInt>,
}

/// The LLL kernel and its Gram-Schmidt workspace, allocated once for
/// bases of up to `capacity` rows and reused for every run.
/// The block reduction drives it on windows of the basis.
pub(crate) struct Lll<W: WorkingTypeFor<Z>> {
    pub(crate) gs: GramSchmidt<W>,

    /// `st[i]` is the first `j` for which `μ[i][j]` is stale.
    st: Vec<usize>,

    /// The size reduction tolerates `|μ| <= 1/2 + 2^-log_red`.
    log_red: i32,

    delta: W::Element,
    deep: usize,
    retry_threshold: usize,
    swap_loop_threshold: usize,

    /// Total number of swaps.
    pub(crate) swaps: u64,
}

impl<W: WorkingTypeFor<Z>> Lll<W> {
    pub(crate) fn new(wt: W, capacity: usize) -> Self {
        let mut kernel = Self {
            gs: GramSchmidt::new(wt, capacity),
            st: Vec::with_capacity(capacity + 1),
            log_red: 0,
            delta: W::zero(),
            deep: 0,
            retry_threshold: 0,
            swap_loop_threshold: 0,
            swaps: 0,
        };
        kernel.configure(&ReductionParams::default());
        kernel
    }

    /// Prepares a run with the given parameters. Resets the tolerance of
    /// the size reduction and the swap counter.
    pub(crate) fn configure(&mut self, params: &ReductionParams) {
        let wt = &self.gs.wt;
        self.log_red = (wt.precision_bits() / 2) as i32;
        self.delta = wt.from_f64(params.delta);
        self.deep = params.deep;
        self.retry_threshold = params.retry_threshold;
        self.swap_loop_threshold = params.swap_loop_threshold;
        self.swaps = 0;
    }

    /// Fails if the basis doesn't fit into the workspace.
    pub(crate) fn check_capacity(&self, dim: usize) -> Result<()> {
        let max_dim = self.gs.capacity();
        if dim > max_dim {
            return Err(Error::DimensionTooLarge { dim, max_dim });
        }
        Ok(())
    }

    /// LLL-reduces the basis of the lattice and swaps the shortest row
    /// into row 0.
    pub(crate) fn reduce(
        &mut self,
        lattice: &mut IntLattice,
        params: &ReductionParams,
    ) -> Result<LllOutcome> {
        params.validate()?;
        let dim = lattice.dim();
        self.check_capacity(dim)?;
        self.configure(params);
        self.gs.load(lattice, dim)?;
        let rank = self.run_window(lattice, dim, 0)?;
        log::debug!("LLL: {} swaps, rank {rank}", self.swaps);
        Ok(shortest_first(lattice, rank))
    }

    /// The slack of the size reduction.
    pub(crate) fn red_fudge(&self) -> f64 {
        0.5f64.powi(self.log_red)
    }

    /// Doubles the slack of the size reduction.
    fn relax(&mut self) -> Result<()> {
        self.log_red -= 1;
        log::warn!("relaxing reduction ({})", self.log_red);
        if self.log_red < 4 {
            return Err(Error::PrecisionLoss);
        }
        Ok(())
    }

    /// The total bit size of row `k`.
    fn bit_size(lattice: &IntLattice, k: usize) -> u64 {
        lattice.row(k).iter().map(|e| e.bits()).sum()
    }

    /// Moves row `from` to `to` in the basis and in the workspace.
    pub(crate) fn rotate(&mut self, lattice: &mut IntLattice, from: usize, to: usize) {
        if from > to {
            for i in (to..from).rev() {
                lattice.swap_rows(i, i + 1);
                self.gs.swap_rows(i, i + 1);
            }
        } else {
            for i in from..to {
                lattice.swap_rows(i, i + 1);
                self.gs.swap_rows(i, i + 1);
            }
        }
    }

    /// LLL-reduces the first `rows` rows of the basis, assuming that the
    /// rows before `start` already are reduced and their Gram-Schmidt data
    /// is up to date. The rows `start..rows` have to be loaded into the
    /// workspace.
    ///
    /// Returns the rank of the first `rows` rows, the zero rows are moved
    /// to the bottom of the window.
    pub(crate) fn run_window(
        &mut self,
        lattice: &mut IntLattice,
        rows: usize,
        start: usize,
    ) -> Result<usize> {
        let mut st = std::mem::take(&mut self.st);
        st.clear();
        st.extend((0..=rows).map(|i| if i < start { i } else { 0 }));
        let rank = self.run_window_with(lattice, rows, start, &mut st);
        self.st = st;
        rank
    }

    fn run_window_with(
        &mut self,
        lattice: &mut IntLattice,
        rows: usize,
        start: usize,
        st: &mut [usize],
    ) -> Result<usize> {
        let mut m = rows;
        let mut k = start;

        // The first row whose Gram-Schmidt data was not refreshed in exact
        // arithmetic since it last changed.
        let mut rr_st = 0;
        let mut max_k: Option<usize> = None;
        let mut swap_cnt = 0;

        while k < m {
            if max_k.is_none_or(|mk| k > mk) {
                max_k = Some(k);
                swap_cnt = 0;
            }
            rr_st = rr_st.min(k);

            let mut rst = if st[k] == k { 0 } else { k };
            if st[k] < st[k + 1] {
                st[k + 1] = st[k];
            }
            self.gs.compute_row(lattice, k, st[k])?;
            st[k] = k;

            if swap_cnt > self.swap_loop_threshold {
                log::warn!("swap loop? refreshing rows {rr_st}..={k}");
                self.gs.refresh(lattice, rr_st, k)?;
                if rr_st < st[k + 1] {
                    st[k + 1] = rr_st;
                }
                rr_st = k + 1;
                rst = k;
                swap_cnt = 0;
            }

            self.size_reduce(lattice, k, rst, st, &mut rr_st)?;

            if self.gs.b[k].is_zero() {
                // Move the zero row to the bottom and shrink the window.
                self.rotate(lattice, k, m - 1);
                st[k..].fill(0);
                rr_st = rr_st.min(k);
                m -= 1;
                continue;
            }

            let wt = &self.gs.wt;
            let (mu, c) = (&self.gs.mu, &self.gs.c);

            if self.deep > 0 {
                let mut cc = self.gs.b[k].clone();
                let mut l = 0;
                while l < k && wt.is_le(&wt.mul(self.delta.clone(), &c[l]), &cc) {
                    let t = wt.mul(mu[(k, l)].clone(), &mu[(k, l)]);
                    wt.mul_sub_assign(&mut cc, &t, &c[l]);
                    l += 1;
                }

                if l < k && (l < self.deep || k - l <= self.deep) {
                    self.rotate(lattice, k, l);
                    k = l;
                    self.swaps += 1;
                    swap_cnt += 1;
                    continue;
                }
            }

            // Lovász condition.
            let swap = k > 0 && {
                let lhs = wt.mul(self.delta.clone(), &c[k - 1]);
                let t = wt.mul(mu[(k, k - 1)].clone(), &mu[(k, k - 1)]);
                let rhs = wt.mul_add(c[k].clone(), &t, &c[k - 1]);
                wt.is_gt(&lhs, &rhs)
            };

            if swap {
                lattice.swap_rows(k, k - 1);
                self.gs.swap_rows(k, k - 1);
                k -= 1;
                self.swaps += 1;
                swap_cnt += 1;
            } else {
                k += 1;
            }
        }

        Ok(m)
    }

    /// Size reduces row `k` against the rows before `rst`.
    fn size_reduce(
        &mut self,
        lattice: &mut IntLattice,
        k: usize,
        mut rst: usize,
        st: &mut [usize],
        rr_st: &mut usize,
    ) -> Result<()> {
        let mut counter = 0u64;
        let mut trigger_index = k;
        let mut small_trigger = false;
        let mut cnt = 0;
        let mut sz = 0;
        let mut did_refresh = false;
        let four = self.gs.wt.from_f64(4.);

        loop {
            counter += 1;
            if counter % 128 == 0 {
                let new_sz = Self::bit_size(lattice, k);
                if counter == 128 || new_sz < sz {
                    sz = new_sz;
                } else {
                    log::warn!("possible infinite loop in the size reduction of row {k}");
                }
            }

            let mut half_plus_fudge = self.gs.wt.from_f64(0.5 + self.red_fudge());
            let mut changed = false;
            let mut start_over = false;

            for j in (0..rst).rev() {
                let t1 = self.gs.wt.abs(self.gs.mu[(k, j)].clone());
                if !self.gs.wt.is_gt(&t1, &half_plus_fudge) {
                    continue;
                }

                if !changed {
                    if j > trigger_index || (j == trigger_index && small_trigger) {
                        cnt += 1;
                        if cnt > self.retry_threshold {
                            if self.log_red <= 15 {
                                while self.log_red > 10 {
                                    self.relax()?;
                                }
                                half_plus_fudge = self.gs.wt.from_f64(0.5 + self.red_fudge());

                                if !did_refresh {
                                    self.gs.refresh(lattice, *rr_st, k)?;
                                    if *rr_st < st[k + 1] {
                                        st[k + 1] = *rr_st;
                                    }
                                    *rr_st = k + 1;
                                    did_refresh = true;
                                    rst = k;
                                    trigger_index = k;
                                    small_trigger = false;
                                    start_over = true;
                                    break;
                                }
                            } else {
                                self.relax()?;
                                half_plus_fudge = self.gs.wt.from_f64(0.5 + self.red_fudge());
                                cnt = 0;
                            }
                        }
                    }

                    trigger_index = j;
                    small_trigger = self.gs.wt.is_lt(&t1, &four);
                    changed = true;
                    *rr_st = (*rr_st).min(k);
                }

                let mu1 = round_half_down(&self.gs.wt, &self.gs.mu[(k, j)]);
                let gs = &mut self.gs;
                let (mu_k, mu_j) = gs.mu.get_rows_mut(k, j);
                for i in 0..j {
                    gs.wt.mul_sub_assign(&mut mu_k[i], &mu1, &mu_j[i]);
                }
                gs.wt.sub_assign(&mut mu_k[j], &mu1);

                let q = -W::to_ring(&mu1, &Z);
                lattice.add_multiple(k, j, &q);
            }

            if changed {
                self.gs.load_row(lattice, k)?;
                if !did_refresh {
                    self.gs.compute_row(lattice, k, 0)?;
                } else {
                    self.gs.refresh(lattice, *rr_st, k)?;
                    *rr_st = k + 1;
                }
                rst = k;
            }

            if !changed && !start_over {
                return Ok(());
            }
        }
    }
}

/// Rounds to the nearest integer with ties towards zero.
pub(crate) fn round_half_down<W: WorkingType>(wt: &W, x: &W::Element) -> W::Element {
    let half = wt.from_f64(0.5);
    if wt.is_ge(x, &W::zero()) {
        // ceil(x - 0.5) = -floor(0.5 - x)
        wt.neg(wt.floor(wt.sub(half, x)))
    } else {
        wt.floor(wt.add(half, x))
    }
}

/// Swaps the shortest of the first `rank` rows into row 0 and collects the
/// squared lengths.
pub(crate) fn shortest_first(lattice: &mut IntLattice, rank: usize) -> LllOutcome {
    let imin = (0..rank).min_by_key(|&i| lattice.l2_norm(i));
    if let Some(imin) = imin {
        lattice.swap_rows(0, imin);
    }
    LllOutcome {
        rank,
        sqlen: (0..rank).map(|i| lattice.l2_norm(i)).collect(),
    }
}

/// LLL-reduces the basis of the lattice with the Gram-Schmidt data in the
/// working type `W`. The dual basis, if any, is kept in sync.
///
/// Afterwards the shortest nonzero row is in row 0 and the zero rows (if
/// the rows were dependent) are at the bottom.
pub fn lll<W: WorkingTypeFor<Z>>(
    wt: W,
    lattice: &mut IntLattice,
    params: &ReductionParams,
) -> Result<LllOutcome> {
    Lll::new(wt, lattice.dim()).reduce(lattice, params)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::config::{NormType, Precision};
    use crate::construction::dual_basis_min_modulus;
    use crate::matrix::OwnedMatrix;
    use crate::rank1::Rank1Lattice;
    use crate::rings::{F64, Q, XF64};
    use proptest::prelude::*;
    use rand::distr::{Distribution, Uniform};
    use rand::{Rng, SeedableRng, rngs::StdRng};

    /// A random basis with determinant `Π diag`, mixed by unimodular row
    /// operations, together with its dual.
    fn random_lattice(rng: &mut StdRng, n: usize) -> IntLattice {
        let entry = Uniform::new_inclusive(-50i64, 50).unwrap();
        let mut v = OwnedMatrix::<Z>::zero(n, n);
        for i in 0..n {
            v[(i, i)] = BigInt::from(rng.random_range(1..=9i64));
            for j in i + 1..n {
                v[(i, j)] = BigInt::from(entry.sample(rng));
            }
        }
        for _ in 0..2 * n {
            let i = rng.random_range(0..n);
            let j = rng.random_range(0..n);
            if i != j {
                v.row_multiply_add(i, j, &BigInt::from(rng.random_range(-3..=3i64)), &Z);
            }
        }
        let (w, m) = dual_basis_min_modulus(&v).unwrap();
        IntLattice::from_basis_with_dual(v, w, m, NormType::L2).unwrap()
    }

    /// Checks the Lovász condition and the size reduction in exact
    /// arithmetic.
    pub(crate) fn assert_reduced(lattice: &IntLattice, rank: usize, delta: f64) {
        let mut gs = GramSchmidt::new(Q, rank);
        gs.load(lattice, rank).unwrap();
        for k in 0..rank {
            gs.compute_row(lattice, k, 0).unwrap();
        }

        let c = |k| Q::to_f64(gs.c(k));
        let mu = |k, j| Q::to_f64(gs.mu(k, j));
        for k in 1..rank {
            let lhs = delta * c(k - 1);
            let rhs = c(k) + mu(k, k - 1) * mu(k, k - 1) * c(k - 1);
            assert!(
                lhs <= rhs * (1. + 1e-9),
                "Lovász condition fails at {k}: {lhs} > {rhs}"
            );
            for j in 0..k {
                assert!(mu(k, j).abs() <= 0.51, "μ[{k}][{j}] = {}", mu(k, j));
            }
        }
    }

    fn check_kernel<W: WorkingTypeFor<Z>>(
        wt: W,
        lattice: &mut IntLattice,
        params: &ReductionParams,
    ) {
        let det = lattice.gram_determinant();
        let dim = lattice.dim();
        let mut kernel = Lll::new(wt, dim);
        kernel.configure(params);
        kernel.gs.load(lattice, dim).unwrap();
        let rank = kernel.run_window(lattice, dim, 0).unwrap();
        assert_eq!(rank, dim);
        assert_reduced(lattice, rank, params.delta);
        assert_eq!(lattice.gram_determinant(), det, "determinant changed");
        assert!(lattice.check_duality(), "dual out of sync: {:?}", lattice.dual_basis());
    }

    #[test]
    fn random_bases() {
        let rng = &mut StdRng::seed_from_u64(0);
        for n in 2..10 {
            let params = ReductionParams::lll(0.99);
            check_kernel(F64, &mut random_lattice(rng, n), &params);
            check_kernel(XF64, &mut random_lattice(rng, n), &params);
            check_kernel(Q, &mut random_lattice(rng, n), &params);
            check_kernel(F64, &mut random_lattice(rng, n), &params.clone().with_deep(3));
        }
    }

    #[test]
    fn korobov_lattice() {
        let (m, a) = (1048573, 209714);
        let rank1 = Rank1Lattice::korobov(m, a, 6);
        let mut lattice = IntLattice::new(m, 6, true, NormType::L2);
        rank1.build_basis(&mut lattice, 6).unwrap();
        let before = (0..6).map(|i| lattice.l2_norm(i)).min().unwrap();

        for precision in [Precision::Double, Precision::Extended, Precision::Arbitrary] {
            let params = ReductionParams::lll(0.99999).with_precision(precision);
            let out = match precision {
                Precision::Double => lll(F64, &mut lattice, &params),
                Precision::Extended => lll(XF64, &mut lattice, &params),
                Precision::Arbitrary => lll(Q, &mut lattice, &params),
            }
            .unwrap();
            assert_eq!(out.rank, 6);
            assert!(out.sqlen[0] < before, "{} >= {before}", out.sqlen[0]);
            assert!(out.sqlen.iter().all(|l| l >= &out.sqlen[0]), "{:?}", out.sqlen);
            assert!(lattice.check_duality());
        }
    }

    #[test]
    fn dependent_rows() {
        // Rank 2 in dimension 3.
        let v = OwnedMatrix::<Z>::from_rows(&[[1, 2, 3], [2, 4, 6], [0, 1, 1]]);
        let mut lattice = IntLattice::from_basis(v, 1, NormType::L2).unwrap();
        let out = lll(F64, &mut lattice, &ReductionParams::lll(0.9)).unwrap();
        assert_eq!(out.rank, 2);
        assert!(lattice.row(2).is_zero(), "{:?}", lattice.basis());
        assert_eq!(out.sqlen[0], BigInt::from(2));
    }

    #[test]
    fn trivial_dimensions() {
        let basis = OwnedMatrix::from_rows(&[[7]]);
        let mut lattice = IntLattice::from_basis(basis, 7, NormType::L2).unwrap();
        let out = lll(F64, &mut lattice, &ReductionParams::default()).unwrap();
        assert_eq!(out, LllOutcome { rank: 1, sqlen: vec![BigInt::from(49)] });

        let mut empty = IntLattice::new(7, 4, false, NormType::L2);
        assert_eq!(lll(F64, &mut empty, &ReductionParams::default()).unwrap().rank, 0);
    }

    #[test]
    fn invalid_delta_leaves_basis_alone() {
        let basis = OwnedMatrix::from_rows(&[[5, 1], [1, 0]]);
        let mut lattice = IntLattice::from_basis(basis, 1, NormType::L2).unwrap();
        let before = lattice.basis();
        let err = lll(F64, &mut lattice, &ReductionParams::lll(1.0));
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
        assert_eq!(lattice.basis(), before);
    }

    #[test]
    fn swap_loop_refresh() {
        // A threshold of 1 refreshes the Gram-Schmidt data in exact
        // arithmetic as soon as a row is swapped back twice.
        let rng = &mut StdRng::seed_from_u64(0);
        let params = ReductionParams::lll(0.99).with_swap_loop_threshold(1);
        params.validate().unwrap();
        for n in [3, 6, 9] {
            check_kernel(F64, &mut random_lattice(rng, n), &params);
            check_kernel(XF64, &mut random_lattice(rng, n), &params);
            check_kernel(F64, &mut random_lattice(rng, n), &params.clone().with_deep(2));
        }
    }

    #[test]
    fn multipliers_beyond_double_precision() {
        // A unimodular basis of Z^4 whose multipliers don't fit into the
        // mantissa of a double, so each row takes several rounds of size
        // reduction. With a retry threshold of 1 the second repeated round
        // relaxes the tolerance.
        let mut v = OwnedMatrix::<Z>::identity(4);
        v[(1, 0)] = (BigInt::from(1) << 70u32) + 12345;
        v[(2, 0)] = BigInt::from(3).pow(50u32);
        v[(2, 1)] = BigInt::from(7).pow(20u32);
        v[(3, 0)] = BigInt::from(5).pow(30u32);
        v[(3, 1)] = BigInt::from(11).pow(15u32);
        v[(3, 2)] = BigInt::from(13).pow(10u32);
        let (w, m) = dual_basis_min_modulus(&v).unwrap();
        let mut lattice = IntLattice::from_basis_with_dual(v, w, m, NormType::L2).unwrap();

        let params = ReductionParams::lll(0.99).with_retry_threshold(1);
        check_kernel(F64, &mut lattice, &params);
        for i in 0..4 {
            assert_eq!(lattice.l2_norm(i), BigInt::from(1), "{:?}", lattice.basis());
        }
    }

    #[test]
    fn relaxing_too_far_fails() {
        let mut kernel = Lll::new(F64, 2);
        assert_eq!(kernel.log_red, 26);
        while kernel.log_red > 4 {
            kernel.relax().unwrap();
        }
        assert_eq!(kernel.relax(), Err(Error::PrecisionLoss));

        // The next run starts with the full precision again.
        kernel.configure(&ReductionParams::default());
        assert_eq!(kernel.red_fudge(), 0.5f64.powi(26));
    }

    #[test]
    fn workspace_is_reused() {
        let rng = &mut StdRng::seed_from_u64(0);
        let mut kernel = Lll::new(Q, 6);
        for n in [6, 2, 5, 3] {
            let mut lattice = random_lattice(rng, n);
            let det = lattice.gram_determinant();
            let out = kernel.reduce(&mut lattice, &ReductionParams::lll(0.9)).unwrap();
            assert_eq!(out.rank, n);
            assert_eq!(lattice.gram_determinant(), det);
            assert!(lattice.check_duality());
        }

        let mut lattice = random_lattice(rng, 7);
        assert_eq!(
            kernel.reduce(&mut lattice, &ReductionParams::lll(0.9)),
            Err(Error::DimensionTooLarge { dim: 7, max_dim: 6 })
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn lll_reduces_and_keeps_lattice(seed: u64, n in 2usize..8, delta in 0.5f64..0.999) {
            let rng = &mut StdRng::seed_from_u64(seed);
            let mut lattice = random_lattice(rng, n);
            let det = lattice.gram_determinant();
            let dim = lattice.dim();
            let params = ReductionParams::lll(delta);
            let mut kernel = Lll::new(F64, dim);
            kernel.configure(&params);
            kernel.gs.load(&lattice, dim).unwrap();
            let rank = kernel.run_window(&mut lattice, dim, 0).unwrap();
            prop_assert_eq!(rank, n);
            assert_reduced(&lattice, rank, delta);
            prop_assert_eq!(lattice.gram_determinant(), det);
            prop_assert!(lattice.check_duality());
        }
    }
}
