//! The [`Reducer`] combines the reduction kernels and the branch-and-bound
//! search on a lattice.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::bb::{BranchAndBound, Search, Stage, splice};
use crate::bkz::Bkz;
use crate::config::{BbParams, MAX_PRE_RED, NormType, Precision, ReductionParams};
use crate::error::{Error, Result};
use crate::lattice::{IntLattice, WorkingTypeFor};
use crate::lll::LllOutcome;
use crate::rings::{F64, IntDivRing, Q, XF64, Z};
use crate::vector::*;

/// The reduction kernels of a [`Reducer`], one per precision. Each is
/// created with the capacity of the reducer when it is first used.
#[derive(Default)]
struct Kernels {
    double: Option<Bkz<F64>>,
    extended: Option<Bkz<XF64>>,
    exact: Option<Bkz<Q>>,
}

/// Runs LLL or, if a block size is set, BKZ on the workspace.
fn run_kernel<W: WorkingTypeFor<Z>>(
    kernel: &mut Bkz<W>,
    lattice: &mut IntLattice,
    params: &ReductionParams,
) -> Result<LllOutcome> {
    match params.block_size {
        None => kernel.lll.reduce(lattice, params),
        Some(_) => kernel.reduce(lattice, params),
    }
}

/// Reduces lattices of dimension up to a fixed maximum and searches for
/// their shortest vectors.
///
/// The branch-and-bound search approximates the Cholesky decomposition of
/// the Gram matrix with the working type `W`. All buffers are sized for
/// `max_dim` and reused for every lattice. The Gram-Schmidt workspaces of
/// the reduction kernels are allocated when a precision is first used.
pub struct Reducer<W: WorkingTypeFor<Z> = F64> {
    max_dim: usize,
    bb: BranchAndBound<W>,
    kernels: Kernels,

    /// `bound_l2[d - 1]` is the squared length below which the shortest
    /// vector search in dimension `d` gives up right away.
    bound_l2: Vec<W::Element>,

    total_nodes: u64,

    /// Number of consecutive steps of the pairwise reduction that changed
    /// nothing.
    quiet: usize,

    /// Number of modifications by the pairwise reduction.
    modifications: u64,

    /// Coefficients of the dual step of the pairwise reduction.
    nv: Vec<BigInt>,

    /// Candidate vector of the pairwise reduction.
    bv: OwnedVector<Z>,

    /// `settled[i]` means that row i can't be shortened in stage 2 of the
    /// Minkowski reduction.
    settled: Vec<bool>,
}

impl Reducer<F64> {
    /// Creates a reducer for lattices of dimension up to `max_dim`.
    pub fn new(max_dim: usize) -> Self {
        Self::with_working_type(F64, max_dim)
    }
}

impl<W: WorkingTypeFor<Z>> Reducer<W> {
    pub fn with_working_type(wt: W, max_dim: usize) -> Self {
        Self {
            max_dim,
            bb: BranchAndBound::new(wt, max_dim, BbParams::default().max_nodes),
            kernels: Kernels::default(),
            bound_l2: std::iter::repeat_with(W::zero).take(max_dim).collect(),
            total_nodes: 0,
            quiet: 0,
            modifications: 0,
            nv: vec![BigInt::default(); max_dim],
            bv: OwnedVector::zero(max_dim),
            settled: Vec::with_capacity(max_dim),
        }
    }

    pub fn max_dim(&self) -> usize {
        self.max_dim
    }

    fn check_dim(&self, lattice: &IntLattice) -> Result<()> {
        if lattice.dim() > self.max_dim {
            return Err(Error::DimensionTooLarge {
                dim: lattice.dim(),
                max_dim: self.max_dim,
            });
        }
        Ok(())
    }

    /// Sets the squared lengths `bounds[dim1..dim2]` below which
    /// [`Reducer::shortest_vector`] stops right away in the dimensions
    /// `dim1 + 1..=dim2`.
    pub fn set_bound_l2(&mut self, bounds: &[f64], dim1: usize, dim2: usize) -> Result<()> {
        if dim2 > self.max_dim || dim2 > bounds.len() {
            return Err(Error::DimensionTooLarge {
                dim: dim2,
                max_dim: self.max_dim.min(bounds.len()),
            });
        }
        for i in dim1..dim2 {
            self.bound_l2[i] = self.bb.wt().from_f64(bounds[i]);
        }
        Ok(())
    }

    /// The maximal number of nodes of a branch-and-bound search.
    pub fn set_max_nodes(&mut self, max_nodes: u64) {
        self.bb.max_nodes = max_nodes;
    }

    pub fn max_nodes(&self) -> u64 {
        self.bb.max_nodes
    }

    /// The squared length of the shortest vector found by the last search.
    pub fn min_length_sqr(&self) -> &W::Element {
        &self.bb.l_min2
    }

    /// The total number of nodes visited by the branch-and-bound searches.
    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    /// LLL or, if `params.block_size` is set, BKZ reduction of the lattice
    /// with the Gram-Schmidt data in the precision `params.precision`.
    pub fn reduce(
        &mut self,
        lattice: &mut IntLattice,
        params: &ReductionParams,
    ) -> Result<LllOutcome> {
        self.check_dim(lattice)?;
        let max_dim = self.max_dim;
        let kernels = &mut self.kernels;
        match params.precision {
            Precision::Double => {
                let kernel = kernels.double.get_or_insert_with(|| Bkz::new(F64, max_dim));
                run_kernel(kernel, lattice, params)
            }
            Precision::Extended => {
                let kernel = kernels.extended.get_or_insert_with(|| Bkz::new(XF64, max_dim));
                run_kernel(kernel, lattice, params)
            }
            Precision::Arbitrary => {
                let kernel = kernels.exact.get_or_insert_with(|| Bkz::new(Q, max_dim));
                run_kernel(kernel, lattice, params)
            }
        }
    }

    /// Pairwise reduction (Dieter) of the rows `d..dim`: rows are
    /// shortened by adding multiples of other rows, and, if the lattice
    /// keeps a dual, by combinations suggested by the dual basis. Stops
    /// after `2 * dim - d` steps without change.
    pub fn pairwise_reduce(&mut self, lattice: &mut IntLattice, d: usize) -> Result<()> {
        self.check_dim(lattice)?;
        self.dieter(lattice, d, None, None);
        Ok(())
    }

    /// [`Reducer::pairwise_reduce`], but the primal step is applied to
    /// randomly chosen rows.
    pub fn pairwise_reduce_randomized(
        &mut self,
        lattice: &mut IntLattice,
        d: usize,
        seed: u64,
    ) -> Result<()> {
        self.check_dim(lattice)?;
        let mut rng = StdRng::seed_from_u64(seed);
        self.dieter(lattice, d, None, Some(&mut rng));
        Ok(())
    }

    fn dieter(
        &mut self,
        lattice: &mut IntLattice,
        d: usize,
        mut settled: Option<&mut [bool]>,
        mut rng: Option<&mut StdRng>,
    ) {
        let dim = lattice.dim();
        if d >= dim {
            return;
        }

        sort_rows(lattice, d, settled.as_deref_mut());
        let bound = 2 * dim - d;
        let with_dual = lattice.has_dual();
        self.quiet = 0;
        self.modifications = 0;

        let mut i = dim - 1;
        loop {
            let primal = match rng.as_deref_mut() {
                Some(rng) => rng.random_range(0..dim),
                None => i,
            };
            self.reduce_primal(lattice, primal, d, settled.as_deref_mut());
            if i > d && with_dual {
                self.reduce_dual(lattice, i, d, settled.as_deref_mut());
            }
            i = if i == 0 { dim - 1 } else { i - 1 };

            if self.quiet >= bound || self.modifications > MAX_PRE_RED {
                break;
            }
        }
        log::debug!("pairwise reduction: {} modifications", self.modifications);
    }

    /// Reduces the rows `d..dim` other than `i` by multiples of `V_i`.
    fn reduce_primal(
        &mut self,
        lattice: &mut IntLattice,
        i: usize,
        d: usize,
        mut settled: Option<&mut [bool]>,
    ) {
        self.quiet += 1;
        let dim = lattice.dim();
        let ni = lattice.l2_norm(i);
        if ni.is_zero() {
            return;
        }

        for j in d..dim {
            if j == i {
                continue;
            }

            let ns = Z::rounded_div(&lattice.row(i).dot(lattice.row(j), &Z), &ni);
            if ns.is_zero() {
                continue;
            }

            if ns.abs() < BigInt::from(1000) {
                // Only if it really gets shorter.
                let bv = &mut self.bv[0..dim];
                bv.as_slice_mut().clone_from_slice(lattice.row(j).as_slice());
                bv.mul_sub_assign(&ns, lattice.row(i), &Z);
                if bv.norm_sqr(&Z) >= lattice.l2_norm(j) {
                    continue;
                }
            }

            lattice.add_multiple(j, i, &-ns);
            self.quiet = 0;
            self.modifications += 1;
            if let Some(settled) = settled.as_deref_mut() {
                for k in [i, j] {
                    if k >= d {
                        settled[k] = false;
                    }
                }
            }
        }
    }

    /// Replaces `V_i` by `V_i + Σ nv_j V_j` with the coefficients
    /// `nv_j = round(<W_i, W_j> / |W_i|²)` if that is shorter.
    fn reduce_dual(
        &mut self,
        lattice: &mut IntLattice,
        i: usize,
        d: usize,
        settled: Option<&mut [bool]>,
    ) {
        self.quiet += 1;
        let dim = lattice.dim();
        let Some(wi) = lattice.dual_l2_norm(i) else {
            return;
        };
        if wi.is_zero() {
            return;
        }

        let bv = &mut self.bv[0..dim];
        bv.as_slice_mut().clone_from_slice(lattice.row(i).as_slice());
        for j in 0..dim {
            self.nv[j] = BigInt::default();
            if j == i {
                continue;
            }
            let (Some(w_i), Some(w_j)) = (lattice.dual_row(i), lattice.dual_row(j)) else {
                return;
            };
            self.nv[j] = Z::rounded_div(&w_i.dot(w_j, &Z), &wi);
            if !self.nv[j].is_zero() {
                bv.mul_add_assign(&self.nv[j], lattice.row(j), &Z);
            }
        }

        if bv.norm_sqr(&Z) >= lattice.l2_norm(i) {
            return;
        }

        self.quiet = 0;
        self.modifications += 1;
        for j in 0..dim {
            if j != i && !self.nv[j].is_zero() {
                // Also W_j -= nv_j W_i.
                lattice.add_multiple(i, j, &self.nv[j]);
            }
        }
        if let Some(settled) = settled {
            for j in (d..dim).filter(|&j| j == i || !self.nv[j].is_zero()) {
                settled[j] = false;
            }
        }
    }

    /// Searches for a shortest nonzero vector in the active norm of the
    /// lattice and makes it the first row.
    ///
    /// Returns `Ok(false)` if the search did not complete: because the node
    /// budget ran out, the Cholesky decomposition failed, or the first row
    /// already is shorter than the bound set with
    /// [`Reducer::set_bound_l2`]. The rows are sorted by length in any case.
    pub fn shortest_vector(&mut self, lattice: &mut IntLattice) -> Result<bool> {
        self.check_dim(lattice)?;
        let dim = lattice.dim();
        if dim == 0 {
            return Ok(true);
        }

        let completed = self.search_shortest(lattice)?;
        lattice.update_norms();
        lattice.sort_by_vec_norm(0);
        Ok(completed)
    }

    fn search_shortest(&mut self, lattice: &mut IntLattice) -> Result<bool> {
        let dim = lattice.dim();
        let norm = lattice.norm_type();

        // Sorted, the Cholesky decomposition loses less precision.
        lattice.sort(0);
        let start = match norm {
            NormType::L2 => lattice.l2_norm(0),
            NormType::L1 => (0..dim).map(|i| lattice.vec_norm(i)).min().unwrap_or_default(),
        };
        let wt = self.bb.wt();
        let l_min2 = wt.from_ring(&start, &Z);
        if wt.is_le(&l_min2, &self.bound_l2[dim - 1]) {
            self.bb.l_min2 = l_min2;
            return Ok(false);
        }

        let search = self.bb.shortest(lattice, l_min2)?;
        self.total_nodes += self.bb.nodes;
        match search {
            Search::Aborted => return Ok(false),
            Search::Exhausted => return Ok(true),
            Search::Improved => {}
        }

        let k = splice(lattice, &mut self.bb.z_short[..dim], &self.bb.bw[0..dim])?;
        if norm == NormType::L2 || lattice.vec_norm(k) < start {
            lattice.swap_rows(k, 0);
        }
        Ok(true)
    }

    /// Minkowski reduction of the rows `d..dim`, the first `d` rows are
    /// left alone.
    ///
    /// Alternates the pairwise reduction with branch-and-bound searches
    /// that shorten single rows, first by combinations in which the row has
    /// the coefficient 1, then, in dimensions above 7, by primitive
    /// combinations with larger coefficients. Returns `Ok(false)` if a
    /// search ran out of nodes.
    pub fn minkowski(&mut self, lattice: &mut IntLattice, d: usize) -> Result<bool> {
        self.check_dim(lattice)?;
        let dim = lattice.dim();
        if dim == 0 {
            return Ok(true);
        }

        let mut settled = std::mem::take(&mut self.settled);
        settled.clear();
        settled.resize(dim, false);
        let complete = self.minkowski_with(lattice, d, &mut settled);
        self.settled = settled;
        complete
    }

    fn minkowski_with(
        &mut self,
        lattice: &mut IntLattice,
        d: usize,
        settled: &mut [bool],
    ) -> Result<bool> {
        let dim = lattice.dim();
        loop {
            settled.iter_mut().enumerate().for_each(|(i, s)| *s = i < d);
            loop {
                self.dieter(lattice, d, Some(&mut *settled), None);
                sort_rows(lattice, d, Some(&mut *settled));

                let mut found = false;
                for i in 0..dim {
                    if settled[i] {
                        continue;
                    }
                    match self.shorten_row(lattice, i, d, Stage::Two, settled)? {
                        Search::Aborted => return Ok(false),
                        Search::Improved => found = true,
                        Search::Exhausted => {}
                    }
                }
                if !found {
                    break;
                }
            }

            let mut found = false;
            if dim > 7 {
                for i in d..dim {
                    match self.shorten_row(lattice, i, d, Stage::Three, settled)? {
                        Search::Aborted => return Ok(false),
                        Search::Improved => found = true,
                        Search::Exhausted => {}
                    }
                }
            }
            if !found {
                break;
            }
        }

        lattice.update_norms();
        self.bb.l_min2 = self.bb.wt().from_ring(&lattice.l2_norm(0), &Z);
        Ok(true)
    }

    /// Tries to shorten row `i` with a branch-and-bound search.
    fn shorten_row(
        &mut self,
        lattice: &mut IntLattice,
        i: usize,
        d: usize,
        stage: Stage,
        settled: &mut [bool],
    ) -> Result<Search> {
        let dim = lattice.dim();
        if stage == Stage::Three {
            // If the angle between V_i and W_i is less than π/3, then V_i
            // is not the longest vector of a combination with |z_i| >= 2.
            if let Some(wi) = lattice.dual_l2_norm(i) {
                let vi = lattice.l2_norm(i);
                let m = lattice.modulus();
                if vi * wi < m * m * 4 {
                    return Ok(Search::Exhausted);
                }
            }
        }

        // The search shortens the last row.
        let last = dim - 1;
        lattice.swap_rows(i, last);
        settled.swap(i, last);

        let search = self.bb.shorten_last(lattice, i, stage);
        self.total_nodes += self.bb.nodes;
        let search = match search {
            Ok(s) => s,
            Err(e) => {
                lattice.swap_rows(i, last);
                settled.swap(i, last);
                return Err(e);
            }
        };

        match search {
            Search::Improved => {
                let k = splice(lattice, &mut self.bb.z_short[..dim], &self.bb.bw[0..dim])?;
                if stage == Stage::Two {
                    // The rows in the combination may be shortened now.
                    for h in d..dim {
                        if h != k && self.bb.z_short[h] != 0 {
                            settled[h] = false;
                        }
                    }
                }
            }
            Search::Exhausted if stage == Stage::Two => settled[last] = true,
            _ => {}
        }

        lattice.swap_rows(i, last);
        settled.swap(i, last);
        Ok(search)
    }
}

/// Sorts the rows `d..dim` by their euclidean length. The flags are
/// permuted along with the rows.
fn sort_rows(lattice: &mut IntLattice, d: usize, flags: Option<&mut [bool]>) {
    let Some(flags) = flags else {
        lattice.sort(d);
        return;
    };
    for i in d + 1..lattice.dim() {
        let mut j = i;
        while j > d && lattice.l2_norm(j - 1) > lattice.l2_norm(j) {
            lattice.swap_rows(j - 1, j);
            flags.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::construction::{dual_basis_min_modulus, lattice_from_generators};
    use crate::matrix::*;
    use crate::rank1::Rank1Lattice;
    use num_traits::ToPrimitive;
    use rand::distr::{Distribution, Uniform};

    fn korobov(m: i64, a: i64, dim: usize, norm: NormType) -> IntLattice {
        let rank1 = Rank1Lattice::korobov(m, a, dim);
        let mut lattice = IntLattice::new(m, dim, true, norm);
        rank1.build_basis(&mut lattice, dim).unwrap();
        lattice
    }

    fn random_lattice(rng: &mut StdRng, n: usize) -> IntLattice {
        let entry = Uniform::new_inclusive(-30i64, 30).unwrap();
        let mut v = OwnedMatrix::<Z>::zero(n, n);
        for i in 0..n {
            v[(i, i)] = BigInt::from(rng.random_range(1..=40i64));
            for j in i + 1..n {
                v[(i, j)] = BigInt::from(entry.sample(rng));
            }
        }
        let (w, m) = dual_basis_min_modulus(&v).unwrap();
        IntLattice::from_basis_with_dual(v, w, m, NormType::L2).unwrap()
    }

    /// The squared length of a shortest vector by exhaustive search over
    /// small coefficients.
    fn brute_force_min(lattice: &IntLattice, bound: i64) -> BigInt {
        let dim = lattice.dim();
        let mut z = vec![-bound; dim];
        let mut best: Option<BigInt> = None;
        loop {
            if z.iter().any(|&c| c != 0) {
                let mut v = OwnedVector::<Z>::zero(dim);
                for (k, &c) in z.iter().enumerate() {
                    v.mul_add_assign(&BigInt::from(c), lattice.row(k), &Z);
                }
                let n = v.norm_sqr(&Z);
                if best.as_ref().is_none_or(|b| n < *b) {
                    best = Some(n);
                }
            }

            let Some(k) = z.iter().position(|&c| c < bound) else {
                break;
            };
            z[k] += 1;
            z[..k].fill(-bound);
        }
        best.unwrap_or_default()
    }

    #[test]
    fn korobov_scenario() {
        let mut lattice = korobov(1048573, 209714, 6, NormType::L2);
        let mut reducer = Reducer::new(6);
        let mut previous = lattice.l2_norm(0);

        let params = ReductionParams::lll(0.99999);
        let out = reducer.reduce(&mut lattice, &params).unwrap();
        assert!(out.sqlen[0] < previous, "{} >= {previous}", out.sqlen[0]);
        previous = out.sqlen[0].clone();

        assert!(reducer.shortest_vector(&mut lattice).unwrap());
        let shortest = lattice.l2_norm(0);
        assert!(shortest <= previous, "{shortest} > {previous}");
        assert_eq!(Some(*reducer.min_length_sqr()), shortest.to_f64());
        assert!(lattice.check_duality());

        // A second search finds nothing shorter.
        assert!(reducer.shortest_vector(&mut lattice).unwrap());
        assert_eq!(lattice.l2_norm(0), shortest);
    }

    #[test]
    fn shortest_vector_matches_brute_force() {
        let rng = &mut StdRng::seed_from_u64(0);
        let mut reducer = Reducer::new(4);
        for _ in 0..10 {
            let mut lattice = random_lattice(rng, 4);
            let det = lattice.gram_determinant();
            let initial = (0..4).map(|i| lattice.l2_norm(i)).min().unwrap();
            reducer
                .reduce(&mut lattice, &ReductionParams::lll(0.99))
                .unwrap();
            let expected = brute_force_min(&lattice, 5);

            assert!(reducer.shortest_vector(&mut lattice).unwrap());
            assert_eq!(lattice.l2_norm(0), expected, "basis {:?}", lattice.basis());
            assert!(expected <= initial, "{expected} > {initial}");

            // Searching again finds the same length.
            assert!(reducer.shortest_vector(&mut lattice).unwrap());
            assert_eq!(lattice.l2_norm(0), expected);
            assert_eq!(lattice.gram_determinant(), det);
            assert!(lattice.check_duality(), "dual out of sync");

            // Sorted by length.
            for i in 1..4 {
                assert!(lattice.vec_norm(i - 1) <= lattice.vec_norm(i));
            }
        }
    }

    #[test]
    fn l1_norm() {
        let mut lattice = korobov(1021, 331, 4, NormType::L1);
        let mut reducer = Reducer::new(4);
        reducer.reduce(&mut lattice, &ReductionParams::lll(0.99)).unwrap();
        let before = (0..4).map(|i| lattice.vec_norm(i)).min().unwrap();
        assert!(reducer.shortest_vector(&mut lattice).unwrap());
        let after = lattice.vec_norm(0);
        assert!(after <= before, "{after} > {before}");
        assert!(lattice.check_duality());
        for i in 1..4 {
            assert!(after <= lattice.vec_norm(i));
        }
    }

    #[test]
    fn node_budget() {
        let mut lattice = korobov(1048573, 209714, 40, NormType::L2);
        let mut reducer = Reducer::new(40);
        reducer.set_max_nodes(1);
        assert_eq!(reducer.max_nodes(), 1);
        assert!(!reducer.shortest_vector(&mut lattice).unwrap());
        assert!(lattice.check_duality());
    }

    #[test]
    fn bound_aborts_search() {
        let mut lattice = korobov(1021, 331, 4, NormType::L2);
        let mut reducer = Reducer::new(4);
        reducer.reduce(&mut lattice, &ReductionParams::lll(0.99)).unwrap();
        reducer.set_bound_l2(&[0., 0., 0., 1e12], 0, 4).unwrap();
        assert!(!reducer.shortest_vector(&mut lattice).unwrap());
        assert_eq!(reducer.total_nodes(), 0);
        assert!(reducer.set_bound_l2(&[0.; 5], 0, 5).is_err());
    }

    #[test]
    fn trivial_dimensions() {
        let mut reducer = Reducer::new(2);

        let basis = OwnedMatrix::from_rows(&[[-5]]);
        let mut lattice = IntLattice::from_basis(basis, 5, NormType::L2).unwrap();
        assert!(reducer.shortest_vector(&mut lattice).unwrap());
        assert_eq!(lattice.l2_norm(0), BigInt::from(25));
        assert!(reducer.minkowski(&mut lattice, 0).unwrap());
        reducer.pairwise_reduce(&mut lattice, 0).unwrap();
        assert_eq!(lattice.l2_norm(0), BigInt::from(25));

        let mut empty = IntLattice::new(5, 2, true, NormType::L2);
        assert!(reducer.shortest_vector(&mut empty).unwrap());
        assert!(reducer.minkowski(&mut empty, 0).unwrap());

        let mut big = korobov(1021, 331, 3, NormType::L2);
        assert_eq!(
            reducer.shortest_vector(&mut big),
            Err(Error::DimensionTooLarge { dim: 3, max_dim: 2 })
        );
    }

    #[test]
    fn pairwise_reduction() {
        let rng = &mut StdRng::seed_from_u64(0);
        let mut reducer = Reducer::new(8);
        for seed in 0..5 {
            let mut lattice = korobov(1048573, 209714, 8, NormType::L2);
            let det = lattice.gram_determinant();
            let before: BigInt = (0..8).map(|i| lattice.l2_norm(i)).sum();

            if seed % 2 == 0 {
                reducer.pairwise_reduce(&mut lattice, 0).unwrap();
            } else {
                reducer
                    .pairwise_reduce_randomized(&mut lattice, 0, rng.random())
                    .unwrap();
            }

            let after: BigInt = (0..8).map(|i| lattice.l2_norm(i)).sum();
            assert!(after < before, "{after} >= {before}");
            assert_eq!(lattice.gram_determinant(), det);
            assert!(lattice.check_duality(), "dual out of sync");
        }
    }

    #[test]
    fn pairwise_reduction_keeps_the_first_rows() {
        let mut lattice = korobov(1021, 331, 5, NormType::L2);
        let mut reducer = Reducer::new(5);
        let first = lattice.basis().row(0).to_owned();
        reducer.pairwise_reduce(&mut lattice, 1).unwrap();
        assert_eq!(lattice.row(0).as_slice(), first.as_slice());
    }

    fn check_minkowski(lattice: &mut IntLattice) {
        let det = lattice.gram_determinant();
        let mut reducer = Reducer::new(lattice.dim());
        assert!(reducer.minkowski(lattice, 0).unwrap());
        assert_eq!(lattice.gram_determinant(), det);
        assert!(lattice.check_duality(), "dual out of sync");

        // The first row is a shortest vector.
        let first = lattice.l2_norm(0);
        let mut copy = lattice.clone();
        assert!(reducer.shortest_vector(&mut copy).unwrap());
        assert_eq!(copy.l2_norm(0), first);

        // No row can be shortened by adding another one.
        let dim = lattice.dim();
        for i in 0..dim {
            for j in 0..dim {
                if i == j {
                    continue;
                }
                let ni = lattice.l2_norm(i);
                for sign in [1, -1] {
                    let mut v = lattice.row(i).to_owned();
                    v.mul_add_assign(&BigInt::from(sign), lattice.row(j), &Z);
                    assert!(v.norm_sqr(&Z) >= ni, "row {i} shortened by row {j}");
                }
            }
        }
    }

    #[test]
    fn minkowski_reduction() {
        let rng = &mut StdRng::seed_from_u64(0);
        for _ in 0..5 {
            check_minkowski(&mut random_lattice(rng, 5));
        }
        check_minkowski(&mut korobov(1048573, 209714, 6, NormType::L2));
        check_minkowski(&mut korobov(1021, 331, 9, NormType::L2));
    }

    #[test]
    fn minkowski_without_dual() {
        let g = OwnedMatrix::<Z>::from_rows(&[
            [1, 12, 43, 99],
            [101, 0, 0, 0],
            [0, 101, 0, 0],
            [0, 0, 101, 0],
            [0, 0, 0, 101],
        ]);
        let mut lattice = lattice_from_generators(&g, 101, false, NormType::L2).unwrap();
        check_minkowski(&mut lattice);
    }

    #[test]
    fn kernels_are_kept() {
        let rng = &mut StdRng::seed_from_u64(3);
        let mut reducer = Reducer::new(8);
        assert!(reducer.kernels.double.is_none());

        for (n, block_size) in [(8, None), (4, Some(3)), (6, None)] {
            let mut lattice = random_lattice(rng, n);
            let det = lattice.gram_determinant();
            let mut params = ReductionParams::lll(0.99);
            params.block_size = block_size;
            let out = reducer.reduce(&mut lattice, &params).unwrap();
            assert_eq!(out.rank, n);
            assert_eq!(lattice.gram_determinant(), det);
        }
        let double = reducer.kernels.double.as_ref().unwrap();
        assert_eq!(double.lll.gs.capacity(), 8);
        assert!(reducer.kernels.extended.is_none());
        assert!(reducer.kernels.exact.is_none());

        let mut lattice = random_lattice(rng, 5);
        let params = ReductionParams::lll(0.99).with_precision(Precision::Arbitrary);
        reducer.reduce(&mut lattice, &params).unwrap();
        assert!(reducer.kernels.exact.is_some());
        assert!(reducer.kernels.extended.is_none());
    }
}
