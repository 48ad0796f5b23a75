//! Branch-and-bound enumeration of short lattice vectors.
//!
//! The search fixes the integer coefficients `z` of a combination of the
//! rows from the last row to the first. The Cholesky decomposition of the
//! Gram matrix bounds the admissible values of each coefficient given the
//! ones fixed so far, and within these bounds the values are tried from the
//! center outwards. The bounds are euclidean, so for the L1 norm the ball of
//! the L1 length is searched, which contains the L1 ball.

use num_bigint::BigInt;
use num_integer::Integer;

use crate::config::NormType;
use crate::error::{Error, Result};
use crate::gram_schmidt::cholesky;
use crate::lattice::{IntLattice, WorkingType, WorkingTypeFor};
use crate::matrix::*;
use crate::rings::{Ring, Z};
use crate::vector::*;

/// Replaces a row of the basis by `v = Σ z[h] V_h`.
///
/// Unless one coefficient already is ±1, the rows with nonzero
/// coefficients are first transformed by a sequence of Euclid steps that
/// carry the gcd of the coefficients to a single row. `z` is updated to
/// the coefficients with respect to the transformed rows. The dual basis
/// follows every step. Returns the index of the replaced row.
///
/// `v` has to be primitive in the lattice, otherwise there is no unimodular
/// transformation and [`Error::Internal`] is returned.
pub(crate) fn splice(lattice: &mut IntLattice, z: &mut [i64], v: &VectorView<Z>) -> Result<usize> {
    let Some(mut j) = z.iter().rposition(|&c| c != 0) else {
        return Err(Error::Internal("spliced vector is zero"));
    };

    while z[j].abs() > 1 {
        let Some(i) = z[..j].iter().rposition(|&c| c != 0) else {
            break;
        };

        // Invariant: v = Σ z[h] V_h.
        while z[j] != 0 {
            let q = z[i] / z[j];
            if q != 0 {
                z[i] -= q * z[j];
                lattice.add_multiple(j, i, &BigInt::from(q));
            }
            z.swap(i, j);
            lattice.swap_rows(i, j);
        }
        j = i;
    }

    lattice.replace_row(j, v, z)?;
    Ok(j)
}

/// The outcome of a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Search {
    /// The node budget ran out.
    Aborted,
    /// There is no shorter vector.
    Exhausted,
    /// A shorter vector was found.
    Improved,
}

/// Which coefficients of the row to shorten the Minkowski search allows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    /// The coefficient is 1.
    Two,
    /// The coefficient is at least 2 and the combination is primitive.
    Three,
}

/// The candidates for one coefficient, from the center of the interval
/// `[min, max]` outwards.
#[derive(Debug)]
struct Candidates {
    low: i64,
    high: i64,
    min: i64,
    max: i64,
    up: bool,
}

impl Candidates {
    fn around<W: WorkingType>(wt: &W, center: &W::Element, min: i64, max: i64) -> Option<Self> {
        if min > max {
            return None;
        }
        let trunc = |x: W::Element| W::to_i64(&W::trunc(x));
        let twice = || wt.add(center.clone(), center);
        let (low, high, up) = if min == max {
            (min, max + 1, false)
        } else if wt.is_ge(center, &W::zero()) {
            let low = trunc(center.clone());
            (low, low + 1, trunc(twice()) & 1 == 1)
        } else {
            let high = trunc(center.clone());
            (high - 1, high, -trunc(twice()) & 1 == 0)
        };
        Some(Self { low, high, min, max, up })
    }

    /// The integers in `[min, max]` for `j = dim - 1` of the Minkowski
    /// search, where the center is 0 and only positive values count.
    fn upwards(min: i64, max: i64) -> Self {
        Self {
            low: 0,
            high: min,
            min,
            max,
            up: true,
        }
    }
}

impl Iterator for Candidates {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.low < self.min && self.high > self.max {
            return None;
        }

        let z = if self.up { self.high } else { self.low };
        if self.up {
            self.high += 1;
            if self.low >= self.min {
                self.up = false;
            }
        } else {
            self.low -= 1;
            if self.high <= self.max {
                self.up = true;
            }
        }
        Some(z)
    }
}

/// The state of the branch-and-bound search. The buffers are allocated once
/// for the largest dimension.
pub(crate) struct BranchAndBound<W: WorkingType> {
    wt: W,

    /// The strictly upper triangular part of the Cholesky decomposition.
    c0: OwnedMatrix<W>,

    /// The diagonal of the Cholesky decomposition.
    dc2: Vec<W::Element>,

    /// `n2[j]` is the squared length of the part of the combination fixed
    /// by the coefficients `z[j+1..]`.
    n2: Vec<W::Element>,

    /// The current coefficients.
    z: Vec<i64>,
    z_real: Vec<W::Element>,

    /// The coefficients of the best vector.
    pub(crate) z_short: Vec<i64>,

    /// The candidate vector.
    bv: OwnedVector<Z>,

    /// The best vector.
    pub(crate) bw: OwnedVector<Z>,

    /// Squared length of the shortest vector so far.
    pub(crate) l_min2: W::Element,

    /// The squared length the Minkowski search has to beat.
    target: BigInt,

    pub(crate) nodes: u64,
    pub(crate) max_nodes: u64,

    found_zero: bool,
    smaller: bool,
}

impl<W: WorkingTypeFor<Z>> BranchAndBound<W> {
    pub(crate) fn new(wt: W, capacity: usize, max_nodes: u64) -> Self {
        let zeros = || std::iter::repeat_with(W::zero).take(capacity).collect::<Vec<_>>();
        Self {
            c0: OwnedMatrix::zero(capacity, capacity),
            dc2: zeros(),
            n2: zeros(),
            z: vec![0; capacity],
            z_real: zeros(),
            z_short: vec![0; capacity],
            bv: OwnedVector::zero(capacity),
            bw: OwnedVector::zero(capacity),
            l_min2: W::zero(),
            target: BigInt::default(),
            nodes: 0,
            max_nodes,
            found_zero: false,
            smaller: false,
            wt,
        }
    }

    pub(crate) fn wt(&self) -> &W {
        &self.wt
    }

    /// Decomposes the Gram matrix and resets the search.
    /// Returns `false` if the decomposition is degenerate.
    fn start(&mut self, lattice: &mut IntLattice) -> Result<bool> {
        let dim = lattice.dim();
        match cholesky(&self.wt, lattice, dim, &mut self.c0, &mut self.dc2) {
            Ok(()) => {}
            Err(Error::NumericDegeneracy { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }
        self.n2[dim - 1] = W::zero();
        self.z[..dim].fill(0);
        self.z_short[..dim].fill(0);
        self.nodes = 0;
        self.found_zero = false;
        self.smaller = false;
        Ok(true)
    }

    /// Counts a node. Returns `false` if the budget is exhausted.
    fn visit(&mut self) -> bool {
        self.nodes += 1;
        if self.nodes > self.max_nodes {
            log::warn!("branch-and-bound exceeded {} nodes", self.max_nodes);
            return false;
        }
        true
    }

    /// The center of the interval of `z[j]`.
    fn center(&self, j: usize, dim: usize) -> W::Element {
        let mut center = W::zero();
        for k in j + 1..dim {
            self.wt.mul_sub_assign(&mut center, &self.c0[(j, k)], &self.z_real[k]);
        }
        center
    }

    /// The distance of the ends of the interval of `z[j]` from its center.
    fn radius(&self, j: usize) -> W::Element {
        let wt = &self.wt;
        W::sqrt(&wt.div(wt.sub(self.l_min2.clone(), &self.n2[j]), &self.dc2[j]))
    }

    /// The smallest and largest integers in `[center - dc, center + dc]`.
    fn bounds(&self, center: &W::Element, dc: &W::Element) -> (i64, i64) {
        let wt = &self.wt;
        let trunc = |x: &W::Element| W::to_i64(&W::trunc(x.clone()));

        let x = wt.sub(center.clone(), dc);
        let mut min = trunc(&x);
        if wt.is_positive(&x) {
            min += 1;
        }

        let x = wt.add(center.clone(), dc);
        let mut max = trunc(&x);
        if wt.is_negative(&x) {
            max -= 1;
        }
        (min, max)
    }

    /// Fixes `z[j]` and returns the squared length of the part of the
    /// combination fixed by `z[j..]`.
    fn fix(&mut self, j: usize, z: i64, center: &W::Element) -> W::Element {
        self.z[j] = z;
        self.z_real[j] = self.wt.from_f64(z as f64);
        let x = self.wt.sub(self.z_real[j].clone(), center);
        let x2 = self.wt.mul(x.clone(), &x);
        self.wt.mul_add(self.n2[j].clone(), &x2, &self.dc2[j])
    }

    /// Computes `bv = Σ z[k] V_k`.
    fn materialize(&mut self, lattice: &IntLattice) {
        let dim = lattice.dim();
        let bv = &mut self.bv[0..dim];
        for e in bv.iter_mut() {
            *e = Z::zero();
        }
        for (k, &z) in self.z[..dim].iter().enumerate() {
            if z != 0 {
                bv.mul_add_assign(&BigInt::from(z), lattice.row(k), &Z);
            }
        }
    }

    /// Remembers the candidate as the best vector.
    fn accept(&mut self, dim: usize) {
        self.smaller = true;
        self.z_short[..dim].copy_from_slice(&self.z[..dim]);
        self.bw[0..dim]
            .as_slice_mut()
            .clone_from_slice(self.bv[0..dim].as_slice());
    }

    /// Searches for a nonzero vector that is strictly shorter than
    /// `l_min2` in the active norm of the lattice. The best one is left in
    /// `bw`, its coefficients in `z_short` and its squared length in
    /// `l_min2`.
    pub(crate) fn shortest(
        &mut self,
        lattice: &mut IntLattice,
        l_min2: W::Element,
    ) -> Result<Search> {
        self.l_min2 = l_min2;
        if !self.start(lattice)? {
            return Ok(Search::Aborted);
        }

        let dim = lattice.dim();
        if !self.try_shortest(lattice, dim - 1) {
            return Ok(Search::Aborted);
        }
        Ok(if self.smaller {
            Search::Improved
        } else {
            Search::Exhausted
        })
    }

    fn try_shortest(&mut self, lattice: &IntLattice, j: usize) -> bool {
        if !self.visit() {
            return false;
        }

        let dim = lattice.dim();
        let center = self.center(j, dim);
        let (mut min, max) = self.bounds(&center, &self.radius(j));

        // Only one of v and -v is visited: the first nonzero coefficient
        // from the end is positive.
        if !self.found_zero {
            min = 0;
        }

        let Some(candidates) = Candidates::around(&self.wt, &center, min, max) else {
            return true;
        };

        for z in candidates {
            let mn = self.fix(j, z, &center);
            if !self.wt.is_lt(&mn, &self.l_min2) {
                if j > 0 {
                    self.n2[j - 1] = mn;
                }
                continue;
            }

            if j > 0 {
                self.n2[j - 1] = mn;
                if !self.try_shortest(lattice, j - 1) {
                    return false;
                }
                continue;
            }

            // The first complete combination is the zero vector.
            if !self.found_zero {
                self.found_zero = true;
                continue;
            }

            self.materialize(lattice);
            let bv = &self.bv[0..dim];
            let len = match lattice.norm_type() {
                NormType::L2 => bv.norm_sqr(&Z),
                NormType::L1 => {
                    let l1 = bv.l1_norm(&Z);
                    &l1 * &l1
                }
            };
            let len = self.wt.from_ring(&len, &Z);
            if self.wt.is_lt(&len, &self.l_min2) {
                log::trace!("shorter vector of squared length {len}");
                self.l_min2 = len;
                self.accept(dim);
            }
        }
        true
    }

    /// Tries to shorten the row `dim - 1` by adding a combination of the
    /// other rows. In stage 2 the coefficient of the row is 1. In stage 3 it
    /// is at least 2 and the coefficients `z[first..]` have to be coprime.
    /// Stops at the first shorter vector, which is left in `bw` with its
    /// coefficients in `z_short`.
    pub(crate) fn shorten_last(
        &mut self,
        lattice: &mut IntLattice,
        first: usize,
        stage: Stage,
    ) -> Result<Search> {
        let dim = lattice.dim();
        self.target = lattice.l2_norm(dim - 1);
        self.l_min2 = self.wt.from_ring(&self.target, &Z);
        if !self.start(lattice)? {
            return Ok(Search::Aborted);
        }

        if !self.try_shorten(lattice, dim - 1, first, stage) {
            return Ok(Search::Aborted);
        }
        Ok(if self.smaller {
            Search::Improved
        } else {
            Search::Exhausted
        })
    }

    fn try_shorten(&mut self, lattice: &IntLattice, j: usize, first: usize, stage: Stage) -> bool {
        if !self.visit() {
            return false;
        }

        let dim = lattice.dim();
        let (center, candidates) = if j + 1 < dim {
            let center = self.center(j, dim);
            let (min, max) = self.bounds(&center, &self.radius(j));
            match Candidates::around(&self.wt, &center, min, max) {
                Some(candidates) => (center, candidates),
                None => return true,
            }
        } else {
            let candidates = match stage {
                Stage::Two => Candidates::upwards(1, 1),
                Stage::Three => {
                    let max = W::to_i64(&W::trunc(self.radius(j)));
                    Candidates::upwards(2, max)
                }
            };
            (W::zero(), candidates)
        };

        for z in candidates {
            let mn = self.fix(j, z, &center);

            if j > 0 {
                self.n2[j - 1] = mn;
                if self.wt.is_ge(&self.l_min2, &self.n2[j - 1]) {
                    if !self.try_shorten(lattice, j - 1, first, stage) {
                        return false;
                    }
                    if self.smaller {
                        return true;
                    }
                }
                continue;
            }

            if !self.wt.is_lt(&mn, &self.l_min2) {
                continue;
            }

            self.materialize(lattice);
            if self.bv[0..dim].norm_sqr(&Z) >= self.target {
                continue;
            }

            let primitive = match stage {
                Stage::Two => true,
                Stage::Three => self.z[first..dim].iter().fold(0i64, |g, z| g.gcd(z)) == 1,
            };
            if primitive {
                self.accept(dim);
                return true;
            }
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rings::F64;

    fn lattice(rows: &[[i64; 3]]) -> IntLattice {
        let basis = OwnedMatrix::<Z>::from_rows(rows);
        let (dual, m) = crate::construction::dual_basis_min_modulus(&basis).unwrap();
        IntLattice::from_basis_with_dual(basis, dual, m, NormType::L2).unwrap()
    }

    #[test]
    fn candidates_alternate_around_the_center() {
        let c: Vec<_> = Candidates::around(&F64, &0.3, -2, 2).unwrap().collect();
        assert_eq!(c, [0, 1, -1, 2, -2]);

        let c: Vec<_> = Candidates::around(&F64, &0.7, -1, 3).unwrap().collect();
        assert_eq!(c, [1, 0, 2, -1, 3]);

        let c: Vec<_> = Candidates::around(&F64, &-0.7, -3, 1).unwrap().collect();
        assert_eq!(c, [-1, 0, -2, 1, -3]);

        let c: Vec<_> = Candidates::around(&F64, &5.5, 5, 5).unwrap().collect();
        assert_eq!(c, [5]);

        assert!(Candidates::around(&F64, &0., 1, 0).is_none());

        let c: Vec<_> = Candidates::upwards(2, 4).collect();
        assert_eq!(c, [2, 3, 4]);
    }

    #[test]
    fn splice_keeps_duality() {
        let mut l = lattice(&[[1, 0, 0], [0, 1, 0], [0, 0, 1]]);

        // 3 V_1 + 2 V_2 has coprime coefficients but none of them is ±1.
        let mut z = [0, 3, 2];
        let v = OwnedVector::<Z>::from_array([0, 3, 2]);
        let k = splice(&mut l, &mut z, v.view()).unwrap();
        assert_eq!(l.row(k).as_slice(), v.as_slice());
        assert_eq!(z[k].abs(), 1, "{z:?}");
        assert!(l.check_duality(), "{:?}", l.dual_basis());
        assert_eq!(l.gram_determinant(), BigInt::from(1));

        let mut z = [0, 0, 0];
        assert!(splice(&mut l, &mut z, v.view()).is_err());
    }

    #[test]
    fn splice_with_unit_coefficient() {
        let mut l = lattice(&[[2, 1, 0], [0, 3, 1], [0, 0, 7]]);
        let mut z = [-1, 0, 2];
        let mut v = OwnedVector::<Z>::zero(3);
        v.mul_sub_assign(&BigInt::from(1), l.row(0), &Z);
        v.mul_add_assign(&BigInt::from(2), l.row(2), &Z);
        let det = l.gram_determinant();

        let k = splice(&mut l, &mut z, v.view()).unwrap();
        assert_eq!(k, 0);
        assert_eq!(l.row(0).as_slice(), v.as_slice());
        assert!(l.check_duality());
        assert_eq!(l.gram_determinant(), det);
    }

    #[test]
    fn shortest_vector_search() {
        // The first two rows span Z^2, so e_0 and e_1 are shortest.
        let mut l = lattice(&[[5, 4, 0], [4, 3, 0], [0, 0, 7]]);
        let mut bb = BranchAndBound::new(F64, 3, 1000);
        assert_eq!(l.l2_norm(0), BigInt::from(41));
        let s = bb.shortest(&mut l, 41.).unwrap();
        assert_eq!(s, Search::Improved);
        assert_eq!(bb.l_min2, 1.);
        let bw = &bb.bw[0..3];
        assert_eq!(bw.norm_sqr(&Z), BigInt::from(1), "{bw:?}");

        // Nothing is shorter than the shortest vector.
        let s = bb.shortest(&mut l, 1.).unwrap();
        assert_eq!(s, Search::Exhausted);

        bb.max_nodes = 1;
        let s = bb.shortest(&mut l, 41.).unwrap();
        assert_eq!(s, Search::Aborted);
    }

    #[test]
    fn minkowski_stages() {
        let mut l = lattice(&[[1, 0, 0], [0, 1, 0], [3, 1, 1]]);
        let mut bb = BranchAndBound::new(F64, 3, 1000);

        // (3, 1, 1) - 3 (1, 0, 0) - (0, 1, 0) = (0, 0, 1).
        let s = bb.shorten_last(&mut l, 2, Stage::Two).unwrap();
        assert_eq!(s, Search::Improved);
        assert_eq!(bb.z_short[2], 1);
        assert_eq!(bb.bw[0..3].as_slice(), [0, 0, 1].map(BigInt::from));

        // The first row can't be shortened by a combination in which it has
        // a coefficient of at least 2.
        l.swap_rows(0, 2);
        let s = bb.shorten_last(&mut l, 0, Stage::Three).unwrap();
        assert_eq!(s, Search::Exhausted);
    }
}
