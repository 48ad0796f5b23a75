//! Integer lattices with an optional m-dual basis.
//!
//! [`IntLattice`] owns the exact basis and keeps the m-dual basis and the
//! cached vector lengths consistent with it. All kernels modify the basis
//! through its row operations, so the duality `V * W^T = m * I` can't be
//! broken by a partial update.

use crate::config::NormType;
use crate::error::{Error, Result};
use crate::rings::{ExtF64, F64, Field, OrderedRing, Q, Ring, SqrtRing, XF64, Z};
use crate::{matrix::*, vector::*};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};

/// Lattice algorithms are possibly internally working with a different ring.
/// These rings need to implement this.
pub trait WorkingType: Field + OrderedRing + SqrtRing {
    /// The number of bits in the mantissa.
    fn precision_bits(&self) -> u32;

    /// Rounds to the nearest integer, ties away from zero.
    fn round(s: Self::Element) -> Self::Element;

    /// Rounds towards zero.
    fn trunc(s: Self::Element) -> Self::Element;

    fn add_isize(s: Self::Element, i: isize) -> Self::Element;

    /// Rounds towards negative infinity.
    fn floor(&self, s: Self::Element) -> Self::Element {
        let t = Self::trunc(s.clone());
        if self.is_lt(&s, &t) {
            Self::add_isize(t, -1)
        } else {
            t
        }
    }

    fn from_f64(&self, f: f64) -> Self::Element;

    /// Converts to a float, saturating to infinity.
    fn to_f64(s: &Self::Element) -> f64;

    /// Approximates a rational. Used to copy the results of exact
    /// computations back into the working type.
    fn from_rational(&self, q: &BigRational) -> Self::Element;

    /// Is the element neither infinite nor NaN?
    fn is_finite(s: &Self::Element) -> bool;

    /// `log2(|s|)`, negative infinity for zero.
    fn log2(s: &Self::Element) -> f64;

    /// `2^x` for a finite `x`.
    fn exp2(&self, x: f64) -> Self::Element;

    /// Converts an integral element to an `i64`, saturating at the bounds.
    fn to_i64(s: &Self::Element) -> i64 {
        // `as` saturates and maps NaN to 0.
        Self::to_f64(s) as i64
    }
}

/// This trait facilitates the conversion between the ring of the lattice and
/// the ring used internally.
pub trait WorkingTypeFor<R: Ring>: WorkingType {
    #[allow(clippy::wrong_self_convention)]
    fn from_ring(&self, e: &R::Element, r: &R) -> Self::Element;

    /// Rounds to the nearest element of `R`.
    fn to_ring(s: &Self::Element, r: &R) -> R::Element;
}

impl WorkingType for F64 {
    fn precision_bits(&self) -> u32 {
        f64::MANTISSA_DIGITS
    }

    fn round(s: Self::Element) -> Self::Element {
        s.round()
    }

    fn trunc(s: Self::Element) -> Self::Element {
        s.trunc()
    }

    fn add_isize(s: Self::Element, i: isize) -> Self::Element {
        s + i as f64
    }

    fn from_f64(&self, f: f64) -> Self::Element {
        f
    }

    fn to_f64(s: &Self::Element) -> f64 {
        *s
    }

    fn from_rational(&self, q: &BigRational) -> Self::Element {
        XF64.from_rational(q).to_f64()
    }

    fn is_finite(s: &Self::Element) -> bool {
        s.is_finite()
    }

    fn log2(s: &Self::Element) -> f64 {
        s.abs().log2()
    }

    fn exp2(&self, x: f64) -> Self::Element {
        x.exp2()
    }
}

impl WorkingTypeFor<Z> for F64 {
    fn from_ring(&self, e: &BigInt, _: &Z) -> Self::Element {
        // Saturates to infinity, which the kernels catch.
        e.to_f64().unwrap_or(f64::NAN)
    }

    fn to_ring(s: &Self::Element, _: &Z) -> BigInt {
        BigInt::from_f64(s.round()).unwrap_or_default()
    }
}

impl WorkingType for XF64 {
    fn precision_bits(&self) -> u32 {
        f64::MANTISSA_DIGITS
    }

    fn round(s: Self::Element) -> Self::Element {
        s.round()
    }

    fn trunc(s: Self::Element) -> Self::Element {
        s.trunc()
    }

    fn add_isize(s: Self::Element, i: isize) -> Self::Element {
        s + ExtF64::from_f64(i as f64)
    }

    fn from_f64(&self, f: f64) -> Self::Element {
        ExtF64::from_f64(f)
    }

    fn to_f64(s: &Self::Element) -> f64 {
        s.to_f64()
    }

    fn from_rational(&self, q: &BigRational) -> Self::Element {
        ExtF64::from_bigint(q.numer()) / ExtF64::from_bigint(q.denom())
    }

    fn is_finite(s: &Self::Element) -> bool {
        s.is_finite()
    }

    fn log2(s: &Self::Element) -> f64 {
        s.mantissa().abs().log2() + s.exp() as f64
    }

    fn exp2(&self, x: f64) -> Self::Element {
        let e = x.floor();
        ExtF64::new((x - e).exp2(), e as i64)
    }
}

impl WorkingTypeFor<Z> for XF64 {
    fn from_ring(&self, e: &BigInt, _: &Z) -> Self::Element {
        ExtF64::from_bigint(e)
    }

    fn to_ring(s: &Self::Element, _: &Z) -> BigInt {
        s.round().to_bigint()
    }
}

impl WorkingType for Q {
    /// Rationals are exact. This is only used to scale tolerances, which
    /// become negligible.
    fn precision_bits(&self) -> u32 {
        256
    }

    fn round(s: Self::Element) -> Self::Element {
        s.round()
    }

    fn trunc(s: Self::Element) -> Self::Element {
        s.trunc()
    }

    fn add_isize(s: Self::Element, i: isize) -> Self::Element {
        s + BigRational::from_integer(BigInt::from(i))
    }

    fn from_f64(&self, f: f64) -> Self::Element {
        BigRational::from_float(f).unwrap_or_default()
    }

    fn to_f64(s: &Self::Element) -> f64 {
        s.to_f64().unwrap_or(f64::NAN)
    }

    fn from_rational(&self, q: &BigRational) -> Self::Element {
        q.clone()
    }

    fn is_finite(_: &Self::Element) -> bool {
        true
    }

    fn log2(s: &Self::Element) -> f64 {
        XF64::log2(&XF64.from_rational(s))
    }

    fn exp2(&self, x: f64) -> Self::Element {
        if !x.is_finite() {
            return BigRational::zero();
        }
        let e = x.floor();
        let m = self.from_f64((x - e).exp2());
        let shift = BigInt::one() << (e.abs() as u64);
        if e >= 0. {
            m * BigRational::from_integer(shift)
        } else {
            m / BigRational::from_integer(shift)
        }
    }

    fn to_i64(s: &Self::Element) -> i64 {
        let i = s.to_integer();
        i.to_i64()
            .unwrap_or(if i.is_negative() { i64::MIN } else { i64::MAX })
    }
}

impl WorkingTypeFor<Z> for Q {
    fn from_ring(&self, e: &BigInt, _: &Z) -> Self::Element {
        BigRational::from_integer(e.clone())
    }

    fn to_ring(s: &Self::Element, _: &Z) -> BigInt {
        s.round().to_integer()
    }
}

/// An integer lattice of dimension `dim` in `Z^dim`, with room for bases of
/// dimension up to `max_dim`.
///
/// The rows of [`IntLattice::basis`] are the basis vectors. If the lattice
/// keeps an m-dual basis `W`, every row operation on the primal basis `V`
/// updates it so that `V * W^T = m * I` holds on the live block.
#[derive(Clone, Debug)]
pub struct IntLattice {
    modulus: BigInt,
    max_dim: usize,
    dim: usize,
    norm: NormType,
    basis: OwnedMatrix<Z>,
    dual: Option<OwnedMatrix<Z>>,

    /// Squared lengths in the active norm. `None` means stale.
    vec_norms: Vec<Option<BigInt>>,

    /// Squared euclidean lengths.
    l2_norms: Vec<Option<BigInt>>,

    /// Squared euclidean lengths of the dual vectors.
    dual_norms: Vec<Option<BigInt>>,
}

impl IntLattice {
    /// Creates a lattice of dimension 0 with storage for bases of dimension
    /// up to `max_dim`.
    pub fn new(
        modulus: impl Into<BigInt>,
        max_dim: usize,
        with_dual: bool,
        norm: NormType,
    ) -> Self {
        Self {
            modulus: modulus.into(),
            max_dim,
            dim: 0,
            norm,
            basis: OwnedMatrix::zero(max_dim, max_dim),
            dual: with_dual.then(|| OwnedMatrix::zero(max_dim, max_dim)),
            vec_norms: vec![None; max_dim],
            l2_norms: vec![None; max_dim],
            dual_norms: vec![None; max_dim],
        }
    }

    /// Creates a lattice from a square basis matrix.
    pub fn from_basis(
        basis: OwnedMatrix<Z>,
        modulus: impl Into<BigInt>,
        norm: NormType,
    ) -> Result<Self> {
        let n = basis.num_rows();
        if basis.num_cols() != n {
            return Err(Error::InvalidConfig(format!(
                "basis is not square ({n}x{})",
                basis.num_cols()
            )));
        }

        Ok(Self {
            dim: n,
            basis,
            dual: None,
            ..Self::new(modulus, n, false, norm)
        })
    }

    /// Creates a lattice from a square basis and its m-dual basis.
    /// Fails with [`Error::DualMismatch`] if `V * W^T != m * I`.
    pub fn from_basis_with_dual(
        basis: OwnedMatrix<Z>,
        dual: OwnedMatrix<Z>,
        modulus: impl Into<BigInt>,
        norm: NormType,
    ) -> Result<Self> {
        let mut lattice = Self::from_basis(basis, modulus, norm)?;
        if dual.num_rows() != lattice.dim || dual.num_cols() != lattice.dim {
            return Err(Error::DualMismatch);
        }
        lattice.dual = Some(dual);
        if !lattice.check_duality() {
            return Err(Error::DualMismatch);
        }
        Ok(lattice)
    }

    /// The current dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The maximal dimension the storage was reserved for.
    pub fn max_dim(&self) -> usize {
        self.max_dim
    }

    /// Changes the dimension. Rows and columns that become live are zeroed.
    pub fn set_dim(&mut self, dim: usize) -> Result<()> {
        if dim > self.max_dim {
            return Err(Error::DimensionTooLarge {
                dim,
                max_dim: self.max_dim,
            });
        }

        for m in std::iter::once(&mut self.basis).chain(self.dual.as_mut()) {
            for i in 0..dim {
                let start = if i < self.dim { self.dim } else { 0 };
                for j in start..dim {
                    m[(i, j)] = BigInt::zero();
                }
            }
        }

        self.dim = dim;
        self.invalidate_all_norms();
        Ok(())
    }

    pub fn modulus(&self) -> &BigInt {
        &self.modulus
    }

    pub fn norm_type(&self) -> NormType {
        self.norm
    }

    /// Changes the norm used by [`IntLattice::vec_norm`].
    pub fn set_norm_type(&mut self, norm: NormType) {
        self.norm = norm;
        self.vec_norms.fill(None);
    }

    /// Does the lattice keep an m-dual basis?
    pub fn has_dual(&self) -> bool {
        self.dual.is_some()
    }

    /// The live part of the `i`-th basis vector.
    pub fn row(&self, i: usize) -> &VectorView<Z> {
        &self.basis[i][0..self.dim]
    }

    /// The live part of the `i`-th dual basis vector.
    pub fn dual_row(&self, i: usize) -> Option<&VectorView<Z>> {
        self.dual.as_ref().map(|w| &w[i][0..self.dim])
    }

    /// A copy of the live block of the basis.
    pub fn basis(&self) -> OwnedMatrix<Z> {
        self.basis.submatrix(self.dim, self.dim)
    }

    /// A copy of the live block of the dual basis.
    pub fn dual_basis(&self) -> Option<OwnedMatrix<Z>> {
        self.dual.as_ref().map(|w| w.submatrix(self.dim, self.dim))
    }

    /// Raw access to the full storage for constructions that rebuild the
    /// basis from scratch. Invalidates all cached lengths.
    pub(crate) fn storage_mut(&mut self) -> (&mut OwnedMatrix<Z>, Option<&mut OwnedMatrix<Z>>) {
        self.invalidate_all_norms();
        (&mut self.basis, self.dual.as_mut())
    }

    /// Swaps the basis vectors `i` and `j` and their duals.
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        self.basis.swap_rows(i, j);
        if let Some(w) = &mut self.dual {
            w.swap_rows(i, j);
        }
        self.vec_norms.swap(i, j);
        self.l2_norms.swap(i, j);
        self.dual_norms.swap(i, j);
    }

    /// Moves the basis vector `from` to position `to`, shifting the vectors
    /// in between by one.
    pub fn rotate(&mut self, from: usize, to: usize) {
        if from > to {
            for i in (to..from).rev() {
                self.swap_rows(i, i + 1);
            }
        } else {
            for i in from..to {
                self.swap_rows(i, i + 1);
            }
        }
    }

    /// `V_j += q * V_i`. The dual is updated with `W_i -= q * W_j`.
    pub fn add_multiple(&mut self, j: usize, i: usize, q: &BigInt) {
        if q.is_zero() {
            return;
        }
        let d = self.dim;
        let (vj, vi) = self.basis.get_rows_mut(j, i);
        vj[0..d].mul_add_assign(q, &vi[0..d], &Z);
        self.invalidate_norm(j);

        if let Some(w) = &mut self.dual {
            let (wi, wj) = w.get_rows_mut(i, j);
            wi[0..d].mul_sub_assign(q, &wj[0..d], &Z);
            self.dual_norms[i] = None;
        }
    }

    /// Negates the basis vector `i` and its dual.
    pub fn negate_row(&mut self, i: usize) {
        let d = self.dim;
        self.basis[i][0..d].neg_assign(&Z);
        if let Some(w) = &mut self.dual {
            w[i][0..d].neg_assign(&Z);
        }
    }

    /// Replaces the basis vector `k` by `v = sum_h z[h] * V_h`, where
    /// `z[k] = ±1`, and updates the dual basis accordingly.
    pub fn replace_row(&mut self, k: usize, v: &VectorView<Z>, z: &[i64]) -> Result<()> {
        if z[k].abs() != 1 {
            return Err(Error::Internal("replaced row has a coefficient other than ±1"));
        }
        let d = self.dim;
        self.basis[k][0..d]
            .as_slice_mut()
            .clone_from_slice(v.as_slice());
        self.invalidate_norm(k);

        if let Some(w) = &mut self.dual {
            if z[k] < 0 {
                w[k][0..d].neg_assign(&Z);
                self.dual_norms[k] = None;
            }
            for (h, &zh) in z.iter().enumerate().take(d) {
                if h == k || zh == 0 {
                    continue;
                }
                let (wh, wk) = w.get_rows_mut(h, k);
                wh[0..d].mul_sub_assign(&BigInt::from(zh), &wk[0..d], &Z);
                self.dual_norms[h] = None;
            }
        }
        Ok(())
    }

    /// The squared length of `V_i` in the active norm. For the L1 norm this
    /// is the square of the sum of absolute values.
    pub fn vec_norm(&mut self, i: usize) -> BigInt {
        if let Some(n) = &self.vec_norms[i] {
            return n.clone();
        }
        let n = match self.norm {
            NormType::L2 => self.l2_norm(i),
            NormType::L1 => {
                let l1 = self.row(i).l1_norm(&Z);
                &l1 * &l1
            }
        };
        self.vec_norms[i] = Some(n.clone());
        n
    }

    /// The squared euclidean length of `V_i`.
    pub fn l2_norm(&mut self, i: usize) -> BigInt {
        if let Some(n) = &self.l2_norms[i] {
            return n.clone();
        }
        let n = self.row(i).norm_sqr(&Z);
        self.l2_norms[i] = Some(n.clone());
        n
    }

    /// The squared euclidean length of `W_i`, if the lattice has a dual.
    pub fn dual_l2_norm(&mut self, i: usize) -> Option<BigInt> {
        if let Some(n) = &self.dual_norms[i] {
            return Some(n.clone());
        }
        let n = self.dual_row(i)?.norm_sqr(&Z);
        self.dual_norms[i] = Some(n.clone());
        Some(n)
    }

    /// Marks the cached lengths of `V_i` as stale.
    pub fn invalidate_norm(&mut self, i: usize) {
        self.vec_norms[i] = None;
        self.l2_norms[i] = None;
    }

    /// Marks all cached lengths as stale.
    pub fn invalidate_all_norms(&mut self) {
        self.vec_norms.fill(None);
        self.l2_norms.fill(None);
        self.dual_norms.fill(None);
    }

    /// Recomputes all stale lengths.
    pub fn update_norms(&mut self) {
        for i in 0..self.dim {
            self.vec_norm(i);
            self.l2_norm(i);
            self.dual_l2_norm(i);
        }
    }

    /// Sorts the basis vectors `d..dim` by increasing euclidean length.
    pub fn sort(&mut self, d: usize) {
        self.sort_by_key(d, Self::l2_norm);
    }

    /// Sorts the basis vectors `d..dim` by increasing length in the active
    /// norm.
    pub fn sort_by_vec_norm(&mut self, d: usize) {
        self.sort_by_key(d, Self::vec_norm);
    }

    /// Insertion sort, so equal vectors keep their order.
    fn sort_by_key(&mut self, d: usize, mut key: impl FnMut(&mut Self, usize) -> BigInt) {
        for i in d + 1..self.dim {
            let mut j = i;
            while j > d && key(self, j - 1) > key(self, j) {
                self.swap_rows(j - 1, j);
                j -= 1;
            }
        }
    }

    /// Checks `V * W^T = m * I` on the live block.
    /// Returns `true` if the lattice has no dual.
    pub fn check_duality(&self) -> bool {
        let Some(w) = &self.dual else {
            return true;
        };
        (0..self.dim).all(|i| {
            (0..self.dim).all(|j| {
                let p = self.row(i).dot(&w[j][0..self.dim], &Z);
                if i == j { p == self.modulus } else { p.is_zero() }
            })
        })
    }

    /// The determinant of the Gram matrix `V * V^T` of the live block.
    /// It is invariant under unimodular row operations.
    pub fn gram_determinant(&self) -> BigInt {
        let v = self.basis();
        determinant(v.mul_transposed(&v, &Z))
    }
}

/// Fraction free (Bareiss) determinant of a square integer matrix.
pub fn determinant(mut a: OwnedMatrix<Z>) -> BigInt {
    let n = a.num_rows();
    assert_eq!(n, a.num_cols(), "Determinant of a non-square matrix.");
    let mut sign = BigInt::from(1);
    let mut prev = BigInt::from(1);
    for k in 0..n {
        // Pivot.
        let Some(p) = (k..n).find(|&i| !a[(i, k)].is_zero()) else {
            return BigInt::zero();
        };
        if p != k {
            a.swap_rows(p, k);
            sign = -sign;
        }
        for i in k + 1..n {
            for j in k + 1..n {
                let e = &a[(i, j)] * &a[(k, k)] - &a[(i, k)] * &a[(k, j)];
                a[(i, j)] = e / &prev;
            }
        }
        prev = a[(k, k)].clone();
    }
    if n == 0 { sign } else { sign * prev }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lattice_2x2() -> IntLattice {
        let v = OwnedMatrix::<Z>::from_rows(&[[1, 3], [0, 7]]);
        let w = OwnedMatrix::<Z>::from_rows(&[[7, 0], [-3, 1]]);
        IntLattice::from_basis_with_dual(v, w, 7, NormType::L2).unwrap()
    }

    #[test]
    fn row_operations_keep_duality() {
        let mut l = lattice_2x2();
        assert!(l.check_duality());
        l.add_multiple(1, 0, &BigInt::from(-2));
        assert_eq!(l.row(1), &[-2, 1].map(BigInt::from));
        assert!(l.check_duality(), "add_multiple broke duality: {:?}", l.dual_basis());
        l.swap_rows(0, 1);
        l.negate_row(1);
        assert!(l.check_duality(), "swap/negate broke duality: {:?}", l.dual_basis());
        assert_eq!(l.l2_norm(0), BigInt::from(5));
        assert_eq!(l.l2_norm(1), BigInt::from(10));
    }

    #[test]
    fn replace_row_updates_dual() {
        let mut l = lattice_2x2();
        // -V_0 + V_1 = (-1, 4), coefficient of V_0 is -1.
        let v = OwnedVector::<Z>::from_entries([-1, 4]);
        l.replace_row(0, v.view(), &[-1, 1]).unwrap();
        assert_eq!(l.row(0), &[-1, 4].map(BigInt::from));
        assert!(l.check_duality(), "dual after replace: {:?}", l.dual_basis());
        assert!(l.replace_row(0, v.view(), &[2, 1]).is_err());
    }

    #[test]
    fn norms_and_sorting() {
        let v = OwnedMatrix::<Z>::from_rows(&[[5, 5, 0], [1, 0, 0], [0, -2, 1]]);
        let mut l = IntLattice::from_basis(v, 1, NormType::L1).unwrap();
        assert_eq!(l.vec_norm(0), BigInt::from(100));
        assert_eq!(l.vec_norm(2), BigInt::from(9));
        l.sort(0);
        assert_eq!(l.row(0), &[1, 0, 0].map(BigInt::from));
        assert_eq!(l.row(1), &[0, -2, 1].map(BigInt::from));
        l.add_multiple(2, 0, &BigInt::from(-5));
        assert_eq!(l.l2_norm(2), BigInt::from(25), "stale cache after add_multiple");
        assert_eq!(l.vec_norm(2), BigInt::from(25));
    }

    #[test]
    fn dimension_bounds() {
        let mut l = IntLattice::new(101, 4, true, NormType::L2);
        assert!(l.set_dim(4).is_ok());
        assert_eq!(
            l.set_dim(5),
            Err(Error::DimensionTooLarge { dim: 5, max_dim: 4 })
        );
    }

    #[test]
    fn gram_determinant() {
        let v = OwnedMatrix::<Z>::from_rows(&[[2, 1, 0], [1, 3, 1], [0, 1, 4]]);
        let l = IntLattice::from_basis(v.clone(), 1, NormType::L2).unwrap();
        let det = determinant(v);
        assert_eq!(det, BigInt::from(18));
        assert_eq!(l.gram_determinant(), &det * &det);
    }

    fn check_log2<W: WorkingTypeFor<Z>>(wt: W) {
        for x in [1., 0.75, 10., 1e-3, 3e6] {
            let e = wt.from_f64(x);
            assert!((W::log2(&e) - x.log2()).abs() < 1e-12, "log2({x}) = {}", W::log2(&e));
            let back = W::to_f64(&wt.exp2(x.log2()));
            assert!((back - x).abs() <= 1e-12 * x, "exp2(log2({x})) = {back}");
        }
        assert_eq!(W::log2(&W::zero()), f64::NEG_INFINITY);
    }

    #[test]
    fn logarithms() {
        check_log2(F64);
        check_log2(XF64);
        check_log2(Q);

        // Far outside the range of a double.
        let big = BigInt::one() << 3000u32;
        let x = XF64.from_ring(&big, &Z);
        assert_eq!(XF64::log2(&x), 3000.);
        assert_eq!(XF64.exp2(-2500.5).exp(), -2500);
        let q = Q.from_ring(&big, &Z);
        assert!((Q::log2(&q) - 3000.).abs() < 1e-9);
        assert_eq!(Q.exp2(3000.), q);
    }
}
