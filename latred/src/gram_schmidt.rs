//! Incremental Gram-Schmidt orthogonalization in a working type, and the
//! Cholesky decomposition of the Gram matrix used by the branch-and-bound
//! search.
//!
//! The basis is exact, the orthogonalization is not. [`GramSchmidt`] keeps
//! the approximate rows and the coefficients `μ` and `c` of the
//! decomposition `b_k = b*_k + Σ_{j<k} μ[k][j] b*_j`, `c[k] = |b*_k|²`,
//! so that the reduction kernels only need to recompute the rows they
//! changed. Inner products that suffer from cancellation are recomputed
//! exactly, and [`GramSchmidt::refresh`] recomputes whole rows in rational
//! arithmetic when the kernels notice that the approximation drifted.

use num_rational::BigRational;

use crate::error::{Error, Result};
use crate::lattice::{IntLattice, WorkingType, WorkingTypeFor};
use crate::matrix::*;
use crate::rings::{Field, Q, Ring, RingElement, Z};

/// The Gram-Schmidt data of the first rows of a basis.
pub struct GramSchmidt<W: WorkingType> {
    pub(crate) wt: W,

    /// The rows of the basis converted to the working type.
    pub(crate) b1: OwnedMatrix<W>,

    /// Squared lengths of the rows.
    pub(crate) b: Vec<W::Element>,

    /// `μ[k][j]` for `j < k`.
    pub(crate) mu: OwnedMatrix<W>,

    /// Squared lengths of the orthogonalized rows.
    pub(crate) c: Vec<W::Element>,

    /// `μ[k][i] * c[i]` of the row that was computed last.
    pub(crate) buf: Vec<W::Element>,

    /// Tolerated loss of precision in inner products, `2^(2⌊0.15 p⌋)`.
    bound: W::Element,

    /// `2^p`.
    two_p: W::Element,
}

impl<W: WorkingTypeFor<Z>> GramSchmidt<W> {
    /// Creates the workspace for bases with up to `capacity` rows and columns.
    pub fn new(wt: W, capacity: usize) -> Self {
        let p = wt.precision_bits() as i32;
        let bound = wt.from_f64(2f64.powi(2 * (0.15 * p as f64) as i32));
        let two_p = wt.from_f64(2f64.powi(p));
        let zeros = || std::iter::repeat_with(W::zero).take(capacity).collect::<Vec<_>>();
        Self {
            b1: OwnedMatrix::zero(capacity, capacity),
            b: zeros(),
            mu: OwnedMatrix::zero(capacity, capacity),
            c: zeros(),
            buf: zeros(),
            bound,
            two_p,
            wt,
        }
    }

    /// The number of rows the workspace was allocated for.
    pub fn capacity(&self) -> usize {
        self.c.len()
    }

    pub fn mu(&self, k: usize, j: usize) -> &W::Element {
        &self.mu[(k, j)]
    }

    pub fn c(&self, k: usize) -> &W::Element {
        &self.c[k]
    }

    /// The squared length of row `k` in the working type.
    pub fn sqr_len(&self, k: usize) -> &W::Element {
        &self.b[k]
    }

    /// Converts row `k` of the basis to the working type and computes its
    /// squared length.
    pub fn load_row(&mut self, lattice: &IntLattice, k: usize) -> Result<()> {
        let n = lattice.dim();
        let row = lattice.row(k);
        for j in 0..n {
            let e = self.wt.from_ring(&row[j], &Z);
            if !W::is_finite(&e) {
                return Err(Error::Overflow);
            }
            self.b1[(k, j)] = e;
        }

        let b = self.b1[k][0..n].norm_sqr(&self.wt);
        if !W::is_finite(&b) {
            return Err(Error::Overflow);
        }
        self.b[k] = b;
        Ok(())
    }

    /// Loads the first `rows` rows.
    pub fn load(&mut self, lattice: &IntLattice, rows: usize) -> Result<()> {
        (0..rows).try_for_each(|k| self.load_row(lattice, k))
    }

    /// Swaps the rows `i` and `j`, including their `μ` rows.
    /// The `c` are not swapped, they have to be recomputed anyway.
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        self.b1.swap_rows(i, j);
        self.mu.swap_rows(i, j);
        self.b.swap(i, j);
    }

    /// Decides whether the inner product `s` of the rows `k` and `j` lost
    /// too much precision, i.e. whether `b[k] * b[j] >= 2^(2p)` and
    /// `s^2 <= b[k] * b[j] / bound`. Computed so that nothing overflows.
    fn needs_exact_product(&self, s: &W::Element, k: usize, j: usize) -> bool {
        let wt = &self.wt;
        let (bk, bj) = (&self.b[k], &self.b[j]);
        if bj.is_zero() {
            return false;
        }

        let big = wt.is_ge(
            &wt.div(bk.clone(), &self.two_p),
            &wt.div(self.two_p.clone(), bj),
        );
        if !big {
            return false;
        }

        let y = wt.abs(s.clone());
        if y.is_zero() {
            return true;
        }

        let one = W::one();
        let t = wt.div(y.clone(), bj);
        let t1 = wt.div(bk.clone(), &y);
        if wt.is_le(&t, &one) {
            wt.is_le(&wt.mul(t, &self.bound), &t1)
        } else if wt.is_ge(&t1, &one) {
            wt.is_le(&t, &wt.div(t1, &self.bound))
        } else {
            false
        }
    }

    /// Computes `μ[k][j]` for `j < k` and `c[k]`.
    /// The values `μ[k][i]` for `i < st` are assumed to be up to date.
    pub fn compute_row(&mut self, lattice: &IntLattice, k: usize, st: usize) -> Result<()> {
        let n = lattice.dim();
        let wt = &self.wt;

        if st < k {
            for i in 0..st {
                self.buf[i] = wt.mul(self.mu[(k, i)].clone(), &self.c[i]);
            }
        }

        for j in st..k {
            let mut s = self.b1[k][0..n].dot(&self.b1[j][0..n], wt);
            if self.needs_exact_product(&s, k, j) {
                s = wt.from_ring(&lattice.row(k).dot(lattice.row(j), &Z), &Z);
            }

            let mut t1 = W::zero();
            for i in 0..j {
                wt.mul_add_assign(&mut t1, &self.mu[(j, i)], &self.buf[i]);
            }

            let bj = wt.sub(s, &t1);
            self.mu[(k, j)] = if self.c[j].is_zero() {
                W::zero()
            } else {
                wt.div(bj.clone(), &self.c[j])
            };
            self.buf[j] = bj;
        }

        // Kahan summation of Σ μ[k][j] * buf[j].
        let mut s = W::zero();
        let mut comp = W::zero();
        for j in 0..k {
            let y = wt.sub(wt.mul(self.mu[(k, j)].clone(), &self.buf[j]), &comp);
            let t = wt.add(s.clone(), &y);
            comp = wt.sub(wt.sub(t.clone(), &s), &y);
            s = t;
        }

        let ck = wt.sub(self.b[k].clone(), &s);
        if !W::is_finite(&ck) {
            return Err(Error::Overflow);
        }
        self.c[k] = ck;
        Ok(())
    }

    /// Recomputes the rows `st..=k` in exact rational arithmetic and
    /// converts the result back into the working type. `buf` is left with
    /// the values of row `k`.
    pub fn refresh(&mut self, lattice: &IntLattice, st: usize, k: usize) -> Result<()> {
        if st > k {
            return Err(Error::Internal("refresh of an empty row range"));
        }

        let q = &Q;
        let int = |e: &num_bigint::BigInt| BigRational::from_integer(e.clone());
        let mut mu = vec![vec![Q::zero(); k + 1]; k + 1];
        let mut c = vec![Q::zero(); k + 1];
        for i in 0..=k {
            for j in 0..i {
                let mut s = int(&lattice.row(i).dot(lattice.row(j), &Z));
                for l in 0..j {
                    let t = q.mul(mu[j][l].clone(), &mu[i][l]);
                    q.mul_sub_assign(&mut s, &t, &c[l]);
                }
                mu[i][j] = if c[j].is_zero() {
                    Q::zero()
                } else {
                    q.div(s, &c[j])
                };
            }
            let mut ci = int(&lattice.row(i).norm_sqr(&Z));
            for j in 0..i {
                let t = q.mul(mu[i][j].clone(), &mu[i][j]);
                q.mul_sub_assign(&mut ci, &t, &c[j]);
            }
            c[i] = ci;
        }

        for i in st..=k {
            self.load_row(lattice, i)?;
            for j in 0..i {
                self.mu[(i, j)] = self.wt.from_rational(&mu[i][j]);
            }
            let ci = self.wt.from_rational(&c[i]);
            if !W::is_finite(&ci) {
                return Err(Error::Overflow);
            }
            self.c[i] = ci;
        }

        for i in 0..k {
            self.buf[i] = self.wt.from_rational(&q.mul(mu[k][i].clone(), &c[i]));
        }
        Ok(())
    }
}

/// Computes the decomposition of the Gram matrix of the first `dim` rows
/// used by the branch-and-bound search. `dc2[i]` are the squared lengths of
/// the orthogonalized rows and `c0[i][j]` for `j > i` are the coefficients
/// `⟨V_i,V_j⟩ - Σ_{k<i} c0[k][i] c0[k][j] dc2[k]`, divided by `dc2[i]`.
///
/// Fails with [`Error::NumericDegeneracy`] if a diagonal element is not
/// positive, which means the rows are (numerically) linearly dependent.
pub fn cholesky<W: WorkingTypeFor<Z>>(
    wt: &W,
    lattice: &mut IntLattice,
    dim: usize,
    c0: &mut OwnedMatrix<W>,
    dc2: &mut [W::Element],
) -> Result<()> {
    for i in 0..dim {
        for j in i..dim {
            let p = if i == j {
                lattice.l2_norm(i)
            } else {
                lattice.row(i).dot(lattice.row(j), &Z)
            };

            let mut c2 = wt.from_ring(&p, &Z);
            for k in 0..i {
                let t = wt.mul(c0[(k, i)].clone(), &c0[(k, j)]);
                wt.mul_sub_assign(&mut c2, &t, &dc2[k]);
            }
            if !W::is_finite(&c2) {
                return Err(Error::Overflow);
            }

            if i == j {
                if !wt.is_positive(&c2) {
                    log::warn!("non-positive diagonal {c2} in the Cholesky decomposition, row {i}");
                    return Err(Error::NumericDegeneracy { row: i });
                }
                dc2[i] = c2;
            } else {
                c0[(i, j)] = wt.div(c2, &dc2[i]);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::NormType;
    use crate::rings::{F64, XF64};

    fn lattice(rows: &[[i64; 3]]) -> IntLattice {
        IntLattice::from_basis(OwnedMatrix::from_rows(rows), 1, NormType::L2).unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() <= 1e-9 * b.abs().max(1.), "{a} != {b}");
    }

    fn check_decomposition<W: WorkingTypeFor<Z>>(wt: W) {
        let l = lattice(&[[3, 1, 0], [2, 2, 0], [1, 1, 5]]);
        let mut gs = GramSchmidt::new(wt, 3);
        gs.load(&l, 3).unwrap();
        for k in 0..3 {
            gs.compute_row(&l, k, 0).unwrap();
        }

        assert_close(W::to_f64(gs.c(0)), 10.);
        assert_close(W::to_f64(gs.mu(1, 0)), 0.8);
        assert_close(W::to_f64(gs.c(1)), 1.6);
        assert_close(W::to_f64(gs.mu(2, 0)), 0.4);
        // b*_1 = (-0.4, 1.2, 0), <b_2, b*_1> = 0.8.
        assert_close(W::to_f64(gs.mu(2, 1)), 0.5);
        assert_close(W::to_f64(gs.c(2)), 25.);

        // Recomputing row 2 from row 1 reuses μ[2][0].
        gs.compute_row(&l, 2, 1).unwrap();
        assert_close(W::to_f64(gs.c(2)), 25.);

        gs.refresh(&l, 1, 2).unwrap();
        assert_close(W::to_f64(gs.c(1)), 1.6);
        assert_close(W::to_f64(gs.mu(2, 1)), 0.5);
    }

    #[test]
    fn decomposition() {
        check_decomposition(F64);
        check_decomposition(XF64);
        check_decomposition(Q);
    }

    #[test]
    fn exact_inner_products() {
        // Two long, almost orthogonal rows. Their inner product is 1, but
        // in doubles it cancels to 0.
        let big = 1i64 << 60;
        let l = lattice(&[[big + 1, 1, 0], [3, -3 * big - 2, 0], [0, 0, 1]]);
        let mut gs = GramSchmidt::new(F64, 3);
        gs.load(&l, 3).unwrap();
        gs.compute_row(&l, 0, 0).unwrap();
        gs.compute_row(&l, 1, 0).unwrap();
        assert!(*gs.mu(1, 0) > 0., "mu = {}", gs.mu(1, 0));
    }

    #[test]
    fn overflow_is_reported() {
        let mut m = OwnedMatrix::<Z>::identity(2);
        m[(0, 0)] = num_bigint::BigInt::from(1) << 2000u32;
        let l = IntLattice::from_basis(m, 1, NormType::L2).unwrap();
        let mut gs = GramSchmidt::new(F64, 2);
        assert_eq!(gs.load(&l, 2), Err(Error::Overflow));
        let mut gs = GramSchmidt::new(XF64, 2);
        assert!(gs.load(&l, 2).is_ok());
    }

    #[test]
    fn cholesky_decomposition() {
        let mut l = lattice(&[[3, 1, 0], [2, 2, 0], [1, 1, 5]]);
        let mut c0 = OwnedMatrix::<F64>::zero(3, 3);
        let mut dc2 = vec![0.; 3];
        cholesky(&F64, &mut l, 3, &mut c0, &mut dc2).unwrap();
        assert_close(dc2[0], 10.);
        assert_close(c0[(0, 1)], 0.8);
        assert_close(dc2[1], 1.6);
        assert_close(dc2[2], 25.);

        let mut l = lattice(&[[1, 2, 0], [2, 4, 0], [0, 0, 1]]);
        assert_eq!(
            cholesky(&F64, &mut l, 3, &mut c0, &mut dc2),
            Err(Error::NumericDegeneracy { row: 1 })
        );
    }
}
