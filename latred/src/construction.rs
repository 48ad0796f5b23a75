//! Bases of lattices given by generating sets, and their m-duals.

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Zero};

use crate::config::NormType;
use crate::error::{Error, Result};
use crate::lattice::IntLattice;
use crate::matrix::*;
use crate::rings::{IntDivRing, OrderedRing, Ring, Z};

/// Computes an upper triangular basis of the lattice spanned by the rows of
/// `generators` (a row-style Hermite normal form). Zero rows are removed,
/// so the result has as many rows as the rank of the generating set.
pub fn triangular_basis(generators: &OwnedMatrix<Z>) -> OwnedMatrix<Z> {
    let mut a = generators.clone();
    let ring = &Z;

    let mut r = 0;
    let mut c = 0;
    while r < a.num_rows() && c < a.num_cols() {
        // The entry of smallest magnitude in the column is the pivot.
        let pivot = (r..a.num_rows())
            .filter(|&i| !a[(i, c)].is_zero())
            .min_by(|&i, &j| ring.cmp_abs(&a[(i, c)], &a[(j, c)]));

        let Some(pivot) = pivot else {
            // The column is zero below r.
            c += 1;
            continue;
        };

        a.swap_rows(r, pivot);

        // Eliminate the entries below the pivot. The remainders are smaller
        // than the pivot, so this terminates after a few rounds.
        for k in r + 1..a.num_rows() {
            if a[(k, c)].is_zero() {
                continue;
            }
            let m = ring.neg(Z::euclidean_div(&a[(k, c)], &a[(r, c)]));
            a.row_multiply_add(k, r, &m, ring);
        }

        if (r + 1..a.num_rows()).any(|k| !a[(k, c)].is_zero()) {
            continue;
        }

        if ring.is_negative(&a[(r, c)]) {
            a.negate_row(r, ring);
        }

        // Reduce the entries above the pivot to [0, pivot).
        for k in 0..r {
            let m = ring.neg(Z::euclidean_div(&a[(k, c)], &a[(r, c)]));
            if !m.is_zero() {
                a.row_multiply_add(k, r, &m, ring);
            }
        }

        c += 1;
        r += 1;
    }

    // The rows below r are zero now.
    a.remove_zero_rows();
    a
}

/// Inverts a square integer matrix over the rationals.
/// Returns `None` if it is singular.
fn inverse(v: &OwnedMatrix<Z>) -> Option<Vec<Vec<BigRational>>> {
    let n = v.num_rows();
    let mut a: Vec<Vec<BigRational>> = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| BigRational::from_integer(v[(i, j)].clone()))
                .chain((0..n).map(|j| {
                    if i == j { BigRational::one() } else { BigRational::zero() }
                }))
                .collect()
        })
        .collect();

    for c in 0..n {
        let p = (c..n).find(|&i| !a[i][c].is_zero())?;
        a.swap(c, p);
        let inv = a[c][c].recip();
        a[c].iter_mut().for_each(|e| *e *= &inv);
        for i in 0..n {
            if i == c || a[i][c].is_zero() {
                continue;
            }
            let f = a[i][c].clone();
            let (pivot_row, row) = if i < c {
                let (lo, hi) = a.split_at_mut(c);
                (&hi[0], &mut lo[i])
            } else {
                let (lo, hi) = a.split_at_mut(i);
                (&lo[c], &mut hi[0])
            };
            for (e, p) in row.iter_mut().zip(pivot_row) {
                *e -= &f * p;
            }
        }
    }

    Some(a.into_iter().map(|r| r[n..].to_vec()).collect())
}

fn check_square(basis: &OwnedMatrix<Z>) -> Result<()> {
    if basis.num_rows() != basis.num_cols() {
        return Err(Error::InvalidConfig(format!(
            "basis is not square ({}x{})",
            basis.num_rows(),
            basis.num_cols()
        )));
    }
    Ok(())
}

/// Computes the m-dual basis `W = m * (V^-1)^T` of a square nonsingular
/// basis `V`. Fails with [`Error::NotDual`] if `W` is not integral, i.e. if
/// `m Z^t` is not contained in the lattice.
pub fn dual_basis(basis: &OwnedMatrix<Z>, m: &BigInt) -> Result<OwnedMatrix<Z>> {
    check_square(basis)?;
    let n = basis.num_rows();
    let inv = inverse(basis).ok_or(Error::NotDual)?;
    let m = BigRational::from_integer(m.clone());
    let mut w = OwnedMatrix::zero(n, n);
    for i in 0..n {
        for j in 0..n {
            // Transposed.
            let e = &inv[j][i] * &m;
            if !e.is_integer() {
                return Err(Error::NotDual);
            }
            w[(i, j)] = e.to_integer();
        }
    }
    Ok(w)
}

/// The smallest positive `m` for which the m-dual of `basis` is integral,
/// together with that m-dual basis.
pub fn dual_basis_min_modulus(basis: &OwnedMatrix<Z>) -> Result<(OwnedMatrix<Z>, BigInt)> {
    check_square(basis)?;
    let inv = inverse(basis).ok_or(Error::NotDual)?;
    let m = inv
        .iter()
        .flatten()
        .fold(BigInt::one(), |acc, e| acc.lcm(e.denom()));
    Ok((dual_basis(basis, &m)?, m))
}

/// Builds a lattice from a generating set of full rank, with the m-dual if
/// requested.
pub fn lattice_from_generators(
    generators: &OwnedMatrix<Z>,
    m: impl Into<BigInt>,
    with_dual: bool,
    norm: NormType,
) -> Result<IntLattice> {
    let basis = triangular_basis(generators);
    if basis.num_rows() != generators.num_cols() {
        return Err(Error::InvalidConfig(format!(
            "generating set has rank {} in dimension {}",
            basis.num_rows(),
            generators.num_cols()
        )));
    }
    let m = m.into();
    if with_dual {
        let dual = dual_basis(&basis, &m)?;
        IntLattice::from_basis_with_dual(basis, dual, m, norm)
    } else {
        IntLattice::from_basis(basis, m, norm)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::distr::{Distribution, Uniform};
    use rand::{SeedableRng, rngs::StdRng};

    fn is_upper_triangular(a: &OwnedMatrix<Z>) -> bool {
        (0..a.num_rows()).all(|i| (0..i.min(a.num_cols())).all(|j| a[(i, j)].is_zero()))
    }

    #[test]
    fn triangular_basis_of_generators() {
        let g = OwnedMatrix::<Z>::from_rows(&[[4, 6, 2], [2, 3, 1], [0, 5, 5], [1, 0, 0]]);
        let b = triangular_basis(&g);
        assert_eq!(b.num_rows(), 3, "rank of {g:?} is 3, got {b:?}");
        assert!(is_upper_triangular(&b), "{b:?}");

        // Rows 0 and 1 are dependent.
        let g = OwnedMatrix::<Z>::from_rows(&[[4, 6, 2], [2, 3, 1]]);
        let b = triangular_basis(&g);
        assert_eq!(b, OwnedMatrix::from_rows(&[[2, 3, 1]]));
    }

    #[test]
    fn random_triangular_bases() {
        let rng = &mut StdRng::seed_from_u64(0);
        let dist = Uniform::new_inclusive(-20i64, 20).unwrap();
        for _ in 0..20 {
            let entries = (0..).map(|_| BigInt::from(dist.sample(rng)));
            let g = OwnedMatrix::<Z>::from_iter(6, 4, entries);
            let b = triangular_basis(&g);
            assert!(is_upper_triangular(&b), "{b:?}");

            // Same lattice: the generators are in the span of the basis with
            // integral coefficients, so the dual with the determinant as
            // modulus stays dual to every generator.
            if b.num_rows() == 4 {
                let (w, m) = dual_basis_min_modulus(&b).unwrap();
                let p = g.mul_transposed(&w, &Z);
                for e in (0..6).flat_map(|i| (0..4).map(move |j| (i, j))) {
                    assert!(
                        p[e].is_multiple_of(&m),
                        "generator {} not in the lattice of {b:?}",
                        e.0
                    );
                }
            }
        }
    }

    #[test]
    fn dual_construction() {
        let v = OwnedMatrix::<Z>::from_rows(&[[1, 3], [0, 7]]);
        let w = dual_basis(&v, &BigInt::from(7)).unwrap();
        assert_eq!(w, OwnedMatrix::from_rows(&[[7, 0], [-3, 1]]));
        assert_eq!(dual_basis(&v, &BigInt::from(5)), Err(Error::NotDual));

        let (_, m) = dual_basis_min_modulus(&v).unwrap();
        assert_eq!(m, BigInt::from(7));

        let singular = OwnedMatrix::<Z>::from_rows(&[[1, 2], [2, 4]]);
        assert_eq!(dual_basis(&singular, &BigInt::from(7)), Err(Error::NotDual));
    }

    #[test]
    fn lattice_from_generating_set() {
        let g = OwnedMatrix::<Z>::from_rows(&[[1, 12, 43], [101, 0, 0], [0, 101, 0], [0, 0, 101]]);
        let mut l = lattice_from_generators(&g, 101, true, NormType::L2).unwrap();
        assert!(l.check_duality());
        assert_eq!(l.gram_determinant(), BigInt::from(101).pow(4));
        assert!(l.l2_norm(0) > BigInt::zero());
    }
}
