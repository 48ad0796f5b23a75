//! Rank-1 lattices, i.e. the lattices `{ x in Z^t : x = k * a mod m }` of
//! lattice rules and of multiplicative congruential generators.
//! For those, triangular primal and m-dual bases can be written down
//! directly, without any elimination.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::{Error, Result};
use crate::lattice::IntLattice;
use crate::matrix::OwnedMatrix;
use crate::rings::Z;

/// The generating vector of a rank-1 lattice with modulus `m`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rank1Lattice {
    modulus: BigInt,
    a: Vec<BigInt>,
}

impl Rank1Lattice {
    /// A Korobov lattice with multiplier `a`, i.e. the generating vector is
    /// `(1, a, a^2 mod m, ...)` with `max_dim` entries.
    pub fn korobov(m: impl Into<BigInt>, a: impl Into<BigInt>, max_dim: usize) -> Self {
        let modulus = m.into();
        let a = a.into();
        let mut coeffs = Vec::with_capacity(max_dim);
        let mut c = BigInt::one();
        for _ in 0..max_dim {
            coeffs.push(c.clone());
            c = (&c * &a) % &modulus;
        }
        Self { modulus, a: coeffs }
    }

    /// A rank-1 lattice with an arbitrary generating vector.
    pub fn from_coefficients(m: impl Into<BigInt>, a: Vec<BigInt>) -> Self {
        Self {
            modulus: m.into(),
            a,
        }
    }

    pub fn modulus(&self) -> &BigInt {
        &self.modulus
    }

    /// The generating vector.
    pub fn coefficients(&self) -> &[BigInt] {
        &self.a
    }

    /// The maximal dimension, i.e. the length of the generating vector.
    pub fn max_dim(&self) -> usize {
        self.a.len()
    }

    fn check_target(&self, lattice: &IntLattice, d: usize) -> Result<()> {
        if lattice.modulus() != &self.modulus {
            return Err(Error::InvalidConfig(format!(
                "lattice modulus {} differs from {}",
                lattice.modulus(),
                self.modulus
            )));
        }
        if d > self.a.len() {
            return Err(Error::DimensionTooLarge {
                dim: d,
                max_dim: self.a.len(),
            });
        }
        Ok(())
    }

    /// Builds the upper triangular basis in `d` dimensions: the first row
    /// is `(a_0, ..., a_{d-1})`, row `i` is `m * e_i`.
    /// If the lattice keeps a dual, the lower triangular m-dual is built too.
    pub fn build_basis(&self, lattice: &mut IntLattice, d: usize) -> Result<()> {
        self.check_target(lattice, d)?;
        lattice.set_dim(d)?;
        let (v, w) = lattice.storage_mut();
        for i in 0..d {
            for j in 0..d {
                v[(i, j)] = if i == 0 {
                    self.a[j].clone()
                } else if i == j {
                    self.modulus.clone()
                } else {
                    BigInt::zero()
                };
            }
        }
        if let Some(w) = w {
            self.fill_dual(w, d);
        }
        Ok(())
    }

    /// Builds only the m-dual basis in `d` dimensions:
    /// `W_0 = m * e_0`, `W_i = -a_i * e_0 + e_i`. The primal basis isn't
    /// touched.
    pub fn build_dual_basis(&self, lattice: &mut IntLattice, d: usize) -> Result<()> {
        self.check_target(lattice, d)?;
        if !lattice.has_dual() {
            return Err(Error::InvalidConfig("lattice keeps no dual basis".to_owned()));
        }
        lattice.set_dim(d)?;
        if let (_, Some(w)) = lattice.storage_mut() {
            self.fill_dual(w, d);
        }
        Ok(())
    }

    fn fill_dual(&self, w: &mut OwnedMatrix<Z>, d: usize) {
        for i in 0..d {
            for j in 0..d {
                w[(i, j)] = match (i, j) {
                    (0, 0) => self.modulus.clone(),
                    (_, 0) => -&self.a[i],
                    _ if i == j => BigInt::one(),
                    _ => BigInt::zero(),
                };
            }
        }
    }

    /// Increases the dimension of the basis by one. The basis does not have
    /// to be the triangular one, any basis of the lattice works. If the
    /// lattice keeps a dual it is extended as well.
    pub fn inc_dim_basis(&self, lattice: &mut IntLattice) -> Result<()> {
        let d = lattice.dim() + 1;
        self.check_target(lattice, d)?;
        lattice.set_dim(d)?;
        let m = &self.modulus;
        let (v, w) = lattice.storage_mut();

        v[(d - 1, d - 1)] = m.clone();
        for i in 0..d - 1 {
            v[(i, d - 1)] = (&self.a[d - 1] * &v[(i, 0)]) % m;
        }

        if let Some(w) = w {
            w[(d - 1, d - 1)] = BigInt::one();
            for j in 0..d - 1 {
                let mut s = BigInt::zero();
                for i in 0..d - 1 {
                    s -= &v[(i, d - 1)] * &w[(i, j)];
                }
                // The sum is always divisible by m.
                w[(d - 1, j)] = s / m;
            }
        }
        Ok(())
    }

    /// Increases the dimension of the triangular m-dual basis built by
    /// [`Rank1Lattice::build_dual_basis`] by one. The primal basis is not
    /// updated.
    pub fn inc_dim_dual_basis(&self, lattice: &mut IntLattice) -> Result<()> {
        let d = lattice.dim() + 1;
        self.check_target(lattice, d)?;
        if !lattice.has_dual() {
            return Err(Error::InvalidConfig("lattice keeps no dual basis".to_owned()));
        }
        lattice.set_dim(d)?;
        if let (_, Some(w)) = lattice.storage_mut() {
            w[(d - 1, 0)] = -&self.a[d - 1];
            w[(d - 1, d - 1)] = BigInt::one();
        }
        Ok(())
    }

    /// Builds a basis (and the m-dual basis, if the target keeps one) of the
    /// projection of the lattice on the 1-based coordinates in `proj`.
    ///
    /// If the first coefficient in the projection is not 1, the generating
    /// vector is multiplied by its inverse modulo m, so it has to be
    /// invertible.
    pub fn build_projection(&self, proj: &[usize], lattice: &mut IntLattice) -> Result<()> {
        let d = proj.len();
        let Some(&first) = proj.first() else {
            return Err(Error::InvalidConfig("empty projection".to_owned()));
        };
        if let Some(&c) = proj.iter().find(|&&c| c == 0 || c > self.a.len()) {
            return Err(Error::InvalidConfig(format!(
                "coordinate {c} is not in 1..={}",
                self.a.len()
            )));
        }
        if lattice.modulus() != &self.modulus {
            return Err(Error::InvalidConfig(format!(
                "lattice modulus {} differs from {}",
                lattice.modulus(),
                self.modulus
            )));
        }

        let m = &self.modulus;
        let a1 = &self.a[first - 1];

        // Coefficients of the projection, scaled so the first one is 1.
        let coeffs: Vec<BigInt> = if a1.is_one() {
            proj.iter().map(|&c| self.a[c - 1].clone()).collect()
        } else {
            let e = a1.extended_gcd(m);
            if !e.gcd.is_one() {
                return Err(Error::NotInvertible);
            }
            let inv = e.x.mod_floor(m);
            std::iter::once(BigInt::one())
                .chain(proj[1..].iter().map(|&c| (&self.a[c - 1] * &inv) % m))
                .collect()
        };

        lattice.set_dim(d)?;
        let (v, w) = lattice.storage_mut();
        for i in 0..d {
            for j in 0..d {
                v[(i, j)] = if i == 0 {
                    coeffs[j].clone()
                } else if i == j {
                    m.clone()
                } else {
                    BigInt::zero()
                };
            }
        }
        if let Some(w) = w {
            Self::from_coefficients(m.clone(), coeffs).fill_dual(w, d);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::NormType;

    #[test]
    fn korobov_coefficients() {
        let l = Rank1Lattice::korobov(101, 12, 4);
        assert_eq!(l.coefficients(), &[1, 12, 144 % 101, (43 * 12) % 101].map(BigInt::from));
    }

    #[test]
    fn triangular_bases_are_dual() {
        let rank1 = Rank1Lattice::korobov(1048573, 209714, 8);
        let mut lattice = IntLattice::new(1048573, 8, true, NormType::L2);
        rank1.build_basis(&mut lattice, 5).unwrap();
        assert!(lattice.check_duality(), "{:?}", lattice.dual_basis());

        for d in 6..=8 {
            rank1.inc_dim_basis(&mut lattice).unwrap();
            assert_eq!(lattice.dim(), d);
            assert!(lattice.check_duality(), "dimension {d}: {:?}", lattice.dual_basis());
        }
        assert!(matches!(
            rank1.inc_dim_basis(&mut lattice),
            Err(Error::DimensionTooLarge { .. })
        ));
    }

    #[test]
    fn inc_dim_after_row_operations() {
        let rank1 = Rank1Lattice::korobov(1021, 331, 6);
        let mut lattice = IntLattice::new(1021, 6, true, NormType::L2);
        rank1.build_basis(&mut lattice, 3).unwrap();
        lattice.add_multiple(1, 0, &BigInt::from(-3));
        lattice.add_multiple(0, 2, &BigInt::from(2));
        lattice.swap_rows(0, 1);
        rank1.inc_dim_basis(&mut lattice).unwrap();
        assert!(lattice.check_duality(), "{:?}", lattice.dual_basis());
    }

    #[test]
    fn dual_only() {
        let rank1 = Rank1Lattice::korobov(1021, 331, 6);
        let mut lattice = IntLattice::new(1021, 6, true, NormType::L2);
        rank1.build_dual_basis(&mut lattice, 3).unwrap();
        rank1.inc_dim_dual_basis(&mut lattice).unwrap();
        let w = lattice.dual_basis().unwrap();
        assert_eq!(w[3], [-(331i64 * 331 * 331 % 1021), 0, 0, 1].map(BigInt::from));

        let mut primal_only = IntLattice::new(1021, 6, false, NormType::L2);
        assert!(rank1.build_dual_basis(&mut primal_only, 3).is_err());
    }

    #[test]
    fn projections() {
        let rank1 = Rank1Lattice::korobov(1021, 331, 6);
        let mut lattice = IntLattice::new(1021, 6, true, NormType::L2);
        rank1.build_projection(&[1, 3, 4], &mut lattice).unwrap();
        let a = rank1.coefficients();
        assert_eq!(lattice.row(0), &[a[0].clone(), a[2].clone(), a[3].clone()]);
        assert!(lattice.check_duality(), "{:?}", lattice.dual_basis());

        rank1.build_projection(&[2, 5, 6], &mut lattice).unwrap();
        assert_eq!(lattice.row(0)[0], BigInt::from(1));
        assert!(lattice.check_duality(), "{:?}", lattice.dual_basis());

        let even = Rank1Lattice::from_coefficients(12, [1, 2, 5].map(BigInt::from).to_vec());
        let mut lattice = IntLattice::new(12, 3, true, NormType::L2);
        assert_eq!(
            even.build_projection(&[2, 3], &mut lattice),
            Err(Error::NotInvertible)
        );
        assert!(even.build_projection(&[4], &mut lattice).is_err());
    }
}
