//! The kinds of numbers
//! ([rings](https://en.wikipedia.org/wiki/Ring_(mathematics))) the lattice
//! algorithms work with.
//!
//! The basis of a lattice is always stored exactly in [`Z`]. The
//! orthogonalization and the reduction kernels approximate rationals in one
//! of three working types:
//!
//! - [`F64`], machine doubles. Fast, but overflows for large entries.
//! - [`XF64`], doubles with a separate 64-bit exponent. As precise as
//!   [`F64`] but the range is practically unbounded.
//! - [`Q`], exact rationals. Slow, but never loses precision.
//!
//! The most important trait is [`Ring`] which stores information about the
//! ring we are working in and all operations on the ring are implemented in
//! this trait. An instance of [`Ring`] needs to be passed to any function that
//! uses the ring. For the rings here it is an empty struct, but the kernels
//! stay generic over it.

mod float;
mod integers;
mod rationals;
mod traits;
mod xdouble;

pub use float::*;
pub use integers::*;
pub use rationals::*;
pub use traits::*;
pub use xdouble::*;

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

impl_ring_element!(BigInt);
impl_ring_element!(BigRational);

/// Negates an element without allocating. There should really be a `NegAssign`
/// trait for this in `num_traits`.
pub(crate) fn neg_assign<T: std::ops::Neg<Output = T> + Default>(e: &mut T) {
    *e = -std::mem::take(e);
}

#[cfg(test)]
mod test {
    use super::*;

    /// Checks the field axioms the kernels rely on for a handful of values.
    pub fn test_field_basics<R: Field + OrderedRing + SqrtRing>(r: &R) {
        let two = r.element_from_usize(2);
        let three = r.element_from_usize(3);
        let six = r.mul(two.clone(), &three);
        assert_eq!(six, r.element_from_usize(6), "2 * 3 != 6");
        let q = r.div(six.clone(), &three);
        assert_eq!(q, two, "6 / 3 = {q}");
        assert!(r.is_lt(&two, &three), "2 < 3 failed");
        assert!(r.is_negative(&r.neg(two.clone())), "-2 is not negative");
        let four = r.element_from_usize(4);
        let s = R::sqrt(&four);
        let diff = r.abs(r.sub(s.clone(), &two));
        let tol = r.div(R::one(), &r.element_from_usize(1 << 20));
        assert!(r.is_lt(&diff, &tol), "sqrt(4) = {s}");
        let big = r.element_from_bigint(&-(BigInt::from(1) << 80u32));
        assert!(r.is_negative(&big), "-2^80 is not negative: {big}");
    }

    #[test]
    fn field_basics() {
        test_field_basics(&F64);
        test_field_basics(&XF64);
        test_field_basics(&Q);
    }

    #[test]
    fn biguint_conversion() {
        let n = BigUint::from(12345u32);
        assert_eq!(F64.element_from_biguint(&n), 12345.);
        assert_eq!(Q.element_from_biguint(&n), BigRational::from_integer(12345.into()));
        assert_eq!(Z.element_from_biguint(&n), BigInt::from(12345));
        assert!(!Signed::is_negative(&Z.element_from_biguint(&n)));
    }
}
