use super::*;

/// The rationals. Used as the exact working type of the reduction kernels and
/// for precision refreshes of the orthogonalization.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Q;

/// Number of fractional bits of the square root approximation.
const SQRT_FRAC_BITS: u32 = 64;

impl Ring for Q {
    type Element = BigRational;

    fn neg_assign(&self, e: &mut Self::Element) {
        neg_assign(e)
    }

    fn add_assign(&self, l: &mut Self::Element, r: &Self::Element) {
        *l += r;
    }

    fn sub_assign(&self, l: &mut Self::Element, r: &Self::Element) {
        *l -= r;
    }

    fn mul_assign(&self, l: &mut Self::Element, r: &Self::Element) {
        *l *= r;
    }

    fn element_from_usize(&self, n: usize) -> Self::Element {
        BigInt::from(n).into()
    }

    fn element_from_biguint(&self, n: &BigUint) -> Self::Element {
        BigInt::from(n.clone()).into()
    }

    fn element_from_bigint(&self, n: &BigInt) -> Self::Element {
        n.clone().into()
    }
}

impl SqrtRing for Q {
    /// Returns a rational slightly above the square root, with an error of at
    /// most `2^-64`. Non-positive inputs map to zero.
    ///
    /// Rounding up matters: the enumeration uses the square root as the
    /// radius of the coefficient interval and must never miss a candidate.
    fn sqrt(e: &Self::Element) -> Self::Element {
        if !e.is_positive() {
            return Zero::zero();
        }

        // sqrt(n/d) = sqrt(n*d)/d, scaled so the integer root keeps enough
        // fractional bits.
        let d = e.denom();
        let scaled = (e.numer() * d) << (2 * SQRT_FRAC_BITS);
        let root = scaled.sqrt() + 1u32;
        BigRational::new(root, d << SQRT_FRAC_BITS)
    }
}

impl Field for Q {
    fn div_assign(&self, l: &mut Self::Element, r: &Self::Element) {
        *l /= r;
    }
}

impl OrderedRing for Q {
    fn cmp(
        &self,
        l: &Self::Element,
        r: &Self::Element,
    ) -> std::cmp::Ordering {
        l.cmp(r)
    }

    fn is_lt(&self, l: &Self::Element, r: &Self::Element) -> bool {
        l < r
    }

    fn is_le(&self, l: &Self::Element, r: &Self::Element) -> bool {
        l <= r
    }

    fn is_ge(&self, l: &Self::Element, r: &Self::Element) -> bool {
        l >= r
    }

    fn is_gt(&self, l: &Self::Element, r: &Self::Element) -> bool {
        l > r
    }

    fn is_positive(&self, e: &Self::Element) -> bool {
        e.is_positive()
    }

    fn is_negative(&self, e: &Self::Element) -> bool {
        e.is_negative()
    }

    fn abs_assign(&self, e: &mut Self::Element) {
        if e.is_negative() {
            self.neg_assign(e);
        }
    }

    fn cmp_abs(
        &self,
        l: &Self::Element,
        r: &Self::Element,
    ) -> std::cmp::Ordering {
        // The denominators are always positive, so cross multiplying the
        // magnitudes avoids cloning both rationals.
        (l.numer().magnitude() * r.denom().magnitude())
            .cmp(&(r.numer().magnitude() * l.denom().magnitude()))
    }
}

#[test]
fn sqrt_is_upper_bound() {
    for (n, d) in [(2i64, 1i64), (1, 3), (10, 7), (1 << 40, 3), (5, 1 << 30)] {
        let e = BigRational::new(BigInt::from(n), BigInt::from(d));
        let s = Q::sqrt(&e);
        let sq = &s * &s;
        assert!(sq >= e, "sqrt({e})^2 = {sq} < {e}");
        let below = &s - BigRational::new(One::one(), BigInt::from(1) << 60u32);
        assert!(&below * &below < e, "sqrt({e}) = {s} is too large");
    }

    assert!(Zero::is_zero(&Q::sqrt(&BigRational::from_integer((-4).into()))));
}
