use super::*;
use num_integer::Integer as _;

/// The integers. Lattice bases are always stored in this ring.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Z;

impl Ring for Z {
    type Element = BigInt;

    fn neg_assign(&self, e: &mut Self::Element) {
        neg_assign(e);
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

    fn mul_add_assign(
        &self,
        acc: &mut Self::Element,
        a: &Self::Element,
        b: &Self::Element,
    ) {
        *acc += a * b;
    }

    fn mul_sub_assign(
        &self,
        acc: &mut Self::Element,
        a: &Self::Element,
        b: &Self::Element,
    ) {
        *acc -= a * b;
    }

    fn element_from_usize(&self, n: usize) -> Self::Element {
        BigInt::from(n)
    }

    fn element_from_biguint(&self, n: &BigUint) -> Self::Element {
        n.clone().into()
    }

    fn element_from_bigint(&self, n: &BigInt) -> Self::Element {
        n.clone()
    }
}

impl SqrtRing for Z {
    fn sqrt(e: &Self::Element) -> Self::Element {
        e.sqrt()
    }
}

impl IntDivRing for Z {
    fn rounded_div(l: &Self::Element, r: &Self::Element) -> Self::Element {
        if l.sign() == r.sign() {
            (l + (r / 2)) / r
        } else {
            (l - (r / 2)) / r
        }
    }

    fn truncated_div(l: &Self::Element, r: &Self::Element) -> Self::Element {
        l / r
    }

    fn euclidean_div(l: &Self::Element, r: &Self::Element) -> Self::Element {
        let (q, m) = l.div_mod_floor(r);
        // `div_mod_floor` rounds towards negative infinity which leaves a
        // negative remainder for negative divisors.
        if m.is_negative() { q + 1 } else { q }
    }

    fn euclidean_rem(l: &Self::Element, r: &Self::Element) -> Self::Element {
        let m = l.mod_floor(r);
        if m.is_negative() { m - r } else { m }
    }
}

impl OrderedRing for Z {
    fn cmp(&self, l: &Self::Element, r: &Self::Element) -> std::cmp::Ordering {
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

    fn cmp_abs(&self, l: &Self::Element, r: &Self::Element) -> std::cmp::Ordering {
        l.magnitude().cmp(r.magnitude())
    }
}

#[test]
fn rounded_div_test() {
    use rand::SeedableRng as _;
    use rand::distr::{Distribution as _, Uniform};
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);

    let dividend_max = 1000;
    let dividend_dist = Uniform::new(-dividend_max, dividend_max + 1).unwrap();
    let divisor_max = 100;
    let divisor_dist = Uniform::new(-divisor_max, divisor_max + 1).unwrap();

    for _ in 0..1000 {
        let dividend = dividend_dist.sample(&mut rng);
        let divisor = loop {
            let divisor = divisor_dist.sample(&mut rng);
            if divisor != 0 {
                break divisor;
            }
        };

        let quotient = Z::rounded_div(&dividend.into(), &divisor.into());
        let check = (((dividend as f64) / (divisor as f64)).round() as i32).into();
        assert_eq!(
            quotient, check,
            "rounded_div({dividend}, {divisor}) = {check} but got {quotient}"
        );

        let truncated = Z::truncated_div(&dividend.into(), &divisor.into());
        let check = BigInt::from(dividend / divisor);
        assert_eq!(
            truncated, check,
            "truncated_div({dividend}, {divisor}) = {check} but got {truncated}"
        );
    }
}

#[test]
fn euclidean_division() {
    for (a, b) in [(7, 3), (-7, 3), (7, -3), (-7, -3), (6, 3), (-6, -3)] {
        let (a, b) = (BigInt::from(a), BigInt::from(b));
        let q = Z::euclidean_div(&a, &b);
        let r = Z::euclidean_rem(&a, &b);
        assert!(!r.is_negative(), "euclidean_rem({a}, {b}) = {r}");
        assert!(r < b.abs(), "euclidean_rem({a}, {b}) = {r}");
        assert_eq!(&q * &b + &r, a, "{a} != {q} * {b} + {r}");
    }
}
