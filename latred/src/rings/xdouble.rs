//! Doubles with an extended exponent range.
//!
//! An [`ExtF64`] is a pair `(mantissa, exp)` representing
//! `mantissa * 2^exp`. The mantissa is kept normalized to `0.5 <= |m| < 1`
//! (or exactly zero), so the precision is that of an [`f64`] but the entries
//! of a basis can have millions of bits without overflowing.

use super::*;
use num_traits::ToPrimitive;
use std::cmp::Ordering;

/// The ring of [`ExtF64`]s.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct XF64;

/// A double with a separate 64-bit exponent.
#[derive(Clone, Copy, Default)]
pub struct ExtF64 {
    mantissa: f64,
    exp: i64,
}

/// If the exponents of two summands differ by more than this, the smaller
/// one doesn't change the sum.
const ALIGN_LIMIT: i64 = 64;

/// Returns `2^k` for `-1022 <= k <= 1023`.
fn pow2(k: i64) -> f64 {
    debug_assert!((-1022..=1023).contains(&k));
    f64::from_bits(((k + 1023) as u64) << 52)
}

/// `m * 2^k` for any `k`, saturating to zero or infinity.
fn ldexp(mut m: f64, mut k: i64) -> f64 {
    while k > 1000 {
        m *= pow2(1000);
        k -= 1000;
        if m.is_infinite() {
            return m;
        }
    }
    while k < -1000 {
        m *= pow2(-1000);
        k += 1000;
        if m == 0. {
            return m;
        }
    }
    m * pow2(k)
}

/// Splits a finite float into a mantissa with `0.5 <= |m| < 1` and an
/// exponent.
fn frexp(x: f64) -> (f64, i64) {
    if x == 0. || !x.is_finite() {
        return (x, 0);
    }

    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i64;
    if biased == 0 {
        // Subnormal.
        let (m, e) = frexp(x * pow2(64));
        return (m, e - 64);
    }

    let m = f64::from_bits((bits & !(0x7ff << 52)) | (1022 << 52));
    (m, biased - 1022)
}

impl ExtF64 {
    /// Normalizes `mantissa * 2^exp`.
    pub fn new(mantissa: f64, exp: i64) -> Self {
        let (m, e) = frexp(mantissa);
        if m == 0. {
            return Self { mantissa: 0., exp: 0 };
        }
        Self {
            mantissa: m,
            exp: exp + e,
        }
    }

    /// Converts a float.
    pub fn from_f64(f: f64) -> Self {
        Self::new(f, 0)
    }

    /// The mantissa, either zero or of absolute value in `[0.5, 1)`.
    pub fn mantissa(&self) -> f64 {
        self.mantissa
    }

    /// The exponent.
    pub fn exp(&self) -> i64 {
        self.exp
    }

    /// Converts to a float, saturating to zero or infinity.
    pub fn to_f64(&self) -> f64 {
        ldexp(self.mantissa, self.exp)
    }

    /// Is the mantissa neither infinite nor NaN?
    pub fn is_finite(&self) -> bool {
        self.mantissa.is_finite()
    }

    /// Approximates an unsigned integer using its top 64 bits.
    pub fn from_biguint(n: &BigUint) -> Self {
        let bits = n.bits();
        if bits <= 64 {
            // `to_u64` can't fail here.
            return Self::from_f64(n.to_u64().unwrap_or(u64::MAX) as f64);
        }
        let shift = bits - 64;
        let top = (n >> shift).to_u64().unwrap_or(u64::MAX);
        Self::new(top as f64, shift as i64)
    }

    /// Approximates an integer using its top 64 bits.
    pub fn from_bigint(n: &BigInt) -> Self {
        let m = Self::from_biguint(n.magnitude());
        if n.is_negative() { -m } else { m }
    }

    /// Rounds to the nearest integer, ties away from zero.
    pub fn round(self) -> Self {
        if self.exp >= 53 || self.mantissa == 0. {
            self
        } else if self.exp < 0 {
            Self::default()
        } else {
            Self::from_f64(self.to_f64().round())
        }
    }

    /// Rounds towards zero.
    pub fn trunc(self) -> Self {
        if self.exp >= 53 || self.mantissa == 0. {
            self
        } else if self.exp <= 0 {
            Self::default()
        } else {
            Self::from_f64(self.to_f64().trunc())
        }
    }

    /// Converts an integral value to an integer.
    /// Fractional parts are truncated.
    pub fn to_bigint(&self) -> BigInt {
        if self.exp <= 53 {
            let f = self.to_f64().trunc();
            return BigInt::from(f as i64);
        }
        // The mantissa times 2^53 is an exact integer.
        let m = ldexp(self.mantissa, 53) as i64;
        BigInt::from(m) << (self.exp - 53) as u64
    }

    /// The square root. Negative values map to NaN.
    pub fn sqrt(self) -> Self {
        if self.mantissa == 0. {
            return self;
        }
        if self.mantissa < 0. {
            return Self {
                mantissa: f64::NAN,
                exp: 0,
            };
        }
        let (m, e) = if self.exp % 2 == 0 {
            (self.mantissa, self.exp)
        } else {
            (self.mantissa * 2., self.exp - 1)
        };
        Self::new(m.sqrt(), e / 2)
    }

    fn sign(&self) -> Ordering {
        self.mantissa.partial_cmp(&0.).unwrap_or(Ordering::Equal)
    }
}

impl std::ops::Neg for ExtF64 {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            mantissa: -self.mantissa,
            exp: self.exp,
        }
    }
}

impl std::ops::Add for ExtF64 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if self.mantissa == 0. {
            return rhs;
        }
        if rhs.mantissa == 0. {
            return self;
        }

        let (big, small) = if self.exp >= rhs.exp {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let d = big.exp - small.exp;
        if d > ALIGN_LIMIT {
            return big;
        }
        Self::new(big.mantissa + small.mantissa * pow2(-d), big.exp)
    }
}

impl std::ops::Sub for ExtF64 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + -rhs
    }
}

impl std::ops::Mul for ExtF64 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.mantissa * rhs.mantissa, self.exp + rhs.exp)
    }
}

impl std::ops::Div for ExtF64 {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self::new(self.mantissa / rhs.mantissa, self.exp - rhs.exp)
    }
}

impl PartialEq for ExtF64 {
    fn eq(&self, other: &Self) -> bool {
        self.mantissa == other.mantissa && (self.mantissa == 0. || self.exp == other.exp)
    }
}

impl PartialOrd for ExtF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.mantissa.is_nan() || other.mantissa.is_nan() {
            return None;
        }

        let sign = self.sign();
        if sign != other.sign() {
            return Some(sign.cmp(&other.sign()));
        }

        match sign {
            Ordering::Equal => Some(Ordering::Equal),
            Ordering::Greater => Some(
                self.exp
                    .cmp(&other.exp)
                    .then(self.mantissa.total_cmp(&other.mantissa)),
            ),
            // A bigger exponent means a smaller negative number.
            Ordering::Less => Some(
                other
                    .exp
                    .cmp(&self.exp)
                    .then(self.mantissa.total_cmp(&other.mantissa)),
            ),
        }
    }
}

impl std::fmt::Debug for ExtF64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*2^{}", self.mantissa, self.exp)
    }
}

impl std::fmt::Display for ExtF64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.to_f64();
        if v.is_finite() && v != 0. || self.mantissa == 0. {
            write!(f, "{v}")
        } else {
            write!(f, "{self:?}")
        }
    }
}

impl RingElement for ExtF64 {
    fn zero() -> Self {
        Self::default()
    }

    fn is_zero(&self) -> bool {
        self.mantissa == 0.
    }

    fn one() -> Self {
        Self {
            mantissa: 0.5,
            exp: 1,
        }
    }

    fn is_one(&self) -> bool {
        self.mantissa == 0.5 && self.exp == 1
    }
}

impl Ring for XF64 {
    type Element = ExtF64;

    fn neg_assign(&self, e: &mut Self::Element) {
        *e = -*e;
    }

    fn add_assign(&self, l: &mut Self::Element, r: &Self::Element) {
        *l = *l + *r;
    }

    fn sub_assign(&self, l: &mut Self::Element, r: &Self::Element) {
        *l = *l - *r;
    }

    fn mul_assign(&self, l: &mut Self::Element, r: &Self::Element) {
        *l = *l * *r;
    }

    fn mul_add_assign(&self, acc: &mut Self::Element, a: &Self::Element, b: &Self::Element) {
        *acc = *acc + *a * *b;
    }

    fn mul_sub_assign(&self, acc: &mut Self::Element, a: &Self::Element, b: &Self::Element) {
        *acc = *acc - *a * *b;
    }

    fn element_from_usize(&self, n: usize) -> Self::Element {
        ExtF64::from_f64(n as f64)
    }

    fn element_from_biguint(&self, n: &BigUint) -> Self::Element {
        ExtF64::from_biguint(n)
    }

    fn element_from_bigint(&self, n: &BigInt) -> Self::Element {
        ExtF64::from_bigint(n)
    }
}

impl Field for XF64 {
    fn div_assign(&self, l: &mut Self::Element, r: &Self::Element) {
        *l = *l / *r;
    }
}

impl SqrtRing for XF64 {
    fn sqrt(e: &Self::Element) -> Self::Element {
        e.sqrt()
    }
}

impl OrderedRing for XF64 {
    fn cmp(&self, l: &Self::Element, r: &Self::Element) -> Ordering {
        l.partial_cmp(r).unwrap_or(Ordering::Equal)
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
        e.mantissa > 0.
    }

    fn is_negative(&self, e: &Self::Element) -> bool {
        e.mantissa < 0.
    }

    fn abs_assign(&self, e: &mut Self::Element) {
        e.mantissa = e.mantissa.abs();
    }
}
