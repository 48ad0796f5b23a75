use num_bigint::{BigInt, BigUint, Sign};

/// An element of a ring.
/// This exists mostly for convenience, so we can call `e.is_zero` on ring
/// elements, but this should really all be implemented on the `Ring` itself,
/// so we'd have to call `r.is_zero(e)`.
pub trait RingElement: 'static + Clone + PartialEq + std::fmt::Debug + std::fmt::Display {
    /// Returns the "zero" element of the ring.
    fn zero() -> Self;

    /// Is the given element "zero"?
    fn is_zero(&self) -> bool;

    /// Returns the "one" element of the ring.
    fn one() -> Self;

    /// Is the given element "one"?
    fn is_one(&self) -> bool;
}

macro_rules! impl_ring_element {
    ($t:ident) => {
        impl RingElement for $t {
            fn zero() -> Self {
                Zero::zero()
            }

            fn is_zero(&self) -> bool {
                Zero::is_zero(self)
            }

            fn one() -> Self {
                One::one()
            }

            fn is_one(&self) -> bool {
                One::is_one(self)
            }
        }
    };
}

pub(crate) use impl_ring_element;

/// A ring.
///
/// The basis of a lattice always lives in [`super::Z`], but the
/// orthogonalization and the reduction kernels work in a [`Field`] that
/// approximates the rationals. All of them implement this trait, so the
/// kernels are written once.
pub trait Ring: 'static + Clone + PartialEq + Eq + std::fmt::Debug {
    /// The type of the elements of the ring.
    type Element: RingElement;

    /// Returns the "zero" element of the ring.
    fn zero() -> Self::Element {
        Self::Element::zero()
    }

    /// Returns the "one" element of the ring.
    fn one() -> Self::Element {
        Self::Element::one()
    }

    /// Negates the element in place.
    fn neg_assign(&self, e: &mut Self::Element);

    /// Negates the element, i.e. computes `0 - e`.
    fn neg(&self, mut e: Self::Element) -> Self::Element {
        self.neg_assign(&mut e);
        e
    }

    /// Add an element to another element.
    fn add_assign(&self, l: &mut Self::Element, r: &Self::Element);

    /// Add two elements.
    fn add(&self, mut l: Self::Element, r: &Self::Element) -> Self::Element {
        self.add_assign(&mut l, r);
        l
    }

    /// Subtract one element from another.
    fn sub_assign(&self, l: &mut Self::Element, r: &Self::Element);

    /// Subtract one element from another.
    fn sub(&self, mut l: Self::Element, r: &Self::Element) -> Self::Element {
        self.sub_assign(&mut l, r);
        l
    }

    /// Multiply two elements.
    fn mul_assign(&self, l: &mut Self::Element, r: &Self::Element);

    /// Multiply two elements.
    fn mul(&self, mut l: Self::Element, r: &Self::Element) -> Self::Element {
        self.mul_assign(&mut l, r);
        l
    }

    /// Multiply two elements and add the result to another element.
    ///
    /// The default implementation allocates a new element for the product.
    /// [`num_bigint`] has a fused version internally but it is not exposed.
    fn mul_add_assign(
        &self,
        acc: &mut Self::Element,
        a: &Self::Element,
        b: &Self::Element,
    ) {
        self.add_assign(acc, &self.mul(a.clone(), b))
    }

    /// Multiply two elements and add the result to another element.
    /// See [`Ring::mul_add_assign`].
    fn mul_add(
        &self,
        mut acc: Self::Element,
        a: &Self::Element,
        b: &Self::Element,
    ) -> Self::Element {
        self.mul_add_assign(&mut acc, a, b);
        acc
    }

    /// [`Ring::mul_add_assign`] but with [`Ring::sub`].
    fn mul_sub_assign(
        &self,
        acc: &mut Self::Element,
        a: &Self::Element,
        b: &Self::Element,
    ) {
        self.sub_assign(acc, &self.mul(a.clone(), b));
    }

    /// Square a number.
    fn square(&self, a: Self::Element) -> Self::Element {
        self.mul(a.clone(), &a)
    }

    /// Converts the `usize` `n` into an element.
    fn element_from_usize(&self, n: usize) -> Self::Element;

    /// Converts the [`BigUint`] `n` into an element.
    fn element_from_biguint(&self, n: &BigUint) -> Self::Element;

    /// Converts the [`BigInt`] `n` into an element.
    fn element_from_bigint(&self, n: &BigInt) -> Self::Element {
        match n.sign() {
            Sign::NoSign => Self::zero(),
            Sign::Plus => self.element_from_biguint(n.magnitude()),
            Sign::Minus => self.neg(self.element_from_biguint(n.magnitude())),
        }
    }
}

/// A field.
pub trait Field: Ring {
    /// Divide an element by another element.
    fn div_assign(&self, l: &mut Self::Element, r: &Self::Element);

    /// Divide an element by another element.
    fn div(&self, mut l: Self::Element, r: &Self::Element) -> Self::Element {
        self.div_assign(&mut l, r);
        l
    }
}

/// A ring where you can take approximate square roots of non-negative
/// elements. The branch-and-bound search needs this for the radius of the
/// interval of admissible coefficients.
pub trait SqrtRing: Ring {
    /// Compute an approximate square root.
    /// It doesn't take a `self` reference, because none of the rings need it.
    fn sqrt(e: &Self::Element) -> Self::Element;
}

/// A ring where you can do integer division.
pub trait IntDivRing: OrderedRing {
    /// Divide two elements and round it to the nearest ring element.
    fn rounded_div(l: &Self::Element, r: &Self::Element) -> Self::Element;

    /// Divide two elements and truncate the quotient towards zero.
    fn truncated_div(l: &Self::Element, r: &Self::Element) -> Self::Element;

    /// Divide two elements such that the remainder is non-negative.
    fn euclidean_div(l: &Self::Element, r: &Self::Element) -> Self::Element;

    /// Compute the remainder of the euclidean division.
    fn euclidean_rem(l: &Self::Element, r: &Self::Element) -> Self::Element;
}

/// A ring where you can compare two elements.
///
/// The working types of the lattice algorithms need this for the Lovász
/// condition and the pruning bounds of the enumeration. It is also
/// implemented for [`super::F64`] which rust doesn't consider to be ordered
/// ([`Ord`]) because of NaNs. The implementation treats NaN as equal to
/// everything, the kernels check for non-finite values separately.
pub trait OrderedRing: Ring {
    /// Compare two elements.
    fn cmp(&self, l: &Self::Element, r: &Self::Element) -> std::cmp::Ordering;

    /// Is `l` less than `r`?
    fn is_lt(&self, l: &Self::Element, r: &Self::Element) -> bool {
        self.cmp(l, r).is_lt()
    }

    /// Is `l` less than or equal to `r`?
    fn is_le(&self, l: &Self::Element, r: &Self::Element) -> bool {
        self.cmp(l, r).is_le()
    }

    /// Is `l` greater than or equal to `r`?
    fn is_ge(&self, l: &Self::Element, r: &Self::Element) -> bool {
        self.cmp(l, r).is_ge()
    }

    /// Is `l` greater than `r`?
    fn is_gt(&self, l: &Self::Element, r: &Self::Element) -> bool {
        self.cmp(l, r).is_gt()
    }

    /// Is the given element greater than 0?
    fn is_positive(&self, e: &Self::Element) -> bool {
        self.is_gt(e, &Self::zero())
    }

    /// Is the given element less than 0?
    fn is_negative(&self, e: &Self::Element) -> bool {
        self.is_lt(e, &Self::zero())
    }

    /// Compute the absolute value of the element, which is defined here as
    /// `is_negative(e) ? neg(e) : e`.
    fn abs_assign(&self, e: &mut Self::Element) {
        if self.is_negative(e) {
            self.neg_assign(e);
        }
    }

    /// Compute the absolute value of the element.
    /// See [`OrderedRing::abs_assign`].
    fn abs(&self, mut e: Self::Element) -> Self::Element {
        self.abs_assign(&mut e);
        e
    }

    /// Compare the absolute value of two elements.
    fn cmp_abs(
        &self,
        l: &Self::Element,
        r: &Self::Element,
    ) -> std::cmp::Ordering {
        self.cmp(&self.abs(l.clone()), &self.abs(r.clone()))
    }
}
