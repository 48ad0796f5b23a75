use super::*;

macro_rules! float_field {
    ($field:ident, $float:ident, $from_big:ident) => {
        /// Floating point numbers aren't actually a ring (or a field) for
        /// multiple reasons:
        /// - Addition and multiplication are not associative
        /// - Infinities, NaNs, -0
        ///
        /// But we act like it so we can store them in vectors, matrices.
        ///
        /// The kernels assume that the floats are finite and check for
        /// overflow themselves after each conversion from an integer.
        #[derive(Clone, PartialEq, Eq, Debug)]
        pub struct $field;

        impl_ring_element!($float);

        impl Ring for $field {
            type Element = $float;

            fn neg_assign(&self, e: &mut Self::Element) {
                *e = -*e;
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

            fn element_from_usize(&self, n: usize) -> Self::Element {
                n as $float
            }

            fn element_from_biguint(&self, n: &BigUint) -> Self::Element {
                use num_traits::cast::ToPrimitive;
                // `to_f64` saturates to infinity instead of failing.
                n.$from_big().unwrap_or($float::INFINITY)
            }
        }

        impl SqrtRing for $field {
            fn sqrt(e: &Self::Element) -> Self::Element {
                e.sqrt()
            }
        }

        impl Field for $field {
            fn div_assign(&self, l: &mut Self::Element, r: &Self::Element) {
                *l /= r;
            }
        }

        impl OrderedRing for $field {
            fn cmp(
                &self,
                l: &Self::Element,
                r: &Self::Element,
            ) -> std::cmp::Ordering {
                l.partial_cmp(r).unwrap_or(std::cmp::Ordering::Equal)
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
                *e > 0.
            }

            fn is_negative(&self, e: &Self::Element) -> bool {
                *e < 0.
            }

            fn abs_assign(&self, e: &mut Self::Element) {
                *e = e.abs();
            }

            fn abs(&self, e: Self::Element) -> Self::Element {
                e.abs()
            }
        }
    };
}

float_field!(F64, f64, to_f64);
