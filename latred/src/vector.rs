//! Vectors.
//!
//! The reason we have a [`VectorStorage`] trait and a [`Vector`] type that just
//! wraps the storage is so that we can implement traits for all vectors, i.e.
//! [`std::ops::Index`], once for owned vectors and for views into the rows of
//! a matrix.
//!
//! The [`Vector`]s are aware of what kind of ring the elements come from, i.e.
//! the generic is the [`Ring`] and not the ring element. The arithmetic needs
//! the ring, and if the vector was generic over the element type, the ring
//! type in (e.g.) `impl<R: Ring, S> Vector<R::Element, S>` would be
//! unconstrained.

use std::borrow::Borrow;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut, Range};

use crate::rings::{OrderedRing, Ring, RingElement};

/// Manages how the entries of the vector are stored.
/// See the module documentation [`crate::vector`].
pub trait VectorStorage<R: Ring>: 'static {
    /// Returns a slice of the vector.
    fn as_slice(&self) -> &[R::Element];

    /// Returns a mutable slice of the vector.
    fn as_slice_mut(&mut self) -> &mut [R::Element];
}

/// A vector. See the module documentation [`crate::vector`].
#[repr(transparent)]
pub struct Vector<R: Ring, S: VectorStorage<R> + ?Sized> {
    phantom: PhantomData<R>,
    storage: S,
}

impl<R: Ring, S: VectorStorage<R> + ?Sized> Vector<R, S> {
    /// Construct the vector from its storage.
    pub fn from_storage(storage: S) -> Self
    where
        S: Sized,
    {
        Self {
            phantom: PhantomData,
            storage,
        }
    }

    /// Returns the dimension of the vector.
    pub fn dim(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns a slice of the vector.
    pub fn as_slice(&self) -> &[R::Element] {
        self.storage.as_slice()
    }

    /// Returns a mutable slice of the vector.
    pub fn as_slice_mut(&mut self) -> &mut [R::Element] {
        self.storage.as_slice_mut()
    }

    /// Returns an iterator over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, R::Element> {
        self.as_slice().iter()
    }

    /// Returns an iterator over the mutable elements.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, R::Element> {
        self.as_slice_mut().iter_mut()
    }

    /// Is the vector empty, i.e. dimension zero?
    pub fn is_empty(&self) -> bool {
        self.dim() == 0
    }

    /// Returns a view of the whole vector.
    pub fn view(&self) -> &VectorView<R> {
        VectorView::from_slice(self.as_slice())
    }

    /// Swap the two entries at index i and j.
    pub fn swap(&mut self, i: usize, j: usize) {
        self.as_slice_mut().swap(i, j);
    }

    /// Are all entries in the vector zero?
    pub fn is_zero(&self) -> bool {
        self.iter().all(RingElement::is_zero)
    }

    /// Negate the vector.
    pub fn neg_assign(&mut self, r: &R) {
        for e in self.iter_mut() {
            r.neg_assign(e);
        }
    }

    /// Add a vector to this one.
    pub fn add_assign<T>(&mut self, rhs: &Vector<R, T>, r: &R)
    where
        T: VectorStorage<R> + ?Sized,
    {
        assert_eq!(
            self.dim(),
            rhs.dim(),
            "Can not add vectors of different dimensions."
        );
        for (a, b) in self.iter_mut().zip(rhs.iter()) {
            r.add_assign(a, b);
        }
    }

    /// Subtract a vector from this one.
    pub fn sub_assign<T>(&mut self, rhs: &Vector<R, T>, r: &R)
    where
        T: VectorStorage<R> + ?Sized,
    {
        assert_eq!(
            self.dim(),
            rhs.dim(),
            "Can not subtract vectors of different dimensions."
        );
        for (a, b) in self.iter_mut().zip(rhs.iter()) {
            r.sub_assign(a, b);
        }
    }

    /// Multiply the vector by a scalar.
    pub fn mul_assign(&mut self, c: &R::Element, r: &R) {
        for e in self.iter_mut() {
            r.mul_assign(e, c);
        }
    }

    /// Multiply a vector by a scalar and add the result to this vector.
    pub fn mul_add_assign<T>(&mut self, c: &R::Element, v: &Vector<R, T>, r: &R)
    where
        T: VectorStorage<R> + ?Sized,
    {
        assert_eq!(self.dim(), v.dim());
        for (a, b) in self.iter_mut().zip(v.iter()) {
            r.mul_add_assign(a, c, b);
        }
    }

    /// Multiply a vector by a scalar and subtract the result from this vector.
    pub fn mul_sub_assign<T>(&mut self, c: &R::Element, v: &Vector<R, T>, r: &R)
    where
        T: VectorStorage<R> + ?Sized,
    {
        assert_eq!(self.dim(), v.dim());
        for (a, b) in self.iter_mut().zip(v.iter()) {
            r.mul_sub_assign(a, c, b);
        }
    }

    /// Compute the dot product of two vectors.
    pub fn dot<T>(&self, other: &Vector<R, T>, r: &R) -> R::Element
    where
        T: VectorStorage<R> + ?Sized,
    {
        assert_eq!(self.dim(), other.dim());
        self.iter()
            .zip(other.iter())
            .fold(R::zero(), |acc, (c, d)| r.mul_add(acc, c, d))
    }

    /// Computes the dot product of the vector with itself.
    pub fn norm_sqr(&self, r: &R) -> R::Element {
        self.iter().fold(R::zero(), |acc, e| r.mul_add(acc, e, e))
    }

    /// Computes the sum of the absolute values of the entries.
    pub fn l1_norm(&self, r: &R) -> R::Element
    where
        R: OrderedRing,
    {
        self.iter()
            .fold(R::zero(), |acc, e| r.add(acc, &r.abs(e.clone())))
    }
}

impl<R, S> Index<usize> for Vector<R, S>
where
    R: Ring,
    S: VectorStorage<R> + ?Sized,
{
    type Output = R::Element;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.as_slice()[idx]
    }
}

impl<R, S> IndexMut<usize> for Vector<R, S>
where
    R: Ring,
    S: VectorStorage<R> + ?Sized,
{
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.as_slice_mut()[idx]
    }
}

impl<R, S> Index<Range<usize>> for Vector<R, S>
where
    R: Ring,
    S: VectorStorage<R> + ?Sized,
{
    type Output = VectorView<R>;

    fn index(&self, index: Range<usize>) -> &Self::Output {
        VectorView::from_slice(&self.as_slice()[index])
    }
}

impl<R, S> IndexMut<Range<usize>> for Vector<R, S>
where
    R: Ring,
    S: VectorStorage<R> + ?Sized,
{
    fn index_mut(&mut self, index: Range<usize>) -> &mut Self::Output {
        VectorView::from_slice_mut(&mut self.as_slice_mut()[index])
    }
}

impl<'a, R, S> IntoIterator for &'a Vector<R, S>
where
    R: Ring,
    S: VectorStorage<R> + ?Sized,
{
    type Item = &'a R::Element;
    type IntoIter = std::slice::Iter<'a, R::Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<R, S, I: ?Sized, U> PartialEq<I> for Vector<R, S>
where
    R: Ring,
    R::Element: PartialEq<U>,
    S: VectorStorage<R> + ?Sized,
    for<'a> &'a I: IntoIterator<Item = &'a U>,
{
    fn eq(&self, other: &I) -> bool {
        self.iter().eq(other)
    }
}

impl<R, S> std::fmt::Debug for Vector<R, S>
where
    R: Ring,
    S: VectorStorage<R> + ?Sized,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Technically this is not a vector view, because it owns
/// the elements. However, you can only get references
/// to this type, which are the views.
pub type VectorView<R> = Vector<R, SliceVectorStorage<R>>;

impl<R: Ring> VectorView<R> {
    /// Create a vector view of a slice.
    pub fn from_slice(s: &[R::Element]) -> &Self {
        // SAFETY: `Vector` and `SliceVectorStorage` are `repr(transparent)`
        // over `[R::Element]`.
        unsafe { &*(s as *const [R::Element] as *const Self) }
    }

    /// Create a mutable vector view of a slice.
    pub fn from_slice_mut(s: &mut [R::Element]) -> &mut Self {
        // SAFETY: See `from_slice`.
        unsafe { &mut *(s as *mut [R::Element] as *mut Self) }
    }
}

impl<R: Ring> ToOwned for VectorView<R> {
    type Owned = OwnedVector<R>;

    fn to_owned(&self) -> Self::Owned {
        OwnedVector::from_raw_entries(self.as_slice().to_vec())
    }
}

#[repr(transparent)]
pub struct SliceVectorStorage<R: Ring>([R::Element]);

impl<R: Ring> VectorStorage<R> for SliceVectorStorage<R> {
    fn as_slice(&self) -> &[R::Element] {
        &self.0
    }

    fn as_slice_mut(&mut self) -> &mut [R::Element] {
        &mut self.0
    }
}

pub type OwnedVector<R> = Vector<R, OwnedVectorStorage<R>>;

impl<R: Ring> OwnedVector<R> {
    /// Returns an empty vector.
    pub fn empty() -> Self {
        Self::from_raw_entries(Vec::new())
    }

    /// Returns a zero vector.
    pub fn zero(dim: usize) -> Self {
        Self::from_raw_entries(std::iter::repeat_with(R::zero).take(dim).collect())
    }

    /// Creates a vector from a slice.
    pub fn from_entries<U, V>(a: U) -> Self
    where
        U: AsRef<[V]>,
        V: Into<R::Element> + Clone,
    {
        Self::from_raw_entries(a.as_ref().iter().cloned().map(Into::into).collect())
    }

    /// Creates a vector from an array.
    pub fn from_array<U: Into<R::Element>, const D: usize>(a: [U; D]) -> Self {
        Self::from_raw_entries(a.into_iter().map(U::into).collect())
    }

    /// Returns an owned vector from the entries.
    pub fn from_raw_entries(entries: Vec<R::Element>) -> Self {
        Self::from_storage(OwnedVectorStorage { entries })
    }
}

impl<R: Ring> Borrow<VectorView<R>> for OwnedVector<R> {
    fn borrow(&self) -> &VectorView<R> {
        self.view()
    }
}

impl<R: Ring> Clone for OwnedVector<R> {
    fn clone(&self) -> Self {
        Self::from_raw_entries(self.storage.entries.clone())
    }
}

pub struct OwnedVectorStorage<R: Ring> {
    /// Memory that holds the entries.
    entries: Vec<R::Element>,
}

impl<R: Ring> VectorStorage<R> for OwnedVectorStorage<R> {
    fn as_slice(&self) -> &[R::Element] {
        &self.entries
    }

    fn as_slice_mut(&mut self) -> &mut [R::Element] {
        &mut self.entries
    }
}
