//! Row-major matrices.
//! The rows are [`VectorView`]s, see the module documentation for
//! [`crate::vector`].

use std::fmt::Debug;
use std::ops::{Index, IndexMut};

use itertools::iproduct;

use crate::rings::Ring;
use crate::vector::*;

/// A matrix that stores its entries row by row.
pub struct OwnedMatrix<R: Ring> {
    entries: Vec<R::Element>,
    rows: usize,
    cols: usize,
}

impl<R: Ring> OwnedMatrix<R> {
    /// Returns an empty 0x0 matrix.
    pub fn empty() -> Self {
        Self::zero(0, 0)
    }

    /// Returns an r×c zero matrix.
    pub fn zero(r: usize, c: usize) -> Self {
        Self {
            entries: std::iter::repeat_with(R::zero).take(r * c).collect(),
            rows: r,
            cols: c,
        }
    }

    /// Returns an nxn identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zero(n, n);
        for i in 0..n {
            m[(i, i)] = R::one();
        }
        m
    }

    /// Creates a matrix from an iterator over the entries in row-major order.
    pub fn from_iter<I: Iterator<Item = R::Element>>(r: usize, c: usize, iter: I) -> Self {
        let entries: Vec<_> = iter.take(r * c).collect();
        assert_eq!(entries.len(), r * c, "Iterator returned too few elements.");
        Self {
            entries,
            rows: r,
            cols: c,
        }
    }

    /// Creates a matrix from slice of rows.
    pub fn from_rows<U, V>(rows: &[U]) -> Self
    where
        U: AsRef<[V]>,
        V: Into<R::Element> + Clone,
    {
        if rows.is_empty() {
            return Self::empty();
        }

        let r = rows.len();
        let c = rows[0].as_ref().len();
        assert!(rows.iter().all(|r| r.as_ref().len() == c));

        Self::from_iter(
            r,
            c,
            rows.iter()
                .flat_map(|r| r.as_ref().iter().map(|e| e.clone().into())),
        )
    }

    /// The number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// The number of columns.
    pub fn num_cols(&self) -> usize {
        self.cols
    }

    /// Is the matrix empty?
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Returns a reference to a row.
    pub fn row(&self, r: usize) -> &VectorView<R> {
        assert!(r < self.rows, "Row {r} out of bounds.");
        VectorView::from_slice(&self.entries[r * self.cols..(r + 1) * self.cols])
    }

    /// Returns a mutable reference to a row.
    pub fn row_mut(&mut self, r: usize) -> &mut VectorView<R> {
        assert!(r < self.rows, "Row {r} out of bounds.");
        VectorView::from_slice_mut(&mut self.entries[r * self.cols..(r + 1) * self.cols])
    }

    /// Returns an iterator over the rows.
    pub fn rows(&self) -> impl DoubleEndedIterator<Item = &VectorView<R>> {
        (0..self.rows).map(|r| self.row(r))
    }

    /// Returns a reference to an entry.
    pub fn entry(&self, r: usize, c: usize) -> &R::Element {
        &self.row(r)[c]
    }

    /// Returns a mutable reference to an entry.
    pub fn entry_mut(&mut self, r: usize, c: usize) -> &mut R::Element {
        &mut self.row_mut(r)[c]
    }

    /// Returns a mutable references to two rows of the matrix. Panics if the
    /// indices are the same.
    pub fn get_rows_mut(&mut self, i: usize, j: usize) -> (&mut VectorView<R>, &mut VectorView<R>) {
        assert_ne!(i, j, "Tried to mutably borrow the same row twice.");
        let c = self.cols;
        let (lo, hi) = (i.min(j), i.max(j));
        let (a, b) = self.entries.split_at_mut(hi * c);
        let lo_row = VectorView::from_slice_mut(&mut a[lo * c..(lo + 1) * c]);
        let hi_row = VectorView::from_slice_mut(&mut b[..c]);
        if i < j {
            (lo_row, hi_row)
        } else {
            (hi_row, lo_row)
        }
    }

    /// Swap two rows.
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }

        let (a, b) = self.get_rows_mut(i, j);
        a.as_slice_mut().swap_with_slice(b.as_slice_mut());
    }

    /// Negates all elements of a row.
    pub fn negate_row(&mut self, row: usize, r: &R) {
        self.row_mut(row).neg_assign(r);
    }

    /// Add a scaled row to another row. N += M * c.
    /// `m` and `n` can not be equal.
    pub fn row_multiply_add(&mut self, n: usize, m: usize, c: &R::Element, r: &R) {
        let (n, m) = self.get_rows_mut(n, m);
        n.mul_add_assign(c, m, r);
    }

    /// Creates an owned matrix that is the transpose of the current matrix.
    pub fn transposed(&self) -> Self {
        Self::from_iter(
            self.cols,
            self.rows,
            iproduct!(0..self.cols, 0..self.rows).map(|(c, r)| self[(r, c)].clone()),
        )
    }

    /// Multiply two matrices.
    pub fn mul(&self, rhs: &Self, ring: &R) -> Self {
        assert_eq!(self.cols, rhs.rows, "Incompatible matrix dimensions.");
        let iter = iproduct!(0..self.rows, 0..rhs.cols).map(|(r, c)| {
            self.row(r)
                .iter()
                .zip(rhs.entries.iter().skip(c).step_by(rhs.cols))
                .fold(R::zero(), |acc, (a, b)| ring.mul_add(acc, a, b))
        });
        Self::from_iter(self.rows, rhs.cols, iter)
    }

    /// Multiplies the matrix with the transpose of another matrix, i.e.
    /// computes the dot products of all pairs of rows.
    pub fn mul_transposed(&self, rhs: &Self, ring: &R) -> Self {
        assert_eq!(self.cols, rhs.cols, "Incompatible matrix dimensions.");
        let iter = iproduct!(0..self.rows, 0..rhs.rows)
            .map(|(r, c)| self.row(r).dot(rhs.row(c), ring));
        Self::from_iter(self.rows, rhs.rows, iter)
    }

    /// Returns the top left `r`×`c` block.
    pub fn submatrix(&self, r: usize, c: usize) -> Self {
        assert!(r <= self.rows && c <= self.cols);
        Self::from_iter(
            r,
            c,
            iproduct!(0..r, 0..c).map(|(i, j)| self[(i, j)].clone()),
        )
    }

    /// Remove rows of zeros at the end of the matrix.
    pub fn remove_zero_rows(&mut self) {
        let num = self.rows().rev().take_while(|r| r.is_zero()).count();
        self.rows -= num;
        self.entries.truncate(self.rows * self.cols);
    }
}

impl<R: Ring> Index<usize> for OwnedMatrix<R> {
    type Output = VectorView<R>;

    fn index(&self, index: usize) -> &Self::Output {
        self.row(index)
    }
}

impl<R: Ring> IndexMut<usize> for OwnedMatrix<R> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        self.row_mut(index)
    }
}

impl<R: Ring> Index<(usize, usize)> for OwnedMatrix<R> {
    type Output = R::Element;

    fn index(&self, (r, c): (usize, usize)) -> &Self::Output {
        self.entry(r, c)
    }
}

impl<R: Ring> IndexMut<(usize, usize)> for OwnedMatrix<R> {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut Self::Output {
        self.entry_mut(r, c)
    }
}

impl<R: Ring> PartialEq for OwnedMatrix<R> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.entries == other.entries
    }
}

impl<R: Ring> Clone for OwnedMatrix<R> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl<R: Ring> Debug for OwnedMatrix<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rows()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rings::Z;
    use num_bigint::BigInt;

    #[test]
    fn rows_and_entries() {
        let m = OwnedMatrix::<Z>::from_rows(&[[2, 3], [4, 5]]);
        assert_eq!(m.row(0), &[2, 3].map(BigInt::from));
        assert_eq!(m[1], [4, 5].map(BigInt::from));
        assert_eq!(m[(1, 0)], BigInt::from(4));
        let t = m.transposed();
        assert_eq!(t[0], [2, 4].map(BigInt::from));
        assert_eq!(t[1], [3, 5].map(BigInt::from));
    }

    #[test]
    fn row_operations() {
        let mut m = OwnedMatrix::<Z>::from_rows(&[[1, 2], [3, 4], [5, 6]]);
        m.swap_rows(0, 2);
        assert_eq!(m, OwnedMatrix::from_rows(&[[5, 6], [3, 4], [1, 2]]));
        m.row_multiply_add(0, 2, &BigInt::from(-5), &Z);
        assert_eq!(m[0], [0, -4].map(BigInt::from));
        m.negate_row(1, &Z);
        assert_eq!(m[1], [-3, -4].map(BigInt::from));
        let (a, b) = m.get_rows_mut(2, 0);
        assert_eq!(a[0], BigInt::from(1));
        assert_eq!(b[1], BigInt::from(-4));
    }

    #[test]
    fn products() {
        let a = OwnedMatrix::<Z>::from_rows(&[[1, 2, 3], [0, 1, -1]]);
        let b = OwnedMatrix::<Z>::from_rows(&[[1, 0], [0, 1], [1, 1]]);
        assert_eq!(a.mul(&b, &Z), OwnedMatrix::from_rows(&[[4, 5], [-1, 0]]));
        assert_eq!(
            a.mul_transposed(&a, &Z),
            OwnedMatrix::from_rows(&[[14, -1], [-1, 2]])
        );
        assert_eq!(
            OwnedMatrix::<Z>::identity(2).mul(&a, &Z),
            a,
            "identity is not neutral"
        );
    }
}
