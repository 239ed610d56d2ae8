//! Packed lower-triangular storage for symmetric matrices.
//!
//! Entry (i, j) with j <= i lives at flat index `i * (i + 1) / 2 + j`.
//! This is the row-major lower-triangle order used by the PLINK `.rel`
//! and GCTA `.grm` / `.grm.bin` formats, so a packed matrix can be
//! streamed to disk without reordering.

use thiserror::Error;

use crate::dense::DenseMatrix;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LinalgError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Packed length {len} is not a triangular number")]
    NotTriangular { len: usize },
}

/// Number of entries in the lower triangle (diagonal included) of an n x n matrix.
#[inline]
pub fn packed_len(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Flat index of (i, j). Either argument order is accepted.
#[inline]
pub fn pair_index(i: usize, j: usize) -> usize {
    let (row, col) = if j > i { (j, i) } else { (i, j) };
    packed_len(row) + col
}

/// Recover (i, j), j <= i, from a flat index.
pub fn pair_from_index(idx: usize) -> (usize, usize) {
    // Closed-form guess, then fix up float error at large indices.
    let mut row = ((((8 * idx + 1) as f64).sqrt() - 1.0) / 2.0) as usize;
    while packed_len(row + 1) <= idx {
        row += 1;
    }
    while packed_len(row) > idx {
        row -= 1;
    }
    (row, idx - packed_len(row))
}

/// Dimension n of a matrix whose lower triangle has `len` entries.
pub fn triangular_dim(len: usize) -> Result<usize, LinalgError> {
    let (row, col) = pair_from_index(len);
    if col == 0 {
        Ok(row)
    } else {
        Err(LinalgError::NotTriangular { len })
    }
}

/// A symmetric n x n matrix stored as its packed lower triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedSymmetric<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> PackedSymmetric<T> {
    /// Matrix of size n with every entry set to `T::default()`.
    pub fn zeros(n: usize) -> Self {
        Self::filled(n, T::default())
    }

    pub fn filled(n: usize, value: T) -> Self {
        Self {
            n,
            data: vec![value; packed_len(n)],
        }
    }

    /// Wrap an existing packed vector. Its length must be n(n+1)/2.
    pub fn from_packed(n: usize, data: Vec<T>) -> Result<Self, LinalgError> {
        if data.len() != packed_len(n) {
            return Err(LinalgError::DimensionMismatch {
                expected: packed_len(n),
                got: data.len(),
            });
        }
        Ok(Self { n, data })
    }

    /// Build from a function of (i, j), called once per lower-triangle
    /// entry in packed order.
    pub fn from_fn<F>(n: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut data = Vec::with_capacity(packed_len(n));
        for i in 0..n {
            for j in 0..=i {
                data.push(f(i, j));
            }
        }
        Self { n, data }
    }

    /// Matrix dimension.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of stored entries, n(n+1)/2.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[pair_index(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        let idx = pair_index(i, j);
        self.data[idx] = value;
    }

    /// Row i of the lower triangle: entries (i, 0..=i).
    pub fn row(&self, i: usize) -> &[T] {
        let start = packed_len(i);
        &self.data[start..start + i + 1]
    }

    /// Rows of the lower triangle in order; row i has i + 1 entries.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.n).map(move |i| self.row(i))
    }

    /// Disjoint mutable row slices, suitable for handing one row per
    /// worker in a parallel accumulation.
    pub fn rows_mut(&mut self) -> Vec<&mut [T]> {
        let mut rows = Vec::with_capacity(self.n);
        let mut rest = self.data.as_mut_slice();
        for i in 0..self.n {
            let (row, tail) = std::mem::take(&mut rest).split_at_mut(i + 1);
            rows.push(row);
            rest = tail;
        }
        rows
    }

    /// Iterate (i, j, value) in packed order.
    pub fn iter_pairs(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.data.iter().enumerate().map(|(idx, &v)| {
            let (i, j) = pair_from_index(idx);
            (i, j, v)
        })
    }

    pub fn diag(&self) -> Vec<T> {
        (0..self.n).map(|i| self.get(i, i)).collect()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl PackedSymmetric<f64> {
    /// Expand into a full n x n dense matrix.
    pub fn to_dense(&self) -> DenseMatrix {
        let mut dense = DenseMatrix::zeros(self.n, self.n);
        for (i, j, v) in self.iter_pairs() {
            dense.set(i, j, v);
            dense.set(j, i, v);
        }
        dense
    }
}
