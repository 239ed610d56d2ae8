#![allow(clippy::needless_range_loop)]
//! Dense matrix backed by faer.
//!
//! Used for full n x n views of a relationship matrix (inspection,
//! symmetry checks, handing the GRM to downstream solvers). The GRM
//! itself is computed and stored packed; see `triangular`.

use faer::Mat;

/// A dense matrix wrapper around faer's `Mat<f64>`.
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    inner: Mat<f64>,
}

impl DenseMatrix {
    /// Create a new dense matrix filled with zeros.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            inner: Mat::zeros(nrows, ncols),
        }
    }

    /// Create a dense matrix from row-major data.
    pub fn from_row_major(nrows: usize, ncols: usize, data: &[f64]) -> Self {
        assert_eq!(data.len(), nrows * ncols);
        let inner = Mat::from_fn(nrows, ncols, |i, j| data[i * ncols + j]);
        Self { inner }
    }

    pub fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    /// Get element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.inner.read(row, col)
    }

    /// Set element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.inner.write(row, col, value);
    }

    /// Diagonal of a square matrix.
    pub fn diag(&self) -> Vec<f64> {
        let n = self.nrows().min(self.ncols());
        (0..n).map(|i| self.inner.read(i, i)).collect()
    }

    /// True if square and |a(i,j) - a(j,i)| <= tol everywhere.
    /// NaN entries compare equal to NaN.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        if self.nrows() != self.ncols() {
            return false;
        }
        let n = self.nrows();
        for i in 0..n {
            for j in 0..i {
                let a = self.inner.read(i, j);
                let b = self.inner.read(j, i);
                if a.is_nan() && b.is_nan() {
                    continue;
                }
                let diff = (a - b).abs();
                if diff.is_nan() || diff > tol {
                    return false;
                }
            }
        }
        true
    }
}

impl std::fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.nrows() {
            for j in 0..self.ncols() {
                if j > 0 {
                    write!(f, "\t")?;
                }
                write!(f, "{:.6}", self.inner.read(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let m = DenseMatrix::zeros(3, 4);
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 4);
        assert_eq!(m.get(0, 0), 0.0);
    }

    #[test]
    fn test_from_row_major() {
        let m = DenseMatrix::from_row_major(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m.get(0, 2), 3.0);
        assert_eq!(m.get(1, 0), 4.0);
    }

    #[test]
    fn test_is_symmetric() {
        let sym = DenseMatrix::from_row_major(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        assert!(sym.is_symmetric(0.0));
        let asym = DenseMatrix::from_row_major(2, 2, &[1.0, 0.5, 0.4, 1.0]);
        assert!(!asym.is_symmetric(1e-3));
        assert!(asym.is_symmetric(0.2));
        let rect = DenseMatrix::zeros(2, 3);
        assert!(!rect.is_symmetric(1.0));
    }

    #[test]
    fn test_display() {
        let m = DenseMatrix::from_row_major(2, 2, &[1.0, 0.25, 0.25, 1.0]);
        assert_eq!(m.to_string(), "1.000000\t0.250000\n0.250000\t1.000000\n");
    }
}
