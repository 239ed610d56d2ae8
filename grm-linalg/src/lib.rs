//! grm-linalg: Matrix storage for GRM-RS
//!
//! Provides packed lower-triangular storage for symmetric matrices
//! (the layout shared by every GRM output format) and a dense
//! faer-backed matrix for full-matrix views.

pub mod dense;
pub mod triangular;

pub use dense::DenseMatrix;
pub use triangular::{LinalgError, PackedSymmetric};
