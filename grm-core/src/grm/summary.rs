//! Summary statistics written alongside a GRM as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use grm_geno::GrmError;

use super::Grm;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrmSummary {
    pub n_samples: usize,
    pub n_variants: usize,
    pub diag_mean: f64,
    pub diag_var: f64,
    /// None for a single sample.
    pub off_diag_mean: Option<f64>,
    pub off_diag_var: Option<f64>,
    pub min_variant_count: u32,
    pub max_variant_count: u32,
    /// Pairs with no shared called variant.
    pub n_undefined_pairs: usize,
}

/// Mean and population variance of the finite values, or None.
fn mean_var(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (mut n, mut sum, mut sum_sq) = (0usize, 0.0, 0.0);
    for v in values.filter(|v| v.is_finite()) {
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0 {
        return None;
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    Some((mean, var))
}

impl GrmSummary {
    pub fn from_grm(grm: &Grm) -> Self {
        let values = grm.values();
        let (diag_mean, diag_var) =
            mean_var(values.diag().into_iter()).unwrap_or((f64::NAN, f64::NAN));
        let off_diag = mean_var(
            values
                .iter_pairs()
                .filter(|&(i, j, _)| i != j)
                .map(|(_, _, v)| v),
        );
        let counts = grm.counts().as_slice();
        Self {
            n_samples: grm.n_samples(),
            n_variants: grm.n_variants(),
            diag_mean,
            diag_var,
            off_diag_mean: off_diag.map(|(m, _)| m),
            off_diag_var: off_diag.map(|(_, v)| v),
            min_variant_count: counts.iter().copied().min().unwrap_or(0),
            max_variant_count: counts.iter().copied().max().unwrap_or(0),
            n_undefined_pairs: values.as_slice().iter().filter(|v| v.is_nan()).count(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<(), GrmError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GrmError::format(path, format!("failed to serialize summary: {}", e)))?;
        std::fs::write(path, json).map_err(|e| GrmError::io(path, e))
    }
}
