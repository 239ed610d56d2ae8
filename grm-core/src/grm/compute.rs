//! GRM construction.
//!
//! Computes GRM[i,j] = (1/M_ij) * sum_m z_im * z_jm
//! where z_im = (dosage_im - 2*p_m) / sqrt(2*p_m*(1-p_m)),
//! p_m is the alt-allele frequency among called samples at marker m,
//! and M_ij is the number of markers called in both i and j (every
//! used marker, for fully-called input).
//!
//! Markers are read sequentially in chunks. Each chunk is standardized
//! and accumulated with rayon, one task per row of the packed lower
//! triangle, so each pair has a single owner and a fixed summation
//! order: results do not depend on the thread count.

use rayon::prelude::*;
use tracing::{debug, info};

use grm_geno::traits::{GenotypeReader, MarkerData};
use grm_geno::{DosageMatrix, GrmError};
use grm_linalg::PackedSymmetric;

use super::filter::{AcceptAll, VariantFilter};
use super::Grm;

/// Markers with 2p(1-p) below this cannot be standardized.
pub const MIN_VARIANCE: f64 = 1e-10;

/// Configuration for GRM computation.
#[derive(Debug, Clone)]
pub struct GrmConfig {
    /// Markers standardized and accumulated per parallel pass.
    pub chunk_size: usize,
}

impl Default for GrmConfig {
    fn default() -> Self {
        Self { chunk_size: 1024 }
    }
}

/// Per-run marker accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct MarkerCounts {
    used: usize,
    filtered: usize,
    monomorphic: usize,
}

/// Standardize a marker's dosages. Missing calls stay NaN.
/// Returns None when the marker has no variance.
pub fn standardize(marker: &MarkerData) -> Option<Vec<f64>> {
    let p = marker.af;
    let var = 2.0 * p * (1.0 - p);
    if var < MIN_VARIANCE {
        return None;
    }
    let sd = var.sqrt();
    let mean = 2.0 * p;
    Some(marker.dosages.iter().map(|&d| (d - mean) / sd).collect())
}

/// A chunk of standardized markers, marker-major.
struct Chunk {
    markers: Vec<Vec<f64>>,
    has_missing: bool,
}

impl Chunk {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            markers: Vec::with_capacity(capacity),
            has_missing: false,
        }
    }

    fn push(&mut self, z: Vec<f64>) {
        self.has_missing |= z.iter().any(|v| v.is_nan());
        self.markers.push(z);
    }

    fn len(&self) -> usize {
        self.markers.len()
    }

    fn clear(&mut self) {
        self.markers.clear();
        self.has_missing = false;
    }
}

/// Running pairwise sums and variant counts.
struct Accumulator {
    sums: PackedSymmetric<f64>,
    counts: PackedSymmetric<u32>,
}

impl Accumulator {
    fn new(n: usize) -> Self {
        Self {
            sums: PackedSymmetric::zeros(n),
            counts: PackedSymmetric::zeros(n),
        }
    }

    fn add_chunk(&mut self, chunk: &Chunk) {
        if chunk.markers.is_empty() {
            return;
        }
        let markers = &chunk.markers;
        let sum_rows = self.sums.rows_mut();
        let count_rows = self.counts.rows_mut();

        if chunk.has_missing {
            sum_rows
                .into_par_iter()
                .zip(count_rows.into_par_iter())
                .enumerate()
                .for_each(|(i, (sums, counts))| {
                    for z in markers {
                        let zi = z[i];
                        if zi.is_nan() {
                            continue;
                        }
                        for (j, (s, c)) in sums.iter_mut().zip(counts.iter_mut()).enumerate() {
                            let zj = z[j];
                            if !zj.is_nan() {
                                *s += zi * zj;
                                *c += 1;
                            }
                        }
                    }
                });
        } else {
            let n_markers = chunk.len() as u32;
            sum_rows
                .into_par_iter()
                .zip(count_rows.into_par_iter())
                .enumerate()
                .for_each(|(i, (sums, counts))| {
                    for z in markers {
                        let zi = z[i];
                        for (s, zj) in sums.iter_mut().zip(&z[..=i]) {
                            *s += zi * zj;
                        }
                    }
                    for c in counts.iter_mut() {
                        *c += n_markers;
                    }
                });
        }
    }

    /// Divide each sum by its variant count; pairs with no shared
    /// markers become NaN.
    fn finish(self) -> (PackedSymmetric<f64>, PackedSymmetric<u32>) {
        let mut values = self.sums;
        for (v, &c) in values.as_mut_slice().iter_mut().zip(self.counts.as_slice()) {
            *v = if c > 0 { *v / c as f64 } else { f64::NAN };
        }
        (values, self.counts)
    }
}

/// Compute the GRM over all markers of `reader` accepted by `filter`.
///
/// Fails with `GrmError::EmptyDataset` when the reader has no samples
/// or no marker survives filtering and standardization.
pub fn compute_grm(
    reader: &mut dyn GenotypeReader,
    filter: &dyn VariantFilter,
    config: &GrmConfig,
) -> Result<Grm, GrmError> {
    let n = reader.n_samples();
    let m = reader.n_markers();

    info!("Computing GRM: {} samples x {} markers", n, m);

    if n == 0 {
        return Err(GrmError::EmptyDataset {
            n_samples: 0,
            n_variants: m,
        });
    }

    let chunk_size = config.chunk_size.max(1);
    let mut acc = Accumulator::new(n);
    let mut chunk = Chunk::with_capacity(chunk_size);
    let mut tally = MarkerCounts::default();

    for marker_idx in 0..m as u64 {
        if !filter.keep_info(&reader.marker_info(marker_idx)?) {
            tally.filtered += 1;
            continue;
        }
        let data = reader.read_marker(marker_idx)?;
        if !filter.keep(&data) {
            tally.filtered += 1;
            continue;
        }
        match standardize(&data) {
            Some(z) => {
                chunk.push(z);
                tally.used += 1;
            }
            None => {
                tally.monomorphic += 1;
                continue;
            }
        }

        if chunk.len() >= chunk_size {
            acc.add_chunk(&chunk);
            chunk.clear();
            debug!("Accumulated {} markers", tally.used);
        }
    }
    acc.add_chunk(&chunk);

    if tally.used == 0 {
        return Err(GrmError::EmptyDataset {
            n_samples: n,
            n_variants: 0,
        });
    }

    info!(
        "GRM computed using {} markers ({} filtered, {} monomorphic)",
        tally.used, tally.filtered, tally.monomorphic
    );

    let (values, counts) = acc.finish();
    Ok(Grm::new(reader.samples(), values, counts, tally.used))
}

/// Compute the GRM from marker-major dosage rows, using every marker
/// that can be standardized.
pub fn compute_grm_from_dosages(
    sample_ids: &[String],
    dosages: &[Vec<f64>],
) -> Result<Grm, GrmError> {
    let mut matrix = DosageMatrix::new(sample_ids.to_vec(), dosages.to_vec())?;
    compute_grm(&mut matrix, &AcceptAll, &GrmConfig::default())
}
