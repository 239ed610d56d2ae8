//! Genetic relationship matrix: computation, export and import.
//!
//! A `Grm` carries the sample order, the packed lower triangle of
//! relatedness values and, per pair, the number of variants that
//! contributed. Export follows the PLINK/GCTA file conventions:
//!
//! | format         | matrix file(s)               | ID file    |
//! |----------------|------------------------------|------------|
//! | `rel`          | `<prefix>.rel`               | `.rel.id`  |
//! | `gcta-grm`     | `<prefix>.grm`               | `.grm.id`  |
//! | `gcta-grm-gz`  | `<prefix>.grm.gz`            | `.grm.id`  |
//! | `gcta-grm-bin` | `<prefix>.grm.bin`, `.grm.N.bin` | `.grm.id` |

pub mod compute;
pub mod filter;
pub mod summary;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use grm_geno::grm_io;
use grm_geno::plink::prefixed_path;
use grm_geno::{GrmError, Sample};
use grm_linalg::{DenseMatrix, LinalgError, PackedSymmetric};

pub use compute::{compute_grm, compute_grm_from_dosages, GrmConfig};
pub use filter::{AcceptAll, StandardFilter, VariantFilter};
pub use summary::GrmSummary;

/// A symmetric sample x sample relationship matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Grm {
    samples: Vec<Sample>,
    values: PackedSymmetric<f64>,
    counts: PackedSymmetric<u32>,
    n_variants: usize,
}

impl Grm {
    pub(crate) fn new(
        samples: Vec<Sample>,
        values: PackedSymmetric<f64>,
        counts: PackedSymmetric<u32>,
        n_variants: usize,
    ) -> Self {
        debug_assert_eq!(samples.len(), values.n());
        debug_assert_eq!(values.n(), counts.n());
        Self {
            samples,
            values,
            counts,
            n_variants,
        }
    }

    /// Assemble a GRM from parts. The variant total is the largest
    /// per-pair count.
    pub fn from_parts(
        samples: Vec<Sample>,
        values: PackedSymmetric<f64>,
        counts: PackedSymmetric<u32>,
    ) -> Result<Self, LinalgError> {
        for got in [values.n(), counts.n()] {
            if got != samples.len() {
                return Err(LinalgError::DimensionMismatch {
                    expected: samples.len(),
                    got,
                });
            }
        }
        let n_variants = counts.as_slice().iter().copied().max().unwrap_or(0) as usize;
        Ok(Self::new(samples, values, counts, n_variants))
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of variants used to build the matrix.
    pub fn n_variants(&self) -> usize {
        self.n_variants
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample_ids(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.id.as_str()).collect()
    }

    /// Relatedness of samples i and j (0-based, either order).
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.values.get(i, j)
    }

    /// Number of variants that contributed to pair (i, j).
    pub fn variant_count(&self, i: usize, j: usize) -> u32 {
        self.counts.get(i, j)
    }

    pub fn values(&self) -> &PackedSymmetric<f64> {
        &self.values
    }

    pub fn counts(&self) -> &PackedSymmetric<u32> {
        &self.counts
    }

    pub fn to_dense(&self) -> DenseMatrix {
        self.values.to_dense()
    }

    /// Drop family IDs so ID files repeat the sample ID (`--double-id`).
    pub fn with_doubled_ids(mut self) -> Self {
        self.samples = self.samples.into_iter().map(Sample::doubled).collect();
        self
    }

    pub fn summary(&self) -> GrmSummary {
        GrmSummary::from_grm(self)
    }

    pub fn export_rel(&self, path: &Path) -> Result<(), GrmError> {
        grm_io::export_rel(path, &self.values)
    }

    /// GCTA text; gzip-compressed when `path` ends in `.gz`.
    pub fn export_gcta_grm(&self, path: &Path) -> Result<(), GrmError> {
        grm_io::export_gcta_grm(path, &self.values, &self.counts)
    }

    pub fn export_gcta_grm_bin(&self, bin_path: &Path, n_bin_path: &Path) -> Result<(), GrmError> {
        grm_io::export_gcta_grm_bin(bin_path, n_bin_path, &self.values, &self.counts)
    }

    pub fn export_id_file(&self, path: &Path) -> Result<(), GrmError> {
        grm_io::export_id_file(path, &self.samples)
    }

    /// Write matrix and ID files for `format` under `prefix`.
    /// Returns the paths written.
    pub fn export(&self, format: GrmFormat, prefix: &Path) -> Result<Vec<PathBuf>, GrmError> {
        let paths = format.paths(prefix);
        match format {
            GrmFormat::Rel => self.export_rel(&paths[0])?,
            GrmFormat::GctaGrm | GrmFormat::GctaGrmGz => self.export_gcta_grm(&paths[0])?,
            GrmFormat::GctaGrmBin => self.export_gcta_grm_bin(&paths[0], &paths[1])?,
        }
        let (id_path, matrix_paths) = paths
            .split_last()
            .ok_or_else(|| GrmError::format(prefix, "no output paths"))?;
        if let Err(e) = self.export_id_file(id_path) {
            for path in matrix_paths {
                grm_io::remove_partial(path);
            }
            return Err(e);
        }
        info!(
            "Wrote {} GRM ({} samples) to {}",
            format,
            self.n_samples(),
            paths[0].display()
        );
        Ok(paths)
    }

    /// Load a `.rel` matrix with its ID file. `.rel` carries no variant
    /// counts, so every count is zero.
    pub fn read_rel(rel_path: &Path, id_path: &Path) -> Result<Self, GrmError> {
        let samples = grm_io::read_id_file(id_path)?;
        let values = grm_io::read_rel(rel_path)?;
        let counts = PackedSymmetric::zeros(values.n());
        Self::from_parts(samples, values, counts).map_err(|e| {
            GrmError::format(rel_path, format!("does not match {}: {}", id_path.display(), e))
        })
    }

    /// Load a GCTA text GRM (`.grm` or `.grm.gz`) with its ID file.
    pub fn read_gcta_grm(grm_path: &Path, id_path: &Path) -> Result<Self, GrmError> {
        let samples = grm_io::read_id_file(id_path)?;
        let (values, counts) = grm_io::read_gcta_grm(grm_path)?;
        Self::from_parts(samples, values, counts).map_err(|e| {
            GrmError::format(grm_path, format!("does not match {}: {}", id_path.display(), e))
        })
    }

    /// Load a GCTA binary GRM. The sample count comes from the ID file.
    pub fn read_gcta_grm_bin(
        bin_path: &Path,
        n_bin_path: &Path,
        id_path: &Path,
    ) -> Result<Self, GrmError> {
        let samples = grm_io::read_id_file(id_path)?;
        let n = samples.len();
        let values = grm_io::read_gcta_grm_bin(bin_path, n)?;
        let counts = grm_io::read_gcta_grm_n_bin(n_bin_path, n)?;
        Self::from_parts(samples, values, counts)
            .map_err(|e| GrmError::format(bin_path, e.to_string()))
    }

    /// Load a GRM written by `export` with the given format and prefix.
    pub fn read(format: GrmFormat, prefix: &Path) -> Result<Self, GrmError> {
        let paths = format.paths(prefix);
        match format {
            GrmFormat::Rel => Self::read_rel(&paths[0], &paths[1]),
            GrmFormat::GctaGrm | GrmFormat::GctaGrmGz => {
                Self::read_gcta_grm(&paths[0], &paths[1])
            }
            GrmFormat::GctaGrmBin => Self::read_gcta_grm_bin(&paths[0], &paths[1], &paths[2]),
        }
    }
}

/// Output formats for a GRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrmFormat {
    Rel,
    GctaGrm,
    GctaGrmGz,
    GctaGrmBin,
}

impl GrmFormat {
    pub const ALL: [GrmFormat; 4] = [
        GrmFormat::Rel,
        GrmFormat::GctaGrm,
        GrmFormat::GctaGrmGz,
        GrmFormat::GctaGrmBin,
    ];

    /// Matrix file(s) followed by the ID file.
    pub fn paths(self, prefix: &Path) -> Vec<PathBuf> {
        let exts: &[&str] = match self {
            GrmFormat::Rel => &["rel", "rel.id"],
            GrmFormat::GctaGrm => &["grm", "grm.id"],
            GrmFormat::GctaGrmGz => &["grm.gz", "grm.id"],
            GrmFormat::GctaGrmBin => &["grm.bin", "grm.N.bin", "grm.id"],
        };
        exts.iter().map(|ext| prefixed_path(prefix, ext)).collect()
    }
}

impl fmt::Display for GrmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GrmFormat::Rel => "rel",
            GrmFormat::GctaGrm => "gcta-grm",
            GrmFormat::GctaGrmGz => "gcta-grm-gz",
            GrmFormat::GctaGrmBin => "gcta-grm-bin",
        };
        f.write_str(name)
    }
}

impl FromStr for GrmFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GrmFormat::ALL
            .into_iter()
            .find(|f| f.to_string() == s)
            .ok_or_else(|| {
                format!(
                    "unknown GRM format '{s}' (expected rel, gcta-grm, gcta-grm-gz or gcta-grm-bin)"
                )
            })
    }
}
