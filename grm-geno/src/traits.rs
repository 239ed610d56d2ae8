//! Core traits for genotype reading.

use anyhow::Result;

use crate::sample::Sample;

/// Information about a genetic marker (variant).
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerInfo {
    /// Chromosome (e.g. "1", "22", "X").
    pub chrom: String,
    /// Position in base pairs.
    pub pos: u64,
    /// Marker/variant ID (e.g. rsID).
    pub id: String,
    /// Reference allele.
    pub ref_allele: String,
    /// Alternative allele.
    pub alt_allele: String,
}

impl MarkerInfo {
    /// True for chromosomes 1-22, with or without a "chr" prefix.
    pub fn is_autosomal(&self) -> bool {
        let chrom = self.chrom.strip_prefix("chr").unwrap_or(&self.chrom);
        matches!(chrom.parse::<u8>(), Ok(1..=22))
    }
}

/// Data for a single marker across all samples.
#[derive(Debug, Clone)]
pub struct MarkerData {
    /// Marker metadata.
    pub info: MarkerInfo,
    /// Alt-allele dosage for each sample (0.0 to 2.0).
    /// Missing calls are represented as NaN.
    pub dosages: Vec<f64>,
    /// Alt-allele frequency among called samples.
    pub af: f64,
    /// Alt-allele count (AC) summed over called samples.
    pub allele_count: f64,
    /// Number of samples with a non-missing call.
    pub n_called: usize,
}

impl MarkerData {
    /// Build marker data, deriving AC, AF and the called count from `dosages`.
    pub fn from_dosages(info: MarkerInfo, dosages: Vec<f64>) -> Self {
        let (allele_count, n_called) = Self::allele_stats(&dosages);
        let af = if n_called > 0 {
            allele_count / (2.0 * n_called as f64)
        } else {
            0.0
        };
        Self {
            info,
            dosages,
            af,
            allele_count,
            n_called,
        }
    }

    /// Alt-allele count and number of called samples.
    pub fn allele_stats(dosages: &[f64]) -> (f64, usize) {
        let mut sum = 0.0;
        let mut n = 0usize;
        for &d in dosages {
            if !d.is_nan() {
                sum += d;
                n += 1;
            }
        }
        (sum, n)
    }

    /// `0 < AC < 2 * n_called`: both alleles observed among called samples.
    pub fn is_polymorphic(&self) -> bool {
        self.allele_count > 0.0 && self.allele_count < 2.0 * self.n_called as f64
    }

    /// Every sample has a call.
    pub fn is_fully_called(&self) -> bool {
        self.n_called == self.dosages.len()
    }
}

/// Trait for reading genotype data.
///
/// Static dispatch via generics in tests; dynamic dispatch
/// (`Box<dyn GenotypeReader>`) at the CLI level.
pub trait GenotypeReader: Send {
    /// Total number of markers.
    fn n_markers(&self) -> usize;

    /// Number of samples returned by `read_marker` (after subsetting).
    fn n_samples(&self) -> usize;

    /// Sample IDs in column order.
    fn sample_ids(&self) -> &[String];

    /// Samples with family IDs where the source has them.
    /// Sources without pedigree metadata report no family ID.
    fn samples(&self) -> Vec<Sample> {
        self.sample_ids().iter().map(Sample::new).collect()
    }

    /// Set a sample subset for reading. Only these samples will be
    /// included in subsequent `read_marker` calls, in the given order.
    fn set_sample_subset(&mut self, ids: &[String]) -> Result<()>;

    /// Read genotype data for marker at the given index.
    fn read_marker(&mut self, index: u64) -> Result<MarkerData>;

    /// Get marker info without reading genotype data.
    fn marker_info(&self, index: u64) -> Result<MarkerInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(chrom: &str) -> MarkerInfo {
        MarkerInfo {
            chrom: chrom.to_string(),
            pos: 1,
            id: "rs1".to_string(),
            ref_allele: "A".to_string(),
            alt_allele: "G".to_string(),
        }
    }

    #[test]
    fn test_autosomal() {
        assert!(info("1").is_autosomal());
        assert!(info("chr22").is_autosomal());
        assert!(!info("X").is_autosomal());
        assert!(!info("23").is_autosomal());
        assert!(!info("MT").is_autosomal());
        assert!(!info("0").is_autosomal());
    }

    #[test]
    fn test_allele_stats_skip_missing() {
        let m = MarkerData::from_dosages(info("1"), vec![0.0, 1.0, f64::NAN, 2.0]);
        assert_eq!(m.allele_count, 3.0);
        assert_eq!(m.n_called, 3);
        assert!((m.af - 0.5).abs() < 1e-12);
        assert!(!m.is_fully_called());
        assert!(m.is_polymorphic());
    }

    #[test]
    fn test_monomorphic() {
        let all_ref = MarkerData::from_dosages(info("1"), vec![0.0; 4]);
        assert!(!all_ref.is_polymorphic());
        let all_alt = MarkerData::from_dosages(info("1"), vec![2.0; 4]);
        assert!(!all_alt.is_polymorphic());
        let none_called = MarkerData::from_dosages(info("1"), vec![f64::NAN; 2]);
        assert_eq!(none_called.af, 0.0);
        assert!(!none_called.is_polymorphic());
    }
}
