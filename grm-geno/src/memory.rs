//! In-memory genotype matrix.
//!
//! Holds marker-major dosages (one vector of sample dosages per marker).
//! Used for library callers that already have genotypes loaded and for
//! building deterministic test datasets.

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::sample::Sample;
use crate::traits::{GenotypeReader, MarkerData, MarkerInfo};

/// A dense sample x marker dosage matrix implementing `GenotypeReader`.
#[derive(Debug, Clone)]
pub struct DosageMatrix {
    samples: Vec<Sample>,
    sample_ids: Vec<String>,
    markers: Vec<MarkerInfo>,
    /// dosages[m][i]: alt dosage of sample i at marker m, NaN if missing.
    dosages: Vec<Vec<f64>>,
    sample_subset: Option<Vec<usize>>,
}

impl DosageMatrix {
    /// Build from sample IDs and marker-major dosage rows. Markers get
    /// placeholder metadata on chromosome 1.
    pub fn new(sample_ids: Vec<String>, dosages: Vec<Vec<f64>>) -> Result<Self> {
        let markers = (0..dosages.len())
            .map(|m| MarkerInfo {
                chrom: "1".to_string(),
                pos: m as u64 + 1,
                id: format!("var{}", m + 1),
                ref_allele: "A".to_string(),
                alt_allele: "C".to_string(),
            })
            .collect();
        Self::with_markers(sample_ids, markers, dosages)
    }

    /// Build with explicit marker metadata.
    pub fn with_markers(
        sample_ids: Vec<String>,
        markers: Vec<MarkerInfo>,
        dosages: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if markers.len() != dosages.len() {
            bail!(
                "{} marker records for {} dosage rows",
                markers.len(),
                dosages.len()
            );
        }
        let n = sample_ids.len();
        for (m, row) in dosages.iter().enumerate() {
            if row.len() != n {
                bail!(
                    "Marker {} has {} dosages, expected {} (one per sample)",
                    m,
                    row.len(),
                    n
                );
            }
            if let Some(bad) = row.iter().find(|d| !d.is_nan() && !(0.0..=2.0).contains(*d)) {
                bail!("Marker {} has dosage {} outside [0, 2]", m, bad);
            }
        }
        Ok(Self {
            samples: sample_ids.iter().map(Sample::new).collect(),
            sample_ids,
            markers,
            dosages,
            sample_subset: None,
        })
    }

    /// Attach pedigree family IDs, one per sample in column order.
    pub fn with_family_ids(mut self, family_ids: Vec<String>) -> Result<Self> {
        if family_ids.len() != self.samples.len() {
            bail!(
                "{} family IDs for {} samples",
                family_ids.len(),
                self.samples.len()
            );
        }
        for (sample, fid) in self.samples.iter_mut().zip(family_ids) {
            sample.family_id = Some(fid);
        }
        Ok(self)
    }

    /// Build from hard calls, `None` meaning missing.
    pub fn from_calls(sample_ids: Vec<String>, calls: &[Vec<Option<u8>>]) -> Result<Self> {
        let dosages = calls
            .iter()
            .map(|row| {
                row.iter()
                    .map(|c| c.map_or(f64::NAN, f64::from))
                    .collect()
            })
            .collect();
        Self::new(sample_ids, dosages)
    }
}

impl GenotypeReader for DosageMatrix {
    fn n_markers(&self) -> usize {
        self.markers.len()
    }

    fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    fn samples(&self) -> Vec<Sample> {
        match &self.sample_subset {
            Some(indices) => indices.iter().map(|&i| self.samples[i].clone()).collect(),
            None => self.samples.clone(),
        }
    }

    fn set_sample_subset(&mut self, ids: &[String]) -> Result<()> {
        let lookup: HashMap<&str, usize> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();
        let mut indices = Vec::with_capacity(ids.len());
        for id in ids {
            match lookup.get(id.as_str()) {
                Some(&i) => indices.push(i),
                None => bail!("Sample {} not present in dosage matrix", id),
            }
        }
        self.sample_ids = ids.to_vec();
        self.sample_subset = Some(indices);
        Ok(())
    }

    fn read_marker(&mut self, index: u64) -> Result<MarkerData> {
        let idx = index as usize;
        if idx >= self.markers.len() {
            bail!("Marker index {} out of range ({})", index, self.markers.len());
        }
        let row = &self.dosages[idx];
        let dosages = match &self.sample_subset {
            Some(indices) => indices.iter().map(|&i| row[i]).collect(),
            None => row.clone(),
        };
        Ok(MarkerData::from_dosages(self.markers[idx].clone(), dosages))
    }

    fn marker_info(&self, index: u64) -> Result<MarkerInfo> {
        match self.markers.get(index as usize) {
            Some(info) => Ok(info.clone()),
            None => bail!("Marker index {} out of range ({})", index, self.markers.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_read_marker_stats() {
        let mut m = DosageMatrix::new(
            ids(&["A", "B", "C"]),
            vec![vec![0.0, 1.0, 2.0], vec![2.0, f64::NAN, 2.0]],
        )
        .unwrap();
        assert_eq!(m.n_markers(), 2);

        let first = m.read_marker(0).unwrap();
        assert_eq!(first.allele_count, 3.0);
        assert!((first.af - 0.5).abs() < 1e-12);

        let second = m.read_marker(1).unwrap();
        assert_eq!(second.n_called, 2);
        assert!(!second.is_polymorphic());
        assert!(m.read_marker(2).is_err());
    }

    #[test]
    fn test_rejects_ragged_and_out_of_range() {
        assert!(DosageMatrix::new(ids(&["A", "B"]), vec![vec![0.0]]).is_err());
        assert!(DosageMatrix::new(ids(&["A"]), vec![vec![3.0]]).is_err());
    }

    #[test]
    fn test_subset_reorders_samples() {
        let mut m = DosageMatrix::new(ids(&["A", "B", "C"]), vec![vec![0.0, 1.0, 2.0]])
            .unwrap()
            .with_family_ids(ids(&["F1", "F2", "F3"]))
            .unwrap();
        m.set_sample_subset(&ids(&["C", "A"])).unwrap();

        assert_eq!(m.n_samples(), 2);
        assert_eq!(m.sample_ids(), &["C", "A"]);
        assert_eq!(m.read_marker(0).unwrap().dosages, vec![2.0, 0.0]);
        assert_eq!(
            m.samples(),
            vec![Sample::with_family("F3", "C"), Sample::with_family("F1", "A")]
        );
        assert!(m.set_sample_subset(&ids(&["Z"])).is_err());
    }

    #[test]
    fn test_from_calls() {
        let mut m =
            DosageMatrix::from_calls(ids(&["A", "B"]), &[vec![Some(0), None]]).unwrap();
        let data = m.read_marker(0).unwrap();
        assert_eq!(data.dosages[0], 0.0);
        assert!(data.dosages[1].is_nan());
    }
}
