//! PLINK bed/bim/fam reader using memory-mapped files.
//!
//! PLINK binary format consists of three files:
//! - .bed: Binary genotype data (2 bits per genotype, packed)
//! - .bim: Variant information (chrom, id, cm, pos, a1, a2; cm is ignored)
//! - .fam: Sample information (fid, iid, father, mother, sex, pheno; only fid/iid are kept)
//!
//! Reference: https://www.cog-genomics.org/plink/1.9/formats#bed

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use tracing::debug;

use crate::sample::Sample;
use crate::traits::{GenotypeReader, MarkerData, MarkerInfo};

const BED_MAGIC: [u8; 3] = [0x6C, 0x1B, 0x01];

/// PLINK BIM file entry (one per variant).
#[derive(Debug, Clone)]
pub struct BimEntry {
    pub chrom: String,
    pub id: String,
    pub pos: u64,
    pub allele1: String, // Usually ALT / minor allele
    pub allele2: String, // Usually REF / major allele
}

/// PLINK FAM file entry (one per sample).
#[derive(Debug, Clone)]
pub struct FamEntry {
    pub fid: String,
    pub iid: String,
}

/// Append `.ext` to a fileset prefix. Unlike `Path::with_extension`
/// this keeps dots already in the prefix (`cohort.chr1` -> `cohort.chr1.bed`).
pub fn prefixed_path(prefix: &Path, ext: &str) -> PathBuf {
    let mut s = OsString::from(prefix.as_os_str());
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Reader for PLINK bed/bim/fam files.
pub struct PlinkReader {
    /// Memory-mapped .bed file.
    mmap: Mmap,
    bim: Vec<BimEntry>,
    fam: Vec<FamEntry>,
    /// Number of bytes per marker in the bed file.
    bytes_per_marker: usize,
    /// IIDs of the samples currently being read.
    sample_ids: Vec<String>,
    /// Indices of selected samples into `fam` (None = all samples).
    sample_subset: Option<Vec<usize>>,
}

impl PlinkReader {
    /// Open PLINK files from a fileset prefix (without extension).
    pub fn new<P: AsRef<Path>>(prefix: P) -> Result<Self> {
        let prefix = prefix.as_ref();
        let bed_path = prefixed_path(prefix, "bed");
        let bim_path = prefixed_path(prefix, "bim");
        let fam_path = prefixed_path(prefix, "fam");

        let fam = Self::parse_fam(&fam_path)?;
        let bim = Self::parse_bim(&bim_path)?;

        let bed_file = std::fs::File::open(&bed_path)
            .with_context(|| format!("Failed to open bed file: {}", bed_path.display()))?;
        // SAFETY: the bed file is opened read-only and not modified while mapped.
        let mmap = unsafe { Mmap::map(&bed_file)? };

        if mmap.len() < 3 {
            bail!("Bed file too small: {}", bed_path.display());
        }
        if mmap[0..2] != BED_MAGIC[0..2] {
            bail!("Invalid PLINK bed file magic number: {}", bed_path.display());
        }
        if mmap[2] != BED_MAGIC[2] {
            bail!("Only SNP-major bed files are supported (mode byte = 0x01)");
        }

        let bytes_per_marker = fam.len().div_ceil(4);
        let expected_size = 3 + bytes_per_marker * bim.len();
        if mmap.len() != expected_size {
            bail!(
                "Bed file size mismatch: expected {} bytes for {} samples x {} markers, got {}",
                expected_size,
                fam.len(),
                bim.len(),
                mmap.len()
            );
        }

        debug!(
            "Opened PLINK fileset {}: {} samples, {} markers",
            prefix.display(),
            fam.len(),
            bim.len()
        );

        let sample_ids: Vec<String> = fam.iter().map(|f| f.iid.clone()).collect();

        Ok(Self {
            mmap,
            bim,
            fam,
            bytes_per_marker,
            sample_ids,
            sample_subset: None,
        })
    }

    /// Parse a .fam file.
    fn parse_fam(path: &Path) -> Result<Vec<FamEntry>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fam file: {}", path.display()))?;
        let mut entries = Vec::new();
        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                bail!("Fam file line {} has fewer than 6 fields", line_num + 1);
            }
            entries.push(FamEntry {
                fid: fields[0].to_string(),
                iid: fields[1].to_string(),
            });
        }
        Ok(entries)
    }

    /// Parse a .bim file.
    fn parse_bim(path: &Path) -> Result<Vec<BimEntry>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bim file: {}", path.display()))?;
        let mut entries = Vec::new();
        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                bail!("Bim file line {} has fewer than 6 fields", line_num + 1);
            }
            let pos = fields[3].parse().with_context(|| {
                format!("Bim file line {}: bad position {}", line_num + 1, fields[3])
            })?;
            entries.push(BimEntry {
                chrom: fields[0].to_string(),
                id: fields[1].to_string(),
                pos,
                allele1: fields[4].to_string(),
                allele2: fields[5].to_string(),
            });
        }
        Ok(entries)
    }

    /// Decode a single genotype from the bed file.
    /// Returns dosage of allele1 (usually ALT): 0, 1, 2, or NaN for missing.
    #[inline]
    fn decode_genotype(byte: u8, offset: usize) -> f64 {
        match (byte >> (offset * 2)) & 0x03 {
            0b00 => 2.0,      // Homozygous A1/A1
            0b01 => f64::NAN, // Missing
            0b10 => 1.0,      // Heterozygous A1/A2
            _ => 0.0,         // Homozygous A2/A2
        }
    }

    #[inline]
    fn dosage_at(&self, block: &[u8], sample_idx: usize) -> f64 {
        Self::decode_genotype(block[sample_idx / 4], sample_idx % 4)
    }

    fn marker_block(&self, marker_idx: usize) -> &[u8] {
        let offset = 3 + marker_idx * self.bytes_per_marker;
        &self.mmap[offset..offset + self.bytes_per_marker]
    }

    fn bim_info(bim: &BimEntry) -> MarkerInfo {
        MarkerInfo {
            chrom: bim.chrom.clone(),
            pos: bim.pos,
            id: bim.id.clone(),
            ref_allele: bim.allele2.clone(),
            alt_allele: bim.allele1.clone(),
        }
    }
}

impl GenotypeReader for PlinkReader {
    fn n_markers(&self) -> usize {
        self.bim.len()
    }

    fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    fn samples(&self) -> Vec<Sample> {
        let to_sample = |f: &FamEntry| Sample::with_family(f.fid.clone(), f.iid.clone());
        match &self.sample_subset {
            Some(indices) => indices.iter().map(|&i| to_sample(&self.fam[i])).collect(),
            None => self.fam.iter().map(to_sample).collect(),
        }
    }

    fn set_sample_subset(&mut self, ids: &[String]) -> Result<()> {
        let lookup: HashMap<&str, usize> = self
            .fam
            .iter()
            .enumerate()
            .map(|(i, f)| (f.iid.as_str(), i))
            .collect();
        let mut indices = Vec::with_capacity(ids.len());
        for id in ids {
            match lookup.get(id.as_str()) {
                Some(&i) => indices.push(i),
                None => bail!("Sample {} not found in fam file", id),
            }
        }
        self.sample_ids = ids.to_vec();
        self.sample_subset = Some(indices);
        Ok(())
    }

    fn read_marker(&mut self, index: u64) -> Result<MarkerData> {
        let marker_idx = index as usize;
        if marker_idx >= self.bim.len() {
            bail!("Marker index {} out of range ({})", index, self.bim.len());
        }

        let block = self.marker_block(marker_idx);
        let dosages: Vec<f64> = match &self.sample_subset {
            Some(indices) => indices.iter().map(|&i| self.dosage_at(block, i)).collect(),
            None => (0..self.fam.len()).map(|i| self.dosage_at(block, i)).collect(),
        };

        Ok(MarkerData::from_dosages(
            Self::bim_info(&self.bim[marker_idx]),
            dosages,
        ))
    }

    fn marker_info(&self, index: u64) -> Result<MarkerInfo> {
        match self.bim.get(index as usize) {
            Some(bim) => Ok(Self::bim_info(bim)),
            None => bail!("Marker index {} out of range ({})", index, self.bim.len()),
        }
    }
}
