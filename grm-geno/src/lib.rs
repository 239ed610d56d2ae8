//! grm-geno: Genotype input and relationship-matrix file formats for GRM-RS
//!
//! Provides the GenotypeReader trait with PLINK bed/bim/fam and
//! in-memory implementations, sample ID handling, and readers/writers
//! for the PLINK `.rel` and GCTA `.grm`, `.grm.gz`, `.grm.bin` formats.

pub mod error;
pub mod grm_io;
pub mod memory;
pub mod plink;
pub mod sample;
pub mod traits;

pub use error::GrmError;
pub use memory::DosageMatrix;
pub use sample::Sample;
pub use traits::{GenotypeReader, MarkerData, MarkerInfo};
