//! grm-core: Genetic relationship matrix construction for GRM-RS
//!
//! Builds the standardized-genotype GRM from any `GenotypeReader`,
//! with pluggable variant filtering, and exports it in the PLINK and
//! GCTA relationship-matrix formats.

pub mod grm;

pub use grm::{
    compute_grm, compute_grm_from_dosages, AcceptAll, Grm, GrmConfig, GrmFormat, GrmSummary,
    StandardFilter, VariantFilter,
};
pub use grm_geno::GrmError;
