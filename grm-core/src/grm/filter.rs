//! Variant filters applied before GRM accumulation.
//!
//! The GRM computer takes any `VariantFilter`; it never decides on its
//! own which variants are eligible beyond skipping those it cannot
//! standardize.

use grm_geno::traits::{MarkerData, MarkerInfo};

/// Decides whether a variant contributes to the GRM.
pub trait VariantFilter {
    /// Cheap pre-check on metadata, before genotypes are decoded.
    fn keep_info(&self, _info: &MarkerInfo) -> bool {
        true
    }

    /// Check on the decoded marker.
    fn keep(&self, marker: &MarkerData) -> bool;
}

/// Keep every variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl VariantFilter for AcceptAll {
    fn keep(&self, _marker: &MarkerData) -> bool {
        true
    }
}

impl<F> VariantFilter for F
where
    F: Fn(&MarkerData) -> bool,
{
    fn keep(&self, marker: &MarkerData) -> bool {
        self(marker)
    }
}

/// The usual GRM variant QC: polymorphic (`0 < AC < 2 * n_called`),
/// called in every sample, optionally restricted to autosomes.
#[derive(Debug, Clone)]
pub struct StandardFilter {
    pub autosomes_only: bool,
    pub require_polymorphic: bool,
    pub require_fully_called: bool,
}

impl Default for StandardFilter {
    fn default() -> Self {
        Self {
            autosomes_only: false,
            require_polymorphic: true,
            require_fully_called: true,
        }
    }
}

impl StandardFilter {
    pub fn autosomal() -> Self {
        Self {
            autosomes_only: true,
            ..Self::default()
        }
    }
}

impl VariantFilter for StandardFilter {
    fn keep_info(&self, info: &MarkerInfo) -> bool {
        !self.autosomes_only || info.is_autosomal()
    }

    fn keep(&self, marker: &MarkerData) -> bool {
        (!self.require_polymorphic || marker.is_polymorphic())
            && (!self.require_fully_called || marker.is_fully_called())
    }
}
