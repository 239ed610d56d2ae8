//! Compute a GRM from a PLINK fileset.
//!
//! grm make-grm --bfile cohort --out cohort --format gcta-grm-bin,rel

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use grm_core::grm::{compute_grm, GrmConfig, GrmFormat, StandardFilter};
use grm_geno::plink::{prefixed_path, PlinkReader};
use grm_geno::sample::{intersect_samples, read_keep_file};
use grm_geno::traits::GenotypeReader;

#[derive(Args)]
pub struct MakeGrmArgs {
    /// PLINK fileset prefix (bed/bim/fam)
    #[arg(long)]
    bfile: PathBuf,

    /// Output prefix
    #[arg(long)]
    out: PathBuf,

    /// Output formats, comma separated: rel, gcta-grm, gcta-grm-gz, gcta-grm-bin
    #[arg(long, value_delimiter = ',', default_value = "gcta-grm-bin")]
    format: Vec<GrmFormat>,

    /// Use only variants on chromosomes 1-22
    #[arg(long)]
    autosomes_only: bool,

    /// Keep only the samples listed in this file (IID or FID IID per line)
    #[arg(long)]
    keep: Option<PathBuf>,

    /// Write the sample ID in both ID-file columns instead of the family ID
    #[arg(long)]
    double_id: bool,

    /// Markers standardized per parallel pass
    #[arg(long, default_value = "1024")]
    chunk_size: usize,

    /// Also write summary statistics to <out>.grm.summary.json
    #[arg(long)]
    summary: bool,
}

pub fn run(args: MakeGrmArgs) -> Result<()> {
    info!("=== Make GRM ===");
    info!("PLINK fileset: {}", args.bfile.display());

    let mut reader = PlinkReader::new(&args.bfile)
        .with_context(|| format!("Failed to open PLINK fileset {}", args.bfile.display()))?;
    info!(
        "Loaded {} markers x {} samples",
        reader.n_markers(),
        reader.n_samples()
    );

    if let Some(keep_path) = &args.keep {
        let keep = read_keep_file(keep_path)?;
        let kept = intersect_samples(&[reader.sample_ids(), keep.as_slice()]).ids;
        if kept.is_empty() {
            bail!("No samples from {} found in the fileset", keep_path.display());
        }
        info!("Keeping {} of {} samples", kept.len(), reader.n_samples());
        reader.set_sample_subset(&kept)?;
    }

    let filter = StandardFilter {
        autosomes_only: args.autosomes_only,
        ..StandardFilter::default()
    };
    let config = GrmConfig {
        chunk_size: args.chunk_size,
    };
    let mut grm = compute_grm(&mut reader, &filter, &config)?;
    if args.double_id {
        grm = grm.with_doubled_ids();
    }

    for &format in &args.format {
        grm.export(format, &args.out)
            .with_context(|| format!("Failed to write {} output", format))?;
    }

    if args.summary {
        let path = prefixed_path(&args.out, "grm.summary.json");
        grm.summary().write_json(&path)?;
        info!("Summary written to {}", path.display());
    }

    info!(
        "GRM saved: {} samples, {} variants",
        grm.n_samples(),
        grm.n_variants()
    );
    Ok(())
}
