//! Convert an existing GRM between file formats.
//!
//! grm convert-grm --input cohort --input-format gcta-grm-bin --out cohort --format rel

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};

use grm_core::grm::{Grm, GrmFormat};

#[derive(Args)]
pub struct ConvertGrmArgs {
    /// Input prefix
    #[arg(long)]
    input: PathBuf,

    /// Format of the input GRM
    #[arg(long, default_value = "gcta-grm-bin")]
    input_format: GrmFormat,

    /// Output prefix
    #[arg(long)]
    out: PathBuf,

    /// Output formats, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    format: Vec<GrmFormat>,
}

pub fn run(args: ConvertGrmArgs) -> Result<()> {
    info!("=== Convert GRM ===");
    if args.input == args.out && args.format.contains(&args.input_format) {
        bail!("Refusing to overwrite the input GRM {}", args.input.display());
    }

    let grm = Grm::read(args.input_format, &args.input).with_context(|| {
        format!(
            "Failed to read {} GRM from {}",
            args.input_format,
            args.input.display()
        )
    })?;
    info!(
        "Loaded {} GRM: {} samples",
        args.input_format,
        grm.n_samples()
    );
    if args.input_format == GrmFormat::Rel && args.format.iter().any(|&f| f != GrmFormat::Rel) {
        warn!(".rel input has no variant counts; GCTA outputs will report 0");
    }

    for &format in &args.format {
        grm.export(format, &args.out)
            .with_context(|| format!("Failed to write {} output", format))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grm_core::grm::compute_grm_from_dosages;

    #[test]
    fn test_convert_bin_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let ids: Vec<String> = vec!["A".into(), "B".into(), "C".into()];
        let dosages = vec![vec![0.0, 1.0, 2.0], vec![1.0, 1.0, 0.0]];
        let grm = compute_grm_from_dosages(&ids, &dosages).unwrap();
        let input = dir.path().join("in");
        grm.export(GrmFormat::GctaGrmBin, &input).unwrap();

        let out = dir.path().join("out");
        run(ConvertGrmArgs {
            input: input.clone(),
            input_format: GrmFormat::GctaGrmBin,
            out: out.clone(),
            format: vec![GrmFormat::GctaGrm, GrmFormat::Rel],
        })
        .unwrap();

        let text = Grm::read(GrmFormat::GctaGrm, &out).unwrap();
        assert_eq!(text.sample_ids(), vec!["A", "B", "C"]);
        assert_eq!(text.counts(), grm.counts());
        for i in 0..3 {
            for j in 0..=i {
                assert!((text.value(i, j) - grm.value(i, j)).abs() < 1e-6);
            }
        }
        assert!(Grm::read(GrmFormat::Rel, &out).is_ok());
    }

    #[test]
    fn test_convert_refuses_in_place_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("same");
        let result = run(ConvertGrmArgs {
            input: prefix.clone(),
            input_format: GrmFormat::Rel,
            out: prefix,
            format: vec![GrmFormat::Rel],
        });
        assert!(result.is_err());
    }
}
