//! grm-rs: genetic relationship matrices from PLINK genotypes.
//!
//! CLI entry point using clap for argument parsing.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "grm",
    version,
    about = "GRM-RS: genetic relationship matrix construction",
    long_about = "Computes the standardized-genotype genetic relationship matrix from a\n\
                   PLINK bed/bim/fam fileset and writes it in PLINK .rel or GCTA\n\
                   .grm / .grm.gz / .grm.bin format."
)]
struct Cli {
    /// Number of threads to use (0 = all cores)
    #[arg(long, default_value = "0", global = true)]
    threads: usize,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a GRM from a PLINK fileset
    MakeGrm(commands::make_grm::MakeGrmArgs),

    /// Convert a GRM between file formats
    ConvertGrm(commands::convert_grm::ConvertGrmArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .ok();

    tracing::info!("GRM-RS v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Using {} threads", rayon::current_num_threads());

    match cli.command {
        Commands::MakeGrm(args) => commands::make_grm::run(args),
        Commands::ConvertGrm(args) => commands::convert_grm::run(args),
    }
}
