//! parcelgen CLI - generate parcel marshalling code
//!
//! Usage:
//!   parcelgen -o <outputDir> <fqname>...
//!
//! Package documents are resolved under the tree named by the
//! `PARCELGEN_ROOT` environment variable.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use parcelgen::Coordinator;

const ROOT_ENV: &str = "PARCELGEN_ROOT";

#[derive(Parser)]
#[command(name = "parcelgen")]
#[command(about = "Generate parcel marshalling code from interface descriptions", long_about = None)]
struct Cli {
    /// Output directory for generated sources
    #[arg(short = 'o', value_name = "DIR")]
    output_dir: PathBuf,

    /// Fully-qualified type names, e.g. com.example.gfx.Frame
    #[arg(value_name = "FQNAME", required = true)]
    fqnames: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Missing or invalid arguments print usage and exit with status 1.
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        process::exit(1);
    });

    let root = std::env::var(ROOT_ENV).unwrap_or_else(|_| {
        eprintln!("Your environment does not define ${ROOT_ENV}.");
        process::exit(1);
    });

    let mut coordinator = Coordinator::new(root);

    for fqname in &cli.fqnames {
        coordinator
            .generate(fqname, &cli.output_dir)
            .map_err(|e| anyhow::anyhow!("failed to generate {}: {}", fqname, e))?;
    }

    Ok(())
}
