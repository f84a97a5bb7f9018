/// Stratum census of a tile folder.
///
/// Reads the folder's `strata_index.json` when present, otherwise parses the
/// `_t{d}e{d}` tag out of every `.tif` name, and prints the 3×3 table.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tilestrata_core::store::INDEX_FILE_NAME;
use tilestrata_core::{FsTileStore, StrataCensus, TileStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "census", about = "Count tiles per difficulty stratum")]
struct Args {
    /// Folder of labelled tiles
    #[arg(long)]
    folder: PathBuf,

    /// Ignore the sidecar index and read labels from file names
    #[arg(long)]
    names_only: bool,
}

fn take_census(store: &dyn TileStore, folder: &Path, names_only: bool) -> Result<StrataCensus> {
    let names = store
        .list(folder)
        .with_context(|| format!("Cannot list {}", folder.display()))?;

    if !names_only {
        let index = store
            .read_index(folder)
            .with_context(|| format!("Cannot read {}", folder.join(INDEX_FILE_NAME).display()))?;
        if let Some(index) = index {
            if index.len() != names.len() {
                tracing::warn!(
                    indexed = index.len(),
                    files = names.len(),
                    "index and folder disagree, counting the index"
                );
            }
            return Ok(index.census());
        }
        tracing::info!("no {} in {}, reading file names", INDEX_FILE_NAME, folder.display());
    }

    StrataCensus::from_names(&names).context("Tile names carry no stratum tag")
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let census = take_census(&FsTileStore, &args.folder, args.names_only)?;
    println!("{census}");
    Ok(())
}
