/// Stratified sample selection: crops an image into tiles, scores and
/// stratifies them against a land-cover raster, and copies a stratum-balanced
/// fraction of the tiles into the sample folder.
///
/// Settings come from built-in defaults, then an optional JSON `--config`,
/// then command-line flags, each overriding the last.
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tilestrata_core::{pipeline, FsTileStore, SamplingConfig};
use tracing_subscriber::EnvFilter;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sampler",
    about = "Crop, stratify and sample remote-sensing tiles for land-cover training"
)]
struct Args {
    /// Remote-sensing image (GeoTIFF)
    #[arg(long)]
    image: Option<PathBuf>,

    /// Land-cover raster covering the image (GeoTIFF)
    #[arg(long)]
    land_cover: Option<PathBuf>,

    /// Class value of the target land cover
    #[arg(long)]
    target_value: Option<f32>,

    /// Folder receiving the selected samples [default: samples]
    #[arg(long)]
    sample_folder: Option<PathBuf>,

    /// Folder holding every cropped tile during the run [default: temp]
    #[arg(long)]
    temp_folder: Option<PathBuf>,

    /// Tile name prefix [default: sample]
    #[arg(long)]
    prefix: Option<String>,

    /// Band indices used for edge detection: R,G,B or a single band [default: 2,1,0]
    #[arg(long, value_delimiter = ',')]
    rgb_bands: Option<Vec<usize>>,

    /// Tile edge length in pixels [default: 256]
    #[arg(long)]
    tile_size: Option<usize>,

    /// Drop tiles whose no-data share reaches this fraction [default: 0.2]
    #[arg(long)]
    zero_percent: Option<f64>,

    /// Fraction of tiles to select, in (0, 1] [default: 0.025]
    #[arg(long)]
    sample_percent: Option<f64>,

    /// Seed for a reproducible selection
    #[arg(long)]
    seed: Option<u64>,

    /// Use the image as-is instead of stretching it to 8 bit
    #[arg(long)]
    no_stretch: bool,

    /// Keep the temp folder after the run
    #[arg(long)]
    keep_temp: bool,

    /// Do not append the stratum tag to tile file names
    #[arg(long)]
    no_rename: bool,

    /// JSON file with run settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the run manifest [default: <sample-folder>/manifest.json]
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    /// Overlay the flags that were given onto `cfg`.
    fn apply(&self, cfg: &mut SamplingConfig) {
        if let Some(p) = &self.image {
            cfg.image = Some(p.clone());
        }
        if let Some(p) = &self.land_cover {
            cfg.land_cover = Some(p.clone());
        }
        if self.target_value.is_some() {
            cfg.target_value = self.target_value;
        }
        if let Some(p) = &self.sample_folder {
            cfg.sample_folder = p.clone();
        }
        if let Some(p) = &self.temp_folder {
            cfg.temp_folder = p.clone();
        }
        if let Some(p) = &self.prefix {
            cfg.prefix = p.clone();
        }
        if let Some(b) = &self.rgb_bands {
            cfg.rgb_bands = b.clone();
        }
        if let Some(n) = self.tile_size {
            cfg.tile_size = n;
        }
        if let Some(z) = self.zero_percent {
            cfg.zero_percent = z;
        }
        if let Some(r) = self.sample_percent {
            cfg.sample_percent = r;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if self.no_stretch {
            cfg.stretch_image = false;
        }
        if self.keep_temp {
            cfg.keep_temp = true;
        }
        if self.no_rename {
            cfg.rename_tiles = false;
        }
    }

    fn resolve(&self) -> Result<SamplingConfig> {
        let mut cfg = match &self.config {
            Some(path) => SamplingConfig::load(path)
                .with_context(|| format!("Cannot load config {}", path.display()))?,
            None => SamplingConfig::default(),
        };
        self.apply(&mut cfg);
        Ok(cfg)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = args.resolve()?;

    if cfg.image.is_none() || cfg.land_cover.is_none() {
        bail!("--image and --land-cover are required (on the command line or in --config)");
    }
    cfg.validate().context("Invalid settings")?;

    eprintln!("[sampler] {} → {}", cfg.temp_folder.display(), cfg.sample_folder.display());
    let mut store = FsTileStore;
    let report = pipeline::run(&mut store, &cfg, |done, total| {
        eprint!("\r  copied {done}/{total}");
        if done == total {
            eprintln!();
        }
        let _ = std::io::stderr().flush();
    })
    .context("Sampling run failed")?;

    eprintln!("[sampler] Population:\n{}", report.population);
    eprintln!("[sampler] Selected:\n{}", report.selected);

    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| cfg.sample_folder.join("manifest.json"));
    report
        .save(&report_path)
        .with_context(|| format!("Cannot write {}", report_path.display()))?;

    eprintln!(
        "[sampler] Done. {} of {} tiles selected, manifest at {}",
        report.selected.total(),
        report.population.total(),
        report_path.display()
    );
    Ok(())
}
