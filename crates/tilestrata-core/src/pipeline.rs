//! End-to-end sampling run.
//!
//! ```text
//! image ──stretch──► tiles ──score──► scores ──fit/classify──► labels
//!                                                                │
//!   sample folder ◄──materialize── selection ◄──quota── census ◄─┘
//! ```
//!
//! Pass 1 crops, scores and stores one tile at a time; only the scores stay
//! in memory. Pass 2 needs every score to fit the strata thresholds.
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::census::StrataCensus;
use crate::config::SamplingConfig;
use crate::error::{Result, StrataError};
use crate::geotiff;
use crate::landcover::{coverage, indicator_mask};
use crate::quota::{plan_from_census, QuotaPlan};
use crate::raster::Raster;
use crate::score::{TileScore, TileScorer};
use crate::select::{materialize, select_samples};
use crate::store::{IndexEntry, TileIndex, TileStore};
use crate::strata::StrataClassifier;
use crate::stretch::stretch_to_u8;
use crate::tiling::{crop_tiles, TileGrid};

/// Summary of one run, written out as the run manifest.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub grid_rows: usize,
    pub grid_cols: usize,
    pub tile_size: usize,
    /// Tiles that passed the no-data filter.
    pub tiles_kept: usize,
    pub tiles_skipped: usize,
    /// Share of the land-cover raster in the target class.
    pub target_coverage: f64,
    pub thresholds: StrataClassifier,
    pub population: StrataCensus,
    pub plan: QuotaPlan,
    pub selected: StrataCensus,
    pub sample_folder: PathBuf,
    pub seed: Option<u64>,
}

/// Read the image and land-cover rasters named in `config` and run.
pub fn run<S, F>(store: &mut S, config: &SamplingConfig, progress: F) -> Result<RunReport>
where
    S: TileStore + ?Sized,
    F: FnMut(usize, usize),
{
    config.validate()?;
    let image_path = required_path(config.image.as_deref(), "image")?;
    let land_cover_path = required_path(config.land_cover.as_deref(), "land_cover")?;

    info!(path = %image_path.display(), "reading image");
    let image = geotiff::read_raster(image_path)?;
    info!(path = %land_cover_path.display(), "reading land cover");
    let classes = geotiff::read_raster(land_cover_path)?;

    run_rasters(store, config, image, &classes, progress)
}

fn required_path<'a>(path: Option<&'a Path>, name: &str) -> Result<&'a Path> {
    path.ok_or_else(|| StrataError::InvalidConfig(format!("{name} path is required")))
}

/// Run on rasters already in memory. `image` is consumed: it is stretched in
/// place when `config.stretch_image` is set.
pub fn run_rasters<S, F>(
    store: &mut S,
    config: &SamplingConfig,
    mut image: Raster,
    classes: &Raster,
    progress: F,
) -> Result<RunReport>
where
    S: TileStore + ?Sized,
    F: FnMut(usize, usize),
{
    config.validate()?;
    let target_value = config
        .target_value
        .ok_or_else(|| StrataError::InvalidConfig("target_value is required".into()))?;
    let temp = config.temp_folder.as_path();

    // ── Data preparation ─────────────────────────────────────────────────────
    if config.stretch_image {
        stretch_to_u8(&mut image, config.stretch_range.low, config.stretch_range.high);
    }
    let mask = indicator_mask(classes, target_value)?;
    let target_coverage = coverage(&mask);
    info!(target_value, target_coverage, "land-cover mask ready");

    // ── Pass 1: crop, score, store ───────────────────────────────────────────
    let grid = TileGrid::for_raster(&image, config.tile_size);
    info!(rows = grid.rows, cols = grid.cols, size = grid.size, "cropping tiles");
    let scorer = TileScorer::new(&mask, config.scorer()?);
    let mut scores: Vec<TileScore> = Vec::new();
    for tile in crop_tiles(&image, config.tile_size, &config.prefix, config.zero_percent) {
        let score = scorer.score(&tile)?;
        store.write(temp, &tile.id, &tile.pixels)?;
        debug!(
            tile = %tile.id.stem(),
            target = score.target_level,
            edge = score.edge_level,
            "tile scored"
        );
        scores.push(score);
    }
    drop(image);
    let tiles_kept = scores.len();
    info!(kept = tiles_kept, skipped = grid.len() - tiles_kept, "pass 1 done");

    // ── Pass 2: stratify ─────────────────────────────────────────────────────
    let classifier = StrataClassifier::fit(&scores, config.strata_range)?;
    let labeled = classifier.classify_all(&scores)?;
    let mut entries = Vec::with_capacity(labeled.len());
    for tile in labeled {
        let file_name = if config.rename_tiles {
            let name = tile.file_name();
            store.rename(&temp.join(tile.id.file_name()), &name)?;
            name
        } else {
            tile.id.file_name()
        };
        entries.push(IndexEntry { file_name, tile });
    }
    let index = TileIndex::new(entries);
    store.write_index(temp, &index)?;
    let population = index.census();
    info!(tiles = population.total(), "population census\n{population}");

    // ── Selection ────────────────────────────────────────────────────────────
    let plan = plan_from_census(&population, config.sample_percent)?;
    let chosen = select_samples(&plan, &index.entries, config.seed);
    let selected_index = materialize(store, &chosen, temp, &config.sample_folder, progress)?;
    let selected = selected_index.census();
    info!(tiles = selected.total(), "selection census\n{selected}");

    if !config.keep_temp {
        store.purge(temp)?;
    }

    Ok(RunReport {
        grid_rows: grid.rows,
        grid_cols: grid.cols,
        tile_size: config.tile_size,
        tiles_kept,
        tiles_skipped: grid.len() - tiles_kept,
        target_coverage,
        thresholds: classifier,
        population,
        plan,
        selected,
        sample_folder: config.sample_folder.clone(),
        seed: config.seed,
    })
}

impl RunReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
