//! Run configuration.
//!
//! Every field has a default, so a JSON config file only needs to name what it
//! changes. Command-line flags are applied on top by the tools.
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::edges::CannyParams;
use crate::error::{Result, StrataError};
use crate::score::{BandSelection, ScorerConfig};
use crate::strata::QuantileRange;
use crate::stretch::{DEFAULT_HIGH_QUANTILE, DEFAULT_LOW_QUANTILE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Multi-band image to tile.
    pub image: Option<PathBuf>,
    /// Land-cover class raster covering the image.
    pub land_cover: Option<PathBuf>,
    /// Class value of the target land cover.
    pub target_value: Option<f32>,
    /// Where the selected samples end up.
    pub sample_folder: PathBuf,
    /// Holds every cropped tile until selection is done.
    pub temp_folder: PathBuf,
    pub prefix: String,
    /// 3 indices (R, G, B) or a single band.
    pub rgb_bands: Vec<usize>,
    /// Edge length of a square tile, in pixels.
    pub tile_size: usize,
    /// A tile is kept only while its share of all-zero pixels stays below this.
    pub zero_percent: f64,
    /// Sampling fraction `r` in (0, 1].
    pub sample_percent: f64,
    /// Percentile-stretch the image to 8 bit before cropping.
    pub stretch_image: bool,
    pub stretch_range: QuantileRange,
    pub canny: CannyParams,
    pub edge_scale: f64,
    pub strata_range: QuantileRange,
    /// Append the stratum tag to tile file names.
    pub rename_tiles: bool,
    /// Keep the temp folder after selection.
    pub keep_temp: bool,
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            image: None,
            land_cover: None,
            target_value: None,
            sample_folder: PathBuf::from("samples"),
            temp_folder: PathBuf::from("temp"),
            prefix: "sample".to_string(),
            rgb_bands: vec![2, 1, 0],
            tile_size: 256,
            zero_percent: 0.2,
            sample_percent: 0.025,
            stretch_image: true,
            stretch_range: QuantileRange {
                low: DEFAULT_LOW_QUANTILE,
                high: DEFAULT_HIGH_QUANTILE,
            },
            canny: CannyParams::default(),
            edge_scale: 10.0,
            strata_range: QuantileRange::default(),
            rename_tiles: true,
            keep_temp: false,
            seed: None,
        }
    }
}

impl SamplingConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn bands(&self) -> Result<BandSelection> {
        BandSelection::from_indices(&self.rgb_bands)
    }

    pub fn scorer(&self) -> Result<ScorerConfig> {
        Ok(ScorerConfig {
            bands: self.bands()?,
            canny: self.canny,
            edge_scale: self.edge_scale,
        })
    }

    /// Check value ranges. Input paths are checked where they are opened.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(StrataError::InvalidConfig(msg));

        if self.target_value.is_none() {
            return invalid("target_value is required".into());
        }
        if self.prefix.is_empty() || self.prefix.contains(|c: char| c == '/' || c == '\\') {
            return invalid(format!("prefix {:?} is not a valid file name part", self.prefix));
        }
        if self.tile_size == 0 {
            return invalid("tile_size must be positive".into());
        }
        if !(self.zero_percent > 0.0 && self.zero_percent <= 1.0) {
            return invalid(format!("zero_percent must be in (0, 1], got {}", self.zero_percent));
        }
        if !(self.sample_percent > 0.0 && self.sample_percent <= 1.0) {
            return invalid(format!("sample_percent must be in (0, 1], got {}", self.sample_percent));
        }
        if !(self.edge_scale > 0.0) {
            return invalid(format!("edge_scale must be positive, got {}", self.edge_scale));
        }
        if self.canny.sigma < 0.0 || self.canny.low < 0.0 || self.canny.low > self.canny.high {
            return invalid(format!("canny parameters out of range: {:?}", self.canny));
        }
        for (name, range) in [("stretch_range", self.stretch_range), ("strata_range", self.strata_range)] {
            if !(0.0 <= range.low && range.low < range.high && range.high <= 1.0) {
                return invalid(format!("{name} must satisfy 0 <= low < high <= 1, got {range:?}"));
            }
        }
        // The temp folder is purged after selection, so neither may hold the other.
        let temp = normalized(&self.temp_folder)?;
        let samples = normalized(&self.sample_folder)?;
        if temp.starts_with(&samples) || samples.starts_with(&temp) {
            return invalid(format!(
                "temp_folder {} and sample_folder {} overlap",
                self.temp_folder.display(),
                self.sample_folder.display()
            ));
        }
        self.bands()?;
        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically; the folders
/// need not exist yet.
fn normalized(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
