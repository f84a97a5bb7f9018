//! Error type shared by every stage of the sampling pipeline.
//!
//! All variants are fatal to the current run: partial output is discarded and
//! the run is repeated, never patched.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = StrataError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StrataError {
    /// A coverage fraction outside [0, 1] reached the entropy computation.
    #[error("coverage fraction {p} is outside [0, 1]")]
    ProbabilityRange { p: f64 },

    /// A score matched none of the three bins on its axis.
    #[error("{axis} level {value} does not fall in any bin (tile {id})")]
    LevelRange {
        axis: &'static str,
        id: String,
        value: f64,
    },

    /// A tile identifier has no parseable `_t{d}e{d}` stratum tag.
    #[error("tile name {name:?} carries no valid stratum tag")]
    NamingConvention { name: String },

    /// A stored label names a bin outside 1..=3.
    #[error("stratum label t{target_bin}e{edge_bin} is outside t1e1..t3e3")]
    LabelRange { target_bin: u8, edge_bin: u8 },

    #[error("failed to copy {from} into {to}")]
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tile footprint does not intersect the land-cover mask.
    #[error("tile {id} footprint does not intersect the land-cover mask")]
    EmptyFootprint { id: String },

    #[error("cannot derive strata thresholds from an empty score list")]
    EmptyScores,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("unsupported raster layout: {0}")]
    UnsupportedLayout(String),

    #[error("tiff error in {path}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
