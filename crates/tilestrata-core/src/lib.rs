//! Stratified tile sampling for land-cover training sets.
//!
//! A remote-sensing image is cut into square tiles, each tile is scored on
//! how mixed its target land cover is and how much edge detail it carries,
//! the scores are binned into a 3×3 grid of difficulty strata, and a
//! stratum-balanced fraction of the tiles is copied out for training.
//! [`pipeline::run`] strings the stages together.

pub mod census;
pub mod config;
pub mod edges;
pub mod error;
pub mod geotiff;
pub mod landcover;
pub mod pipeline;
pub mod quota;
pub mod raster;
pub mod score;
pub mod select;
mod stats;
pub mod store;
pub mod strata;
pub mod stretch;
pub mod tiling;

pub use census::StrataCensus;
pub use config::SamplingConfig;
pub use error::{Result, StrataError};
pub use pipeline::RunReport;
pub use quota::QuotaPlan;
pub use raster::Raster;
pub use score::{TileScore, TileScorer};
pub use store::{FsTileStore, MemoryTileStore, TileIndex, TileStore};
pub use strata::{LabeledTile, StrataClassifier, StratumLabel};
