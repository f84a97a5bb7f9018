//! Fixed-size tile cropping.
//!
//! The raster is cut into non-overlapping `size`×`size` windows on a regular
//! grid anchored at the top-left pixel; partial windows at the right and
//! bottom edges are dropped. Windows dominated by no-data are skipped.
use serde::{Deserialize, Serialize};

use crate::raster::Raster;

/// Grid position of a tile plus the name prefix it is saved under. Ordered
/// by prefix, then row, then column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    pub prefix: String,
    pub row: usize,
    pub col: usize,
}

impl TileId {
    pub fn new(prefix: impl Into<String>, row: usize, col: usize) -> Self {
        Self {
            prefix: prefix.into(),
            row,
            col,
        }
    }

    /// `<prefix>_h{row:03}w{col:03}`
    pub fn stem(&self) -> String {
        format!("{}_h{:03}w{:03}", self.prefix, self.row, self.col)
    }

    /// Crop-time file name, before any stratum tag is attached.
    pub fn file_name(&self) -> String {
        format!("{}.tif", self.stem())
    }
}

/// One cropped window of the source raster.
#[derive(Debug, Clone)]
pub struct Tile {
    pub id: TileId,
    pub pixels: Raster,
    pub zero_fraction: f64,
}

/// Regular tiling of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub rows: usize,
    pub cols: usize,
    pub size: usize,
}

impl TileGrid {
    pub fn for_raster(raster: &Raster, size: usize) -> Self {
        if size == 0 {
            return Self { rows: 0, cols: 0, size };
        }
        Self {
            rows: raster.height / size,
            cols: raster.width / size,
            size,
        }
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lazily crop every grid cell whose no-data share stays below
/// `max_zero_fraction`. Tiles are produced row-major and one at a time so
/// the caller can drop each tile's pixels after scoring it.
pub fn crop_tiles<'a>(
    raster: &'a Raster,
    size: usize,
    prefix: &'a str,
    max_zero_fraction: f64,
) -> impl Iterator<Item = Tile> + 'a {
    let grid = TileGrid::for_raster(raster, size);
    (0..grid.rows)
        .flat_map(move |row| (0..grid.cols).map(move |col| (row, col)))
        .filter_map(move |(row, col)| {
            let pixels = raster.window(row * size, col * size, size, size);
            let zero_fraction = pixels.zero_fraction();
            if zero_fraction >= max_zero_fraction {
                tracing::debug!(row, col, zero_fraction, "tile skipped: too much no-data");
                return None;
            }
            Some(Tile {
                id: TileId::new(prefix, row, col),
                pixels,
                zero_fraction,
            })
        })
}
