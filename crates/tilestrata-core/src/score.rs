//! Per-tile difficulty scoring.
//!
//! Two independent scalars are computed for every tile:
//!
//! * **target level**: binary entropy of the share of the tile footprint
//!   covered by the target land-cover class. Mixed tiles (share ≈ 0.5) score
//!   1.0, homogeneous tiles score ≈ 0.
//! * **edge level**: `f · edge_pixels / area` from a Canny detector on the
//!   tile luminance, so it ranges over [0, f].
//!
//! Scoring is pure: the scorer only borrows the mask and the tile pixels.
use serde::{Deserialize, Serialize};

use crate::edges::{edge_count, CannyParams};
use crate::error::{Result, StrataError};
use crate::raster::{GeoTransform, Raster};
use crate::tiling::{Tile, TileId};

/// Clamp applied to the coverage fraction before taking logarithms.
pub const ENTROPY_EPSILON: f64 = 1e-10;

/// Which raster bands feed the edge detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSelection {
    /// Red, green, blue band indices, reduced to luminance.
    Rgb([usize; 3]),
    /// A single band used directly.
    Single(usize),
}

impl Default for BandSelection {
    fn default() -> Self {
        BandSelection::Rgb([2, 1, 0])
    }
}

impl BandSelection {
    pub fn from_indices(indices: &[usize]) -> Result<Self> {
        match *indices {
            [b] => Ok(BandSelection::Single(b)),
            [r, g, b] => Ok(BandSelection::Rgb([r, g, b])),
            _ => Err(StrataError::InvalidConfig(format!(
                "band selection needs 1 or 3 indices, got {}",
                indices.len()
            ))),
        }
    }

    fn max_index(&self) -> usize {
        match *self {
            BandSelection::Rgb(b) => b.into_iter().max().unwrap_or(0),
            BandSelection::Single(b) => b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub bands: BandSelection,
    pub canny: CannyParams,
    /// Scale factor `f` applied to the edge density.
    pub edge_scale: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            bands: BandSelection::default(),
            canny: CannyParams::default(),
            edge_scale: 10.0,
        }
    }
}

/// Scores of one tile. The pixel data is not retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileScore {
    pub id: TileId,
    pub target_level: f64,
    pub edge_level: f64,
}

pub struct TileScorer<'m> {
    mask: &'m Raster,
    config: ScorerConfig,
}

impl<'m> TileScorer<'m> {
    /// `mask` is a single-band target indicator with values in [0, 1].
    pub fn new(mask: &'m Raster, config: ScorerConfig) -> Self {
        Self { mask, config }
    }

    pub fn score(&self, tile: &Tile) -> Result<TileScore> {
        let p = footprint_coverage(&tile.pixels, self.mask).ok_or_else(|| {
            StrataError::EmptyFootprint {
                id: tile.id.stem(),
            }
        })?;
        Ok(TileScore {
            id: tile.id.clone(),
            target_level: binary_entropy(p)?,
            edge_level: self.edge_level(&tile.pixels)?,
        })
    }

    pub fn edge_level(&self, pixels: &Raster) -> Result<f64> {
        let gray = luminance(pixels, self.config.bands)?;
        let area = pixels.band_len();
        if area == 0 {
            return Ok(0.0);
        }
        let edges = edge_count(&gray, pixels.width, pixels.height, &self.config.canny);
        Ok(self.config.edge_scale * edges as f64 / area as f64)
    }
}

/// Binary entropy `H(p) = −p·log2 p − (1−p)·log2(1−p)`.
///
/// `p` must lie in [0, 1]; it is then clamped to `[ε, 1−ε]` so the result
/// is finite and strictly positive.
pub fn binary_entropy(p: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&p) {
        return Err(StrataError::ProbabilityRange { p });
    }
    let p = p.clamp(ENTROPY_EPSILON, 1.0 - ENTROPY_EPSILON);
    let q = 1.0 - p;
    Ok(-p * p.log2() - q * q.log2())
}

/// Mask pixel window `(row0, row1, col0, col1)` (half-open) covering the
/// footprint of a `width`×`height` block placed at `geo`.
///
/// The footprint is widened outward so boundary pixels are never clipped:
/// the lower bound is floored, the upper bound ceiled plus one, then both
/// are clamped to the mask extent. `None` when nothing overlaps.
pub fn footprint_window(
    geo: &GeoTransform,
    width: usize,
    height: usize,
    mask: &Raster,
) -> Option<(usize, usize, usize, usize)> {
    let m = &mask.geo;
    let to_row = |y: f64| (y - m.origin_y) / m.pixel_height;
    let to_col = |x: f64| (x - m.origin_x) / m.pixel_width;

    let (mut r1, mut r2) = (to_row(geo.origin_y), to_row(geo.origin_y + height as f64 * geo.pixel_height));
    let (mut c1, mut c2) = (to_col(geo.origin_x), to_col(geo.origin_x + width as f64 * geo.pixel_width));
    if r1 > r2 {
        std::mem::swap(&mut r1, &mut r2);
    }
    if c1 > c2 {
        std::mem::swap(&mut c1, &mut c2);
    }

    let row0 = r1.floor().max(0.0);
    let row1 = (r2.ceil() + 1.0).min(mask.height as f64);
    let col0 = c1.floor().max(0.0);
    let col1 = (c2.ceil() + 1.0).min(mask.width as f64);
    if !(row0 < row1 && col0 < col1) {
        return None;
    }
    Some((row0 as usize, row1 as usize, col0 as usize, col1 as usize))
}

/// Mean mask value over the tile footprint, i.e. the target coverage share.
pub fn footprint_coverage(pixels: &Raster, mask: &Raster) -> Option<f64> {
    let (row0, row1, col0, col1) = footprint_window(&pixels.geo, pixels.width, pixels.height, mask)?;
    let band = mask.band(0);
    let mut sum = 0.0f64;
    for r in row0..row1 {
        sum += band[r * mask.width + col0..r * mask.width + col1]
            .iter()
            .map(|&v| v as f64)
            .sum::<f64>();
    }
    Some(sum / ((row1 - row0) * (col1 - col0)) as f64)
}

/// Reduce the selected bands to one channel in [0, 1].
///
/// RGB uses the ITU-R BT.709 luma weights `0.2125 R + 0.7154 G + 0.0721 B`.
/// Integer rasters are divided by their type's full scale; float rasters
/// (and single bands of any type) are divided by their maximum when it
/// exceeds 1.
pub fn luminance(pixels: &Raster, bands: BandSelection) -> Result<Vec<f32>> {
    if bands.max_index() >= pixels.bands {
        return Err(StrataError::InvalidConfig(format!(
            "band selection {:?} out of range for a {}-band raster",
            bands, pixels.bands
        )));
    }
    match bands {
        BandSelection::Rgb([r, g, b]) => {
            let (rb, gb, bb) = (pixels.band(r), pixels.band(g), pixels.band(b));
            let mut gray: Vec<f32> = (0..pixels.band_len())
                .map(|i| 0.2125 * rb[i] + 0.7154 * gb[i] + 0.0721 * bb[i])
                .collect();
            match pixels.pixel_type.full_scale() {
                Some(scale) => gray.iter_mut().for_each(|v| *v /= scale),
                None => normalise_by_max(&mut gray),
            }
            Ok(gray)
        }
        BandSelection::Single(b) => {
            let mut gray = pixels.band(b).to_vec();
            normalise_by_max(&mut gray);
            Ok(gray)
        }
    }
}

fn normalise_by_max(values: &mut [f32]) {
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if max > 1.0 {
        values.iter_mut().for_each(|v| *v /= max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelType;
    use approx::assert_abs_diff_eq;

    /// 10×10 mask at 10 m pixels; left half target (1), right half not (0).
    fn half_mask() -> Raster {
        let mut m = Raster::new(1, 10, 10, PixelType::F32, GeoTransform::new(0.0, 10.0, 100.0, -10.0), 0.0);
        for r in 0..10 {
            for c in 0..5 {
                m.set(0, r, c, 1.0);
            }
        }
        m
    }

    fn tile_at(origin_x: f64, origin_y: f64, size: usize, pixel: f64) -> Tile {
        let pixels = Raster::new(3, size, size, PixelType::U8, GeoTransform::new(origin_x, pixel, origin_y, -pixel), 128.0);
        Tile {
            id: TileId::new("t", 0, 0),
            pixels,
            zero_fraction: 0.0,
        }
    }

    #[test]
    fn entropy_peaks_at_half() {
        assert_abs_diff_eq!(binary_entropy(0.5).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn entropy_at_extremes_is_tiny_but_positive() {
        for p in [0.0, 1.0] {
            let h = binary_entropy(p).unwrap();
            assert!(h > 0.0, "H({}) should be clamped above 0", p);
            assert!(h < 1e-8, "H({}) = {}", p, h);
        }
    }

    #[test]
    fn entropy_rejects_out_of_range() {
        assert!(matches!(binary_entropy(1.5), Err(StrataError::ProbabilityRange { .. })));
        assert!(matches!(binary_entropy(-0.1), Err(StrataError::ProbabilityRange { .. })));
        assert!(binary_entropy(f64::NAN).is_err());
    }

    #[test]
    fn footprint_is_widened_by_one_pixel() {
        let mask = half_mask();
        // 2×2 tile at 10 m covering mask rows 2..4, cols 1..3 exactly.
        let geo = GeoTransform::new(10.0, 10.0, 80.0, -10.0);
        assert_eq!(footprint_window(&geo, 2, 2, &mask), Some((2, 5, 1, 4)));
    }

    #[test]
    fn footprint_is_clamped_to_mask_extent() {
        let mask = half_mask();
        let geo = GeoTransform::new(70.0, 10.0, 30.0, -10.0);
        assert_eq!(footprint_window(&geo, 4, 4, &mask), Some((7, 10, 7, 10)));
    }

    #[test]
    fn footprint_outside_mask_is_empty() {
        let mask = half_mask();
        let geo = GeoTransform::new(500.0, 10.0, 100.0, -10.0);
        assert_eq!(footprint_window(&geo, 2, 2, &mask), None);
    }

    #[test]
    fn target_level_from_mixed_footprint() {
        let mask = half_mask();
        // Covers the whole mask: coverage exactly 0.5.
        let tile = tile_at(0.0, 100.0, 10, 10.0);
        let scorer = TileScorer::new(&mask, ScorerConfig::default());
        let s = scorer.score(&tile).unwrap();
        assert_abs_diff_eq!(s.target_level, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn target_level_of_pure_tile_is_near_zero() {
        let mask = half_mask();
        // Left two columns, all target.
        let tile = tile_at(0.0, 100.0, 2, 10.0);
        let scorer = TileScorer::new(&mask, ScorerConfig::default());
        assert!(scorer.score(&tile).unwrap().target_level < 1e-8);
    }

    #[test]
    fn tile_outside_mask_fails() {
        let mask = half_mask();
        let tile = tile_at(1_000.0, 100.0, 2, 10.0);
        let scorer = TileScorer::new(&mask, ScorerConfig::default());
        assert!(matches!(scorer.score(&tile), Err(StrataError::EmptyFootprint { .. })));
    }

    #[test]
    fn uniform_tile_has_zero_edge_level() {
        let mask = half_mask();
        let tile = tile_at(0.0, 100.0, 16, 1.0);
        let scorer = TileScorer::new(&mask, ScorerConfig::default());
        assert_eq!(scorer.edge_level(&tile.pixels).unwrap(), 0.0);
    }

    #[test]
    fn edge_level_is_scaled_density() {
        let mask = half_mask();
        let mut tile = tile_at(0.0, 100.0, 32, 1.0);
        for b in 0..3 {
            for r in 0..32 {
                for c in 16..32 {
                    tile.pixels.set(b, r, c, 255.0);
                }
            }
        }
        let cfg = ScorerConfig::default();
        let scorer = TileScorer::new(&mask, cfg);
        let level = scorer.edge_level(&tile.pixels).unwrap();
        let gray = luminance(&tile.pixels, cfg.bands).unwrap();
        let n = edge_count(&gray, 32, 32, &cfg.canny);
        assert!(n > 0);
        assert_abs_diff_eq!(level, 10.0 * n as f64 / 1024.0, epsilon = 1e-12);
        assert!(level <= cfg.edge_scale);
    }

    #[test]
    fn luminance_normalises_u8_and_single_bands() {
        let mut r = Raster::new(3, 2, 1, PixelType::U8, GeoTransform::identity(), 255.0);
        let gray = luminance(&r, BandSelection::Rgb([0, 1, 2])).unwrap();
        assert!(gray.iter().all(|&v| (v - 1.0).abs() < 1e-4));

        r.set(1, 0, 0, 100.0);
        r.set(1, 0, 1, 50.0);
        let single = luminance(&r, BandSelection::Single(1)).unwrap();
        assert_eq!(single, vec![1.0, 0.5]);
    }

    #[test]
    fn luminance_rejects_missing_band() {
        let r = Raster::new(3, 2, 2, PixelType::U8, GeoTransform::identity(), 0.0);
        assert!(luminance(&r, BandSelection::Rgb([3, 1, 0])).is_err());
    }

    #[test]
    fn band_selection_accepts_one_or_three() {
        assert_eq!(BandSelection::from_indices(&[2, 1, 0]).unwrap(), BandSelection::Rgb([2, 1, 0]));
        assert_eq!(BandSelection::from_indices(&[0]).unwrap(), BandSelection::Single(0));
        assert!(BandSelection::from_indices(&[0, 1]).is_err());
    }
}
