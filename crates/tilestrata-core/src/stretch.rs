//! Percentile stretch of a multi-band image to 8-bit.
//!
//! Each band is mapped linearly from its [q_low, q_high] quantile range
//! (computed over non-zero pixels only) onto 0–255. Zero pixels are no-data
//! and stay zero; NaN is treated as no-data.
use tracing::debug;

use crate::raster::{PixelType, Raster};
use crate::stats::quantile;

pub const DEFAULT_LOW_QUANTILE: f64 = 0.02;
pub const DEFAULT_HIGH_QUANTILE: f64 = 0.98;

/// Stretch every band of `raster` in place and mark it as `PixelType::U8`.
pub fn stretch_to_u8(raster: &mut Raster, q_low: f64, q_high: f64) {
    for b in 0..raster.bands {
        let band = raster.band_mut(b);
        for v in band.iter_mut() {
            if v.is_nan() {
                *v = 0.0;
            }
        }

        let valid = band.iter().filter(|&&v| v != 0.0).map(|&v| v as f64);
        let lo = quantile(valid.clone(), q_low);
        let hi = quantile(valid, q_high);
        debug!(band = b, lo, hi, "stretch range");

        let range = hi - lo;
        for v in band.iter_mut() {
            if *v == 0.0 {
                continue;
            }
            // An all-zero or constant band has no usable range.
            *v = if !range.is_finite() || range <= 0.0 {
                0.0
            } else {
                ((*v as f64 - lo) / range * 255.0).clamp(0.0, 255.0).floor() as f32
            };
        }
    }
    raster.pixel_type = PixelType::U8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;

    #[test]
    fn stretch_maps_quantile_range_onto_bytes() {
        // 0 is no-data, 1..=100 are valid.
        let mut data = vec![0.0f32];
        data.extend((1..=100).map(|v| v as f32));
        data.push(0.0);
        data.push(0.0);
        data.push(0.0);
        let mut r = Raster::from_data(data, 1, 13, 8, PixelType::U16, GeoTransform::identity()).unwrap();
        stretch_to_u8(&mut r, 0.0, 1.0);

        assert_eq!(r.pixel_type, PixelType::U8);
        assert_eq!(r.data[0], 0.0, "no-data stays zero");
        assert_eq!(r.data[100], 255.0, "maximum maps to 255");
        assert!(r.data.iter().all(|&v| (0.0..=255.0).contains(&v)));
    }

    #[test]
    fn stretch_clips_outliers() {
        let mut data: Vec<f32> = (1..=99).map(|v| v as f32).collect();
        data.push(10_000.0);
        let mut r = Raster::from_data(data, 1, 10, 10, PixelType::F32, GeoTransform::identity()).unwrap();
        stretch_to_u8(&mut r, DEFAULT_LOW_QUANTILE, DEFAULT_HIGH_QUANTILE);
        assert_eq!(r.data[99], 255.0);
        assert_eq!(r.data[0], 0.0);
    }

    #[test]
    fn stretch_turns_nan_into_nodata() {
        let mut r = Raster::from_data(
            vec![f32::NAN, 1.0, 2.0, 3.0],
            1,
            2,
            2,
            PixelType::F32,
            GeoTransform::identity(),
        )
        .unwrap();
        stretch_to_u8(&mut r, 0.0, 1.0);
        assert_eq!(r.data[0], 0.0);
        assert_eq!(r.data[3], 255.0);
    }
}
