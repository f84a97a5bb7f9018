//! Land-cover class raster → target-class indicator mask.
//!
//! The mask keeps the class raster's placement; no warping or clipping is
//! done, the scorer projects each tile footprint onto the mask grid itself.
use crate::error::{Result, StrataError};
use crate::raster::{PixelType, Raster};

/// Build a single-band mask with 1.0 where band 0 equals `class_value` and
/// 0.0 elsewhere.
pub fn indicator_mask(classes: &Raster, class_value: f32) -> Result<Raster> {
    if classes.bands == 0 {
        return Err(StrataError::InvalidConfig(
            "land-cover raster has no bands".into(),
        ));
    }
    let data = classes
        .band(0)
        .iter()
        .map(|&v| if v == class_value { 1.0 } else { 0.0 })
        .collect();
    let mut mask = Raster::from_data(
        data,
        1,
        classes.width,
        classes.height,
        PixelType::F32,
        classes.geo,
    )?;
    mask.geo_keys = classes.geo_keys.clone();
    Ok(mask)
}

/// Fraction of mask pixels that belong to the target class.
pub fn coverage(mask: &Raster) -> f64 {
    let n = mask.band_len();
    if n == 0 {
        return 0.0;
    }
    mask.band(0).iter().map(|&v| v as f64).sum::<f64>() / n as f64
}
