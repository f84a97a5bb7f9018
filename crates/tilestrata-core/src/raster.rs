use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Affine placement of a north-up raster: origin of the top-left corner plus
/// per-axis pixel size. `pixel_height` is negative for north-up images.
/// Rotation terms are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub origin_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            origin_y,
            pixel_height,
        }
    }

    /// Pixel-aligned identity placement, used for rasters without geo tags.
    pub fn identity() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }

    /// Placement of a window whose top-left pixel is `(row, col)`.
    pub fn offset(&self, row: usize, col: usize) -> Self {
        Self {
            origin_x: self.origin_x + col as f64 * self.pixel_width,
            origin_y: self.origin_y + row as f64 * self.pixel_height,
            ..*self
        }
    }
}

/// Storage type of the source samples. Values are always held as f32 in
/// memory; the type only decides normalisation and the encoding on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelType {
    U8,
    U16,
    F32,
}

impl PixelType {
    /// Value that maps to 1.0 when normalising to [0, 1]. `None` for floats,
    /// which are assumed to be normalised already.
    pub fn full_scale(self) -> Option<f32> {
        match self {
            PixelType::U8 => Some(u8::MAX as f32),
            PixelType::U16 => Some(u16::MAX as f32),
            PixelType::F32 => None,
        }
    }
}

/// GeoTIFF key directory and parameters carried through unchanged so that
/// written tiles keep the CRS of their source raster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoKeys {
    pub directory: Vec<u16>,
    pub double_params: Vec<f64>,
    pub ascii_params: String,
}

/// A band-sequential raster: `data[band][row][col]` flattened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    pub data: Vec<f32>,
    pub bands: usize,
    pub width: usize,
    pub height: usize,
    pub pixel_type: PixelType,
    pub geo: GeoTransform,
    #[serde(default)]
    pub geo_keys: Option<GeoKeys>,
}

impl Raster {
    /// Create a raster filled with `fill`.
    pub fn new(
        bands: usize,
        width: usize,
        height: usize,
        pixel_type: PixelType,
        geo: GeoTransform,
        fill: f32,
    ) -> Self {
        Self {
            data: vec![fill; bands * width * height],
            bands,
            width,
            height,
            pixel_type,
            geo,
            geo_keys: None,
        }
    }

    /// Wrap existing band-sequential data, checking its length.
    pub fn from_data(
        data: Vec<f32>,
        bands: usize,
        width: usize,
        height: usize,
        pixel_type: PixelType,
        geo: GeoTransform,
    ) -> Result<Self> {
        let expected = bands * width * height;
        if data.len() != expected {
            return Err(StrataError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            bands,
            width,
            height,
            pixel_type,
            geo,
            geo_keys: None,
        })
    }

    #[inline]
    pub fn band_len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn get(&self, band: usize, row: usize, col: usize) -> f32 {
        self.data[band * self.band_len() + row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, band: usize, row: usize, col: usize, val: f32) {
        let idx = band * self.band_len() + row * self.width + col;
        self.data[idx] = val;
    }

    pub fn band(&self, band: usize) -> &[f32] {
        let n = self.band_len();
        &self.data[band * n..(band + 1) * n]
    }

    pub fn band_mut(&mut self, band: usize) -> &mut [f32] {
        let n = self.band_len();
        &mut self.data[band * n..(band + 1) * n]
    }

    /// Copy the `size_h`×`size_w` window at `(row0, col0)` into a new raster
    /// with an adjusted placement. Caller guarantees the window is in bounds.
    pub fn window(&self, row0: usize, col0: usize, size_h: usize, size_w: usize) -> Raster {
        let mut data = Vec::with_capacity(self.bands * size_h * size_w);
        for b in 0..self.bands {
            let band = self.band(b);
            for r in row0..row0 + size_h {
                let start = r * self.width + col0;
                data.extend_from_slice(&band[start..start + size_w]);
            }
        }
        Raster {
            data,
            bands: self.bands,
            width: size_w,
            height: size_h,
            pixel_type: self.pixel_type,
            geo: self.geo.offset(row0, col0),
            geo_keys: self.geo_keys.clone(),
        }
    }

    /// Share of pixels whose value is 0 in every band (no-data pixels).
    pub fn zero_fraction(&self) -> f64 {
        let n = self.band_len();
        if n == 0 {
            return 0.0;
        }
        let zeros = (0..n)
            .filter(|&i| (0..self.bands).all(|b| self.data[b * n + i] == 0.0))
            .count();
        zeros as f64 / n as f64
    }
}
