//! GeoTIFF decode/encode on top of the pure-Rust `tiff` crate.
//!
//! Only north-up rasters are understood: the placement comes from
//! ModelPixelScale + ModelTiepoint, or from a ModelTransformation without
//! rotation terms. The GeoKey directory is carried through verbatim.
//!
//! Readable layouts are gray, RGB and four-sample RGB; images with two or more
//! than four samples per pixel are rejected with `UnsupportedLayout`.
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tiff::{ColorType, TiffError};

use crate::error::{Result, StrataError};
use crate::raster::{GeoKeys, GeoTransform, PixelType, Raster};

fn tiff_err(path: &Path) -> impl Fn(TiffError) -> StrataError + '_ {
    move |source| StrataError::Tiff {
        path: path.to_path_buf(),
        source,
    }
}

// ── Decode ───────────────────────────────────────────────────────────────────

/// Read a chunky (pixel-interleaved) GeoTIFF of 1, 3 or 4 bands into a
/// band-sequential `Raster`.
pub fn read_raster(path: &Path) -> Result<Raster> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(tiff_err(path))?;
    let (width, height) = decoder.dimensions().map_err(tiff_err(path))?;
    let (width, height) = (width as usize, height as usize);

    let colortype = decoder.colortype().map_err(|e| match e {
        TiffError::UnsupportedError(what) => {
            StrataError::UnsupportedLayout(format!("{}: {what}", path.display()))
        }
        other => tiff_err(path)(other),
    })?;
    let bands = match colortype {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) | ColorType::CMYK(_) => 4,
        other => {
            return Err(StrataError::UnsupportedLayout(format!(
                "{}: colour type {:?}",
                path.display(),
                other
            )))
        }
    };

    if let Some(planar) = decoder
        .find_tag(Tag::PlanarConfiguration)
        .map_err(tiff_err(path))?
    {
        if planar.into_u16().map_err(tiff_err(path))? == 2 {
            return Err(StrataError::UnsupportedLayout(format!(
                "{}: planar (band-separate) storage",
                path.display()
            )));
        }
    }

    let geo = read_geotransform(&mut decoder, path)?;
    let geo_keys = read_geo_keys(&mut decoder, path)?;

    let image = decoder.read_image().map_err(tiff_err(path))?;
    let (interleaved, pixel_type): (Vec<f32>, PixelType) = match image {
        DecodingResult::U8(v) => (v.into_iter().map(f32::from).collect(), PixelType::U8),
        DecodingResult::U16(v) => (v.into_iter().map(f32::from).collect(), PixelType::U16),
        DecodingResult::I16(v) => (v.into_iter().map(f32::from).collect(), PixelType::F32),
        DecodingResult::U32(v) => (v.into_iter().map(|x| x as f32).collect(), PixelType::F32),
        DecodingResult::F32(v) => (v, PixelType::F32),
        DecodingResult::F64(v) => (v.into_iter().map(|x| x as f32).collect(), PixelType::F32),
        _ => {
            return Err(StrataError::UnsupportedLayout(format!(
                "{}: unsupported sample format",
                path.display()
            )))
        }
    };

    let expected = bands * width * height;
    if interleaved.len() != expected {
        return Err(StrataError::ShapeMismatch {
            expected,
            actual: interleaved.len(),
        });
    }

    let mut raster = Raster::from_data(
        deinterleave(&interleaved, bands),
        bands,
        width,
        height,
        pixel_type,
        geo,
    )?;
    raster.geo_keys = geo_keys;
    Ok(raster)
}

fn read_geotransform<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<GeoTransform> {
    if let Some(m) = decoder
        .find_tag(Tag::ModelTransformationTag)
        .map_err(tiff_err(path))?
    {
        let m = m.into_f64_vec().map_err(tiff_err(path))?;
        if m.len() < 8 {
            return Err(StrataError::UnsupportedLayout(format!(
                "{}: short ModelTransformation tag",
                path.display()
            )));
        }
        if m[1] != 0.0 || m[4] != 0.0 {
            return Err(StrataError::UnsupportedLayout(format!(
                "{}: rotated rasters are not supported",
                path.display()
            )));
        }
        return Ok(GeoTransform::new(m[3], m[0], m[7], m[5]));
    }

    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)
        .map_err(tiff_err(path))?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)
        .map_err(tiff_err(path))?;
    match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) => {
            let s = scale.into_f64_vec().map_err(tiff_err(path))?;
            let t = tiepoint.into_f64_vec().map_err(tiff_err(path))?;
            if s.len() < 2 || t.len() < 6 {
                return Err(StrataError::UnsupportedLayout(format!(
                    "{}: malformed georeferencing tags",
                    path.display()
                )));
            }
            // Tiepoint maps raster (i, j) to model (x, y); rows grow southward.
            let origin_x = t[3] - t[0] * s[0];
            let origin_y = t[4] + t[1] * s[1];
            Ok(GeoTransform::new(origin_x, s[0], origin_y, -s[1]))
        }
        _ => {
            tracing::warn!(path = %path.display(), "no georeferencing tags, using pixel grid");
            Ok(GeoTransform::identity())
        }
    }
}

fn read_geo_keys<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<Option<GeoKeys>> {
    let Some(directory) = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .map_err(tiff_err(path))?
    else {
        return Ok(None);
    };
    let directory = directory.into_u16_vec().map_err(tiff_err(path))?;
    let double_params = match decoder
        .find_tag(Tag::GeoDoubleParamsTag)
        .map_err(tiff_err(path))?
    {
        Some(v) => v.into_f64_vec().map_err(tiff_err(path))?,
        None => Vec::new(),
    };
    let ascii_params = match decoder
        .find_tag(Tag::GeoAsciiParamsTag)
        .map_err(tiff_err(path))?
    {
        Some(v) => v.into_string().map_err(tiff_err(path))?,
        None => String::new(),
    };
    Ok(Some(GeoKeys {
        directory,
        double_params,
        ascii_params,
    }))
}

/// Pixel-interleaved → band-sequential.
fn deinterleave(interleaved: &[f32], bands: usize) -> Vec<f32> {
    if bands == 1 {
        return interleaved.to_vec();
    }
    let n = interleaved.len() / bands;
    let mut out = vec![0.0f32; interleaved.len()];
    for (i, px) in interleaved.chunks_exact(bands).enumerate() {
        for (b, &v) in px.iter().enumerate() {
            out[b * n + i] = v;
        }
    }
    out
}

/// Band-sequential → pixel-interleaved.
fn interleave(raster: &Raster) -> Vec<f32> {
    let n = raster.band_len();
    let mut out = Vec::with_capacity(raster.data.len());
    for i in 0..n {
        for b in 0..raster.bands {
            out.push(raster.data[b * n + i]);
        }
    }
    out
}

// ── Encode ───────────────────────────────────────────────────────────────────

/// Write a 1-, 3- or 4-band raster as a GeoTIFF, keeping its placement and
/// GeoKeys. Sample encoding follows `raster.pixel_type`. A fourth band is
/// tagged as an unspecified extra sample, not as alpha.
pub fn write_raster(path: &Path, raster: &Raster) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(tiff_err(path))?;
    let samples = interleave(raster);

    let res = match (raster.pixel_type, raster.bands) {
        (PixelType::U8, 1) => write_image::<colortype::Gray8, _>(&mut encoder, raster, &to_u8(&samples)),
        (PixelType::U8, 3) => write_image::<colortype::RGB8, _>(&mut encoder, raster, &to_u8(&samples)),
        (PixelType::U8, 4) => write_image::<colortype::RGBA8, _>(&mut encoder, raster, &to_u8(&samples)),
        (PixelType::U16, 1) => write_image::<colortype::Gray16, _>(&mut encoder, raster, &to_u16(&samples)),
        (PixelType::U16, 3) => write_image::<colortype::RGB16, _>(&mut encoder, raster, &to_u16(&samples)),
        (PixelType::U16, 4) => write_image::<colortype::RGBA16, _>(&mut encoder, raster, &to_u16(&samples)),
        (PixelType::F32, 1) => write_image::<colortype::Gray32Float, _>(&mut encoder, raster, &samples),
        (PixelType::F32, 3) => write_image::<colortype::RGB32Float, _>(&mut encoder, raster, &samples),
        (PixelType::F32, 4) => write_image::<colortype::RGBA32Float, _>(&mut encoder, raster, &samples),
        (pt, bands) => {
            return Err(StrataError::UnsupportedLayout(format!(
                "cannot encode {bands}-band {pt:?} raster to {}",
                path.display()
            )))
        }
    };
    res.map_err(tiff_err(path))
}

fn write_image<C, W>(
    encoder: &mut TiffEncoder<W>,
    raster: &Raster,
    samples: &[C::Inner],
) -> std::result::Result<(), TiffError>
where
    C: colortype::ColorType,
    W: Write + Seek,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(raster.width as u32, raster.height as u32)?;
    let g = &raster.geo;
    let dir = image.encoder();
    if raster.bands == 4 {
        // ExtraSamples = 0: unspecified data, e.g. near-infrared.
        dir.write_tag(Tag::ExtraSamples, 0u16)?;
    }
    dir.write_tag(
        Tag::ModelPixelScaleTag,
        &[g.pixel_width, -g.pixel_height, 0.0][..],
    )?;
    dir.write_tag(
        Tag::ModelTiepointTag,
        &[0.0, 0.0, 0.0, g.origin_x, g.origin_y, 0.0][..],
    )?;
    if let Some(keys) = &raster.geo_keys {
        dir.write_tag(Tag::GeoKeyDirectoryTag, &keys.directory[..])?;
        if !keys.double_params.is_empty() {
            dir.write_tag(Tag::GeoDoubleParamsTag, &keys.double_params[..])?;
        }
        if !keys.ascii_params.is_empty() {
            dir.write_tag(Tag::GeoAsciiParamsTag, keys.ascii_params.as_str())?;
        }
    }
    image.write_data(samples)
}

fn to_u8(samples: &[f32]) -> Vec<u8> {
    samples.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8).collect()
}

fn to_u16(samples: &[f32]) -> Vec<u16> {
    samples.iter().map(|&v| v.round().clamp(0.0, 65535.0) as u16).collect()
}
