//! Canny edge detector on a single-channel image in [0, 1].
//!
//! Stages:
//!   1. Gaussian smoothing (σ configurable, kernel truncated at 4σ). Border
//!      pixels are normalised by the in-bounds kernel weight, so the image is
//!      not darkened towards its edges.
//!   2. Sobel gradient, kernel `[-1 0 1] ⊗ [1 2 1]` (unnormalised).
//!   3. Non-maximum suppression along the gradient direction, quantised to
//!      0°, 45°, 90° and 135°.
//!   4. Double threshold + hysteresis: pixels at or above `high` seed edges,
//!      8-connected pixels at or above `low` are grown onto them.
//!
//! The one-pixel image border never carries an edge.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CannyParams {
    /// Standard deviation of the Gaussian pre-filter, in pixels.
    pub sigma: f64,
    /// Hysteresis lower bound on gradient magnitude.
    pub low: f64,
    /// Hysteresis upper bound on gradient magnitude.
    pub high: f64,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            sigma: 2.0,
            low: 0.1,
            high: 0.2,
        }
    }
}

/// Edge map of a `width`×`height` row-major image.
pub fn canny(image: &[f32], width: usize, height: usize, params: &CannyParams) -> Vec<bool> {
    let n = width * height;
    let mut edges = vec![false; n];
    if width < 3 || height < 3 || image.len() != n {
        return edges;
    }

    let smoothed = gaussian_blur(image, width, height, params.sigma);
    let (gx, gy) = sobel(&smoothed, width, height);
    let mag: Vec<f64> = gx.iter().zip(&gy).map(|(x, y)| x.hypot(*y)).collect();

    // ── Non-maximum suppression ──────────────────────────────────────────────
    let mut thin = vec![0.0f64; n];
    for r in 1..height - 1 {
        for c in 1..width - 1 {
            let i = r * width + c;
            let m = mag[i];
            if m == 0.0 {
                continue;
            }
            let (a, b) = match direction_sector(gx[i], gy[i]) {
                0 => (mag[i - 1], mag[i + 1]),
                1 => (mag[i - width + 1], mag[i + width - 1]),
                2 => (mag[i - width], mag[i + width]),
                _ => (mag[i - width - 1], mag[i + width + 1]),
            };
            if m >= a && m >= b {
                thin[i] = m;
            }
        }
    }

    // ── Hysteresis ───────────────────────────────────────────────────────────
    let mut stack: Vec<usize> = Vec::new();
    for r in 1..height - 1 {
        for c in 1..width - 1 {
            let i = r * width + c;
            if thin[i] >= params.high {
                edges[i] = true;
                stack.push(i);
            }
        }
    }
    while let Some(i) = stack.pop() {
        let r = i / width;
        let c = i % width;
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let rr = r as i64 + dr;
                let cc = c as i64 + dc;
                if rr < 1 || cc < 1 || rr >= height as i64 - 1 || cc >= width as i64 - 1 {
                    continue;
                }
                let j = rr as usize * width + cc as usize;
                if !edges[j] && thin[j] >= params.low {
                    edges[j] = true;
                    stack.push(j);
                }
            }
        }
    }

    edges
}

/// Number of edge pixels found by [`canny`].
pub fn edge_count(image: &[f32], width: usize, height: usize, params: &CannyParams) -> usize {
    canny(image, width, height, params).iter().filter(|&&e| e).count()
}

/// Quantise the gradient direction (perpendicular to the edge) into one of
/// four sectors: 0 = horizontal, 1 = 45°, 2 = vertical, 3 = 135°.
/// Rows grow downward, so a positive `gy` points south.
fn direction_sector(gx: f64, gy: f64) -> u8 {
    let mut angle = gy.atan2(gx).to_degrees();
    if angle < 0.0 {
        angle += 180.0;
    }
    if !(22.5..157.5).contains(&angle) {
        0
    } else if angle < 67.5 {
        3
    } else if angle < 112.5 {
        2
    } else {
        1
    }
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as usize;
    let two_s2 = 2.0 * sigma * sigma;
    (0..=2 * radius)
        .map(|k| {
            let x = k as f64 - radius as f64;
            (-x * x / two_s2).exp()
        })
        .collect()
}

/// Separable Gaussian blur with in-bounds weight normalisation.
fn gaussian_blur(image: &[f32], width: usize, height: usize, sigma: f64) -> Vec<f64> {
    let src: Vec<f64> = image.iter().map(|&v| v as f64).collect();
    if sigma <= 0.0 {
        return src;
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;

    let pass = |input: &[f64], horizontal: bool| -> Vec<f64> {
        let mut out = vec![0.0f64; width * height];
        for r in 0..height {
            for c in 0..width {
                let (mut acc, mut wsum) = (0.0f64, 0.0f64);
                for (k, &w) in kernel.iter().enumerate() {
                    let off = k as i64 - radius;
                    let (rr, cc) = if horizontal {
                        (r as i64, c as i64 + off)
                    } else {
                        (r as i64 + off, c as i64)
                    };
                    if rr < 0 || cc < 0 || rr >= height as i64 || cc >= width as i64 {
                        continue;
                    }
                    acc += w * input[rr as usize * width + cc as usize];
                    wsum += w;
                }
                out[r * width + c] = if wsum > 0.0 { acc / wsum } else { 0.0 };
            }
        }
        out
    };

    let rows = pass(&src, true);
    pass(&rows, false)
}

/// Sobel gradients with edge-clamped borders. Returns `(d/dcol, d/drow)`.
fn sobel(img: &[f64], width: usize, height: usize) -> (Vec<f64>, Vec<f64>) {
    let mut gx = vec![0.0f64; width * height];
    let mut gy = vec![0.0f64; width * height];
    for r in 0..height {
        for c in 0..width {
            let g = |dr: i64, dc: i64| -> f64 {
                let rr = (r as i64 + dr).clamp(0, height as i64 - 1) as usize;
                let cc = (c as i64 + dc).clamp(0, width as i64 - 1) as usize;
                img[rr * width + cc]
            };
            gx[r * width + c] =
                -g(-1, -1) + g(-1, 1) - 2.0 * g(0, -1) + 2.0 * g(0, 1) - g(1, -1) + g(1, 1);
            gy[r * width + c] =
                -g(-1, -1) - 2.0 * g(-1, 0) - g(-1, 1) + g(1, -1) + 2.0 * g(1, 0) + g(1, 1);
        }
    }
    (gx, gy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_image(width: usize, height: usize, split: usize) -> Vec<f32> {
        (0..height)
            .flat_map(|_| (0..width).map(move |c| if c < split { 0.0 } else { 1.0 }))
            .collect()
    }

    #[test]
    fn flat_image_has_no_edges() {
        let img = vec![0.5f32; 32 * 32];
        assert_eq!(edge_count(&img, 32, 32, &CannyParams::default()), 0);
    }

    #[test]
    fn vertical_step_yields_a_thin_vertical_line() {
        let (w, h) = (32, 32);
        let img = step_image(w, h, 16);
        let edges = canny(&img, w, h, &CannyParams::default());

        // Every interior row carries at least one edge pixel near the step
        // and none far away from it.
        for r in 1..h - 1 {
            let cols: Vec<usize> = (0..w).filter(|&c| edges[r * w + c]).collect();
            assert!(!cols.is_empty(), "row {} has no edge", r);
            assert!(cols.iter().all(|&c| (14..=17).contains(&c)), "row {}: {:?}", r, cols);
            assert!(cols.len() <= 2, "row {} edge is not thin: {:?}", r, cols);
        }
    }

    #[test]
    fn border_pixels_never_flagged() {
        let (w, h) = (16, 16);
        let img: Vec<f32> = (0..w * h).map(|i| if (i / w + i % w) % 2 == 0 { 1.0 } else { 0.0 }).collect();
        let edges = canny(&img, w, h, &CannyParams { sigma: 0.0, low: 0.1, high: 0.2 });
        for c in 0..w {
            assert!(!edges[c] && !edges[(h - 1) * w + c]);
        }
        for r in 0..h {
            assert!(!edges[r * w] && !edges[r * w + w - 1]);
        }
    }

    #[test]
    fn stronger_smoothing_suppresses_fine_texture() {
        let (w, h) = (48, 48);
        let img: Vec<f32> = (0..w * h)
            .map(|i| if ((i / w) / 2 + (i % w) / 2) % 2 == 0 { 0.6 } else { 0.4 })
            .collect();
        let sharp = edge_count(&img, w, h, &CannyParams { sigma: 0.5, low: 0.1, high: 0.2 });
        let smooth = edge_count(&img, w, h, &CannyParams { sigma: 4.0, low: 0.1, high: 0.2 });
        assert!(smooth < sharp, "sharp={} smooth={}", sharp, smooth);
    }

    #[test]
    fn kernel_is_symmetric_and_truncated_at_four_sigma() {
        let k = gaussian_kernel(2.0);
        assert_eq!(k.len(), 17);
        assert!((k[0] - k[16]).abs() < 1e-15);
        assert_eq!(k[8], 1.0);
    }
}
