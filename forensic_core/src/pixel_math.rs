//! Numeric primitives shared by the pixel checks.
//!
//! - Luminance plane (Rec.601 weights)
//! - Population mean / standard deviation
//! - 4-neighbour Laplacian and 3x3 Sobel magnitude
//! - Heatmap colour mapping
//! - Coarse block content hash

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Single-channel f64 plane, row-major.
#[derive(Debug, Clone)]
pub struct LumaPlane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl LumaPlane {
    pub fn from_rgba(img: &RgbaImage) -> Self {
        let data = img
            .pixels()
            .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
            .collect();
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data,
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Population mean and standard deviation. Empty input yields `(0, 0)`.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Mean and standard deviation of one square-or-rectangular block of the plane.
pub fn block_mean_std(plane: &LumaPlane, x0: usize, y0: usize, w: usize, h: usize) -> (f64, f64) {
    let n = (w * h) as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in y0..y0 + h {
        let row = &plane.data[y * plane.width + x0..y * plane.width + x0 + w];
        for &v in row {
            sum += v;
            sum_sq += v * v;
        }
    }
    let mean = sum / n;
    let var = (sum_sq / n - mean * mean).max(0.0);
    (mean, var.sqrt())
}

/// Absolute 4-neighbour Laplacian. Border pixels are zero.
pub fn laplacian_abs(plane: &LumaPlane) -> Vec<f64> {
    let (w, h) = (plane.width, plane.height);
    let mut out = vec![0.0; w * h];
    if w < 3 || h < 3 {
        return out;
    }
    out.par_chunks_mut(w)
        .enumerate()
        .skip(1)
        .take(h - 2)
        .for_each(|(y, row)| {
            for x in 1..w - 1 {
                let c = plane.at(x, y);
                let v = 4.0 * c
                    - plane.at(x - 1, y)
                    - plane.at(x + 1, y)
                    - plane.at(x, y - 1)
                    - plane.at(x, y + 1);
                row[x] = v.abs();
            }
        });
    out
}

const SOBEL_X: [[f64; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_Y: [[f64; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Sobel gradient magnitude `sqrt(gx^2 + gy^2)`. Border pixels are zero.
pub fn sobel_magnitude(plane: &LumaPlane) -> Vec<f64> {
    let (w, h) = (plane.width, plane.height);
    let mut out = vec![0.0; w * h];
    if w < 3 || h < 3 {
        return out;
    }
    out.par_chunks_mut(w)
        .enumerate()
        .skip(1)
        .take(h - 2)
        .for_each(|(y, row)| {
            for x in 1..w - 1 {
                let mut gx = 0.0;
                let mut gy = 0.0;
                for ky in 0..3 {
                    for kx in 0..3 {
                        let v = plane.at(x + kx - 1, y + ky - 1);
                        gx += SOBEL_X[ky][kx] * v;
                        gy += SOBEL_Y[ky][kx] * v;
                    }
                }
                row[x] = (gx * gx + gy * gy).sqrt();
            }
        });
    out
}

/// Colour mapping used for overlays. Only affects rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatmapPalette {
    /// blue -> cyan -> green -> yellow -> red
    #[default]
    Thermal,
    Grayscale,
}

impl HeatmapPalette {
    /// Map `t` in [0, 1] (clamped) to an opaque colour.
    pub fn color(&self, t: f64) -> [u8; 3] {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        match self {
            HeatmapPalette::Grayscale => {
                let v = (t * 255.0).round() as u8;
                [v, v, v]
            }
            HeatmapPalette::Thermal => {
                let (r, g, b) = if t < 0.25 {
                    (0.0, t / 0.25, 1.0)
                } else if t < 0.5 {
                    (0.0, 1.0, 1.0 - (t - 0.25) / 0.25)
                } else if t < 0.75 {
                    ((t - 0.5) / 0.25, 1.0, 0.0)
                } else {
                    (1.0, 1.0 - (t - 0.75) / 0.25, 0.0)
                };
                [
                    (r * 255.0).round() as u8,
                    (g * 255.0).round() as u8,
                    (b * 255.0).round() as u8,
                ]
            }
        }
    }
}

/// Render a per-pixel signal as an opaque heatmap, normalising by `scale`
/// (values are divided by it; a non-positive scale yields an all-low map).
pub fn heatmap(values: &[f64], width: u32, height: u32, scale: f64, palette: HeatmapPalette) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    for (px, &v) in out.pixels_mut().zip(values) {
        let t = if scale > 0.0 { v / scale } else { 0.0 };
        let [r, g, b] = palette.color(t);
        *px = Rgba([r, g, b, 255]);
    }
    out
}

/// Luminance quantised to 16 levels.
#[inline]
pub fn quantize16(luma: f64) -> u32 {
    ((luma / 16.0) as u32).min(15)
}

/// Fold a block's quantised luminance into a 32-bit rolling hash (`h * 31 + q`).
pub fn block_hash(plane: &LumaPlane, x0: usize, y0: usize, size: usize) -> u32 {
    let mut h: u32 = 0;
    for y in y0..y0 + size {
        let row = &plane.data[y * plane.width + x0..y * plane.width + x0 + size];
        for &v in row {
            h = h.wrapping_mul(31).wrapping_add(quantize16(v));
        }
    }
    h
}
