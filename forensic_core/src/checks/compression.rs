//! Compression stage: JPEG quality estimate, block-boundary (double compression)
//! strength and uniform-area detection.

use super::CheckContext;
use crate::check::{CheckResult, Status, LOW_CONFIDENCE};
use crate::image_jpeg_analysis::{find_dqt, ijg_table_match, quality_from_dc, QualityBand};
use crate::pixel_math::{block_mean_std, LumaPlane};
use image::{Rgba, RgbaImage};

pub const JPEG_QUALITY: &str = "jpeg_quality";
pub const DOUBLE_COMPRESSION: &str = "double_compression";
pub const UNIFORM_AREAS: &str = "uniform_areas";

const JPEG_BLOCK: usize = 8;
const UNIFORM_BLOCK: usize = 16;
const UNIFORM_STDDEV: f64 = 3.0;
const UNIFORM_SCORE_SPAN: f64 = 10.0;
const OVERLAY_MAX_ALPHA: f64 = 180.0;

/// DC-coefficient quality estimate. Omitted for non-JPEG input.
pub fn jpeg_quality(ctx: &CheckContext) -> Option<CheckResult> {
    if !ctx.is_jpeg() {
        return None;
    }
    let bytes = &ctx.buffer.bytes;

    let Some(probe) = find_dqt(bytes) else {
        return Some(
            CheckResult::new(
                JPEG_QUALITY,
                "JPEG quality",
                Status::Info,
                "JPEG quality unknown: no readable quantization table",
            )
            .with_detail("quality", None::<u8>)
            .with_confidence(0.2),
        );
    };

    let quality = quality_from_dc(probe.dc_coefficient);
    let band = QualityBand::from_quality(quality);
    let status = match band {
        QualityBand::Low => Status::Warn,
        QualityBand::Medium => Status::Info,
        QualityBand::Good | QualityBand::High => Status::Ok,
    };
    let ijg = ijg_table_match(bytes);

    Some(
        CheckResult::new(
            JPEG_QUALITY,
            "JPEG quality",
            status,
            format!("Estimated JPEG quality ~{}% ({})", quality, band.as_str()),
        )
        .with_detail("quality", quality)
        .with_detail("band", band.as_str())
        .with_detail("dc_coefficient", probe.dc_coefficient as u32)
        .with_detail("table_precision_bits", if probe.precision == 0 { 8u32 } else { 16 })
        .with_detail("ijg_match_quality", ijg.map(|(q, _)| q))
        .with_detail("ijg_exact_match", ijg.map(|(_, exact)| exact))
        .with_confidence(0.6)
        .with_caveats("Estimated from the first DC quantization coefficient; custom encoder tables skew the value."),
    )
}

/// Boundary/interior gradient means over the 8x8 grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockingStats {
    pub boundary_mean: f64,
    pub interior_mean: f64,
    pub samples: usize,
}

impl BlockingStats {
    /// Boundary mean over interior mean. A flat interior is neutral (1.0) unless the
    /// boundaries carry signal, in which case the ratio saturates.
    pub fn ratio(&self) -> f64 {
        if self.interior_mean > f64::EPSILON {
            self.boundary_mean / self.interior_mean
        } else if self.boundary_mean > f64::EPSILON {
            2.0
        } else {
            1.0
        }
    }

    pub fn strength(&self) -> f64 {
        ((self.ratio() - 0.8) / 1.2).clamp(0.0, 1.0)
    }
}

/// Sample every 8x8 block that has a right and a lower neighbour. Boundary samples
/// straddle the block edges at the block's mid-lines; interior samples sit at (4,4).
pub fn blocking_stats(plane: &LumaPlane) -> BlockingStats {
    let (w, h) = (plane.width, plane.height);
    let mut boundary_sum = 0.0;
    let mut interior_sum = 0.0;
    let mut samples = 0usize;

    let mut y0 = 0;
    while y0 + JPEG_BLOCK < h {
        let mut x0 = 0;
        while x0 + JPEG_BLOCK < w {
            let mid = 4;
            let dh = plane.at(x0 + 8, y0 + mid) - plane.at(x0 + 7, y0 + mid);
            let dv = plane.at(x0 + mid, y0 + 8) - plane.at(x0 + mid, y0 + 7);
            boundary_sum += (dh * dh + dv * dv).sqrt();

            let c = plane.at(x0 + mid, y0 + mid);
            let ih = c - plane.at(x0 + mid - 1, y0 + mid);
            let iv = c - plane.at(x0 + mid, y0 + mid - 1);
            interior_sum += (ih * ih + iv * iv).sqrt();

            samples += 1;
            x0 += JPEG_BLOCK;
        }
        y0 += JPEG_BLOCK;
    }

    let n = samples.max(1) as f64;
    BlockingStats {
        boundary_mean: boundary_sum / n,
        interior_mean: interior_sum / n,
        samples,
    }
}

/// Experimental blocking-artifact strength. JPEG only.
pub fn double_compression(ctx: &CheckContext) -> Option<CheckResult> {
    if !ctx.is_jpeg() {
        return None;
    }
    let stats = blocking_stats(&ctx.luma);
    if stats.samples == 0 {
        return Some(
            CheckResult::new(
                DOUBLE_COMPRESSION,
                "Double compression (experimental)",
                Status::Info,
                "Image too small for block-boundary analysis",
            )
            .with_confidence(LOW_CONFIDENCE),
        );
    }

    let ratio = stats.ratio();
    let strength = stats.strength();
    let (status, summary) = if strength > 0.7 {
        (Status::Warn, format!("Strong 8x8 block-boundary artifacts (strength {:.2})", strength))
    } else if strength > 0.4 {
        (Status::Info, format!("Moderate 8x8 block-boundary artifacts (strength {:.2})", strength))
    } else {
        (Status::Ok, format!("No notable block-boundary artifacts (strength {:.2})", strength))
    };

    Some(
        CheckResult::new(DOUBLE_COMPRESSION, "Double compression (experimental)", status, summary)
            .with_detail("boundary_mean", stats.boundary_mean)
            .with_detail("interior_mean", stats.interior_mean)
            .with_detail("ratio", ratio)
            .with_detail("strength", strength)
            .with_detail("samples", stats.samples)
            .with_confidence(0.3)
            .with_caveats("Experimental: content aligned with the 8x8 grid and heavy single compression also raise the ratio."),
    )
}

/// Flat-area ratio over 16x16 blocks, with a per-block uniformity overlay.
pub fn uniform_areas(ctx: &CheckContext) -> CheckResult {
    let plane = &ctx.luma;
    let bx = plane.width / UNIFORM_BLOCK;
    let by = plane.height / UNIFORM_BLOCK;
    let total = bx * by;

    if total == 0 {
        return CheckResult::new(
            UNIFORM_AREAS,
            "Uniform areas",
            Status::Info,
            "Image too small for uniform-area analysis",
        )
        .with_confidence(LOW_CONFIDENCE);
    }

    let mut overlay = RgbaImage::new(plane.width as u32, plane.height as u32);
    let mut uniform = 0usize;

    for j in 0..by {
        for i in 0..bx {
            let (x0, y0) = (i * UNIFORM_BLOCK, j * UNIFORM_BLOCK);
            let (_, std) = block_mean_std(plane, x0, y0, UNIFORM_BLOCK, UNIFORM_BLOCK);
            if std < UNIFORM_STDDEV {
                uniform += 1;
            }

            let score = (1.0 - std / UNIFORM_SCORE_SPAN).max(0.0);
            let [r, g, b] = ctx.palette.color(score);
            let px = Rgba([r, g, b, (score * OVERLAY_MAX_ALPHA).round() as u8]);
            for y in y0..y0 + UNIFORM_BLOCK {
                for x in x0..x0 + UNIFORM_BLOCK {
                    overlay.put_pixel(x as u32, y as u32, px);
                }
            }
        }
    }

    let ratio = uniform as f64 / total as f64;
    let (status, summary) = if ratio > 0.3 {
        (Status::Warn, format!("{:.0}% of blocks are flat; large smooth areas can hide retouching", ratio * 100.0))
    } else if ratio > 0.1 {
        (Status::Info, format!("{:.0}% of blocks are flat", ratio * 100.0))
    } else {
        (Status::Ok, format!("Few flat blocks ({:.0}%)", ratio * 100.0))
    };

    CheckResult::new(UNIFORM_AREAS, "Uniform areas", status, summary)
        .with_detail("block_size", UNIFORM_BLOCK)
        .with_detail("blocks", total)
        .with_detail("uniform_blocks", uniform)
        .with_detail("uniform_ratio", ratio)
        .with_confidence(0.5)
        .with_caveats("Skies, studio backdrops and synthetic graphics are legitimately flat.")
        .with_overlay(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ImageBuffer;
    use crate::check::DetailValue;
    use crate::image_formats::DetectedFormat;
    use crate::pixel_math::HeatmapPalette;

    fn ctx_for(buffer: &ImageBuffer, format: Option<DetectedFormat>) -> CheckContext<'_> {
        CheckContext::new(buffer, format, HeatmapPalette::Thermal)
    }

    #[test]
    fn test_jpeg_quality_omitted_for_png() {
        let buf = ImageBuffer::from_pixels("a.png", "image/png", RgbaImage::new(8, 8));
        assert!(jpeg_quality(&ctx_for(&buf, Some(DetectedFormat::Png))).is_none());
        assert!(double_compression(&ctx_for(&buf, Some(DetectedFormat::Png))).is_none());
    }

    #[test]
    fn test_jpeg_quality_unknown_when_unparsable() {
        let mut buf = ImageBuffer::from_pixels("a.jpg", "image/jpeg", RgbaImage::new(8, 8));
        buf.bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let r = jpeg_quality(&ctx_for(&buf, Some(DetectedFormat::Jpeg))).unwrap();
        assert_eq!(r.status, Status::Info);
        assert_eq!(r.detail("quality"), Some(&DetailValue::Null));
    }

    #[test]
    fn test_uniform_solid_image_warns() {
        let img = RgbaImage::from_pixel(50, 50, Rgba([128, 128, 128, 255]));
        let buf = ImageBuffer::from_pixels("g.png", "image/png", img);
        let r = uniform_areas(&ctx_for(&buf, Some(DetectedFormat::Png)));
        assert_eq!(r.status, Status::Warn);
        assert_eq!(r.detail("blocks").and_then(|v| v.as_f64()), Some(9.0));
        assert_eq!(r.detail("uniform_ratio").and_then(|v| v.as_f64()), Some(1.0));
        let overlay = r.overlay.unwrap();
        assert_eq!(overlay.dimensions(), (50, 50));
        assert_eq!(overlay.get_pixel(0, 0)[3], 180);
        assert_eq!(overlay.get_pixel(49, 49)[3], 0);
    }

    #[test]
    fn test_uniform_checkerboard_is_ok() {
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            if (x + y) % 2 == 0 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
        });
        let buf = ImageBuffer::from_pixels("c.png", "image/png", img);
        let r = uniform_areas(&ctx_for(&buf, None));
        assert_eq!(r.status, Status::Ok);
    }

    fn jpeg_ctx_image(w: u32, h: u32, f: impl Fn(u32, u32) -> u8) -> ImageBuffer {
        let img = RgbaImage::from_fn(w, h, |x, y| {
            let v = f(x, y);
            Rgba([v, v, v, 255])
        });
        ImageBuffer::from_pixels("d.jpg", "image/jpeg", img)
    }

    #[test]
    fn test_double_compression_tiers() {
        // Edges only on the 8x8 grid: ratio saturates.
        let grid = jpeg_ctx_image(64, 64, |x, y| if ((x / 8) + (y / 8)) % 2 == 0 { 40 } else { 200 });
        let r = double_compression(&ctx_for(&grid, Some(DetectedFormat::Jpeg))).unwrap();
        assert_eq!(r.status, Status::Warn);
        assert_eq!(r.detail("strength").and_then(|v| v.as_f64()), Some(1.0));

        // Ramp of 2 per pixel with an extra step of 1 at each block edge: ratio ~1.5.
        let ramp = jpeg_ctx_image(64, 64, |x, _| (2 * x + x / 8) as u8);
        let r = double_compression(&ctx_for(&ramp, Some(DetectedFormat::Jpeg))).unwrap();
        assert_eq!(r.status, Status::Info);
        let ratio = r.detail("ratio").and_then(|v| v.as_f64()).unwrap();
        assert!((ratio - 1.5).abs() < 1e-6, "ratio {}", ratio);

        let flat = jpeg_ctx_image(64, 64, |_, _| 77);
        let r = double_compression(&ctx_for(&flat, Some(DetectedFormat::Jpeg))).unwrap();
        assert_eq!(r.status, Status::Ok);
        assert_eq!(r.detail("ratio").and_then(|v| v.as_f64()), Some(1.0));
    }

    #[test]
    fn test_double_compression_too_small() {
        let tiny = jpeg_ctx_image(8, 8, |_, _| 10);
        let r = double_compression(&ctx_for(&tiny, Some(DetectedFormat::Jpeg))).unwrap();
        assert_eq!((r.status, r.confidence), (Status::Info, LOW_CONFIDENCE));
    }

    #[test]
    fn test_blocking_ratio_neutral_on_flat() {
        let plane = LumaPlane { width: 32, height: 32, data: vec![50.0; 32 * 32] };
        let stats = blocking_stats(&plane);
        assert_eq!(stats.samples, 9);
        assert_eq!(stats.ratio(), 1.0);
        assert!((stats.strength() - 0.2 / 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_blocking_grid_edges_saturate() {
        // Constant 8x8 tiles with alternating levels: edges only on the grid.
        let mut data = Vec::new();
        for y in 0..32usize {
            for x in 0..32usize {
                data.push(if ((x / 8) + (y / 8)) % 2 == 0 { 40.0 } else { 200.0 });
            }
        }
        let stats = blocking_stats(&LumaPlane { width: 32, height: 32, data });
        assert_eq!(stats.interior_mean, 0.0);
        assert_eq!(stats.strength(), 1.0);
    }
}
