//! Error-Level Analysis
//!
//! Difference between the decoded image and a fixed-quality JPEG round trip of itself.

use super::CheckContext;
use crate::check::{CheckResult, Status, LOW_CONFIDENCE};
use crate::img_errors::Result;
use crate::pixel_math::heatmap;
use image::RgbaImage;

pub const ELA: &str = "ela";
const NAME: &str = "Error level analysis";

/// Re-encode quality used for the round trip.
pub const ELA_QUALITY: f32 = 0.9;
const WARN_STDDEV: f64 = 20.0;
const VISUAL_GAIN: f64 = 2.0;

pub const ELA_CAVEAT: &str = "ELA is prone to false positives: images that were already \
recompressed, re-uploaded through social media, or that contain large smooth regions show \
uneven error levels without any editing.";

#[derive(Debug, Clone, PartialEq)]
pub struct ElaStats {
    pub mean: f64,
    pub max: f64,
    pub stddev: f64,
    /// Per-pixel mean absolute RGB difference, row-major.
    pub diffs: Vec<f64>,
}

/// Per-pixel average of |dR|, |dG|, |dB| with running mean, max and standard deviation.
pub fn ela_statistics(original: &RgbaImage, recompressed: &RgbaImage) -> ElaStats {
    let mut diffs = Vec::with_capacity((original.width() * original.height()) as usize);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut max = 0.0f64;

    for (a, b) in original.pixels().zip(recompressed.pixels()) {
        let d = (0..3)
            .map(|c| (a[c] as f64 - b[c] as f64).abs())
            .sum::<f64>()
            / 3.0;
        sum += d;
        sum_sq += d * d;
        max = max.max(d);
        diffs.push(d);
    }

    let n = diffs.len().max(1) as f64;
    let mean = sum / n;
    let stddev = (sum_sq / n - mean * mean).max(0.0).sqrt();
    ElaStats { mean, max, stddev, diffs }
}

/// Scale by `255 / max` (1 when max is zero), apply the visual gain, cap at 255.
pub fn ela_visual(stats: &ElaStats, width: u32, height: u32, ctx: &CheckContext) -> RgbaImage {
    let scale = if stats.max > 0.0 { 255.0 / stats.max } else { 1.0 };
    let scaled: Vec<f64> = stats
        .diffs
        .iter()
        .map(|d| (d * scale * VISUAL_GAIN).min(255.0))
        .collect();
    heatmap(&scaled, width, height, 255.0, ctx.palette)
}

fn reencode_failed(msg: String) -> CheckResult {
    CheckResult::new(ELA, NAME, Status::Info, format!("Re-encode failed: {}", msg))
        .with_detail("applicable", true)
        .with_detail("error", msg.as_str())
        .with_confidence(LOW_CONFIDENCE)
        .with_caveats(format!("{} {}", msg, ELA_CAVEAT))
}

/// `reencoded` is the outcome of the external round trip; `None` means it was not
/// attempted because the input is not a JPEG.
pub fn error_level(ctx: &CheckContext, reencoded: Option<&Result<RgbaImage>>) -> CheckResult {
    let reencoded = match reencoded {
        Some(r) if ctx.is_jpeg() => r,
        _ => {
            return CheckResult::new(
                ELA,
                NAME,
                Status::Info,
                "Not applicable: error-level analysis only runs on JPEG input",
            )
            .with_detail("applicable", false)
            .with_confidence(0.9)
            .with_caveats(ELA_CAVEAT);
        }
    };

    let pixels = &ctx.buffer.pixels;
    let recompressed = match reencoded {
        Ok(img) if img.dimensions() == pixels.dimensions() => img,
        Ok(img) => {
            return reencode_failed(format!(
                "re-encoded image is {}x{}, source is {}x{}",
                img.width(),
                img.height(),
                pixels.width(),
                pixels.height()
            ))
        }
        Err(e) => return reencode_failed(e.to_string()),
    };

    let stats = ela_statistics(pixels, recompressed);
    let overlay = ela_visual(&stats, pixels.width(), pixels.height(), ctx);

    let (status, summary) = if stats.stddev > WARN_STDDEV {
        (
            Status::Warn,
            format!("Uneven error levels (stddev {:.1}); inspect bright regions", stats.stddev),
        )
    } else {
        (
            Status::Info,
            format!("Error levels are fairly even (stddev {:.1})", stats.stddev),
        )
    };

    CheckResult::new(ELA, NAME, status, summary)
        .with_detail("applicable", true)
        .with_detail("quality", (ELA_QUALITY * 100.0).round() as u32)
        .with_detail("mean_diff", stats.mean)
        .with_detail("max_diff", stats.max)
        .with_detail("stddev", stats.stddev)
        .with_confidence(0.4)
        .with_caveats(ELA_CAVEAT)
        .with_overlay(overlay)
}
