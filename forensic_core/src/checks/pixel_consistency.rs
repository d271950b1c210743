//! Pixel Consistency Engine
//!
//! Noise-energy outliers (Laplacian), edge-strength distribution (Sobel) and
//! block-hash clone detection. All three read the shared luminance plane only.

use super::CheckContext;
use crate::check::{CheckResult, Region, Status, LOW_CONFIDENCE};
use crate::pixel_math::{block_hash, heatmap, laplacian_abs, mean_std, sobel_magnitude, LumaPlane};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NOISE_CONSISTENCY: &str = "noise_consistency";
pub const EDGE_CONSISTENCY: &str = "edge_consistency";
pub const CLONE_DETECTION: &str = "clone_detection";

const NOISE_BLOCK: usize = 32;
const NOISE_MIN_BLOCKS_PER_AXIS: usize = 3;
const NOISE_Z_THRESHOLD: f64 = 2.5;
const STRONG_EDGE_SIGMAS: f64 = 3.0;
const CLONE_MIN_SAMPLES_PER_AXIS: usize = 4;
/// Soft bound on recorded duplicate pairs; flat images otherwise pair quadratically.
/// Once reached, each further bucket records only its first pair.
pub const MAX_CLONE_PAIRS: usize = 5000;

pub fn noise_consistency(ctx: &CheckContext) -> CheckResult {
    let plane = &ctx.luma;
    let bx = plane.width / NOISE_BLOCK;
    let by = plane.height / NOISE_BLOCK;

    if bx < NOISE_MIN_BLOCKS_PER_AXIS || by < NOISE_MIN_BLOCKS_PER_AXIS {
        return CheckResult::new(
            NOISE_CONSISTENCY,
            "Noise consistency",
            Status::Info,
            "Skipped: image too small for 32px noise blocks (needs 3x3)",
        )
        .with_confidence(LOW_CONFIDENCE);
    }

    let lap = laplacian_abs(plane);
    let block_area = (NOISE_BLOCK * NOISE_BLOCK) as f64;
    let energies: Vec<f64> = (0..by)
        .flat_map(|j| (0..bx).map(move |i| (i, j)))
        .map(|(i, j)| {
            let mut sum = 0.0;
            for y in j * NOISE_BLOCK..(j + 1) * NOISE_BLOCK {
                let start = y * plane.width + i * NOISE_BLOCK;
                sum += lap[start..start + NOISE_BLOCK].iter().sum::<f64>();
            }
            sum / block_area
        })
        .collect();

    let (mean, std) = mean_std(&energies);
    let mut regions = Vec::new();
    if std > 0.0 {
        for (idx, &e) in energies.iter().enumerate() {
            let z = (e - mean).abs() / std;
            if z > NOISE_Z_THRESHOLD {
                let (i, j) = (idx % bx, idx / bx);
                regions.push(
                    Region::new(
                        (i * NOISE_BLOCK) as u32,
                        (j * NOISE_BLOCK) as u32,
                        NOISE_BLOCK as u32,
                        NOISE_BLOCK as u32,
                    )
                    .labeled(format!("z={:.2}", z)),
                );
            }
        }
    }

    let total = energies.len();
    let outliers = regions.len();
    let ratio = outliers as f64 / total as f64;
    let (status, summary) = if ratio > 0.15 {
        (Status::Warn, format!("{} of {} blocks have inconsistent noise levels", outliers, total))
    } else if ratio > 0.05 {
        (Status::Info, format!("{} of {} blocks deviate from the image noise level", outliers, total))
    } else {
        (Status::Ok, format!("Noise level is consistent ({} of {} blocks deviate)", outliers, total))
    };

    let max = lap.iter().cloned().fold(0.0, f64::max);
    let overlay = heatmap(&lap, plane.width as u32, plane.height as u32, max, ctx.palette);

    CheckResult::new(NOISE_CONSISTENCY, "Noise consistency", status, summary)
        .with_detail("block_size", NOISE_BLOCK)
        .with_detail("blocks", total)
        .with_detail("outlier_blocks", outliers)
        .with_detail("outlier_ratio", ratio)
        .with_detail("mean_energy", mean)
        .with_detail("energy_stddev", std)
        .with_detail("z_threshold", NOISE_Z_THRESHOLD)
        .with_confidence(0.5)
        .with_caveats("Texture changes (foliage next to sky, bokeh) also shift local noise energy.")
        .with_overlay(overlay)
        .with_regions(regions)
}

/// Strong-edge ratio. Informational only: there is no warn tier for this check.
pub fn edge_consistency(ctx: &CheckContext) -> CheckResult {
    let plane = &ctx.luma;
    let mag = sobel_magnitude(plane);

    let positive: Vec<f64> = mag.iter().copied().filter(|&m| m > 0.0).collect();
    let (mean, std) = mean_std(&positive);
    let threshold = mean + STRONG_EDGE_SIGMAS * std;
    let strong = if positive.is_empty() {
        0
    } else {
        mag.iter().filter(|&&m| m > threshold).count()
    };
    let ratio = if mag.is_empty() { 0.0 } else { strong as f64 / mag.len() as f64 };

    let (status, summary) = if ratio > 0.02 {
        (Status::Info, format!("{:.2}% of pixels are unusually strong edges", ratio * 100.0))
    } else {
        (Status::Ok, format!("Edge strength distribution looks ordinary ({:.2}% strong)", ratio * 100.0))
    };

    let max = mag.iter().cloned().fold(0.0, f64::max);
    let overlay = heatmap(&mag, plane.width as u32, plane.height as u32, max, ctx.palette);

    CheckResult::new(EDGE_CONSISTENCY, "Edge consistency", status, summary)
        .with_detail("mean_magnitude", mean)
        .with_detail("magnitude_stddev", std)
        .with_detail("strong_threshold", threshold)
        .with_detail("strong_edge_pixels", strong)
        .with_detail("strong_edge_ratio", ratio)
        .with_confidence(0.4)
        .with_caveats("Pasted objects often carry crisper edges, but so do text and line art.")
        .with_overlay(overlay)
}

/// Block size / stride presets for the clone scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneScanMode {
    #[default]
    Quick,
    Deep,
}

impl CloneScanMode {
    pub fn block_size(&self) -> usize {
        match self {
            CloneScanMode::Quick => 32,
            CloneScanMode::Deep => 16,
        }
    }

    pub fn stride(&self) -> usize {
        match self {
            CloneScanMode::Quick => 16,
            CloneScanMode::Deep => 8,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            CloneScanMode::Quick => 0.4,
            CloneScanMode::Deep => 0.6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloneScanMode::Quick => "quick",
            CloneScanMode::Deep => "deep",
        }
    }
}

type Pos = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClonePair {
    pub a: Pos,
    pub b: Pos,
}

#[derive(Debug, Clone, Default)]
pub struct CloneScan {
    pub sampled_blocks: usize,
    pub candidate_pairs: usize,
    pub truncated: bool,
    pub unique: Vec<ClonePair>,
}

fn sample_count(extent: usize, block: usize, stride: usize) -> usize {
    if extent < block {
        0
    } else {
        (extent - block) / stride + 1
    }
}

#[inline]
fn near(p: Pos, q: Pos, block: usize) -> bool {
    p.0.abs_diff(q.0) < block && p.1.abs_diff(q.1) < block
}

fn same_match(p: &ClonePair, q: &ClonePair, block: usize) -> bool {
    (near(p.a, q.a, block) && near(p.b, q.b, block)) || (near(p.a, q.b, block) && near(p.b, q.a, block))
}

/// Hash sampled blocks, pair identical hashes that are far enough apart, then collapse
/// pairs whose endpoints overlap an already-kept pair.
pub fn scan_clones(plane: &LumaPlane, mode: CloneScanMode) -> Option<CloneScan> {
    let (bs, st) = (mode.block_size(), mode.stride());
    let nx = sample_count(plane.width, bs, st);
    let ny = sample_count(plane.height, bs, st);
    if nx < CLONE_MIN_SAMPLES_PER_AXIS || ny < CLONE_MIN_SAMPLES_PER_AXIS {
        return None;
    }

    let positions: Vec<Pos> = (0..ny)
        .flat_map(|j| (0..nx).map(move |i| (i * st, j * st)))
        .collect();
    let hashes: Vec<u32> = positions
        .par_iter()
        .map(|&(x, y)| block_hash(plane, x, y, bs))
        .collect();

    let mut buckets: BTreeMap<u32, Vec<Pos>> = BTreeMap::new();
    for (pos, h) in positions.iter().zip(hashes) {
        buckets.entry(h).or_default().push(*pos);
    }

    let min_dist_sq = (2 * bs * 2 * bs) as f64;
    let mut pairs = Vec::new();
    let mut truncated = false;
    // Past the cap each remaining bucket still records its first far-apart pair.
    for group in buckets.values().filter(|g| g.len() >= 2) {
        let mut recorded = false;
        'group: for (k, &a) in group.iter().enumerate() {
            for &b in &group[k + 1..] {
                let dx = a.0 as f64 - b.0 as f64;
                let dy = a.1 as f64 - b.1 as f64;
                if dx * dx + dy * dy > min_dist_sq {
                    if recorded && pairs.len() >= MAX_CLONE_PAIRS {
                        truncated = true;
                        break 'group;
                    }
                    pairs.push(ClonePair { a, b });
                    recorded = true;
                }
            }
        }
    }

    let mut unique: Vec<ClonePair> = Vec::new();
    for p in &pairs {
        if !unique.iter().any(|u| same_match(p, u, bs)) {
            unique.push(*p);
        }
    }

    Some(CloneScan {
        sampled_blocks: positions.len(),
        candidate_pairs: pairs.len(),
        truncated,
        unique,
    })
}

fn clone_regions(unique: &[ClonePair], block: usize) -> Vec<Region> {
    let mut kept: Vec<Pos> = Vec::new();
    let mut regions = Vec::new();
    for (n, pair) in unique.iter().enumerate() {
        for p in [pair.a, pair.b] {
            if kept.iter().any(|&k| near(k, p, block)) {
                continue;
            }
            kept.push(p);
            regions.push(
                Region::new(p.0 as u32, p.1 as u32, block as u32, block as u32)
                    .labeled(format!("match {}", n + 1)),
            );
        }
    }
    regions
}

pub fn clone_detection(plane: &LumaPlane, mode: CloneScanMode) -> CheckResult {
    let Some(scan) = scan_clones(plane, mode) else {
        return CheckResult::new(
            CLONE_DETECTION,
            "Clone detection",
            Status::Info,
            format!(
                "Skipped: image too small for a {} clone scan (needs 4x4 sampled blocks)",
                mode.as_str()
            ),
        )
        .with_detail("mode", mode.as_str())
        .with_confidence(LOW_CONFIDENCE);
    };

    let matches = scan.unique.len();
    let (status, summary) = if matches > 10 {
        (Status::Warn, format!("{} duplicated block pairs found", matches))
    } else if matches > 0 {
        (Status::Info, format!("{} duplicated block pair(s) found", matches))
    } else {
        (Status::Ok, "No duplicated blocks found".to_string())
    };

    CheckResult::new(CLONE_DETECTION, "Clone detection", status, summary)
        .with_detail("mode", mode.as_str())
        .with_detail("block_size", mode.block_size())
        .with_detail("stride", mode.stride())
        .with_detail("sampled_blocks", scan.sampled_blocks)
        .with_detail("candidate_pairs", scan.candidate_pairs)
        .with_detail("unique_matches", matches)
        .with_detail("truncated", scan.truncated)
        .with_confidence(mode.confidence())
        .with_caveats("Repeating textures and flat regions produce legitimate duplicate blocks.")
        .with_regions(clone_regions(&scan.unique, mode.block_size()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ImageBuffer;
    use crate::pixel_math::HeatmapPalette;
    use image::{Rgba, RgbaImage};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise_image(w: u32, h: u32, seed: u64) -> RgbaImage {
        let mut rng = StdRng::seed_from_u64(seed);
        RgbaImage::from_fn(w, h, |_, _| Rgba([rng.gen(), rng.gen(), rng.gen(), 255]))
    }

    fn copy_block(img: &mut RgbaImage, from: (u32, u32), to: (u32, u32), size: u32) {
        for dy in 0..size {
            for dx in 0..size {
                let p = *img.get_pixel(from.0 + dx, from.1 + dy);
                img.put_pixel(to.0 + dx, to.1 + dy, p);
            }
        }
    }

    #[test]
    fn test_clone_scan_finds_copied_block() {
        let mut img = noise_image(256, 256, 7);
        copy_block(&mut img, (16, 16), (160, 176), 32);
        let plane = LumaPlane::from_rgba(&img);
        let r = clone_detection(&plane, CloneScanMode::Quick);
        let matches = r.detail("unique_matches").and_then(|v| v.as_f64()).unwrap();
        assert!(matches >= 1.0, "expected a match, got {}", matches);
        assert_ne!(r.status, Status::Ok);
        assert!(r.regions.as_ref().is_some_and(|v| v.len() >= 2));
    }

    #[test]
    fn test_clone_scan_pure_noise_has_no_matches() {
        for seed in [1u64, 2, 3] {
            let plane = LumaPlane::from_rgba(&noise_image(256, 256, seed));
            let r = clone_detection(&plane, CloneScanMode::Quick);
            assert_eq!(r.status, Status::Ok, "seed {}", seed);
            assert_eq!(r.detail("unique_matches").and_then(|v| v.as_f64()), Some(0.0));
        }
    }

    #[test]
    fn test_clone_scan_skips_small_images() {
        let plane = LumaPlane::from_rgba(&noise_image(60, 300, 1));
        let r = clone_detection(&plane, CloneScanMode::Quick);
        assert_eq!((r.status, r.confidence), (Status::Info, LOW_CONFIDENCE));
        // Deep mode samples more densely and fits.
        let r = clone_detection(&plane, CloneScanMode::Deep);
        assert_eq!(r.confidence, 0.6);
    }

    #[test]
    fn test_clone_pairs_capped_on_flat_image() {
        let plane = LumaPlane { width: 512, height: 512, data: vec![90.0; 512 * 512] };
        let scan = scan_clones(&plane, CloneScanMode::Quick).unwrap();
        assert!(scan.truncated);
        assert_eq!(scan.candidate_pairs, MAX_CLONE_PAIRS);
        assert!(!scan.unique.is_empty());
    }

    #[test]
    fn test_cap_keeps_copied_block_beside_flat_area() {
        for seed in 0u64..12 {
            let mut img = noise_image(512, 512, seed);
            for y in 0..512 {
                for x in 0..256 {
                    img.put_pixel(x, y, Rgba([128, 128, 128, 255]));
                }
            }
            copy_block(&mut img, (288, 32), (416, 416), 32);
            let plane = LumaPlane::from_rgba(&img);
            let scan = scan_clones(&plane, CloneScanMode::Quick).unwrap();
            assert!(scan.truncated, "seed {}", seed);
            let found = scan.unique.iter().any(|p| {
                let ends = [p.a, p.b];
                ends.contains(&(288, 32)) && ends.contains(&(416, 416))
            });
            assert!(found, "copied block lost behind flat bucket, seed {}", seed);
        }
    }

    #[test]
    fn test_clone_warns_on_many_matches() {
        let mut img = noise_image(512, 512, 21);
        // Twelve source blocks on the top rows, each copied to the bottom rows.
        for n in 0..12u32 {
            let x = (n % 6) * 80;
            let y = (n / 6) * 64;
            copy_block(&mut img, (x, y), (x, 384 + y), 32);
        }
        let plane = LumaPlane::from_rgba(&img);
        let r = clone_detection(&plane, CloneScanMode::Quick);
        let matches = r.detail("unique_matches").and_then(|v| v.as_f64()).unwrap();
        assert!(matches > 10.0, "got {}", matches);
        assert_eq!(r.status, Status::Warn);
    }

    #[test]
    fn test_near_pairs_collapse() {
        let p = ClonePair { a: (0, 0), b: (200, 200) };
        let q = ClonePair { a: (216, 200), b: (16, 0) };
        assert!(same_match(&p, &q, 32));
        assert!(!same_match(&p, &ClonePair { a: (0, 0), b: (300, 0) }, 32));
    }

    fn ctx_image(img: RgbaImage) -> ImageBuffer {
        ImageBuffer::from_pixels("n.png", "image/png", img)
    }

    #[test]
    fn test_noise_skip_when_too_small() {
        let buf = ctx_image(noise_image(95, 200, 3));
        let ctx = CheckContext::new(&buf, None, HeatmapPalette::Thermal);
        let r = noise_consistency(&ctx);
        assert_eq!((r.status, r.confidence), (Status::Info, LOW_CONFIDENCE));
        assert!(r.overlay.is_none());
    }

    #[test]
    fn test_noise_flags_smooth_patch_in_noise() {
        let mut img = noise_image(320, 320, 11);
        for y in 96..128 {
            for x in 96..128 {
                img.put_pixel(x, y, Rgba([128, 128, 128, 255]));
            }
        }
        let buf = ctx_image(img);
        let ctx = CheckContext::new(&buf, None, HeatmapPalette::Thermal);
        let r = noise_consistency(&ctx);
        let regions = r.regions.clone().unwrap();
        assert!(regions.iter().any(|g| g.x == 96 && g.y == 96));
        assert!(regions[0].label.as_deref().unwrap().starts_with("z="));
        assert_eq!(r.overlay.unwrap().dimensions(), (320, 320));
    }

    #[test]
    fn test_edge_has_no_warn_tier() {
        // Sparse bright dots: few strong edges relative to background, and a dense grid.
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            if x % 4 == 0 && y % 4 == 0 { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 255]) }
        });
        let buf = ctx_image(img);
        let ctx = CheckContext::new(&buf, None, HeatmapPalette::Thermal);
        let r = edge_consistency(&ctx);
        assert_ne!(r.status, Status::Warn);
        assert_eq!(r.overlay.unwrap().dimensions(), (64, 64));
    }

    #[test]
    fn test_edge_flat_image_is_ok() {
        let buf = ctx_image(RgbaImage::from_pixel(40, 40, Rgba([9, 9, 9, 255])));
        let ctx = CheckContext::new(&buf, None, HeatmapPalette::Thermal);
        let r = edge_consistency(&ctx);
        assert_eq!(r.status, Status::Ok);
        assert_eq!(r.detail("strong_edge_pixels").and_then(|v| v.as_f64()), Some(0.0));
    }

    #[test]
    fn test_palette_does_not_change_findings() {
        let buf = ctx_image(noise_image(128, 128, 5));
        let thermal = CheckContext::new(&buf, None, HeatmapPalette::Thermal);
        let gray = CheckContext::new(&buf, None, HeatmapPalette::Grayscale);
        for (a, b) in [
            (noise_consistency(&thermal), noise_consistency(&gray)),
            (edge_consistency(&thermal), edge_consistency(&gray)),
        ] {
            assert_eq!(a.status, b.status);
            assert_eq!(a.summary, b.summary);
            assert_eq!(a.details, b.details);
            assert_ne!(a.overlay, b.overlay);
        }
    }
}
