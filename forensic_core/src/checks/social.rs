//! Social-media re-upload heuristic.
//!
//! Sharing platforms strip metadata, resize to a handful of fixed long-edge widths,
//! recompress aggressively and favour a few crop ratios. Each of those leaves a
//! weak signal; the score simply adds them up.

use crate::check::{CheckResult, Status};

pub const SOCIAL_REUPLOAD: &str = "social_reupload";
const NAME: &str = "Social media re-upload";

/// Long-edge sizes produced by common platforms. Matching stops at the first
/// satisfied entry, so the order is part of the output.
pub const PLATFORM_WIDTHS: &[u32] = &[
    1080, 1350, 2048, 1600, 1200, 1280, 1920, 720, 960, 640, 1440, 800, 4096,
];

const NEAR_PX: u32 = 10;
const SQUARE_TOLERANCE: f64 = 0.01;
const CROP_TOLERANCE: f64 = 0.02;

pub const MAX_SCORE: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReuploadScore {
    pub score: u32,
    pub signals: Vec<String>,
}

impl ReuploadScore {
    fn add(&mut self, points: u32, signal: String) {
        self.score += points;
        self.signals.push(signal);
    }
}

fn near(ratio: f64, target: f64, tolerance: f64) -> bool {
    (ratio - target).abs() <= tolerance
}

/// Additive score over metadata, dimensions, JPEG quality and aspect ratio.
///
/// `jpeg_quality` is the estimate from the compression stage, `None` for
/// non-JPEG input or when the table could not be read.
pub fn reupload_score(width: u32, height: u32, exif_present: bool, jpeg_quality: Option<f64>) -> ReuploadScore {
    let mut s = ReuploadScore::default();

    if !exif_present {
        s.add(2, "no EXIF metadata".to_string());
    }

    let long_edge = width.max(height);
    for &w in PLATFORM_WIDTHS {
        if w == long_edge {
            s.add(2, format!("long edge {}px matches a platform size", w));
            break;
        }
        if w.abs_diff(long_edge) <= NEAR_PX {
            s.add(1, format!("long edge {}px is close to platform size {}px", long_edge, w));
            break;
        }
    }

    if let Some(q) = jpeg_quality {
        if q < 85.0 {
            s.add(1, format!("JPEG quality {:.0} below 85", q));
        }
        if q < 70.0 {
            s.add(1, format!("JPEG quality {:.0} below 70", q));
        }
    }

    if height > 0 {
        let ratio = width as f64 / height as f64;
        if near(ratio, 1.0, SQUARE_TOLERANCE) {
            s.add(1, "square 1:1 crop".to_string());
        }
        if near(ratio, 4.0 / 5.0, CROP_TOLERANCE) || near(ratio, 5.0 / 4.0, CROP_TOLERANCE) {
            s.add(1, "4:5 portrait/landscape crop".to_string());
        }
        if near(ratio, 16.0 / 9.0, CROP_TOLERANCE) || near(ratio, 9.0 / 16.0, CROP_TOLERANCE) {
            s.add(1, "16:9 crop".to_string());
        }
    }
    s
}

pub fn social_reupload(width: u32, height: u32, exif_present: bool, jpeg_quality: Option<f64>) -> CheckResult {
    let scored = reupload_score(width, height, exif_present, jpeg_quality);

    let (status, summary, confidence) = if scored.score >= 4 {
        (Status::Info, "Image is likely reshared from a social platform", 0.7)
    } else if scored.score >= 2 {
        (Status::Info, "Some signs of social-media resharing", 0.5)
    } else {
        (Status::Ok, "No strong indicators of social-media resharing", 0.4)
    };

    CheckResult::new(SOCIAL_REUPLOAD, NAME, status, summary)
        .with_detail("score", scored.score)
        .with_detail("max_score", MAX_SCORE)
        .with_detail("signals", scored.signals.join("; "))
        .with_confidence(confidence)
        .with_caveats("Re-upload signals are circumstantial and say nothing about whether content was edited.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_signals_stack() {
        let s = reupload_score(1080, 1080, false, Some(60.0));
        assert_eq!(s.score, 7);
        assert_eq!(s.signals.len(), 5);
        let r = social_reupload(1080, 1080, false, Some(60.0));
        assert_eq!((r.status, r.confidence), (Status::Info, 0.7));
        assert_eq!(r.detail("max_score").and_then(|v| v.as_f64()), Some(8.0));
    }

    #[test]
    fn test_near_width_scores_one() {
        let s = reupload_score(1284, 700, true, None);
        assert_eq!(s.score, 1);
        assert!(s.signals[0].contains("1280"));
    }

    #[test]
    fn test_exact_match_scores_two() {
        let s = reupload_score(1350, 1000, true, None);
        assert_eq!(s.score, 2);
        assert!(s.signals[0].contains("matches"));
    }

    #[test]
    fn test_quality_thresholds_are_cumulative() {
        assert_eq!(reupload_score(3000, 2000, true, Some(90.0)).score, 0);
        assert_eq!(reupload_score(3000, 2000, true, Some(80.0)).score, 1);
        assert_eq!(reupload_score(3000, 2000, true, Some(50.0)).score, 2);
    }

    #[test]
    fn test_aspect_ratio_signals() {
        assert_eq!(reupload_score(3000, 3020, true, None).score, 1);
        assert_eq!(reupload_score(2400, 3000, true, None).score, 1);
        assert_eq!(reupload_score(3200, 1800, true, None).score, 1);
        assert_eq!(reupload_score(3000, 2000, true, None).score, 0);
    }

    #[test]
    fn test_status_tiers() {
        let r = social_reupload(3000, 2000, true, Some(95.0));
        assert_eq!((r.status, r.confidence), (Status::Ok, 0.4));
        let r = social_reupload(3000, 2000, false, None);
        assert_eq!((r.status, r.confidence), (Status::Info, 0.5));
    }
}
