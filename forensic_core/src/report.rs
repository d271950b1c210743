//! Report Module
//!
//! Aggregated result of one run, the verdict derived from it, the portable export
//! form and a box-drawn text rendering for terminals.

use crate::check::{CheckResult, Details, Region, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stands in for every overlay raster in an exported report.
pub const OVERLAY_PLACEHOLDER: &str = "[overlay omitted]";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub ok: usize,
    pub warn: usize,
    pub fail: usize,
    pub info: usize,
}

impl StatusCounts {
    pub fn from_checks(checks: &[CheckResult]) -> Self {
        let mut counts = Self::default();
        for c in checks {
            match c.status {
                Status::Ok => counts.ok += 1,
                Status::Warn => counts.warn += 1,
                Status::Fail => counts.fail += 1,
                Status::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.ok + self.warn + self.fail + self.info
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Clean,
    Review,
    Suspicious,
}

impl Verdict {
    /// Depends on the counts alone.
    pub fn from_counts(counts: &StatusCounts) -> Self {
        if counts.fail > 0 || counts.warn >= 3 {
            Verdict::Suspicious
        } else if counts.warn > 0 {
            Verdict::Review
        } else {
            Verdict::Clean
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Clean => "clean",
            Verdict::Review => "review",
            Verdict::Suspicious => "suspicious",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub file_name: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub declared_mime: String,
    pub detected_mime: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Stage order.
    pub checks: Vec<CheckResult>,
    pub counts: StatusCounts,
    pub verdict: Verdict,
}

impl Report {
    pub fn check(&self, id: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.id == id)
    }

    /// Portable copy with every overlay replaced by [`OVERLAY_PLACEHOLDER`].
    pub fn export(&self) -> ExportedReport {
        ExportedReport {
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            width: self.width,
            height: self.height,
            declared_mime: self.declared_mime.clone(),
            detected_mime: self.detected_mime.clone(),
            timestamp: self.timestamp,
            checks: self.checks.iter().map(ExportedCheck::from).collect(),
            counts: self.counts,
            verdict: self.verdict,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export())
    }

    /// Multi-line box-drawn summary for terminals.
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        let rule = "═".repeat(BOX_WIDTH);
        let thin = "─".repeat(BOX_WIDTH);

        out.push_str(&format!("╔{}╗\n", rule));
        box_line(&mut out, &format!("Forensic report: {}", self.file_name));
        out.push_str(&format!("╠{}╣\n", rule));
        box_line(
            &mut out,
            &format!(
                "Size: {}   Dimensions: {}x{}",
                format_bytes(self.file_size),
                self.width,
                self.height
            ),
        );
        box_line(
            &mut out,
            &format!(
                "Declared: {}   Detected: {}",
                if self.declared_mime.is_empty() { "-" } else { self.declared_mime.as_str() },
                self.detected_mime.as_deref().unwrap_or("unknown")
            ),
        );
        box_line(&mut out, &format!("Analyzed: {}", self.timestamp.to_rfc3339()));
        out.push_str(&format!("╠{}╣\n", rule));

        for (i, c) in self.checks.iter().enumerate() {
            if i > 0 {
                out.push_str(&format!("╟{}╢\n", thin));
            }
            box_line(
                &mut out,
                &format!("{} {:<4} {} ({:.0}%)", status_marker(c.status), c.status.as_str(), c.name, c.confidence * 100.0),
            );
            box_line(&mut out, &format!("     {}", c.summary));
            if let Some(regions) = c.regions.as_ref().filter(|r| !r.is_empty()) {
                box_line(&mut out, &format!("     {} region(s) flagged", regions.len()));
            }
        }

        out.push_str(&format!("╠{}╣\n", rule));
        box_line(
            &mut out,
            &format!(
                "ok {}  warn {}  fail {}  info {}   Verdict: {}",
                self.counts.ok,
                self.counts.warn,
                self.counts.fail,
                self.counts.info,
                self.verdict.as_str().to_uppercase()
            ),
        );
        out.push_str(&format!("╚{}╝\n", rule));
        out
    }
}

const BOX_WIDTH: usize = 78;

fn box_line(out: &mut String, text: &str) {
    let inner = BOX_WIDTH - 2;
    let mut line: String = text.chars().take(inner).collect();
    let used = line.chars().count();
    line.extend(std::iter::repeat(' ').take(inner - used));
    out.push_str(&format!("║ {} ║\n", line));
}

fn status_marker(status: Status) -> char {
    match status {
        Status::Ok => '✓',
        Status::Warn => '!',
        Status::Fail => '✗',
        Status::Info => '·',
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Export form of a [`CheckResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedCheck {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub summary: String,
    pub details: Details,
    pub confidence: f64,
    pub caveats: String,
    pub overlay: Option<String>,
    pub regions: Option<Vec<Region>>,
}

impl From<&CheckResult> for ExportedCheck {
    fn from(c: &CheckResult) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            status: c.status,
            summary: c.summary.clone(),
            details: c.details.clone(),
            confidence: c.confidence,
            caveats: c.caveats.clone(),
            overlay: c.overlay.as_ref().map(|_| OVERLAY_PLACEHOLDER.to_string()),
            regions: c.regions.clone(),
        }
    }
}

/// Export form of a [`Report`]. The timestamp serializes as RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedReport {
    pub file_name: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub declared_mime: String,
    pub detected_mime: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<ExportedCheck>,
    pub counts: StatusCounts,
    pub verdict: Verdict,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use proptest::prelude::*;

    fn counts(ok: usize, warn: usize, fail: usize, info: usize) -> StatusCounts {
        StatusCounts { ok, warn, fail, info }
    }

    fn sample_report() -> Report {
        let checks = vec![
            CheckResult::new("file_type", "File type", Status::Ok, "Signature matches")
                .with_detail("detected_mime", "image/png")
                .with_confidence(0.95),
            CheckResult::new("noise_consistency", "Noise", Status::Warn, "2 outlier blocks")
                .with_detail("outlier_ratio", 0.2)
                .with_overlay(RgbaImage::new(4, 4))
                .with_regions(vec![Region::new(0, 0, 32, 32).labeled("z=3.10")]),
        ];
        let counts = StatusCounts::from_checks(&checks);
        Report {
            file_name: "a.png".into(),
            file_size: 1234,
            width: 4,
            height: 4,
            declared_mime: "image/png".into(),
            detected_mime: Some("image/png".into()),
            timestamp: Utc::now(),
            verdict: Verdict::from_counts(&counts),
            checks,
            counts,
        }
    }

    #[test]
    fn test_verdict_rules() {
        assert_eq!(Verdict::from_counts(&counts(5, 0, 0, 3)), Verdict::Clean);
        assert_eq!(Verdict::from_counts(&counts(5, 1, 0, 0)), Verdict::Review);
        assert_eq!(Verdict::from_counts(&counts(5, 2, 0, 0)), Verdict::Review);
        assert_eq!(Verdict::from_counts(&counts(0, 3, 0, 0)), Verdict::Suspicious);
        assert_eq!(Verdict::from_counts(&counts(9, 0, 1, 0)), Verdict::Suspicious);
    }

    #[test]
    fn test_export_replaces_overlays() {
        let report = sample_report();
        let exported = report.export();
        assert_eq!(exported.checks[0].overlay, None);
        assert_eq!(exported.checks[1].overlay.as_deref(), Some(OVERLAY_PLACEHOLDER));
        assert_eq!(exported.checks[1].regions, report.checks[1].regions);
    }

    #[test]
    fn test_export_json_reparses_equal() {
        let exported = sample_report().export();
        let json = serde_json::to_string(&exported).unwrap();
        let back: ExportedReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, exported);
        assert!(json.contains(r#""verdict":"review""#));
    }

    #[test]
    fn test_render_human_lines_are_aligned() {
        let text = sample_report().render_human();
        assert!(text.contains("Forensic report: a.png"));
        assert!(text.contains("Verdict: REVIEW"));
        let widths: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
        assert!(widths.iter().all(|&w| w == BOX_WIDTH + 2));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    proptest! {
        #[test]
        fn prop_verdict_is_pure_function_of_counts(
            ok in 0usize..20, warn in 0usize..6, fail in 0usize..3, info in 0usize..20,
        ) {
            let c = counts(ok, warn, fail, info);
            let v = Verdict::from_counts(&c);
            prop_assert_eq!(v, Verdict::from_counts(&counts(ok, warn, fail, info)));
            let expected = if fail > 0 || warn >= 3 {
                Verdict::Suspicious
            } else if warn > 0 {
                Verdict::Review
            } else {
                Verdict::Clean
            };
            prop_assert_eq!(v, expected);
        }

        #[test]
        fn prop_counts_sum_to_checks(statuses in prop::collection::vec(0u8..4, 0..40)) {
            let checks: Vec<CheckResult> = statuses
                .iter()
                .map(|s| {
                    let status = match s {
                        0 => Status::Ok,
                        1 => Status::Warn,
                        2 => Status::Fail,
                        _ => Status::Info,
                    };
                    CheckResult::new("x", "X", status, "")
                })
                .collect();
            prop_assert_eq!(StatusCounts::from_checks(&checks).total(), checks.len());
        }
    }
}
