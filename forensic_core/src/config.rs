//! Pipeline configuration.

use serde::{Deserialize, Serialize};

pub use crate::checks::pixel_consistency::CloneScanMode;
pub use crate::pixel_math::HeatmapPalette;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Block size / stride used by the clone detector during a normal run.
    pub clone_scan: CloneScanMode,
    /// Colour mapping for overlays. Never changes statuses or details.
    pub palette: HeatmapPalette,
    /// When false, overlays are dropped from results before the report is built.
    pub include_overlays: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clone_scan: CloneScanMode::Quick,
            palette: HeatmapPalette::Thermal,
            include_overlays: true,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clone_scan(mut self, mode: CloneScanMode) -> Self {
        self.clone_scan = mode;
        self
    }

    pub fn with_palette(mut self, palette: HeatmapPalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_overlays(mut self, include: bool) -> Self {
        self.include_overlays = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.clone_scan, CloneScanMode::Quick);
        assert_eq!(cfg.palette, HeatmapPalette::Thermal);
        assert!(cfg.include_overlays);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"clone_scan":"deep"}"#).unwrap();
        assert_eq!(cfg, PipelineConfig::new().with_clone_scan(CloneScanMode::Deep));
    }
}
