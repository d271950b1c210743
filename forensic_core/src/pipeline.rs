//! Pipeline Orchestrator
//!
//! Runs the checks of one image in a fixed stage order and folds the results into a
//! [`Report`]:
//!
//! 1. file / container
//! 2. metadata
//! 3. compression
//! 4. pixel consistency
//! 5. error-level analysis
//! 6. social re-upload (reads the EXIF record and the compression stage's quality)
//!
//! Metadata extraction and the ELA re-encode are the only calls into external
//! collaborators; they run concurrently before the stages start. Cancellation is
//! honoured between stages only.

use crate::buffer::{ImageBuffer, Submission};
use crate::check::CheckResult;
use crate::checks::compression::{double_compression, jpeg_quality, uniform_areas, DOUBLE_COMPRESSION, JPEG_QUALITY, UNIFORM_AREAS};
use crate::checks::ela::{error_level, ELA, ELA_QUALITY};
use crate::checks::file_checks::{animation, file_properties, file_type, ANIMATION, FILE_PROPERTIES, FILE_TYPE};
use crate::checks::metadata_checks::{editing_software, exif_presence, EDITING_SOFTWARE, EXIF_PRESENCE};
use crate::checks::pixel_consistency::{
    clone_detection, edge_consistency, noise_consistency, CLONE_DETECTION, EDGE_CONSISTENCY, NOISE_CONSISTENCY,
};
use crate::checks::social::{social_reupload, SOCIAL_REUPLOAD};
use crate::checks::{guarded, CheckContext};
use crate::codec::{ImageCrateCodec, ImageLoader, Reencoder};
use crate::config::{CloneScanMode, PipelineConfig};
use crate::image_formats::{detect_format, DetectedFormat};
use crate::img_errors::{ForensicsError, Result};
use crate::metadata::{ExifReader, ExifRecord, MetadataExtractor};
use crate::pixel_math::LumaPlane;
use crate::report::{Report, StatusCounts, Verdict};
use chrono::Utc;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    File,
    Metadata,
    Compression,
    Pixel,
    ErrorLevel,
    Social,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::File,
        Stage::Metadata,
        Stage::Compression,
        Stage::Pixel,
        Stage::ErrorLevel,
        Stage::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::File => "file",
            Stage::Metadata => "metadata",
            Stage::Compression => "compression",
            Stage::Pixel => "pixel",
            Stage::ErrorLevel => "error_level",
            Stage::Social => "social",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives stage checkpoints. Both hooks default to no-ops.
pub trait ProgressSink: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    /// `emitted` is the number of results the stage added to the report.
    fn stage_finished(&self, _stage: Stage, _emitted: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// Shared cancellation flag, polled before each stage.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Pipeline {
    loader: Box<dyn ImageLoader>,
    reencoder: Box<dyn Reencoder>,
    metadata: Box<dyn MetadataExtractor>,
    config: PipelineConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

/// Run an external collaborator, turning a panic into an error built by `on_panic`.
fn contain<T>(what: &str, f: impl FnOnce() -> Result<T>, on_panic: fn(String) -> ForensicsError) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| Err(on_panic(format!("{} panicked", what))))
}

impl Pipeline {
    /// Pipeline backed by the `image` crate codec and the kamadak-exif reader.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            loader: Box::new(ImageCrateCodec),
            reencoder: Box::new(ImageCrateCodec),
            metadata: Box::new(ExifReader),
            config,
        }
    }

    pub fn with_loader(mut self, loader: impl ImageLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_reencoder(mut self, reencoder: impl Reencoder + 'static) -> Self {
        self.reencoder = Box::new(reencoder);
        self
    }

    pub fn with_metadata_extractor(mut self, extractor: impl MetadataExtractor + 'static) -> Self {
        self.metadata = Box::new(extractor);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decode a submission and analyze it. Decode failure is the only way a started
    /// run ends without a report, apart from cancellation.
    pub fn analyze(&self, submission: &Submission, progress: &dyn ProgressSink, cancel: &CancelToken) -> Result<Report> {
        if cancel.is_cancelled() {
            return Err(ForensicsError::Cancelled(Stage::File));
        }
        let pixels = self.decode(&submission.bytes).map_err(|e| {
            warn!(file = %submission.file_name, error = %e, "decode failed");
            e
        })?;
        let buffer = ImageBuffer::new(submission.clone(), pixels);
        self.analyze_buffer(&buffer, progress, cancel)
    }

    /// Decode with the configured loader. Any loader error is reported as unsupported.
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbaImage> {
        match contain("image loader", || self.loader.decode(bytes), ForensicsError::UnsupportedFormat) {
            Ok(pixels) => Ok(pixels),
            Err(e @ ForensicsError::UnsupportedFormat(_)) => Err(e),
            Err(other) => Err(ForensicsError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Analyze an already decoded buffer.
    pub fn analyze_buffer(&self, buffer: &ImageBuffer, progress: &dyn ProgressSink, cancel: &CancelToken) -> Result<Report> {
        let start = Instant::now();
        let detected = detect_format(&buffer.bytes);
        debug!(
            file = %buffer.file_name,
            detected = ?detected,
            width = buffer.width(),
            height = buffer.height(),
            "analysis started"
        );

        let (exif, reencoded) = rayon::join(
            || self.extract_metadata(&buffer.bytes),
            || {
                (detected == Some(DetectedFormat::Jpeg)).then(|| {
                    contain(
                        "re-encoder",
                        || self.reencoder.reencode_jpeg(&buffer.pixels, ELA_QUALITY),
                        ForensicsError::Reencode,
                    )
                })
            },
        );

        let ctx = CheckContext::new(buffer, detected, self.config.palette);
        let mut checks: Vec<CheckResult> = Vec::new();

        run_stage(Stage::File, progress, cancel, &mut checks, |out| {
            out.extend(guarded(FILE_TYPE, "File type", || Ok(Some(file_type(buffer, detected)))));
            out.extend(guarded(ANIMATION, "Animation", || Ok(animation(detected, &buffer.bytes))));
            out.extend(guarded(FILE_PROPERTIES, "File properties", || Ok(Some(file_properties(buffer)))));
        })?;

        run_stage(Stage::Metadata, progress, cancel, &mut checks, |out| {
            out.extend(guarded(EXIF_PRESENCE, "EXIF metadata", || Ok(Some(exif_presence(exif.as_ref())))));
            out.extend(guarded(EDITING_SOFTWARE, "Editing software", || {
                Ok(Some(editing_software(exif.as_ref())))
            }));
        })?;

        let mut quality = None;
        run_stage(Stage::Compression, progress, cancel, &mut checks, |out| {
            let estimate = guarded(JPEG_QUALITY, "JPEG quality", || Ok(jpeg_quality(&ctx)));
            quality = estimate
                .as_ref()
                .and_then(|r| r.detail("quality"))
                .and_then(|v| v.as_f64());
            out.extend(estimate);
            out.extend(guarded(DOUBLE_COMPRESSION, "Double compression", || Ok(double_compression(&ctx))));
            out.extend(guarded(UNIFORM_AREAS, "Uniform areas", || Ok(Some(uniform_areas(&ctx)))));
        })?;

        let mode = self.config.clone_scan;
        run_stage(Stage::Pixel, progress, cancel, &mut checks, |out| {
            out.extend(guarded(NOISE_CONSISTENCY, "Noise consistency", || Ok(Some(noise_consistency(&ctx)))));
            out.extend(guarded(EDGE_CONSISTENCY, "Edge consistency", || Ok(Some(edge_consistency(&ctx)))));
            out.extend(guarded(CLONE_DETECTION, "Clone detection", || {
                Ok(Some(clone_detection(&ctx.luma, mode)))
            }));
        })?;

        run_stage(Stage::ErrorLevel, progress, cancel, &mut checks, |out| {
            out.extend(guarded(ELA, "Error level analysis", || Ok(Some(error_level(&ctx, reencoded.as_ref())))));
        })?;

        let exif_present = exif.as_ref().is_some_and(|r| !r.is_empty());
        run_stage(Stage::Social, progress, cancel, &mut checks, |out| {
            out.extend(guarded(SOCIAL_REUPLOAD, "Social media re-upload", || {
                Ok(Some(social_reupload(buffer.width(), buffer.height(), exif_present, quality)))
            }));
        })?;

        if !self.config.include_overlays {
            for c in &mut checks {
                c.overlay = None;
            }
        }

        let counts = StatusCounts::from_checks(&checks);
        let verdict = Verdict::from_counts(&counts);
        info!(
            file = %buffer.file_name,
            checks = checks.len(),
            warn = counts.warn,
            fail = counts.fail,
            verdict = %verdict,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "analysis complete"
        );

        Ok(Report {
            file_name: buffer.file_name.clone(),
            file_size: buffer.byte_size,
            width: buffer.width(),
            height: buffer.height(),
            declared_mime: buffer.declared_mime.clone(),
            detected_mime: detected.map(|f| f.mime().to_string()),
            timestamp: Utc::now(),
            checks,
            counts,
            verdict,
        })
    }

    /// Deep clone scan on demand. Returns a standalone result; no report is touched.
    pub fn rescan_clones(&self, buffer: &ImageBuffer) -> CheckResult {
        let mode = CloneScanMode::Deep;
        info!(file = %buffer.file_name, mode = mode.as_str(), "clone rescan");
        guarded(CLONE_DETECTION, "Clone detection", || {
            let plane = LumaPlane::from_rgba(&buffer.pixels);
            Ok(Some(clone_detection(&plane, mode)))
        })
        .unwrap_or_else(|| CheckResult::failed(CLONE_DETECTION, "Clone detection", "rescan produced no result"))
    }

    /// Extractor failures never reach the caller; they read as "no metadata".
    fn extract_metadata(&self, bytes: &[u8]) -> Option<ExifRecord> {
        if bytes.is_empty() {
            return None;
        }
        match contain("metadata extractor", || self.metadata.extract(bytes), ForensicsError::Metadata) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "metadata extraction failed, continuing without EXIF");
                None
            }
        }
    }
}

fn run_stage(
    stage: Stage,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
    checks: &mut Vec<CheckResult>,
    body: impl FnOnce(&mut Vec<CheckResult>),
) -> Result<()> {
    if cancel.is_cancelled() {
        info!(stage = %stage, "analysis cancelled");
        return Err(ForensicsError::Cancelled(stage));
    }
    progress.stage_started(stage);
    let before = checks.len();
    let start = Instant::now();
    body(checks);
    let emitted = checks.len() - before;
    debug!(stage = %stage, emitted, elapsed_ms = start.elapsed().as_millis() as u64, "stage finished");
    progress.stage_finished(stage, emitted);
    Ok(())
}
