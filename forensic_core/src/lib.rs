//! forensic_core - image forensics triage engine
//!
//! Takes the raw bytes of one image plus the name and mime type it was submitted
//! with, runs a fixed sequence of heuristic checks (container, metadata,
//! compression, pixel statistics, error-level analysis, re-upload signals) and
//! returns a [`Report`] with per-check results and an overall verdict.
//!
//! ```no_run
//! use forensic_core::{CancelToken, NullProgress, Pipeline, PipelineConfig, Submission};
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let report = pipeline
//!     .analyze(&Submission::new("photo.jpg", "image/jpeg", bytes), &NullProgress, &CancelToken::new())
//!     .unwrap();
//! println!("{}", report.render_human());
//! ```

pub mod buffer;
pub mod check;
pub mod checks;
pub mod codec;
pub mod config;
pub mod image_formats;
pub mod image_jpeg_analysis;
pub mod img_errors;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod pixel_math;
pub mod report;


pub use buffer::{ImageBuffer, Submission};
pub use check::{CheckResult, DetailValue, Details, Region, Status, LOW_CONFIDENCE};
pub use codec::{ImageCrateCodec, ImageLoader, Reencoder};
pub use config::{CloneScanMode, HeatmapPalette, PipelineConfig};
pub use image_formats::{detect_format, DetectedFormat};
pub use img_errors::{ForensicsError, Result};
pub use metadata::{ExifReader, ExifRecord, MetadataExtractor, NoMetadata};
pub use pipeline::{CancelToken, NullProgress, Pipeline, ProgressSink, Stage};
pub use report::{ExportedCheck, ExportedReport, Report, StatusCounts, Verdict, OVERLAY_PLACEHOLDER};
