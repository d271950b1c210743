//! File / container stage: signature vs. claimed type, animation, basic properties.

use crate::buffer::ImageBuffer;
use crate::check::{CheckResult, DetailValue, Status};
use crate::image_formats::{normalize_mime, probe_animation, DetectedFormat};

pub const FILE_TYPE: &str = "file_type";
pub const ANIMATION: &str = "animation";
pub const FILE_PROPERTIES: &str = "file_properties";

/// Signature check. Priority: unknown signature, declared mime mismatch, extension
/// mismatch, then ok.
pub fn file_type(buffer: &ImageBuffer, detected: Option<DetectedFormat>) -> CheckResult {
    let declared = normalize_mime(&buffer.declared_mime);
    let extension = buffer.extension();
    let implied = extension.as_deref().and_then(DetectedFormat::from_extension);

    let base = |status, summary: String| {
        CheckResult::new(FILE_TYPE, "File type", status, summary)
            .with_detail("detected_mime", detected.map(|f| f.mime()))
            .with_detail(
                "declared_mime",
                if declared.is_empty() { DetailValue::Null } else { declared.clone().into() },
            )
            .with_detail("extension", extension.clone())
    };

    let Some(format) = detected else {
        return base(
            Status::Warn,
            "Could not verify file type: no known signature found".to_string(),
        )
        .with_confidence(0.5);
    };

    if !declared.is_empty() && declared != format.mime() {
        return base(
            Status::Warn,
            format!(
                "Content is {} but was declared as {}",
                format.mime(),
                declared
            ),
        )
        .with_detail("mismatch", "declared_mime")
        .with_confidence(0.9);
    }

    if let Some(ext_format) = implied {
        if ext_format != format {
            return base(
                Status::Warn,
                format!(
                    "Extension .{} does not match detected {}",
                    extension.as_deref().unwrap_or_default(),
                    format.as_str()
                ),
            )
            .with_detail("mismatch", "extension")
            .with_confidence(0.8);
        }
    }

    base(Status::Ok, format!("Signature matches {}", format.as_str())).with_confidence(0.95)
}

/// Animation markers. Omitted for formats other than GIF and WebP.
pub fn animation(detected: Option<DetectedFormat>, bytes: &[u8]) -> Option<CheckResult> {
    let format = detected?;
    let probe = probe_animation(format, bytes)?;

    let (status, summary) = if probe.animated {
        (Status::Info, format!("Animated {}; only the first frame is analyzed", format.as_str()))
    } else {
        (Status::Ok, format!("Single-frame {}", format.as_str()))
    };

    Some(
        CheckResult::new(ANIMATION, "Animation", status, summary)
            .with_detail("format", format.as_str())
            .with_detail("animated", probe.animated)
            .with_detail("marker_count", probe.marker_count)
            .with_confidence(0.9),
    )
}

fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}

pub fn file_properties(buffer: &ImageBuffer) -> CheckResult {
    let (w, h) = (buffer.width(), buffer.height());
    let aspect = if h > 0 { w as f64 / h as f64 } else { 0.0 };
    let megapixels = (w as f64 * h as f64) / 1_000_000.0;
    let has_alpha = buffer.pixels.pixels().any(|p| p[3] < 255);

    let note = if w < 100 || h < 100 {
        "thumbnail-like dimensions"
    } else if w > 8000 || h > 8000 {
        "very high resolution"
    } else {
        "standard dimensions"
    };

    CheckResult::new(
        FILE_PROPERTIES,
        "File properties",
        Status::Info,
        format!("{}x{} px, {:.2} MP, {}", w, h, megapixels, note),
    )
    .with_detail("width", w)
    .with_detail("height", h)
    .with_detail("bytes", buffer.byte_size)
    .with_detail("aspect_ratio", round_to(aspect, 4))
    .with_detail("has_alpha", has_alpha)
    .with_detail("megapixels", round_to(megapixels, 2))
    .with_detail("size_note", note)
    .with_confidence(1.0)
}
