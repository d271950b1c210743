//! Byte Sniffer
//!
//! Detects image formats from magic bytes without trusting file names or declared
//! mime types, and inspects container markers for animation.

use serde::{Deserialize, Serialize};

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF_MAGIC: &[u8] = b"GIF8";
const RIFF_MAGIC: &[u8] = b"RIFF";
const WEBP_TAG: &[u8] = b"WEBP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectedFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl DetectedFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            DetectedFormat::Jpeg => "image/jpeg",
            DetectedFormat::Png => "image/png",
            DetectedFormat::Gif => "image/gif",
            DetectedFormat::WebP => "image/webp",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedFormat::Jpeg => "JPEG",
            DetectedFormat::Png => "PNG",
            DetectedFormat::Gif => "GIF",
            DetectedFormat::WebP => "WebP",
        }
    }

    /// Format implied by a (lower-case, dot-less) file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" | "jpe" | "jfif" => Some(DetectedFormat::Jpeg),
            "png" => Some(DetectedFormat::Png),
            "gif" => Some(DetectedFormat::Gif),
            "webp" => Some(DetectedFormat::WebP),
            _ => None,
        }
    }
}

/// Normalise a declared mime type for comparison (`image/jpg` is treated as `image/jpeg`).
pub fn normalize_mime(mime: &str) -> String {
    let m = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match m.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => m,
    }
}

/// Sniff the format from the leading bytes. Returns `None` when nothing matches.
pub fn detect_format(data: &[u8]) -> Option<DetectedFormat> {
    if data.starts_with(JPEG_MAGIC) {
        return Some(DetectedFormat::Jpeg);
    }
    if data.starts_with(PNG_MAGIC) {
        return Some(DetectedFormat::Png);
    }
    if data.starts_with(GIF_MAGIC) {
        return Some(DetectedFormat::Gif);
    }
    if data.len() >= 12 && data.starts_with(RIFF_MAGIC) && &data[8..12] == WEBP_TAG {
        return Some(DetectedFormat::WebP);
    }
    None
}

pub mod gif {
    /// Graphic Control Extension introducer + label.
    const GCE: [u8; 2] = [0x21, 0xF9];

    pub fn count_control_extensions(data: &[u8]) -> usize {
        data.windows(2).filter(|w| *w == GCE).count()
    }

    pub fn is_animated_from_bytes(data: &[u8]) -> bool {
        count_control_extensions(data) > 1
    }
}

pub mod webp {
    pub fn is_animated_from_bytes(data: &[u8]) -> bool {
        data.windows(4).any(|w| w == b"ANIM")
    }

    pub fn count_frames_from_bytes(data: &[u8]) -> usize {
        data.windows(4).filter(|w| *w == b"ANMF").count()
    }
}

/// Container-level animation facts. `None` for formats that cannot animate here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationProbe {
    pub animated: bool,
    /// GCE count for GIF, ANMF count for WebP.
    pub marker_count: usize,
}

pub fn probe_animation(format: DetectedFormat, data: &[u8]) -> Option<AnimationProbe> {
    match format {
        DetectedFormat::Gif => Some(AnimationProbe {
            animated: gif::is_animated_from_bytes(data),
            marker_count: gif::count_control_extensions(data),
        }),
        DetectedFormat::WebP => Some(AnimationProbe {
            animated: webp::is_animated_from_bytes(data),
            marker_count: webp::count_frames_from_bytes(data),
        }),
        DetectedFormat::Jpeg | DetectedFormat::Png => None,
    }
}
