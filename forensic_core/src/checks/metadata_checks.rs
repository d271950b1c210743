//! Metadata stage: EXIF presence and editing-software signatures.

use crate::check::{CheckResult, Status};
use crate::metadata::ExifRecord;

pub const EXIF_PRESENCE: &str = "exif_presence";
pub const EDITING_SOFTWARE: &str = "editing_software";

/// Date fields in the order they are preferred (capture time first).
const DATE_FIELDS: &[&str] = &["DateTimeOriginal", "DateTimeDigitized", "CreateDate", "DateTime"];

/// Lower-case substrings of known editors and retouching apps.
pub const KNOWN_EDITORS: &[&str] = &[
    "photoshop",
    "lightroom",
    "gimp",
    "affinity",
    "pixelmator",
    "snapseed",
    "facetune",
    "picsart",
    "canva",
    "vsco",
    "paint.net",
    "paintshop",
    "corel",
    "capture one",
    "luminar",
    "darktable",
    "rawtherapee",
    "fotor",
    "befunky",
    "photoscape",
    "meitu",
    "airbrush",
    "photopea",
];

/// Substrings typical of in-camera or phone firmware software tags.
const DEVICE_KEYWORDS: &[&str] = &[
    "camera", "firmware", "iphone", "ios", "android", "galaxy", "pixel", "canon", "nikon",
    "sony", "fujifilm", "olympus", "panasonic", "dji", "gopro", "ver.",
];

fn present(exif: Option<&ExifRecord>) -> Option<&ExifRecord> {
    exif.filter(|r| !r.is_empty())
}

pub fn exif_presence(exif: Option<&ExifRecord>) -> CheckResult {
    let Some(record) = present(exif) else {
        return CheckResult::new(
            EXIF_PRESENCE,
            "EXIF metadata",
            Status::Info,
            "No EXIF metadata found",
        )
        .with_detail("fields", 0usize)
        .with_confidence(0.8)
        .with_caveats("Many platforms and editors strip EXIF; absence alone is not evidence of editing.");
    };

    let make = record.get("Make");
    let model = record.get("Model");
    let date = DATE_FIELDS
        .iter()
        .find_map(|key| record.get(key).map(|v| (*key, v)));

    let device = match (make, model) {
        (Some(make), Some(model)) if model.starts_with(make) => model.to_string(),
        (Some(make), Some(model)) => format!("{} {}", make, model),
        (Some(one), None) | (None, Some(one)) => one.to_string(),
        (None, None) => "unknown device".to_string(),
    };
    let summary = match date {
        Some((_, when)) => format!("EXIF present: {}, dated {}", device, when),
        None => format!("EXIF present: {}, no capture date", device),
    };

    CheckResult::new(EXIF_PRESENCE, "EXIF metadata", Status::Ok, summary)
        .with_detail("fields", record.len())
        .with_detail("make", make)
        .with_detail("model", model)
        .with_detail("date", date.map(|(_, v)| v))
        .with_detail("date_source", date.map(|(k, _)| k))
        .with_detail(
            "has_gps",
            record.get("GPSLatitude").is_some() && record.get("GPSLongitude").is_some(),
        )
        .with_confidence(0.9)
}

pub fn editing_software(exif: Option<&ExifRecord>) -> CheckResult {
    let Some(software) = present(exif).and_then(|r| r.get("Software")) else {
        return CheckResult::new(
            EDITING_SOFTWARE,
            "Editing software",
            Status::Info,
            "No software tag recorded",
        )
        .with_confidence(0.6);
    };

    let lower = software.to_lowercase();
    let matched: Vec<&str> = KNOWN_EDITORS
        .iter()
        .copied()
        .filter(|name| lower.contains(name))
        .collect();

    let result = if !matched.is_empty() {
        CheckResult::new(
            EDITING_SOFTWARE,
            "Editing software",
            Status::Warn,
            format!("Saved by editing software: {}", matched.join(", ")),
        )
        .with_detail("matched", matched.join(", "))
        .with_confidence(0.75)
    } else if DEVICE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        CheckResult::new(
            EDITING_SOFTWARE,
            "Editing software",
            Status::Ok,
            format!("Camera/device software: {}", software),
        )
        .with_confidence(0.7)
    } else {
        CheckResult::new(
            EDITING_SOFTWARE,
            "Editing software",
            Status::Ok,
            format!("Unknown software: {}", software),
        )
        .with_confidence(0.7)
    };

    result.with_detail("software", software)
}
