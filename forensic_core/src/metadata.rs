//! Metadata extraction boundary.
//!
//! The pipeline only sees a flat, ordered key/value `ExifRecord`. Parsing is done by an
//! injected `MetadataExtractor`; the default one reads the primary IFD with kamadak-exif.

use crate::img_errors::{ForensicsError, Result};
use indexmap::IndexMap;
use std::io::Cursor;

/// Flat EXIF record in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifRecord {
    fields: IndexMap<String, String>,
}

impl ExifRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    /// Non-blank value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Raw bytes -> optional EXIF record.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Option<ExifRecord>>;
}

/// Extractor for callers that have no metadata source.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadata;

impl MetadataExtractor for NoMetadata {
    fn extract(&self, _bytes: &[u8]) -> Result<Option<ExifRecord>> {
        Ok(None)
    }
}

/// kamadak-exif backed extractor. Containers without EXIF yield `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifReader;

/// Tag name aliases so downstream heuristics can use the familiar short names.
fn canonical_tag_name(name: &str) -> &str {
    match name {
        "PhotographicSensitivity" | "ISOSpeedRatings" => "ISO",
        other => other,
    }
}

impl MetadataExtractor for ExifReader {
    fn extract(&self, bytes: &[u8]) -> Result<Option<ExifRecord>> {
        let mut cursor = Cursor::new(bytes);
        let parsed = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(parsed) => parsed,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(ForensicsError::Metadata(e.to_string())),
        };

        let mut record = ExifRecord::new();
        for field in parsed.fields().filter(|f| f.ifd_num == exif::In::PRIMARY) {
            let name = field.tag.to_string();
            let value = match &field.value {
                exif::Value::Ascii(parts) => parts
                    .first()
                    .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())
                    .unwrap_or_default(),
                _ => field.display_value().with_unit(&parsed).to_string(),
            };
            record.insert(canonical_tag_name(&name), value);
        }

        Ok(if record.is_empty() { None } else { Some(record) })
    }
}
