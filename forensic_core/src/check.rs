//! Check result model shared by every analyzer.
//!
//! A `CheckResult` carries an ordered detail map. Insertion order is kept through
//! serialization so that exported reports are byte-for-byte reproducible.

use image::RgbaImage;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Warn => "warn",
            Status::Fail => "fail",
            Status::Info => "info",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar detail value. Non-finite numbers are stored as `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl DetailValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DetailValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DetailValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailValue::Null => f.write_str("-"),
            DetailValue::Bool(b) => write!(f, "{}", b),
            DetailValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            DetailValue::Number(n) => write!(f, "{:.4}", n),
            DetailValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for DetailValue {
    fn from(v: f64) -> Self {
        if v.is_finite() {
            DetailValue::Number(v)
        } else {
            DetailValue::Null
        }
    }
}

impl From<u32> for DetailValue {
    fn from(v: u32) -> Self {
        DetailValue::Number(v as f64)
    }
}

impl From<u64> for DetailValue {
    fn from(v: u64) -> Self {
        DetailValue::Number(v as f64)
    }
}

impl From<usize> for DetailValue {
    fn from(v: usize) -> Self {
        DetailValue::Number(v as f64)
    }
}

impl From<u8> for DetailValue {
    fn from(v: u8) -> Self {
        DetailValue::Number(v as f64)
    }
}

impl From<bool> for DetailValue {
    fn from(v: bool) -> Self {
        DetailValue::Bool(v)
    }
}

impl From<&str> for DetailValue {
    fn from(v: &str) -> Self {
        DetailValue::Text(v.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(v: String) -> Self {
        DetailValue::Text(v)
    }
}

impl<T: Into<DetailValue>> From<Option<T>> for DetailValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(DetailValue::Null)
    }
}

/// Insertion-ordered string-keyed map. Re-inserting a key replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Details {
    entries: IndexMap<String, DetailValue>,
}

impl Details {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DetailValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&DetailValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DetailValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rectangle of interest in source-pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            label: None,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Confidence assigned to results produced by a failing or skipped computation.
pub const LOW_CONFIDENCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub summary: String,
    pub details: Details,
    pub confidence: f64,
    pub caveats: String,
    /// Same dimensions as the source image. Independently owned.
    pub overlay: Option<RgbaImage>,
    pub regions: Option<Vec<Region>>,
}

impl CheckResult {
    pub fn new(id: &str, name: &str, status: Status, summary: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            status,
            summary: summary.into(),
            details: Details::new(),
            confidence: 0.5,
            caveats: String::new(),
            overlay: None,
            regions: None,
        }
    }

    /// Informational result for a computation that failed at its own boundary.
    pub fn failed(id: &str, name: &str, error: &str) -> Self {
        Self::new(id, name, Status::Info, format!("Check could not complete: {}", error))
            .with_detail("error", error)
            .with_confidence(LOW_CONFIDENCE)
            .with_caveats(error)
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key, value);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_caveats(mut self, caveats: impl Into<String>) -> Self {
        self.caveats = caveats.into();
        self
    }

    pub fn with_overlay(mut self, overlay: RgbaImage) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn detail(&self, key: &str) -> Option<&DetailValue> {
        self.details.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_keep_insertion_order() {
        let mut d = Details::new();
        d.insert("zeta", 1.0);
        d.insert("alpha", "x");
        d.insert("mid", true);
        d.insert("zeta", 2.0);
        let keys: Vec<_> = d.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(d.get("zeta"), Some(&DetailValue::Number(2.0)));
    }

    #[test]
    fn test_details_json_order_survives_reparse() {
        let mut d = Details::new();
        d.insert("b", 1u32);
        d.insert("a", DetailValue::Null);
        d.insert("c", "text");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"b":1.0,"a":null,"c":"text"}"#);
        let back: Details = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_non_finite_becomes_null() {
        assert_eq!(DetailValue::from(f64::NAN), DetailValue::Null);
        assert_eq!(DetailValue::from(f64::INFINITY), DetailValue::Null);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let r = CheckResult::new("x", "X", Status::Ok, "s").with_confidence(1.7);
        assert_eq!(r.confidence, 1.0);
        let r = r.with_confidence(-0.2);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn test_failed_result_shape() {
        let r = CheckResult::failed("ela", "Error level analysis", "encoder missing");
        assert_eq!(r.status, Status::Info);
        assert_eq!(r.confidence, LOW_CONFIDENCE);
        assert_eq!(r.detail("error").and_then(|v| v.as_str()), Some("encoder missing"));
    }
}
