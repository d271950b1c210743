//! Forensics Error Types
//!
//! One error enum for the whole analysis engine. Only a few variants are fatal to a
//! run; the rest are caught at a check boundary and turned into an informational result.

use crate::pipeline::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForensicsError {
    #[error("Image format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Check '{check}' failed: {reason}")]
    CheckFailed { check: &'static str, reason: String },

    #[error("Re-encode failed: {0}")]
    Reencode(String),

    #[error("Metadata extraction failed: {0}")]
    Metadata(String),

    #[error("Analysis cancelled before stage {0:?}")]
    Cancelled(Stage),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),
}

impl ForensicsError {
    /// Fatal errors abort the run; the caller gets no partial report.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ForensicsError::UnsupportedFormat(_)
                | ForensicsError::Cancelled(_)
                | ForensicsError::IoError(_)
        )
    }

    pub fn check(check: &'static str, reason: impl Into<String>) -> Self {
        ForensicsError::CheckFailed {
            check,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForensicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ForensicsError::UnsupportedFormat("x".into()).is_fatal());
        assert!(ForensicsError::Cancelled(Stage::Pixel).is_fatal());
        assert!(!ForensicsError::Reencode("boom".into()).is_fatal());
        assert!(!ForensicsError::check("noise_consistency", "empty").is_fatal());
        assert!(!ForensicsError::Metadata("bad ifd".into()).is_fatal());
    }

    #[test]
    fn test_check_failed_message() {
        let err = ForensicsError::check("clone_detection", "overflow");
        assert_eq!(
            err.to_string(),
            "Check 'clone_detection' failed: overflow"
        );
    }
}
