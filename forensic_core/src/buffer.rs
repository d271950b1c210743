//! Per-run image snapshot.

use image::RgbaImage;

/// What a caller submits: raw bytes plus the name and mime type it claims.
#[derive(Debug, Clone)]
pub struct Submission {
    pub file_name: String,
    pub declared_mime: String,
    pub bytes: Vec<u8>,
}

impl Submission {
    pub fn new(file_name: impl Into<String>, declared_mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            declared_mime: declared_mime.into(),
            bytes,
        }
    }
}

/// Immutable input shared read-only by every check of a run.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pub file_name: String,
    pub declared_mime: String,
    pub byte_size: u64,
    pub pixels: RgbaImage,
    pub bytes: Vec<u8>,
}

impl ImageBuffer {
    pub fn new(submission: Submission, pixels: RgbaImage) -> Self {
        Self {
            byte_size: submission.bytes.len() as u64,
            file_name: submission.file_name,
            declared_mime: submission.declared_mime,
            pixels,
            bytes: submission.bytes,
        }
    }

    /// Buffer without backing file bytes, used by pixel-only tests and rescans.
    pub fn from_pixels(file_name: &str, declared_mime: &str, pixels: RgbaImage) -> Self {
        Self {
            file_name: file_name.to_string(),
            declared_mime: declared_mime.to_string(),
            byte_size: 0,
            pixels,
            bytes: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        let buf = ImageBuffer::from_pixels("Holiday.JPEG", "image/jpeg", RgbaImage::new(1, 1));
        assert_eq!(buf.extension().as_deref(), Some("jpeg"));
        let buf = ImageBuffer::from_pixels("noext", "", RgbaImage::new(1, 1));
        assert_eq!(buf.extension(), None);
    }

    #[test]
    fn test_byte_size_from_submission() {
        let sub = Submission::new("a.png", "image/png", vec![0u8; 42]);
        let buf = ImageBuffer::new(sub, RgbaImage::new(2, 3));
        assert_eq!(buf.byte_size, 42);
        assert_eq!((buf.width(), buf.height()), (2, 3));
    }
}
