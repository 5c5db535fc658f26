//! OCR engines.
//!
//! The pipeline treats OCR as an opaque and fallible service: it hands over
//! a grayscale page image and gets text back. Any error degrades the page to
//! its native text.

mod tesseract;

pub use tesseract::TesseractEngine;

use image::GrayImage;

use crate::error::{Error, Result};

/// Recognizes text in a rasterized page.
pub trait OcrEngine: Send + Sync {
    /// Recognize the text in `image`.
    fn recognize(&self, image: &GrayImage) -> Result<String>;

    /// Short engine name used in logs.
    fn name(&self) -> &str;
}

/// An engine that never recognizes anything.
///
/// Every call fails with [`Error::Ocr`], so pages keep their native text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn recognize(&self, _image: &GrayImage) -> Result<String> {
        Err(Error::Ocr("OCR is disabled".to_string()))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_engine_fails() {
        let image = GrayImage::new(4, 4);
        let err = DisabledOcr.recognize(&image).unwrap_err();
        assert!(matches!(err, Error::Ocr(_)));
        assert_eq!(DisabledOcr.name(), "disabled");
    }
}
