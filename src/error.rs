//! Error types for pdfsig library.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pdfsig operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF analysis.
///
/// Only [`Error::EmptyInput`], [`Error::UnknownFormat`] and
/// [`Error::UnsupportedVersion`] ever escape [`crate::analyze`]; every other
/// variant is caught inside the pipeline and recorded as a diagnostic.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading files or talking to an external process.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input contained no bytes at all.
    #[error("Empty input: no document bytes were supplied")]
    EmptyInput,

    /// The input is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted and cannot be opened with an empty password.
    #[error("Document is encrypted")]
    Encrypted,

    /// The PDF structure is corrupted or malformed.
    #[error("Corrupted PDF structure: {0}")]
    Corrupted(String),

    /// A required PDF object is missing.
    #[error("Missing required object: {0}")]
    MissingObject(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Error while rasterizing a page or region.
    #[error("Rendering error: {0}")]
    Render(String),

    /// A region had no area left after clipping to the page.
    #[error("Region is empty after clipping to page bounds")]
    EmptyRegion,

    /// The OCR engine failed or is unavailable.
    #[error("OCR error: {0}")]
    Ocr(String),

    /// A bounded operation did not finish in time.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Render(err.to_string())
    }
}

impl Error {
    /// Whether this error must abort the whole analysis.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::EmptyInput | Error::UnknownFormat | Error::UnsupportedVersion(_)
        )
    }
}
