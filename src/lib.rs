//! # pdfsig
//!
//! PDF analysis for document intake: per-page text with an OCR fallback,
//! best-effort tables, digital signature fields and wet-ink signatures.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfsig::{analyze, render};
//!
//! fn main() -> pdfsig::Result<()> {
//!     let bytes = std::fs::read("contract.pdf")?;
//!     let result = analyze(&bytes, 1000, 0.02)?;
//!
//!     println!("{}", render::to_json(&result, render::JsonFormat::Pretty)?);
//!     Ok(())
//! }
//! ```
//!
//! ## What it does
//!
//! - **Text**: native text per page; pages with little of it are rasterized
//!   and OCR'd, and the longer of the two wins
//! - **Tables**: column grids detected from text alignment
//! - **Digital signatures**: `/Sig` fields of the AcroForm tree, with a
//!   raw-byte marker scan when the tree is missing or broken
//! - **Wet signatures**: ink density next to labels such as "Signed by"
//! - **Graceful degradation**: only empty or non-PDF input is an error;
//!   everything else lands in `diagnostics`

pub mod detect;
pub mod error;
pub mod model;
pub mod ocr;
pub mod options;
pub mod parser;
pub mod render;
pub mod signature;
pub mod tables;
pub mod text;

mod degrade;
mod pipeline;

#[cfg(test)]
mod fixtures;

// Re-export commonly used types
pub use degrade::with_timeout;
pub use detect::{detect_format_from_bytes, is_pdf_bytes, PdfFormat};
pub use error::{Error, Result};
pub use model::{
    AnalysisResult, Diagnostic, InkRegion, PageBox, PdfTimestamp, Rect, SignatureField,
    SignedField, Stage, TableRecord, TextRecord, TextSource, WetSignatureCandidate,
    WetSignatureSummary,
};
pub use ocr::{DisabledOcr, OcrEngine, TesseractEngine};
pub use options::{AnalyzeOptions, RegionGeometry, DEFAULT_LABELS, DEFAULT_OCR_TIMEOUT};
pub use pipeline::{analyze, analyze_with_options, Analyzer};
pub use render::JsonFormat;

use std::io::Read;
use std::path::Path;

/// Analyze a PDF file with default options.
///
/// # Example
///
/// ```no_run
/// let result = pdfsig::analyze_file("contract.pdf").unwrap();
/// println!("signed fields: {}", result.has_digital_signature());
/// ```
pub fn analyze_file<P: AsRef<Path>>(path: P) -> Result<AnalysisResult> {
    let data = std::fs::read(path)?;
    Analyzer::new().analyze(&data)
}

/// Analyze a PDF read from `reader`.
pub fn analyze_reader<R: Read>(mut reader: R, options: &AnalyzeOptions) -> Result<AnalysisResult> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    analyze_with_options(&data, options)
}

/// Analyze a PDF and render the result as JSON.
pub fn analyze_to_json(data: &[u8], options: &AnalyzeOptions, format: JsonFormat) -> Result<String> {
    let result = analyze_with_options(data, options)?;
    render::to_json(&result, format)
}

/// Get the library version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
