//! The analysis pipeline.
//!
//! Per page: text (with OCR fallback), tables and wet signature candidates.
//! Once per document: digital signature fields. The stages never block one
//! another; each degrades on its own and records why.

use std::sync::Arc;

use rayon::prelude::*;

use crate::degrade::attempt;
use crate::detect::detect_format_from_bytes;
use crate::error::Result;
use crate::model::{
    AnalysisResult, Diagnostic, Stage, TableRecord, TextRecord, WetSignatureCandidate,
    WetSignatureSummary,
};
use crate::ocr::{OcrEngine, TesseractEngine};
use crate::options::AnalyzeOptions;
use crate::parser::{LopdfBackend, PdfBackend};
use crate::signature::{digital_signatures, WetSignatureLocator};
use crate::tables::TableExtractor;
use crate::text::TextExtractor;

/// Analyze a PDF with default options and the two tunable thresholds.
///
/// # Example
///
/// ```no_run
/// let bytes = std::fs::read("contract.pdf")?;
/// let result = pdfsig::analyze(&bytes, 1000, 0.02)?;
/// println!("{} pages", result.page_count());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn analyze(
    data: &[u8],
    ocr_threshold_chars: usize,
    density_threshold: f32,
) -> Result<AnalysisResult> {
    let options = AnalyzeOptions::new()
        .with_ocr_threshold(ocr_threshold_chars)
        .with_density_threshold(density_threshold);
    analyze_with_options(data, &options)
}

/// Analyze a PDF with custom options and the default OCR engine.
pub fn analyze_with_options(data: &[u8], options: &AnalyzeOptions) -> Result<AnalysisResult> {
    Analyzer::new().with_options(options.clone()).analyze(data)
}

/// Everything one page contributes to the result.
struct PageOutcome {
    text: TextRecord,
    tables: Vec<TableRecord>,
    wet: Vec<WetSignatureCandidate>,
    diagnostics: Vec<Diagnostic>,
}

/// Configurable analysis entry point.
///
/// ```no_run
/// use pdfsig::{AnalyzeOptions, Analyzer, DisabledOcr};
///
/// let analyzer = Analyzer::new()
///     .with_options(AnalyzeOptions::new().with_ocr_threshold(500).sequential())
///     .with_ocr_engine(DisabledOcr);
/// let result = analyzer.analyze(&std::fs::read("scan.pdf")?)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct Analyzer {
    options: AnalyzeOptions,
    ocr: Arc<dyn OcrEngine>,
}

impl Analyzer {
    /// Analyzer with default options and [`TesseractEngine`].
    pub fn new() -> Self {
        Self {
            options: AnalyzeOptions::default(),
            ocr: Arc::new(TesseractEngine::new()),
        }
    }

    pub fn with_options(mut self, options: AnalyzeOptions) -> Self {
        self.options = options;
        self
    }

    /// Use another OCR engine.
    pub fn with_ocr_engine(self, engine: impl OcrEngine + 'static) -> Self {
        self.with_shared_ocr_engine(Arc::new(engine))
    }

    /// Use an OCR engine shared with other analyzers.
    pub fn with_shared_ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = engine;
        self
    }

    pub fn options(&self) -> &AnalyzeOptions {
        &self.options
    }

    /// Analyze one document.
    ///
    /// Fails only when the input is empty or not a PDF. Everything else
    /// degrades into a partial result whose `diagnostics` say what was lost.
    pub fn analyze(&self, data: &[u8]) -> Result<AnalysisResult> {
        let format = detect_format_from_bytes(data)?;
        log::debug!("analyzing {} ({} bytes)", format, data.len());

        let mut diagnostics = Vec::new();
        let backend = attempt(Stage::Document, None, &mut diagnostics, || {
            LopdfBackend::load_bytes(data)
        });

        let mut result = AnalysisResult::default();
        let mut wet = Vec::new();
        if let Some(backend) = &backend {
            for outcome in self.analyze_pages(backend) {
                result.pages.push(outcome.text);
                result.tables.extend(outcome.tables);
                wet.extend(outcome.wet);
                diagnostics.extend(outcome.diagnostics);
            }
        }

        result.digital_signatures = digital_signatures(
            backend.as_ref().map(LopdfBackend::raw_doc),
            data,
            self.options.raw_signature_scan,
            &mut diagnostics,
        );
        result.wet_signature = WetSignatureSummary::from_details(wet);
        result.diagnostics = diagnostics;

        log::info!(
            "analyzed {} pages: {} tables, {} digital signatures, {} wet signatures, {} diagnostics",
            result.page_count(),
            result.tables.len(),
            result.digital_signatures.len(),
            result.wet_signature.wet_signatures_detected,
            result.diagnostics.len()
        );
        Ok(result)
    }

    /// Per-page outcomes in page order.
    fn analyze_pages(&self, backend: &LopdfBackend) -> Vec<PageOutcome> {
        let pages = backend.page_numbers();
        if self.options.parallel && pages.len() > 1 {
            pages
                .par_iter()
                .map(|&page_no| self.analyze_page(backend, page_no))
                .collect()
        } else {
            pages
                .iter()
                .map(|&page_no| self.analyze_page(backend, page_no))
                .collect()
        }
    }

    fn analyze_page(&self, backend: &LopdfBackend, page_no: u32) -> PageOutcome {
        let mut diagnostics = Vec::new();

        let text = TextExtractor::new(backend, &self.ocr, &self.options)
            .extract(page_no, &mut diagnostics);

        let tables = attempt(Stage::Tables, Some(page_no), &mut diagnostics, || {
            TableExtractor::new(backend).extract_page(page_no)
        })
        .unwrap_or_default();

        let wet = WetSignatureLocator::new(backend, &self.options)
            .locate_page(page_no, &mut diagnostics);

        PageOutcome {
            text,
            tables,
            wet,
            diagnostics,
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
