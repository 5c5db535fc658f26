//! Page text: normalization and the native-or-OCR decision.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::degrade::{attempt, with_timeout};
use crate::error::Result;
use crate::model::{Diagnostic, Stage, TextRecord, TextSource};
use crate::ocr::OcrEngine;
use crate::options::AnalyzeOptions;
use crate::parser::{LayoutAnalyzer, LopdfBackend, PdfBackend, Rasterizer, TextLine};

static HORIZONTAL_WS: OnceLock<Regex> = OnceLock::new();
static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
static ANY_WS: OnceLock<Regex> = OnceLock::new();

fn horizontal_ws() -> &'static Regex {
    HORIZONTAL_WS.get_or_init(|| Regex::new(r"[ \t]+").expect("valid regex"))
}

fn blank_lines() -> &'static Regex {
    BLANK_LINES.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

fn any_ws() -> &'static Regex {
    ANY_WS.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Canonicalize extracted text.
///
/// Carriage returns become newlines, runs of spaces and tabs become one
/// space, three or more newlines become a paragraph break, and the result
/// is trimmed. Idempotent.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let text = raw.replace('\r', "\n");
    let text = horizontal_ws().replace_all(&text, " ");
    let text = blank_lines().replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Collapse every whitespace run to one space and trim.
///
/// Used for short metadata strings such as signer names.
pub(crate) fn collapse_whitespace(raw: &str) -> String {
    any_ws().replace_all(raw, " ").trim().to_string()
}

/// Native text of one page, one layout line per text line.
///
/// Falls back to lopdf's plain extraction when the layout pass fails.
pub fn native_text(backend: &dyn PdfBackend, page_no: u32) -> Result<String> {
    match LayoutAnalyzer::new(backend).extract_page_lines(page_no) {
        Ok(lines) => Ok(lines.iter().map(TextLine::text).collect::<Vec<_>>().join("\n")),
        Err(err) => {
            log::debug!(
                "layout extraction failed on page {}: {}, using plain extraction",
                page_no,
                err
            );
            backend.simple_text(page_no)
        }
    }
}

/// Decide between native text and OCR for one page.
///
/// OCR runs only when the normalized native text has fewer than `threshold`
/// characters, and its output wins only when it is strictly longer. An OCR
/// failure keeps the native text and records a diagnostic.
pub(crate) fn select_text<F>(
    page_no: u32,
    native_raw: &str,
    threshold: usize,
    diagnostics: &mut Vec<Diagnostic>,
    ocr: F,
) -> TextRecord
where
    F: FnOnce() -> Result<String>,
{
    let native = normalize(native_raw);
    let native_len = native.chars().count();
    if native_len >= threshold {
        return TextRecord::new(page_no, native, TextSource::Native);
    }

    log::debug!(
        "page {}: {} native chars below threshold {}, trying OCR",
        page_no,
        native_len,
        threshold
    );
    if let Some(raw) = attempt(Stage::Ocr, Some(page_no), diagnostics, ocr) {
        let recognized = normalize(&raw);
        if recognized.chars().count() > native_len {
            return TextRecord::new(page_no, recognized, TextSource::Ocr);
        }
    }
    TextRecord::new(page_no, native, TextSource::Native)
}

/// Produces one [`TextRecord`] per page.
pub struct TextExtractor<'a> {
    backend: &'a LopdfBackend,
    ocr: &'a Arc<dyn OcrEngine>,
    options: &'a AnalyzeOptions,
}

impl<'a> TextExtractor<'a> {
    pub fn new(
        backend: &'a LopdfBackend,
        ocr: &'a Arc<dyn OcrEngine>,
        options: &'a AnalyzeOptions,
    ) -> Self {
        Self {
            backend,
            ocr,
            options,
        }
    }

    /// Text of one page. Never fails; degraded steps land in `diagnostics`.
    pub fn extract(&self, page_no: u32, diagnostics: &mut Vec<Diagnostic>) -> TextRecord {
        let native = attempt(Stage::Text, Some(page_no), diagnostics, || {
            native_text(self.backend, page_no)
        })
        .unwrap_or_default();

        select_text(
            page_no,
            &native,
            self.options.ocr_threshold_chars,
            diagnostics,
            || self.ocr_page(page_no),
        )
    }

    fn ocr_page(&self, page_no: u32) -> Result<String> {
        let backend = self.backend.clone();
        let scale = self.options.render_scale;
        let page = with_timeout(self.options.render_timeout, move || {
            Rasterizer::new(&backend).render_page(page_no, scale)
        })?;
        let gray = image::imageops::grayscale(&page);

        let engine = Arc::clone(self.ocr);
        log::debug!(
            "page {}: running {} on {}x{} image",
            page_no,
            engine.name(),
            gray.width(),
            gray.height()
        );
        with_timeout(self.options.ocr_timeout, move || engine.recognize(&gray))
    }
}
