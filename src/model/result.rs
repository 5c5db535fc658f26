//! The top-level analysis result.

use serde::Serialize;

use super::{SignatureField, TableRecord, TextRecord, WetSignatureSummary};

/// Pipeline stage a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Document,
    Text,
    Ocr,
    Tables,
    Signatures,
    WetSignature,
}

/// A recoverable failure recorded while analyzing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    /// Page the failure happened on, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, page: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            stage,
            page,
            message: message.into(),
        }
    }
}

/// Everything [`crate::analyze`] learned about one document.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AnalysisResult {
    /// One record per page, in page order
    pub pages: Vec<TextRecord>,
    /// Tables in page then discovery order
    pub tables: Vec<TableRecord>,
    /// Signature fields in AcroForm order, or a single marker finding
    pub digital_signatures: Vec<SignatureField>,
    pub wet_signature: WetSignatureSummary,
    /// Recoverable failures, omitted from JSON when there are none
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisResult {
    /// Number of pages analyzed.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Whether any digital signature field is signed.
    pub fn has_digital_signature(&self) -> bool {
        self.digital_signatures.iter().any(|f| f.is_signed())
    }

    /// Whether any recoverable failure was recorded.
    pub fn is_degraded(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
