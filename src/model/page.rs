//! Per-page text records.

use serde::{Deserialize, Serialize};

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    /// Text drawn by the content stream
    Native,
    /// Text recognized from a rasterized page
    Ocr,
}

/// Normalized text of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    /// Page number (1-indexed)
    pub page_no: u32,

    /// Normalized text, possibly empty
    pub text: String,

    /// Which extraction path produced `text`
    pub source: TextSource,
}

impl TextRecord {
    pub fn new(page_no: u32, text: impl Into<String>, source: TextSource) -> Self {
        Self {
            page_no,
            text: text.into(),
            source,
        }
    }

    /// Number of characters (not bytes) in the text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
