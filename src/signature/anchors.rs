//! Label search over positioned page text.

use crate::error::Result;
use crate::model::Rect;
use crate::parser::{LayoutAnalyzer, PdfBackend, TextLine};

/// One occurrence of a label on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatch {
    /// The vocabulary label, as configured
    pub label: String,
    /// Bounds of the matched characters in top-left page space
    pub bbox: Rect,
}

/// Find every occurrence of every label on a page.
pub fn find_anchors(
    backend: &dyn PdfBackend,
    page_no: u32,
    labels: &[String],
) -> Result<Vec<LabelMatch>> {
    let lines = LayoutAnalyzer::new(backend).extract_page_lines(page_no)?;
    Ok(search_lines(&lines, labels))
}

/// Case-insensitive literal search, label by label, top to bottom.
///
/// Occurrences of one label do not overlap each other; different labels
/// may match the same text ("signatory" inside "authorised signatory").
pub fn search_lines(lines: &[TextLine], labels: &[String]) -> Vec<LabelMatch> {
    let prepared: Vec<(Vec<char>, Vec<(f32, f32)>, &TextLine)> = lines
        .iter()
        .map(|line| {
            let (text, glyphs) = line.text_with_glyphs();
            (text.chars().collect(), glyphs, line)
        })
        .collect();

    let mut found = Vec::new();
    for label in labels {
        let needle: Vec<char> = label.chars().collect();
        if needle.iter().all(|c| c.is_whitespace()) {
            continue;
        }

        for (chars, glyphs, line) in &prepared {
            if glyphs.len() != chars.len() {
                log::debug!("glyph positions do not match line text, skipping line");
                continue;
            }

            let mut start = 0;
            while start + needle.len() <= chars.len() {
                let window = &chars[start..start + needle.len()];
                if !window.iter().zip(&needle).all(|(a, b)| same_letter(*a, *b)) {
                    start += 1;
                    continue;
                }

                let x0 = glyphs[start].0;
                let x1 = glyphs[start + needle.len() - 1].1;
                found.push(LabelMatch {
                    label: label.clone(),
                    bbox: Rect::new(x0, line.top(), x1, line.bottom()),
                });
                start += needle.len();
            }
        }
    }
    found
}

fn same_letter(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}
