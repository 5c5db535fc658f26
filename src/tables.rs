//! Best-effort table extraction per page.

use crate::error::Result;
use crate::model::TableRecord;
use crate::parser::{detect_grids, LayoutAnalyzer, PdfBackend};

/// Turns detected text grids into [`TableRecord`]s.
pub struct TableExtractor<'a> {
    backend: &'a dyn PdfBackend,
}

impl<'a> TableExtractor<'a> {
    pub fn new(backend: &'a dyn PdfBackend) -> Self {
        Self { backend }
    }

    /// Tables of one page in discovery order.
    ///
    /// Every table's `bbox` is the page's own bounds in top-left space;
    /// tables with no non-empty row are dropped.
    pub fn extract_page(&self, page_no: u32) -> Result<Vec<TableRecord>> {
        let page_id = self.backend.page_id(page_no)?;
        let bounds = self.backend.page_box(page_id).bounds();
        let spans = LayoutAnalyzer::new(self.backend).extract_page_spans(page_no)?;
        let tables: Vec<TableRecord> = detect_grids(&spans)
            .into_iter()
            .filter_map(|grid| TableRecord::from_raw_rows(page_no, grid.rows, bounds))
            .collect();

        log::debug!("page {}: {} tables", page_no, tables.len());
        Ok(tables)
    }
}
