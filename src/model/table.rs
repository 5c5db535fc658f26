//! Table records.

use serde::{Deserialize, Serialize};

use super::Rect;

/// A table found on a page.
///
/// Cells are trimmed, rows with only empty cells are gone, and `cols` is the
/// length of the first remaining row. Later rows may be shorter or longer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    /// Page number (1-indexed)
    pub page_no: u32,

    /// Cell text, row-major
    pub rows: Vec<Vec<String>>,

    /// Column count of the first row
    pub cols: usize,

    /// Detected table bounds in top-left page space
    pub bbox: Rect,
}

impl TableRecord {
    /// Build a record from raw cell text.
    ///
    /// Returns `None` when nothing is left after cleaning.
    pub fn from_raw_rows(page_no: u32, raw: Vec<Vec<String>>, bbox: Rect) -> Option<Self> {
        let rows: Vec<Vec<String>> = raw
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.trim().to_string()).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .collect();

        let cols = rows.first()?.len();
        Some(Self {
            page_no,
            rows,
            cols,
            bbox,
        })
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_cleaning_trims_and_drops_empty_rows() {
        let bbox = Rect::new(0.0, 0.0, 100.0, 50.0);
        let table = TableRecord::from_raw_rows(
            3,
            raw(&[&[" Name ", "Qty"], &["", "  "], &["Apple", " 3"]]),
            bbox,
        )
        .unwrap();

        assert_eq!(table.page_no, 3);
        assert_eq!(table.rows, raw(&[&["Name", "Qty"], &["Apple", "3"]]));
        assert_eq!(table.cols, 2);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_cols_follow_first_row() {
        let bbox = Rect::new(0.0, 0.0, 100.0, 50.0);
        let table =
            TableRecord::from_raw_rows(1, raw(&[&["a", "b", "c"], &["d"]]), bbox).unwrap();
        assert_eq!(table.cols, 3);
        assert_eq!(table.rows[1].len(), 1);
    }

    #[test]
    fn test_all_empty_table_is_dropped() {
        let bbox = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert!(TableRecord::from_raw_rows(1, raw(&[&["", " "], &["\t"]]), bbox).is_none());
        assert!(TableRecord::from_raw_rows(1, Vec::new(), bbox).is_none());
    }
}
