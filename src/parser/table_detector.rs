//! Table grids recovered from text alignment.
//!
//! No ruling lines are needed: spans (top-left page space) are banded into
//! rows, left edges shared by several rows become column starts, and runs
//! of rows lining up with those starts form a grid. Numbered and bulleted
//! lists line up the same way and are filtered out.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::layout::TextSpan;

/// Left edges within this distance share a column bucket.
const EDGE_BUCKET: f32 = 5.0;
const MIN_ROWS: usize = 2;
const MIN_COLUMNS: usize = 2;
/// Above this many columns the spans are usually single words, not cells.
const MAX_COLUMNS: usize = 6;
/// Row banding tolerance as a fraction of font size.
const ROW_TOLERANCE: f32 = 0.4;
/// Share of a row's spans that must start on a column.
const MIN_ALIGNMENT: f32 = 0.3;
const MIN_COLUMN_GAP: f32 = 15.0;
const ALIGN_TOLERANCE: f32 = 5.0;
/// A span may start this far left of its column.
const CELL_LEAD: f32 = 10.0;

/// Cell text of one grid, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct TextGrid {
    /// Left edge of each column
    pub columns: Vec<f32>,
    /// One string per column per row; spans sharing a cell are joined by a space
    pub rows: Vec<Vec<String>>,
}

impl TextGrid {
    pub fn col_count(&self) -> usize {
        self.columns.len()
    }
}

/// Spans on one baseline band, left to right.
struct Band<'s> {
    spans: Vec<&'s TextSpan>,
}

impl Band<'_> {
    fn leftmost(&self) -> Option<&TextSpan> {
        self.spans.first().copied()
    }

    /// Share of spans starting on one of `columns`.
    fn alignment(&self, columns: &[f32]) -> f32 {
        if self.spans.is_empty() || columns.is_empty() {
            return 0.0;
        }
        let aligned = self
            .spans
            .iter()
            .filter(|span| columns.iter().any(|c| (span.x - c).abs() <= ALIGN_TOLERANCE))
            .count();
        aligned as f32 / self.spans.len() as f32
    }

    fn cells(&self, columns: &[f32]) -> Vec<String> {
        let mut cells: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
        for span in &self.spans {
            if let Some(cell) = cells.get_mut(column_of(span.x, columns)) {
                cell.push(span.text.trim());
            }
        }
        cells.into_iter().map(|parts| parts.join(" ")).collect()
    }
}

/// Find text grids among `spans`.
pub fn detect_grids(spans: &[TextSpan]) -> Vec<TextGrid> {
    if spans.len() < MIN_ROWS * MIN_COLUMNS {
        return Vec::new();
    }

    let bands = bands(spans);
    let page_columns = column_starts(&bands);
    log::debug!(
        "table grid: {} bands, column starts {:?}",
        bands.len(),
        page_columns
    );
    if bands.len() < MIN_ROWS || page_columns.len() < MIN_COLUMNS {
        return Vec::new();
    }

    aligned_runs(&bands, &page_columns)
        .into_iter()
        .filter_map(|run| {
            let run = &bands[run];
            // A run's own edges are tighter than the page-wide ones
            let columns = column_starts(run);
            if !(MIN_COLUMNS..=MAX_COLUMNS).contains(&columns.len()) {
                log::debug!("table grid: rejecting run with {} columns", columns.len());
                return None;
            }
            if looks_like_list(run, columns.len()) {
                log::debug!("table grid: rejecting run of {} list items", run.len());
                return None;
            }
            let rows = run.iter().map(|band| band.cells(&columns)).collect();
            Some(TextGrid { columns, rows })
        })
        .collect()
}

/// Group spans into baseline bands, top first.
fn bands(spans: &[TextSpan]) -> Vec<Band<'_>> {
    let mut sorted: Vec<&TextSpan> = spans.iter().collect();
    sorted.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });

    let mut bands: Vec<(f32, Band)> = Vec::new();
    for span in sorted {
        let tolerance = span.font_size * ROW_TOLERANCE;
        match bands.last_mut() {
            Some((y, band)) if (span.y - *y).abs() <= tolerance => band.spans.push(span),
            _ => bands.push((span.y, Band { spans: vec![span] })),
        }
    }

    bands
        .into_iter()
        .map(|(_, mut band)| {
            band.spans
                .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
            band
        })
        .collect()
}

/// Left edges shared by enough bands, merged when closer than a column gap.
///
/// Bands with several spans vote once per bucket. When too few bands have
/// more than one span, every span votes instead.
fn column_starts(bands: &[Band]) -> Vec<f32> {
    let multi: Vec<&Band> = bands.iter().filter(|b| b.spans.len() >= 2).collect();
    let mut votes: HashMap<i32, usize> = HashMap::new();
    let voters = if multi.len() >= MIN_ROWS {
        for band in &multi {
            let buckets: HashSet<i32> = band.spans.iter().map(|s| bucket(s.x)).collect();
            for b in buckets {
                *votes.entry(b).or_default() += 1;
            }
        }
        multi.len()
    } else {
        for span in bands.iter().flat_map(|b| &b.spans) {
            *votes.entry(bucket(span.x)).or_default() += 1;
        }
        bands.len()
    };

    let quorum = ((voters as f32 * MIN_ALIGNMENT) as usize).max(2);
    let mut edges: Vec<f32> = votes
        .into_iter()
        .filter(|(_, n)| *n >= quorum)
        .map(|(b, _)| b as f32 * EDGE_BUCKET)
        .collect();
    edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    edges.dedup_by(|next, kept| *next - *kept < MIN_COLUMN_GAP);
    edges
}

fn bucket(x: f32) -> i32 {
    (x / EDGE_BUCKET).round() as i32
}

/// Index ranges of consecutive aligned bands, at least `MIN_ROWS` long.
fn aligned_runs(bands: &[Band], columns: &[f32]) -> Vec<std::ops::Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, band) in bands.iter().enumerate() {
        let aligned = band.alignment(columns) >= MIN_ALIGNMENT;
        match (aligned, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s >= MIN_ROWS {
                    runs.push(s..i);
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        if bands.len() - s >= MIN_ROWS {
            runs.push(s..bands.len());
        }
    }
    runs
}

/// Column for a span starting at `x`.
///
/// The column whose range holds `x` (allowing for `CELL_LEAD`), else the
/// one with the nearest start.
fn column_of(x: f32, columns: &[f32]) -> usize {
    let within = columns.iter().enumerate().position(|(i, start)| {
        let end = columns.get(i + 1).map_or(f32::INFINITY, |next| next - CELL_LEAD);
        x >= start - CELL_LEAD && x < end
    });
    within.unwrap_or_else(|| {
        columns
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (x - **a)
                    .abs()
                    .partial_cmp(&(x - **b).abs())
                    .unwrap_or(Ordering::Equal)
            })
            .map_or(0, |(i, _)| i)
    })
}

/// Whether a run's first column holds list markers rather than data.
///
/// Bullets in half the rows always mean a list. Numbers only do for
/// two-column runs, since numbered first columns are common in real tables.
fn looks_like_list(run: &[Band], columns: usize) -> bool {
    if run.is_empty() {
        return false;
    }
    let (mut bullets, mut numbers) = (0usize, 0usize);
    for text in run.iter().filter_map(|b| b.leftmost()).map(|s| s.text.trim()) {
        if is_bullet_marker(text) {
            bullets += 1;
        } else if is_number_marker(text) {
            numbers += 1;
        }
    }
    let rows = run.len() as f32;
    bullets as f32 / rows >= 0.5 || (columns == 2 && (bullets + numbers) as f32 / rows >= 0.5)
}

fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "▹" | "►" | "■" | "●" | "※"
            | "□" | "◆" | "◇" | "▶" | "▷" | "☞" | "➤" | "➜"
    )
}

/// `1.`, `12)`, `3`, `a.`, `B)` and the like.
fn is_number_marker(text: &str) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.chars().take_while(char::is_ascii_digit).count();
    let rest = &compact[digits..];
    if digits > 0 {
        return rest.is_empty() || rest == "." || rest == ")";
    }
    let mut chars = compact.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(letter), Some('.' | ')'), None) if letter.is_alphabetic()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan::new(text, x, y, 12.0)
    }

    fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_bands_are_top_down_and_left_to_right() {
        let spans = vec![
            span("A2", 10.0, 115.0),
            span("B1", 60.0, 101.0),
            span("A1", 10.0, 100.0),
            span("B2", 60.0, 115.0),
        ];
        let bands = bands(&spans);
        assert_eq!(bands.len(), 2);
        let text: Vec<&str> = bands[0].spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(text, vec!["A1", "B1"]);
        assert_eq!(bands[1].spans[1].text, "B2");
    }

    #[test]
    fn test_column_starts() {
        let spans: Vec<TextSpan> = [100.0, 115.0, 130.0]
            .iter()
            .flat_map(|&y| [span("A", 10.0, y), span("B", 61.0, y), span("b", 64.0, y)])
            .collect();
        // 61 and 64 are closer than a column gap
        assert_eq!(column_starts(&bands(&spans)), vec![10.0, 60.0]);
    }

    #[test]
    fn test_simple_grid() {
        let spans = vec![
            span("Name", 10.0, 100.0),
            span("Age", 60.0, 100.0),
            span("Alice", 10.0, 115.0),
            span("30", 60.0, 115.0),
            span("Bob", 10.0, 130.0),
            span("25", 60.0, 130.0),
        ];
        let grids = detect_grids(&spans);
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].col_count(), 2);
        assert_eq!(
            grids[0].rows,
            strings(&[&["Name", "Age"], &["Alice", "30"], &["Bob", "25"]])
        );
    }

    #[test]
    fn test_prose_around_a_grid_is_left_out() {
        let spans = vec![
            span("Fee schedule follows", 35.0, 70.0),
            span("Item", 10.0, 100.0),
            span("Fee", 150.0, 100.0),
            span("Filing", 10.0, 115.0),
            span("120", 150.0, 115.0),
            span("Review", 10.0, 130.0),
            span("80", 150.0, 130.0),
        ];
        let grids = detect_grids(&spans);
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].rows[0], vec!["Item".to_string(), "Fee".to_string()]);
        assert_eq!(grids[0].rows.len(), 3);
    }

    #[test]
    fn test_single_column_is_not_a_grid() {
        let spans = vec![
            span("Line 1", 10.0, 100.0),
            span("Line 2", 10.0, 115.0),
            span("Line 3", 10.0, 130.0),
        ];
        assert!(detect_grids(&spans).is_empty());
    }

    #[test]
    fn test_spans_sharing_a_cell_are_joined() {
        let spans = [span("New", 10.0, 100.0), span("York", 30.0, 100.0), span(" 8 ", 60.0, 100.0)];
        let band = Band {
            spans: spans.iter().collect(),
        };
        assert_eq!(band.cells(&[10.0, 60.0]), vec!["New York".to_string(), "8".to_string()]);
    }

    #[test]
    fn test_column_of_prefers_containing_range() {
        let columns = [50.0, 150.0, 300.0];
        assert_eq!(column_of(45.0, &columns), 0);
        assert_eq!(column_of(139.0, &columns), 0);
        assert_eq!(column_of(141.0, &columns), 1);
        assert_eq!(column_of(900.0, &columns), 2);
        // Left of everything falls to the nearest start
        assert_eq!(column_of(0.0, &columns), 0);
    }

    #[test]
    fn test_wide_word_runs_are_not_grids() {
        let spans: Vec<TextSpan> = [100.0, 115.0, 130.0]
            .iter()
            .flat_map(|&y| (0..8).map(move |i| span("w", 10.0 + i as f32 * 40.0, y)))
            .collect();
        assert!(detect_grids(&spans).is_empty());
    }

    #[test]
    fn test_numbered_list_is_not_a_grid() {
        let spans = vec![
            span("1.", 50.0, 400.0),
            span("Scope of work", 80.0, 400.0),
            span("2.", 50.0, 430.0),
            span("Payment terms", 80.0, 430.0),
            span("3.", 50.0, 460.0),
            span("Termination", 80.0, 460.0),
            span("4.", 50.0, 490.0),
            span("Governing law", 80.0, 490.0),
        ];
        assert!(detect_grids(&spans).is_empty());
    }

    #[test]
    fn test_bullet_list_is_not_a_grid() {
        let spans = vec![
            span("-", 50.0, 400.0),
            span("Management", 80.0, 400.0),
            span("-", 50.0, 430.0),
            span("Interface/Service Option", 80.0, 430.0),
            span("-", 50.0, 460.0),
            span("Firmware", 80.0, 460.0),
        ];
        assert!(detect_grids(&spans).is_empty());
    }

    #[test]
    fn test_list_markers() {
        for marker in ["1.", "12.", "1)", "1 .", "3", "a.", "B)"] {
            assert!(is_number_marker(marker), "{}", marker);
        }
        for marker in ["-", "•", "*"] {
            assert!(is_bullet_marker(marker), "{}", marker);
        }
        for text in ["Name", "Alice", "", "1.5", "ab."] {
            assert!(!is_number_marker(text) && !is_bullet_marker(text), "{}", text);
        }
    }
}
