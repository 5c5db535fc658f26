//! Layout analysis for PDF pages.
//!
//! Interprets page content streams to recover positioned text spans, then
//! groups them into lines. Every coordinate produced here is in top-left
//! page space: `x` grows rightwards from the media box's left edge and `y`
//! grows downwards from its top edge.

use std::collections::HashMap;

use lopdf::ObjectId;

use super::backend::{ContentOp, FontMetrics, PdfBackend, PdfValue, ResourceScope, XObjectKind};
use crate::error::Result;
use crate::model::{PageBox, Rect};

/// Deepest nesting of form XObjects followed.
pub(crate) const MAX_FORM_DEPTH: usize = 8;

/// TJ adjustments (1/1000 em) above this read as a word break.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// A text span with position information.
#[derive(Debug, Clone)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Width of the text
    pub width: f32,
    /// Font size in points
    pub font_size: f32,
    /// Horizontal extent `(x0, x1)` of each character of `text`
    pub glyphs: Vec<(f32, f32)>,
}

impl TextSpan {
    /// Create a span whose characters are half an em wide each.
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        let text = text.into();
        let advance = font_size * 0.5;
        let glyphs = (0..text.chars().count())
            .map(|i| {
                let x0 = x + i as f32 * advance;
                (x0, x0 + advance)
            })
            .collect();
        Self::with_glyphs(text, glyphs, y, font_size)
    }

    /// Create a span from per-character extents.
    pub fn with_glyphs(text: String, glyphs: Vec<(f32, f32)>, y: f32, font_size: f32) -> Self {
        let x = glyphs
            .iter()
            .map(|g| g.0)
            .fold(f32::INFINITY, f32::min);
        let right = glyphs
            .iter()
            .map(|g| g.1)
            .fold(f32::NEG_INFINITY, f32::max);
        let (x, width) = if x.is_finite() && right.is_finite() {
            (x, right - x)
        } else {
            (0.0, 0.0)
        };
        Self {
            text,
            x,
            y,
            width,
            font_size,
            glyphs,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Get the top Y coordinate (approximate, based on font size).
    pub fn top(&self) -> f32 {
        self.y - self.font_size * 0.8 // Approximate ascender
    }

    /// Get the bottom Y coordinate (approximate, based on font size).
    pub fn bottom(&self) -> f32 {
        self.y + self.font_size * 0.2 // Approximate descender
    }

    /// Bounding box of the span.
    pub fn bbox(&self) -> Rect {
        Rect::new(self.x, self.top(), self.right(), self.bottom())
    }
}

/// A text line composed of multiple spans on the same baseline.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// The spans in this line, sorted by X position
    pub spans: Vec<TextSpan>,
    /// Y position (baseline)
    pub y: f32,
    /// Leftmost X position
    pub x: f32,
    /// Dominant font size in this line
    pub font_size: f32,
}

impl TextLine {
    /// Create a new text line from spans.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        if spans.is_empty() {
            return Self {
                spans: vec![],
                y: 0.0,
                x: 0.0,
                font_size: 0.0,
            };
        }

        // Sort spans by X position
        spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));

        // Calculate dominant font size (weighted by text length)
        let total_chars: usize = spans.iter().map(|s| s.text.len()).sum();
        let weighted_size: f32 = spans
            .iter()
            .map(|s| s.font_size * s.text.len() as f32)
            .sum();
        let font_size = if total_chars > 0 {
            weighted_size / total_chars as f32
        } else {
            spans[0].font_size
        };

        let y = spans[0].y;
        let x = spans[0].x;

        Self {
            spans,
            y,
            x,
            font_size,
        }
    }

    /// Get the combined text of all spans with appropriate spacing.
    pub fn text(&self) -> String {
        self.text_with_glyphs().0
    }

    /// Combined text plus the horizontal extent of every character in it.
    ///
    /// Inserts spaces between spans based on their X coordinate gaps.
    /// For CJK characters, no space is inserted between adjacent characters.
    /// An inserted space covers the gap it stands for.
    pub fn text_with_glyphs(&self) -> (String, Vec<(f32, f32)>) {
        let mut result = String::new();
        let mut glyphs = Vec::new();

        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev_span = &self.spans[i - 1];

                // Calculate gap between end of previous span and start of current span
                let prev_end = prev_span.right();
                let gap = span.x - prev_end;

                // Estimate average character width from current span
                let char_count = span.text.chars().count();
                let avg_char_width = if char_count > 0 && span.width > 0.0 {
                    span.width / char_count as f32
                } else {
                    span.font_size * 0.5
                };

                // Gap threshold: if gap is more than 20% of average char width, insert space
                let should_insert_space = gap > avg_char_width * 0.2 && {
                    let prev_is_cjk = prev_span
                        .text
                        .chars()
                        .last()
                        .map(is_spaceless_script_char)
                        .unwrap_or(false);
                    let curr_is_cjk = span
                        .text
                        .chars()
                        .next()
                        .map(is_spaceless_script_char)
                        .unwrap_or(false);
                    !(prev_is_cjk && curr_is_cjk)
                };

                let prev_ends_with_space =
                    prev_span.text.ends_with(' ') || prev_span.text.ends_with('\u{00A0}');
                let curr_starts_with_space =
                    span.text.starts_with(' ') || span.text.starts_with('\u{00A0}');

                if should_insert_space && !prev_ends_with_space && !curr_starts_with_space {
                    result.push(' ');
                    glyphs.push((prev_end, span.x));
                }
            }

            result.push_str(&span.text);
            glyphs.extend(span_glyphs(span));
        }

        (result, glyphs)
    }

    /// Top edge of the tallest span.
    pub fn top(&self) -> f32 {
        self.spans.iter().map(TextSpan::top).fold(self.y, f32::min)
    }

    /// Bottom edge of the lowest span.
    pub fn bottom(&self) -> f32 {
        self.spans.iter().map(TextSpan::bottom).fold(self.y, f32::max)
    }
}

/// Per-character extents of a span, padded if they disagree with its text.
fn span_glyphs(span: &TextSpan) -> Vec<(f32, f32)> {
    let count = span.text.chars().count();
    if span.glyphs.len() == count {
        return span.glyphs.clone();
    }
    spread(span.x, span.right(), count)
}

/// Split `[x0, x1]` into `count` equal cells.
fn spread(x0: f32, x1: f32, count: usize) -> Vec<(f32, f32)> {
    if count == 0 {
        return Vec::new();
    }
    let step = (x1 - x0) / count as f32;
    (0..count)
        .map(|i| (x0 + step * i as f32, x0 + step * (i + 1) as f32))
        .collect()
}

/// Affine transform `[a b c d e f]` as used by PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn from_slice(m: &[f32]) -> Option<Self> {
        match m {
            [a, b, c, d, e, f] => Some(Self::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self` applied first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Length of the transformed unit Y vector.
    pub fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Text state parameters (`Tf`, `Tc`, `Tw`, `Tz`, `TL`, `Ts`, `Tr`).
#[derive(Debug, Clone)]
pub(crate) struct TextState {
    pub font: Vec<u8>,
    pub size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
    render_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Vec::new(),
            size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

impl TextState {
    /// Whether shown glyphs leave marks (modes 3 and 7 are invisible).
    pub fn paints(&self) -> bool {
        !matches!(self.render_mode, 3 | 7)
    }

    /// Whether glyphs are stroked but not filled.
    pub fn outline_only(&self) -> bool {
        matches!(self.render_mode, 1 | 5)
    }

    /// Glyph space (one unit per em) to user space for text matrix `tm`.
    fn glyph_matrix(&self, tm: &Matrix, ctm: &Matrix) -> Matrix {
        Matrix::new(
            self.size * self.horizontal_scale,
            0.0,
            0.0,
            self.size,
            0.0,
            self.rise,
        )
        .then(tm)
        .then(ctm)
    }

    fn next_line(&self, line_matrix: &mut Matrix) {
        let leading = if self.leading != 0.0 { self.leading } else { self.size };
        *line_matrix = Matrix::translate(0.0, -leading).then(line_matrix);
    }
}

/// How a content operator affects text.
pub(crate) enum TextOp<'o> {
    /// Not a text operator
    Other,
    /// Text state or position changed
    Moved,
    /// Show these string and adjustment operands
    Show(&'o [PdfValue]),
}

/// One glyph placed by a show operator.
#[derive(Debug, Clone)]
pub(crate) struct PlacedGlyph<'p> {
    pub code: u32,
    /// Operand bytes this code came from
    pub bytes: &'p [u8],
    /// Glyph space (one unit per em) to user space
    pub matrix: Matrix,
    /// Advance in em
    pub width: f32,
}

impl PlacedGlyph<'_> {
    /// Horizontal extent in user space.
    pub fn extent(&self) -> (f32, f32) {
        let (x0, _) = self.matrix.apply(0.0, 0.0);
        let (x1, _) = self.matrix.apply(self.width, 0.0);
        (x0.min(x1), x0.max(x1))
    }
}

/// A piece of a show operator after positioning.
pub(crate) enum Shown<'p> {
    /// A string operand and its glyphs
    Glyphs {
        bytes: &'p [u8],
        glyphs: Vec<PlacedGlyph<'p>>,
    },
    /// A `TJ` number, with the pen's user-space x before and after it
    Adjust { amount: f32, before: f32, after: f32 },
}

impl<'p> Shown<'p> {
    pub fn glyphs(&self) -> &[PlacedGlyph<'p>] {
        match self {
            Shown::Glyphs { glyphs, .. } => glyphs,
            Shown::Adjust { .. } => &[],
        }
    }
}

/// Text and line matrices of the current text object.
///
/// Shared by every content interpreter so text lands in the same place
/// whether it is read or painted.
#[derive(Debug, Clone, Default)]
pub(crate) struct TextCursor {
    text_matrix: Matrix,
    line_matrix: Matrix,
    in_block: bool,
}

impl TextCursor {
    /// Apply `op` to the text state and matrices.
    pub fn interpret<'o>(&mut self, op: &'o ContentOp, ts: &mut TextState) -> TextOp<'o> {
        match op.operator.as_str() {
            "BT" => {
                *self = TextCursor {
                    in_block: true,
                    ..TextCursor::default()
                };
            }
            "ET" => self.in_block = false,
            "Tf" => {
                if let Some(name) = op.name() {
                    ts.font = name.to_vec();
                }
                if let Some(size) = op.number(1) {
                    ts.size = size;
                }
            }
            "Tc" => ts.char_spacing = op.number(0).unwrap_or(0.0),
            "Tw" => ts.word_spacing = op.number(0).unwrap_or(0.0),
            "Tz" => ts.horizontal_scale = op.number(0).unwrap_or(100.0) / 100.0,
            "TL" => ts.leading = op.number(0).unwrap_or(0.0),
            "Ts" => ts.rise = op.number(0).unwrap_or(0.0),
            "Tr" => ts.render_mode = op.number(0).map_or(0, |m| m as i64),
            "Td" | "TD" => {
                let tx = op.number(0).unwrap_or(0.0);
                let ty = op.number(1).unwrap_or(0.0);
                if op.operator == "TD" {
                    ts.leading = -ty;
                }
                self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
                self.text_matrix = self.line_matrix;
            }
            "Tm" => {
                if let Some(m) = op.numbers().as_deref().and_then(Matrix::from_slice) {
                    self.line_matrix = m;
                    self.text_matrix = m;
                }
            }
            "T*" => self.next_line(ts),
            "Tj" | "TJ" => {
                let pieces: &[PdfValue] = match op.operands.first() {
                    Some(PdfValue::Array(arr)) if op.operator == "TJ" => arr.as_slice(),
                    Some(_) if op.operator == "Tj" => &op.operands[..1],
                    _ => &[],
                };
                if self.in_block {
                    return TextOp::Show(pieces);
                }
            }
            "'" | "\"" => {
                if op.operator == "\"" {
                    ts.word_spacing = op.number(0).unwrap_or(ts.word_spacing);
                    ts.char_spacing = op.number(1).unwrap_or(ts.char_spacing);
                }
                self.next_line(ts);
                let text_idx = if op.operator == "\"" { 2 } else { 0 };
                if self.in_block {
                    if let Some(piece) = op.operands.get(text_idx) {
                        return TextOp::Show(std::slice::from_ref(piece));
                    }
                }
            }
            _ => return TextOp::Other,
        }
        TextOp::Moved
    }

    fn next_line(&mut self, ts: &TextState) {
        ts.next_line(&mut self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// User-space position of the pen.
    pub fn pen(&self, ts: &TextState, ctm: &Matrix) -> (f32, f32) {
        ts.glyph_matrix(&self.text_matrix, ctm).apply(0.0, 0.0)
    }

    /// Current font size in user space.
    pub fn font_size(&self, ts: &TextState, ctm: &Matrix) -> f32 {
        ts.size * self.text_matrix.then(ctm).vertical_scale()
    }

    /// Place the glyphs of `pieces` and advance the pen past them.
    pub fn show<'p>(
        &mut self,
        pieces: &'p [PdfValue],
        ts: &TextState,
        metrics: &FontMetrics,
        ctm: &Matrix,
    ) -> Vec<Shown<'p>> {
        let mut shown = Vec::with_capacity(pieces.len());
        for piece in pieces {
            match piece {
                PdfValue::Str(bytes) => {
                    let mut glyphs = Vec::with_capacity(bytes.len());
                    for (code, code_bytes) in metrics.code_chunks(bytes) {
                        let w0 = metrics.width(code) / 1000.0;
                        glyphs.push(PlacedGlyph {
                            code,
                            bytes: code_bytes,
                            matrix: ts.glyph_matrix(&self.text_matrix, ctm),
                            width: w0,
                        });

                        let word = if code == 32 && !metrics.is_multi_byte() {
                            ts.word_spacing
                        } else {
                            0.0
                        };
                        let tx = (w0 * ts.size + ts.char_spacing + word) * ts.horizontal_scale;
                        self.text_matrix = Matrix::translate(tx, 0.0).then(&self.text_matrix);
                    }
                    shown.push(Shown::Glyphs { bytes, glyphs });
                }
                other => {
                    let Some(n) = other.as_number() else {
                        continue;
                    };
                    let (before, _) = self.pen(ts, ctm);
                    let tx = -n / 1000.0 * ts.size * ts.horizontal_scale;
                    self.text_matrix = Matrix::translate(tx, 0.0).then(&self.text_matrix);
                    let (after, _) = self.pen(ts, ctm);
                    shown.push(Shown::Adjust {
                        amount: n,
                        before,
                        after,
                    });
                }
            }
        }
        shown
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// Analyzes page layout through a [`PdfBackend`].
pub struct LayoutAnalyzer<'a> {
    backend: &'a dyn PdfBackend,
}

impl<'a> LayoutAnalyzer<'a> {
    /// Create a new layout analyzer.
    pub fn new(backend: &'a dyn PdfBackend) -> Self {
        Self { backend }
    }

    /// Extract text spans from a page with position information.
    pub fn extract_page_spans(&self, page_no: u32) -> Result<Vec<TextSpan>> {
        let page_id = self.backend.page_id(page_no)?;
        let page_box = self.backend.page_box(page_id);
        let content = self.backend.page_content(page_id)?;
        let ops = self.backend.decode_content(&content)?;

        let mut collector = SpanCollector {
            backend: self.backend,
            page_box,
            metrics: HashMap::new(),
            spans: Vec::new(),
        };
        let mut forms = Vec::new();
        collector.run(&ops, ResourceScope::page(page_id), Matrix::IDENTITY, &mut forms);
        Ok(collector.spans)
    }

    /// Extract text lines from a page, top to bottom.
    pub fn extract_page_lines(&self, page_no: u32) -> Result<Vec<TextLine>> {
        let spans = self.extract_page_spans(page_no)?;
        Ok(self.group_spans_into_lines(spans))
    }

    /// Simple Y-based line grouping for single-column layout.
    pub fn group_spans_into_lines(&self, spans: Vec<TextSpan>) -> Vec<TextLine> {
        if spans.is_empty() {
            return vec![];
        }

        // Sort spans by Y (top of page first) then X
        let mut spans = spans;
        spans.sort_by(|a, b| {
            let y_cmp = a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal);
            if y_cmp == std::cmp::Ordering::Equal {
                a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)
            } else {
                y_cmp
            }
        });

        let mut lines: Vec<TextLine> = Vec::new();
        let mut current_line_spans: Vec<TextSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in spans {
            let y_tolerance = span.font_size * 0.3; // Allow 30% of font size variance

            match current_y {
                Some(y) if (span.y - y).abs() <= y_tolerance => current_line_spans.push(span),
                _ => {
                    if !current_line_spans.is_empty() {
                        lines.push(TextLine::from_spans(std::mem::take(
                            &mut current_line_spans,
                        )));
                    }
                    current_y = Some(span.y);
                    current_line_spans.push(span);
                }
            }
        }

        // Don't forget the last line
        if !current_line_spans.is_empty() {
            lines.push(TextLine::from_spans(current_line_spans));
        }

        lines
    }
}

/// Content stream interpreter that records shown text.
struct SpanCollector<'a> {
    backend: &'a dyn PdfBackend,
    page_box: PageBox,
    metrics: HashMap<(ResourceScope, Vec<u8>), FontMetrics>,
    spans: Vec<TextSpan>,
}

impl SpanCollector<'_> {
    fn run(
        &mut self,
        ops: &[ContentOp],
        scope: ResourceScope,
        base_ctm: Matrix,
        forms: &mut Vec<ObjectId>,
    ) {
        let mut gs = GraphicsState {
            ctm: base_ctm,
            text: TextState::default(),
        };
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut cursor = TextCursor::default();

        for op in ops {
            match cursor.interpret(op, &mut gs.text) {
                TextOp::Show(pieces) => {
                    self.show(pieces, &gs, &mut cursor, scope);
                    continue;
                }
                TextOp::Moved => continue,
                TextOp::Other => {}
            }
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = op.numbers().as_deref().and_then(Matrix::from_slice) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "Do" => self.run_form(op, &gs, scope, forms),
                _ => {}
            }
        }
    }

    /// Follow a form XObject so text drawn inside it is found too.
    fn run_form(
        &mut self,
        op: &ContentOp,
        gs: &GraphicsState,
        scope: ResourceScope,
        forms: &mut Vec<ObjectId>,
    ) {
        if forms.len() >= MAX_FORM_DEPTH {
            return;
        }
        let Some(name) = op.name() else {
            return;
        };
        let Some(XObjectKind::Form(form)) = self.backend.xobject(scope, name) else {
            return;
        };
        if forms.contains(&form.id) {
            log::debug!("form XObject {:?} draws itself, skipping", form.id);
            return;
        }
        let ops = match self.backend.decode_content(&form.content) {
            Ok(ops) => ops,
            Err(e) => {
                log::debug!("skipping undecodable form XObject {:?}: {}", form.id, e);
                return;
            }
        };

        let ctm = Matrix::from_slice(&form.matrix)
            .unwrap_or_default()
            .then(&gs.ctm);
        forms.push(form.id);
        self.run(&ops, scope.with_form(form.id), ctm, forms);
        forms.pop();
    }

    fn font_metrics(&mut self, scope: ResourceScope, font: &[u8]) -> FontMetrics {
        let backend = self.backend;
        self.metrics
            .entry((scope, font.to_vec()))
            .or_insert_with(|| backend.font_metrics(scope, font))
            .clone()
    }

    /// Record the text shown by `Tj`/`TJ` pieces and advance the text matrix.
    fn show(
        &mut self,
        pieces: &[PdfValue],
        gs: &GraphicsState,
        cursor: &mut TextCursor,
        scope: ResourceScope,
    ) {
        let ts = &gs.text;
        let metrics = self.font_metrics(scope, &ts.font);
        let (_, baseline) = cursor.pen(ts, &gs.ctm);
        let font_size = cursor.font_size(ts, &gs.ctm);
        let mut text = String::new();
        let mut glyphs: Vec<(f32, f32)> = Vec::new();

        for piece in cursor.show(pieces, ts, &metrics, &gs.ctm) {
            match piece {
                Shown::Glyphs { bytes, glyphs: placed } => {
                    let decoded = self.backend.decode_text(scope, &ts.font, bytes);
                    let extents: Vec<(f32, f32)> = placed.iter().map(PlacedGlyph::extent).collect();
                    push_chars(&mut text, &mut glyphs, &decoded, &extents);
                }
                Shown::Adjust {
                    amount,
                    before,
                    after,
                } => {
                    // Large negative values indicate word breaks
                    let ends_with_space = text.ends_with(' ') || text.ends_with('\u{00A0}');
                    let last_is_cjk = text.chars().last().map(is_spaceless_script_char);
                    if -amount > TJ_SPACE_THRESHOLD && !ends_with_space && last_is_cjk == Some(false) {
                        text.push(' ');
                        glyphs.push((before.min(after), before.max(after)));
                    }
                }
            }
        }

        if text.trim().is_empty() {
            return;
        }

        let (_, y) = self.page_box.to_page_space(0.0, baseline);
        let left = self.page_box.x0;
        let glyphs = glyphs.into_iter().map(|(a, b)| (a - left, b - left)).collect();
        self.spans
            .push(TextSpan::with_glyphs(text, glyphs, y, font_size));
    }
}

/// Append decoded characters with their extents.
///
/// When decoding changed the character count (ligatures, multi-byte
/// encodings) the string's full extent is split evenly between characters.
fn push_chars(text: &mut String, glyphs: &mut Vec<(f32, f32)>, decoded: &str, extents: &[(f32, f32)]) {
    let chars: Vec<char> = decoded.chars().collect();
    if chars.is_empty() || extents.is_empty() {
        return;
    }
    if chars.len() == extents.len() {
        glyphs.extend_from_slice(extents);
    } else {
        let x0 = extents.iter().map(|e| e.0).fold(f32::INFINITY, f32::min);
        let x1 = extents.iter().map(|e| e.1).fold(f32::NEG_INFINITY, f32::max);
        glyphs.extend(spread(x0, x1, chars.len()));
    }
    text.extend(chars);
}

/// Check if character is from a script that doesn't use word spaces.
/// Chinese and Japanese don't use spaces between words, but Korean does.
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs (Chinese characters, used in Chinese/Japanese)
    (0x4E00..=0x9FFF).contains(&code)
    // CJK Unified Ideographs Extension A
    || (0x3400..=0x4DBF).contains(&code)
    // CJK Unified Ideographs Extension B-F
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana and Katakana (Japanese)
    || (0x3040..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}
