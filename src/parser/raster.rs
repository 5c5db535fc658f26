//! Page rasterization with tiny-skia.
//!
//! Paints vector paths, image XObjects and shown text. Glyph outlines come
//! from [`super::glyphs`]; text positioning is shared with the layout
//! interpreter so painted glyphs land where extracted text says they are.

use std::collections::HashMap;

use image::RgbaImage;
use lopdf::ObjectId;
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, Mask, Paint, PathBuilder, Pixmap, PixmapPaint,
    Stroke, Transform,
};

use super::backend::{
    ContentOp, DecodedImage, FontMetrics, PdfBackend, PdfValue, ResourceScope, XObjectKind,
};
use super::glyphs::{FontOutlines, Glyph};
use super::layout::{Matrix, Shown, TextCursor, TextOp, TextState, MAX_FORM_DEPTH};
use crate::error::{Error, Result};
use crate::model::{PageBox, Rect};

/// Largest raster side accepted, in pixels.
const MAX_RASTER_SIDE: u32 = 16_384;

/// Renders pages or page regions to RGBA bitmaps.
pub struct Rasterizer<'a> {
    backend: &'a dyn PdfBackend,
}

impl<'a> Rasterizer<'a> {
    pub fn new(backend: &'a dyn PdfBackend) -> Self {
        Self { backend }
    }

    /// Render a whole page at `scale` pixels per point.
    pub fn render_page(&self, page_no: u32, scale: f32) -> Result<RgbaImage> {
        let page_id = self.backend.page_id(page_no)?;
        let bounds = self.backend.page_box(page_id).bounds();
        self.render(page_id, bounds, scale)
    }

    /// Render a region given in top-left page space.
    ///
    /// The region is clipped to the page first; an empty intersection is
    /// [`Error::EmptyRegion`].
    pub fn render_region(&self, page_no: u32, region: Rect, scale: f32) -> Result<RgbaImage> {
        let page_id = self.backend.page_id(page_no)?;
        let bounds = self.backend.page_box(page_id).bounds();
        let region = region.intersect(&bounds).ok_or(Error::EmptyRegion)?;
        self.render(page_id, region, scale)
    }

    fn render(&self, page_id: ObjectId, region: Rect, scale: f32) -> Result<RgbaImage> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::Render(format!("invalid scale {}", scale)));
        }
        let width = pixel_extent(region.width(), scale)?;
        let height = pixel_extent(region.height(), scale)?;

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::Render(format!("cannot allocate {}x{} pixmap", width, height)))?;
        pixmap.fill(Color::WHITE);

        let page_box = self.backend.page_box(page_id);
        let content = self.backend.page_content(page_id)?;
        let ops = self.backend.decode_content(&content)?;

        let mut painter = Painter {
            backend: self.backend,
            base: region_transform(&page_box, &region, scale),
            pixmap,
            fonts: HashMap::new(),
        };
        let mut forms = Vec::new();
        painter.run(&ops, ResourceScope::page(page_id), PaintState::default(), &mut forms);

        RgbaImage::from_raw(width, height, painter.pixmap.take())
            .ok_or_else(|| Error::Render("pixmap size mismatch".to_string()))
    }
}

fn pixel_extent(points: f32, scale: f32) -> Result<u32> {
    let pixels = (points * scale).ceil().max(1.0);
    if pixels > MAX_RASTER_SIDE as f32 {
        return Err(Error::Render(format!(
            "raster side of {} pixels exceeds {}",
            pixels, MAX_RASTER_SIDE
        )));
    }
    Ok(pixels as u32)
}

/// Map PDF user space onto the pixels of `region`.
fn region_transform(page_box: &PageBox, region: &Rect, scale: f32) -> Transform {
    Transform::from_row(
        scale,
        0.0,
        0.0,
        -scale,
        -scale * (page_box.x0 + region.x0),
        scale * (page_box.y1 - region.y0),
    )
}

fn to_transform(m: &Matrix) -> Transform {
    Transform::from_row(m.a, m.b, m.c, m.d, m.e, m.f)
}

fn gray(v: f32) -> Color {
    rgb(v, v, v)
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    let ch = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color::from_rgba8(ch(r), ch(g), ch(b), 255)
}

fn cmyk(c: f32, m: f32, y: f32, k: f32) -> Color {
    let k = 1.0 - k.clamp(0.0, 1.0);
    rgb((1.0 - c) * k, (1.0 - m) * k, (1.0 - y) * k)
}

/// Colour from `sc`/`scn` style operands, judged by component count.
fn color_from_components(op: &ContentOp) -> Option<Color> {
    let values: Vec<f32> = op.operands.iter().filter_map(|v| v.as_number()).collect();
    match values.as_slice() {
        [g] => Some(gray(*g)),
        [r, g, b] => Some(rgb(*r, *g, *b)),
        [c, m, y, k] => Some(cmyk(*c, *m, *y, *k)),
        _ => None,
    }
}

#[derive(Clone)]
struct PaintState {
    ctm: Matrix,
    fill: Color,
    stroke: Color,
    line_width: f32,
    clip: Option<Mask>,
    text: TextState,
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: Color::BLACK,
            stroke: Color::BLACK,
            line_width: 1.0,
            clip: None,
            text: TextState::default(),
        }
    }
}

/// Widths and outlines of one font resource.
struct PaintFont {
    metrics: FontMetrics,
    outlines: FontOutlines,
}

/// Content stream interpreter that paints onto a pixmap.
struct Painter<'a> {
    backend: &'a dyn PdfBackend,
    base: Transform,
    pixmap: Pixmap,
    fonts: HashMap<(ResourceScope, Vec<u8>), PaintFont>,
}

impl Painter<'_> {
    fn transform(&self, ctm: &Matrix) -> Transform {
        self.base.pre_concat(to_transform(ctm))
    }

    fn paint(color: Color) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        paint
    }

    fn run(
        &mut self,
        ops: &[ContentOp],
        scope: ResourceScope,
        initial: PaintState,
        forms: &mut Vec<ObjectId>,
    ) {
        let mut gs = initial;
        let mut stack: Vec<PaintState> = Vec::new();
        let mut path = PathBuilder::new();
        let mut current = (0.0f32, 0.0f32);
        let mut pending_clip: Option<FillRule> = None;
        let mut cursor = TextCursor::default();

        for op in ops {
            match cursor.interpret(op, &mut gs.text) {
                TextOp::Show(pieces) => {
                    self.show_text(pieces, &gs, &mut cursor, scope);
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
                "w" => gs.line_width = op.number(0).unwrap_or(1.0),
                "g" => gs.fill = gray(op.number(0).unwrap_or(0.0)),
                "G" => gs.stroke = gray(op.number(0).unwrap_or(0.0)),
                "rg" | "sc" | "scn" | "k" => {
                    if let Some(c) = color_from_components(op) {
                        gs.fill = c;
                    }
                }
                "RG" | "SC" | "SCN" | "K" => {
                    if let Some(c) = color_from_components(op) {
                        gs.stroke = c;
                    }
                }
                "cs" => gs.fill = Color::BLACK,
                "CS" => gs.stroke = Color::BLACK,
                "m" => {
                    if let (Some(x), Some(y)) = (op.number(0), op.number(1)) {
                        path.move_to(x, y);
                        current = (x, y);
                    }
                }
                "l" => {
                    if let (Some(x), Some(y)) = (op.number(0), op.number(1)) {
                        path.line_to(x, y);
                        current = (x, y);
                    }
                }
                "c" => {
                    if let Some([x1, y1, x2, y2, x3, y3]) = op.numbers().and_then(|n| <[f32; 6]>::try_from(n).ok()) {
                        path.cubic_to(x1, y1, x2, y2, x3, y3);
                        current = (x3, y3);
                    }
                }
                "v" => {
                    if let Some([x2, y2, x3, y3]) = op.numbers().and_then(|n| <[f32; 4]>::try_from(n).ok()) {
                        path.cubic_to(current.0, current.1, x2, y2, x3, y3);
                        current = (x3, y3);
                    }
                }
                "y" => {
                    if let Some([x1, y1, x3, y3]) = op.numbers().and_then(|n| <[f32; 4]>::try_from(n).ok()) {
                        path.cubic_to(x1, y1, x3, y3, x3, y3);
                        current = (x3, y3);
                    }
                }
                "re" => {
                    if let Some([x, y, w, h]) = op.numbers().and_then(|n| <[f32; 4]>::try_from(n).ok()) {
                        path.move_to(x, y);
                        path.line_to(x + w, y);
                        path.line_to(x + w, y + h);
                        path.line_to(x, y + h);
                        path.close();
                        current = (x, y);
                    }
                }
                "h" => path.close(),
                "W" => pending_clip = Some(FillRule::Winding),
                "W*" => pending_clip = Some(FillRule::EvenOdd),
                "f" | "F" | "f*" | "S" | "s" | "B" | "B*" | "b" | "b*" | "n" => {
                    let operator = op.operator.as_str();
                    if matches!(operator, "s" | "b" | "b*") {
                        path.close();
                    }
                    let finished = std::mem::replace(&mut path, PathBuilder::new()).finish();
                    if let Some(shape) = finished {
                        let rule = if operator.ends_with('*') {
                            FillRule::EvenOdd
                        } else {
                            FillRule::Winding
                        };
                        let transform = self.transform(&gs.ctm);
                        let fills = matches!(operator, "f" | "F" | "f*" | "B" | "B*" | "b" | "b*");
                        let strokes = matches!(operator, "S" | "s" | "B" | "B*" | "b" | "b*");
                        if fills {
                            self.pixmap.fill_path(
                                &shape,
                                &Self::paint(gs.fill),
                                rule,
                                transform,
                                gs.clip.as_ref(),
                            );
                        }
                        if strokes {
                            let stroke = Stroke {
                                width: gs.line_width.max(0.0),
                                ..Stroke::default()
                            };
                            self.pixmap.stroke_path(
                                &shape,
                                &Self::paint(gs.stroke),
                                &stroke,
                                transform,
                                gs.clip.as_ref(),
                            );
                        }
                        if let Some(clip_rule) = pending_clip.take() {
                            self.intersect_clip(&mut gs, &shape, clip_rule, transform);
                        }
                    }
                    pending_clip = None;
                }
                "Do" => self.draw_xobject(op, &gs, scope, forms),
                _ => {}
            }
        }
    }

    /// Fill the glyphs of a show operator and advance the cursor.
    fn show_text(
        &mut self,
        pieces: &[PdfValue],
        gs: &PaintState,
        cursor: &mut TextCursor,
        scope: ResourceScope,
    ) {
        let ts = &gs.text;
        let backend = self.backend;
        let font = self
            .fonts
            .entry((scope, ts.font.clone()))
            .or_insert_with(|| PaintFont {
                metrics: backend.font_metrics(scope, &ts.font),
                outlines: FontOutlines::new(backend.font_program(scope, &ts.font)),
            });
        let shown = cursor.show(pieces, ts, &font.metrics, &gs.ctm);
        if !ts.paints() {
            return;
        }

        let color = if ts.outline_only() { gs.stroke } else { gs.fill };
        let paint = Self::paint(color);
        for placed in shown.iter().flat_map(Shown::glyphs) {
            let transform = self.base.pre_concat(to_transform(&placed.matrix));
            let glyph = font.outlines.glyph(placed.code, placed.width, || {
                backend.decode_text(scope, &ts.font, placed.bytes).chars().next()
            });
            match glyph {
                Glyph::Outline(path) => {
                    self.pixmap
                        .fill_path(path, &paint, FillRule::Winding, transform, gs.clip.as_ref());
                }
                Glyph::Missing => {
                    let width = if placed.width > 0.0 { placed.width } else { 0.5 };
                    if let Some(rect) = tiny_skia::Rect::from_ltrb(0.05 * width, 0.0, 0.95 * width, 0.7) {
                        self.pixmap
                            .fill_rect(rect, &paint, transform, gs.clip.as_ref());
                    }
                }
                Glyph::Blank => {}
            }
        }
    }

    fn intersect_clip(
        &self,
        gs: &mut PaintState,
        shape: &tiny_skia::Path,
        rule: FillRule,
        transform: Transform,
    ) {
        match gs.clip.as_mut() {
            Some(mask) => mask.intersect_path(shape, rule, true, transform),
            None => {
                if let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) {
                    mask.fill_path(shape, rule, true, transform);
                    gs.clip = Some(mask);
                }
            }
        }
    }

    fn draw_xobject(
        &mut self,
        op: &ContentOp,
        gs: &PaintState,
        scope: ResourceScope,
        forms: &mut Vec<ObjectId>,
    ) {
        let Some(name) = op.name() else {
            return;
        };
        match self.backend.xobject(scope, name) {
            Some(XObjectKind::Image(id)) => match self.backend.decode_image(id) {
                Ok(image) => self.draw_image(image, gs),
                Err(e) => log::debug!("skipping image XObject {:?}: {}", id, e),
            },
            Some(XObjectKind::Form(form)) => {
                if forms.len() >= MAX_FORM_DEPTH || forms.contains(&form.id) {
                    return;
                }
                let ops = match self.backend.decode_content(&form.content) {
                    Ok(ops) => ops,
                    Err(e) => {
                        log::debug!("skipping undecodable form XObject {:?}: {}", form.id, e);
                        return;
                    }
                };
                let mut inner = gs.clone();
                inner.ctm = Matrix::from_slice(&form.matrix)
                    .unwrap_or_default()
                    .then(&gs.ctm);
                forms.push(form.id);
                self.run(&ops, scope.with_form(form.id), inner, forms);
                forms.pop();
            }
            None => {}
        }
    }

    /// Draw an image into the unit square of the current CTM.
    fn draw_image(&mut self, image: DecodedImage, gs: &PaintState) {
        let pixmap = match image {
            DecodedImage::Pixels(img) => {
                let (w, h) = img.dimensions();
                IntSize::from_wh(w, h).and_then(|size| Pixmap::from_vec(img.into_raw(), size))
            }
            DecodedImage::Stencil(mask) => {
                let (w, h) = mask.dimensions();
                let fill = gs.fill.to_color_u8();
                let data: Vec<u8> = mask
                    .pixels()
                    .flat_map(|p| {
                        if p.0[0] > 0 {
                            [fill.red(), fill.green(), fill.blue(), 255]
                        } else {
                            [0, 0, 0, 0]
                        }
                    })
                    .collect();
                IntSize::from_wh(w, h).and_then(|size| Pixmap::from_vec(data, size))
            }
        };
        let Some(pixmap) = pixmap else {
            return;
        };

        let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
        let unit = Transform::from_row(1.0 / w, 0.0, 0.0, -1.0 / h, 0.0, 1.0);
        let transform = self.transform(&gs.ctm).pre_concat(unit);
        let paint = PixmapPaint {
            quality: FilterQuality::Nearest,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, pixmap.as_ref(), &paint, transform, gs.clip.as_ref());
    }
}
