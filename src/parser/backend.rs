//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for PDF operations, isolating
//! the concrete PDF library (lopdf) from the layout, table and raster code.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use image::{GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use lopdf::{encryption, Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::model::PageBox;

/// Page identifier: (object number, generation number).
pub type PageId = ObjectId;

/// Longest chain of indirect references or `/Parent` links followed.
const MAX_LINK_DEPTH: usize = 32;

/// Glyph width (1/1000 em) used when a font has no usable metrics.
const FALLBACK_GLYPH_WIDTH: f32 = 500.0;

/// Largest image side accepted, in samples.
const MAX_IMAGE_SIDE: u32 = 16_384;

/// Largest image accepted, in samples.
const MAX_IMAGE_PIXELS: u64 = 64 * 1024 * 1024;

/// A value from a PDF content stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

impl PdfValue {
    /// Numeric value, if this operand is a number.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            PdfValue::Integer(i) => Some(*i as f32),
            PdfValue::Real(r) => Some(*r),
            _ => None,
        }
    }
}

/// A single operation from a PDF content stream.
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl ContentOp {
    /// The `i`-th operand as a number.
    pub fn number(&self, i: usize) -> Option<f32> {
        self.operands.get(i).and_then(PdfValue::as_number)
    }

    /// All operands as numbers, or `None` if any is not numeric.
    pub fn numbers(&self) -> Option<Vec<f32>> {
        self.operands.iter().map(PdfValue::as_number).collect()
    }

    /// The first operand as a name.
    pub fn name(&self) -> Option<&[u8]> {
        match self.operands.first() {
            Some(PdfValue::Name(n)) => Some(n),
            _ => None,
        }
    }
}

/// Where named resources (fonts, XObjects) are looked up.
///
/// A form XObject's own `/Resources` win over the page's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceScope {
    pub page: PageId,
    pub form: Option<ObjectId>,
}

impl ResourceScope {
    pub fn page(page: PageId) -> Self {
        Self { page, form: None }
    }

    pub fn with_form(self, form: ObjectId) -> Self {
        Self {
            page: self.page,
            form: Some(form),
        }
    }
}

/// Glyph advance widths of one font.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    widths: HashMap<u32, f32>,
    default_width: f32,
    bytes_per_code: usize,
}

impl FontMetrics {
    /// Metrics for a font we know nothing about.
    pub fn fallback() -> Self {
        Self {
            widths: HashMap::new(),
            default_width: FALLBACK_GLYPH_WIDTH,
            bytes_per_code: 1,
        }
    }

    /// Split a string operand into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        self.code_chunks(bytes).map(|(code, _)| code).collect()
    }

    /// Character codes of a string operand with the bytes each came from.
    pub fn code_chunks<'b>(&self, bytes: &'b [u8]) -> impl Iterator<Item = (u32, &'b [u8])> + 'b {
        bytes
            .chunks(self.bytes_per_code.max(1))
            .map(|c| (c.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32), c))
    }

    /// Advance width of a code in 1/1000 text space units.
    pub fn width(&self, code: u32) -> f32 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    /// Whether the font uses multi-byte codes (word spacing never applies).
    pub fn is_multi_byte(&self) -> bool {
        self.bytes_per_code > 1
    }
}

/// How character codes select glyphs in an embedded font program.
#[derive(Debug, Clone, PartialEq)]
pub enum GlyphMapping {
    /// Simple font: codes go through the program's own `cmap`
    Simple,
    /// Composite font whose CIDs are glyph ids
    Identity,
    /// Composite font with a `/CIDToGIDMap` stream
    Table(Vec<u16>),
}

/// An embedded TrueType or OpenType font program.
#[derive(Debug, Clone)]
pub struct FontProgram {
    pub data: Arc<Vec<u8>>,
    pub mapping: GlyphMapping,
}

/// A form XObject ready to be interpreted.
#[derive(Debug, Clone)]
pub struct FormXObject {
    pub id: ObjectId,
    pub content: Vec<u8>,
    /// `/Matrix`, identity when absent
    pub matrix: [f32; 6],
}

/// What a `Do` operand refers to.
#[derive(Debug, Clone)]
pub enum XObjectKind {
    Image(ObjectId),
    Form(FormXObject),
}

/// Pixels of an image XObject.
#[derive(Debug, Clone)]
pub enum DecodedImage {
    /// Opaque samples converted to RGBA
    Pixels(RgbaImage),
    /// `/ImageMask` stencil, 255 where the fill colour is painted
    Stencil(GrayImage),
}

/// Abstract interface for PDF document access.
///
/// Implementations provide page enumeration, geometry, content stream
/// decoding, font metrics and XObject access, without exposing any
/// concrete PDF library types.
pub trait PdfBackend: Send + Sync {
    /// Page numbers (1-indexed) in document order.
    fn page_numbers(&self) -> Vec<u32>;

    /// Resolve a page number to its page object.
    fn page_id(&self, page_no: u32) -> Result<PageId>;

    /// The page's media box, inherited through `/Parent`, Letter when absent.
    fn page_box(&self, page: PageId) -> PageBox;

    /// Return the raw (decompressed) content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>>;

    /// Parse raw content stream bytes into a sequence of operations.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>>;

    /// Decode a text byte sequence using the font's encoding.
    /// Falls back to simple decoding if the font or encoding is unavailable.
    fn decode_text(&self, scope: ResourceScope, font_name: &[u8], bytes: &[u8]) -> String;

    /// Advance widths of a font resource.
    fn font_metrics(&self, scope: ResourceScope, font_name: &[u8]) -> FontMetrics;

    /// The font resource's embedded TrueType/OpenType program, if any.
    fn font_program(&self, scope: ResourceScope, font_name: &[u8]) -> Option<FontProgram>;

    /// Look up a named XObject.
    fn xobject(&self, scope: ResourceScope, name: &[u8]) -> Option<XObjectKind>;

    /// Decode an image XObject's samples.
    fn decode_image(&self, id: ObjectId) -> Result<DecodedImage>;

    /// Plain text of a page from the library's own extractor.
    fn simple_text(&self, page_no: u32) -> Result<String>;
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // Try UTF-16BE first (BOM marker)
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    // Try UTF-8
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Fallback: Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

// ---------------------------------------------------------------------------
// LopdfBackend: concrete implementation backed by lopdf
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] backed by `lopdf::Document`.
///
/// Cheap to clone; clones share the parsed document.
#[derive(Clone)]
pub struct LopdfBackend {
    doc: Arc<LopdfDocument>,
    pages: BTreeMap<u32, PageId>,
}

impl LopdfBackend {
    /// Load from an in-memory byte slice.
    ///
    /// Encrypted files are opened with the empty user password; any other
    /// password surfaces as [`Error::Encrypted`].
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let mut doc = LopdfDocument::load_mem(data)?;
        if doc.is_encrypted() {
            log::debug!("document is encrypted, trying the empty user password");
            decrypt_with_empty_password(&mut doc)?;
        }
        let pages = doc.get_pages();
        Ok(Self {
            doc: Arc::new(doc),
            pages,
        })
    }

    /// Direct access to the underlying `lopdf::Document`.
    ///
    /// Escape hatch for operations not covered by `PdfBackend`
    /// (the AcroForm walk, for one).
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    /// Get PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }

    fn page_dict(&self, page: PageId) -> Option<&Dictionary> {
        self.doc.get_dictionary(page).ok()
    }

    /// Resource dictionaries in lookup order for a scope.
    fn resource_dicts(&self, scope: ResourceScope) -> Vec<&Dictionary> {
        let mut dicts = Vec::with_capacity(2);
        if let Some(form) = scope.form {
            if let Ok(Object::Stream(s)) = self.doc.get_object(form) {
                if let Some(res) = s.dict.get(b"Resources").ok().and_then(|o| resolve_dict(&self.doc, o)) {
                    dicts.push(res);
                }
            }
        }
        if let Some(res) = inherited_attribute(&self.doc, scope.page, b"Resources")
            .and_then(|o| resolve_dict(&self.doc, o))
        {
            dicts.push(res);
        }
        dicts
    }

    /// Find `/Resources/<category>/<name>`, returning the entry and its object id.
    fn resource(
        &self,
        scope: ResourceScope,
        category: &[u8],
        name: &[u8],
    ) -> Option<(Option<ObjectId>, &Object)> {
        self.resource_dicts(scope).into_iter().find_map(|res| {
            let entries = res.get(category).ok().and_then(|o| resolve_dict(&self.doc, o))?;
            let entry = entries.get(name).ok()?;
            let id = entry.as_reference().ok();
            Some((id, resolve(&self.doc, entry)))
        })
    }

    fn font_dict(&self, scope: ResourceScope, font_name: &[u8]) -> Option<&Dictionary> {
        match self.resource(scope, b"Font", font_name)?.1 {
            Object::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    fn simple_font_metrics(&self, font: &Dictionary) -> Option<FontMetrics> {
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(resolve(&self.doc, o)))? as u32;
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(&self.doc, o).as_array().ok())?;
        let missing = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve_dict(&self.doc, o))
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(|o| number(resolve(&self.doc, o)))
            .filter(|w| *w > 0.0)
            .unwrap_or(FALLBACK_GLYPH_WIDTH);

        let widths = widths
            .iter()
            .enumerate()
            .filter_map(|(i, w)| Some((first_char + i as u32, number(resolve(&self.doc, w))?)))
            .collect();
        Some(FontMetrics {
            widths,
            default_width: missing,
            bytes_per_code: 1,
        })
    }

    fn descendant_font<'d>(&'d self, font: &'d Dictionary) -> Option<&'d Dictionary> {
        font.get(b"DescendantFonts")
            .ok()
            .and_then(|o| resolve(&self.doc, o).as_array().ok())
            .and_then(|arr| arr.first())
            .and_then(|o| resolve_dict(&self.doc, o))
    }

    fn composite_font_metrics(&self, font: &Dictionary) -> FontMetrics {
        let mut metrics = FontMetrics {
            widths: HashMap::new(),
            default_width: 1000.0,
            bytes_per_code: 2,
        };

        let Some(descendant) = self.descendant_font(font) else {
            return metrics;
        };

        if let Some(dw) = descendant
            .get(b"DW")
            .ok()
            .and_then(|o| number(resolve(&self.doc, o)))
        {
            metrics.default_width = dw;
        }

        let Some(w) = descendant
            .get(b"W")
            .ok()
            .and_then(|o| resolve(&self.doc, o).as_array().ok())
        else {
            return metrics;
        };

        // /W mixes `c [w1 w2 ...]` and `c_first c_last w` groups
        let mut i = 0;
        while i < w.len() {
            let Some(start) = number(resolve(&self.doc, &w[i])) else {
                break;
            };
            let start = start as u32;
            match w.get(i + 1).map(|o| resolve(&self.doc, o)) {
                Some(Object::Array(list)) => {
                    for (k, width) in list.iter().enumerate() {
                        if let Some(width) = number(resolve(&self.doc, width)) {
                            metrics.widths.insert(start + k as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(end) => {
                    let end = number(end).map(|e| e as u32).unwrap_or(start);
                    let width = w.get(i + 2).and_then(|o| number(resolve(&self.doc, o)));
                    if let Some(width) = width {
                        for code in start..=end.min(start.saturating_add(0xFFFF)) {
                            metrics.widths.insert(code, width);
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
        metrics
    }
}

impl PdfBackend for LopdfBackend {
    fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    fn page_id(&self, page_no: u32) -> Result<PageId> {
        self.pages
            .get(&page_no)
            .copied()
            .ok_or(Error::PageOutOfRange(page_no, self.pages.len() as u32))
    }

    fn page_box(&self, page: PageId) -> PageBox {
        inherited_attribute(&self.doc, page, b"MediaBox")
            .and_then(|o| resolve(&self.doc, o).as_array().ok())
            .and_then(|arr| {
                let n: Vec<f32> = arr
                    .iter()
                    .filter_map(|o| number(resolve(&self.doc, o)))
                    .collect();
                (n.len() == 4).then(|| PageBox::new(n[0], n[1], n[2], n[3]))
            })
            .filter(|b| b.width() > 0.0 && b.height() > 0.0)
            .unwrap_or_default()
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>> {
        let page_dict = self
            .page_dict(page)
            .ok_or_else(|| Error::MissingObject(format!("page {:?}", page)))?;

        let contents = match page_dict.get(b"Contents") {
            Ok(c) => resolve(&self.doc, c),
            // A page without /Contents is blank
            Err(_) => return Ok(Vec::new()),
        };

        match contents {
            Object::Stream(s) => stream_data(s),
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Object::Stream(s) = resolve(&self.doc, obj) {
                        match stream_data(s) {
                            Ok(data) => {
                                content.extend_from_slice(&data);
                                content.push(b'\n');
                            }
                            Err(e) => log::debug!("skipping unreadable content stream: {}", e),
                        }
                    }
                }
                Ok(content)
            }
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>> {
        let content =
            lopdf::content::Content::decode(data).map_err(|e| Error::PdfParse(e.to_string()))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn decode_text(&self, scope: ResourceScope, font_name: &[u8], bytes: &[u8]) -> String {
        if let Some(font_dict) = self.font_dict(scope, font_name) {
            if let Ok(enc) = font_dict.get_font_encoding(&self.doc) {
                if let Ok(text) = LopdfDocument::decode_text(&enc, bytes) {
                    return text;
                }
            }
        }
        decode_text_simple(bytes)
    }

    fn font_metrics(&self, scope: ResourceScope, font_name: &[u8]) -> FontMetrics {
        let Some(font) = self.font_dict(scope, font_name) else {
            return FontMetrics::fallback();
        };
        let subtype = font.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        if subtype == Some(b"Type0".as_slice()) {
            return self.composite_font_metrics(font);
        }
        self.simple_font_metrics(font)
            .unwrap_or_else(FontMetrics::fallback)
    }

    fn font_program(&self, scope: ResourceScope, font_name: &[u8]) -> Option<FontProgram> {
        let font = self.font_dict(scope, font_name)?;
        let subtype = font.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        let (described, mapping) = if subtype == Some(b"Type0".as_slice()) {
            let descendant = self.descendant_font(font)?;
            let mapping = match descendant
                .get(b"CIDToGIDMap")
                .ok()
                .map(|o| resolve(&self.doc, o))
            {
                Some(Object::Stream(s)) => GlyphMapping::Table(
                    stream_data(s)
                        .ok()?
                        .chunks_exact(2)
                        .map(|c| u16::from_be_bytes([c[0], c[1]]))
                        .collect(),
                ),
                _ => GlyphMapping::Identity,
            };
            (descendant, mapping)
        } else {
            (font, GlyphMapping::Simple)
        };

        let descriptor = described
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve_dict(&self.doc, o))?;
        let data = [b"FontFile2".as_slice(), b"FontFile3".as_slice()]
            .into_iter()
            .find_map(|key| match descriptor.get(key).ok().map(|o| resolve(&self.doc, o)) {
                Some(Object::Stream(s)) => stream_data(s).ok(),
                _ => None,
            })?;
        Some(FontProgram {
            data: Arc::new(data),
            mapping,
        })
    }

    fn xobject(&self, scope: ResourceScope, name: &[u8]) -> Option<XObjectKind> {
        let (id, obj) = self.resource(scope, b"XObject", name)?;
        let Object::Stream(stream) = obj else {
            return None;
        };
        let subtype = stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok())?;
        match subtype {
            b"Image" => Some(XObjectKind::Image(id?)),
            b"Form" => {
                let id = id?;
                let content = stream_data(stream).ok()?;
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|o| resolve(&self.doc, o).as_array().ok())
                    .and_then(|arr| {
                        let m: Vec<f32> = arr
                            .iter()
                            .filter_map(|o| number(resolve(&self.doc, o)))
                            .collect();
                        (m.len() == 6).then(|| [m[0], m[1], m[2], m[3], m[4], m[5]])
                    })
                    .unwrap_or([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
                Some(XObjectKind::Form(FormXObject {
                    id,
                    content,
                    matrix,
                }))
            }
            _ => None,
        }
    }

    fn decode_image(&self, id: ObjectId) -> Result<DecodedImage> {
        match self.doc.get_object(id)? {
            Object::Stream(stream) => decode_image_stream(&self.doc, stream),
            _ => Err(Error::Render(format!("image {:?} is not a stream", id))),
        }
    }

    fn simple_text(&self, page_no: u32) -> Result<String> {
        self.page_id(page_no)?;
        Ok(self.doc.extract_text(&[page_no])?)
    }
}

// ---------------------------------------------------------------------------
// Object graph helpers
// ---------------------------------------------------------------------------

/// Follow indirect references until a direct object is reached.
///
/// Dangling references and reference cycles resolve to the last object seen.
pub(crate) fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_LINK_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Resolve to a dictionary, looking through streams.
pub(crate) fn resolve_dict<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Numeric value of an object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Look up an inheritable page attribute, walking `/Parent` links.
fn inherited_attribute<'a>(
    doc: &'a LopdfDocument,
    page: PageId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut visited = HashSet::new();
    let mut current = doc.get_dictionary(page).ok()?;
    visited.insert(page);

    for _ in 0..MAX_LINK_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        if !visited.insert(parent) {
            return None;
        }
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Decrypt every string and stream with the empty user password.
///
/// Unlike `Document::decrypt`, strings nested inside dictionaries and
/// arrays are decrypted too; field names and signature metadata live there.
fn decrypt_with_empty_password(doc: &mut LopdfDocument) -> Result<()> {
    let encrypt_id = doc
        .trailer
        .get(b"Encrypt")
        .and_then(Object::as_reference)
        .ok();
    let key = encryption::get_encryption_key(doc, "", true).map_err(|e| {
        log::debug!("empty user password rejected: {}", e);
        Error::Encrypted
    })?;

    for (&id, obj) in doc.objects.iter_mut() {
        if Some(id) != encrypt_id {
            decrypt_nested(&key, id, obj);
        }
    }
    doc.trailer.remove(b"Encrypt");
    Ok(())
}

fn decrypt_nested(key: &[u8], id: ObjectId, obj: &mut Object) {
    let is_xref = matches!(obj, Object::Stream(s) if s.dict.get(b"Type").and_then(Object::as_name).ok() == Some(b"XRef".as_slice()));
    if !is_xref {
        if let Ok(plain) = encryption::decrypt_object(key, id, obj) {
            match obj {
                Object::String(bytes, _) => *bytes = plain,
                Object::Stream(stream) => stream.set_content(plain),
                _ => {}
            }
        }
    }
    match obj {
        Object::Array(items) => items.iter_mut().for_each(|o| decrypt_nested(key, id, o)),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, o)| decrypt_nested(key, id, o)),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .for_each(|(_, o)| decrypt_nested(key, id, o)),
        _ => {}
    }
}

/// Stream bytes with filters applied; unfiltered streams are returned as is.
fn stream_data(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|e| Error::PdfParse(e.to_string()))
}

/// Convert a `lopdf::Object` to [`PdfValue`].
fn convert_object(obj: &Object) -> PdfValue {
    match obj {
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(r) => PdfValue::Real(*r),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(b, _) => PdfValue::Str(b.clone()),
        Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        _ => PdfValue::Other,
    }
}

// ---------------------------------------------------------------------------
// Image decoding
// ---------------------------------------------------------------------------

/// Colour space of raw image samples.
#[derive(Debug, Clone)]
enum SampleSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette lookup into a base space
    Indexed { base: Box<SampleSpace>, palette: Vec<u8> },
}

impl SampleSpace {
    fn components(&self) -> usize {
        match self {
            SampleSpace::Gray | SampleSpace::Indexed { .. } => 1,
            SampleSpace::Rgb => 3,
            SampleSpace::Cmyk => 4,
        }
    }

    fn to_rgba(&self, samples: &[u8]) -> Rgba<u8> {
        match self {
            SampleSpace::Gray => Rgba([samples[0], samples[0], samples[0], 255]),
            SampleSpace::Rgb => Rgba([samples[0], samples[1], samples[2], 255]),
            SampleSpace::Cmyk => {
                let k = 255 - samples[3] as u16;
                let ch = |c: u8| ((255 - c as u16) * k / 255) as u8;
                Rgba([ch(samples[0]), ch(samples[1]), ch(samples[2]), 255])
            }
            SampleSpace::Indexed { base, palette } => {
                let n = base.components();
                let start = samples[0] as usize * n;
                match palette.get(start..start + n) {
                    Some(entry) => base.to_rgba(entry),
                    None => Rgba([0, 0, 0, 255]),
                }
            }
        }
    }
}

fn sample_space(doc: &LopdfDocument, obj: &Object, depth: usize) -> Result<SampleSpace> {
    if depth > 4 {
        return Err(Error::Render("colour space nesting too deep".to_string()));
    }
    match resolve(doc, obj) {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"G" | b"CalGray" => Ok(SampleSpace::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(SampleSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(SampleSpace::Cmyk),
            other => Err(Error::Render(format!(
                "unsupported colour space {}",
                String::from_utf8_lossy(other)
            ))),
        },
        Object::Array(arr) => {
            let family = arr.first().and_then(|o| o.as_name().ok()).unwrap_or(b"");
            match family {
                b"ICCBased" => {
                    let n = arr
                        .get(1)
                        .and_then(|o| resolve_dict(doc, o))
                        .and_then(|d| d.get(b"N").ok())
                        .and_then(number)
                        .unwrap_or(3.0) as usize;
                    Ok(match n {
                        1 => SampleSpace::Gray,
                        4 => SampleSpace::Cmyk,
                        _ => SampleSpace::Rgb,
                    })
                }
                b"CalGray" => Ok(SampleSpace::Gray),
                b"CalRGB" | b"Lab" => Ok(SampleSpace::Rgb),
                b"Indexed" | b"I" => {
                    let base = arr
                        .get(1)
                        .ok_or_else(|| Error::Render("indexed space without base".to_string()))?;
                    let base = sample_space(doc, base, depth + 1)?;
                    let palette = match arr.get(3).map(|o| resolve(doc, o)) {
                        Some(Object::String(bytes, _)) => bytes.clone(),
                        Some(Object::Stream(s)) => stream_data(s)?,
                        _ => Vec::new(),
                    };
                    Ok(SampleSpace::Indexed {
                        base: Box::new(base),
                        palette,
                    })
                }
                other => Err(Error::Render(format!(
                    "unsupported colour space {}",
                    String::from_utf8_lossy(other)
                ))),
            }
        }
        _ => Ok(SampleSpace::Gray),
    }
}

/// Name of the last filter applied to a stream.
fn last_filter(stream: &Stream) -> Option<Vec<u8>> {
    match stream.dict.get(b"Filter").ok()? {
        Object::Name(n) => Some(n.clone()),
        Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()).map(<[u8]>::to_vec),
        _ => None,
    }
}

/// Fail unless `data` holds `height` rows of `row_bytes`.
fn require_samples(data: &[u8], row_bytes: usize, height: u32) -> Result<()> {
    let needed = row_bytes.saturating_mul(height as usize);
    if data.len() < needed {
        return Err(Error::Render(format!(
            "image data too short ({} < {})",
            data.len(),
            needed
        )));
    }
    Ok(())
}

fn decode_image_stream(doc: &LopdfDocument, stream: &Stream) -> Result<DecodedImage> {
    let dict = &stream.dict;
    let dim = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|o| number(resolve(doc, o)))
            .map(|v| v as u32)
            .filter(|v| *v > 0)
            .ok_or_else(|| Error::Render("image without dimensions".to_string()))
    };
    let width = dim(b"Width")?;
    let height = dim(b"Height")?;
    if width > MAX_IMAGE_SIDE
        || height > MAX_IMAGE_SIDE
        || width as u64 * height as u64 > MAX_IMAGE_PIXELS
    {
        return Err(Error::Render(format!(
            "image of {}x{} samples is too large",
            width, height
        )));
    }

    let is_mask = dict
        .get(b"ImageMask")
        .ok()
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);

    // Decode [1 0] flips sample polarity
    let inverted = dict
        .get(b"Decode")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
        .and_then(|arr| arr.first().and_then(number))
        .map(|first| first > 0.5)
        .unwrap_or(false);

    match last_filter(stream).as_deref() {
        Some(b"DCTDecode") | Some(b"DCT") => {
            let img = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)?;
            return Ok(DecodedImage::Pixels(img.to_rgba8()));
        }
        Some(b"JPXDecode") | Some(b"JBIG2Decode") | Some(b"CCITTFaxDecode") => {
            return Err(Error::Render("unsupported image filter".to_string()));
        }
        _ => {}
    }

    let data = stream_data(stream)?;

    if is_mask {
        let row_bytes = (width as usize).div_ceil(8);
        require_samples(&data, row_bytes, height)?;
        let mask = GrayImage::from_fn(width, height, |x, y| {
            let byte = data
                .get(y as usize * row_bytes + x as usize / 8)
                .copied()
                .unwrap_or(0xFF);
            let bit = (byte >> (7 - (x % 8))) & 1;
            // Sample 0 paints unless the decode array is inverted
            let paint = (bit == 0) != inverted;
            Luma([if paint { 255 } else { 0 }])
        });
        return Ok(DecodedImage::Stencil(mask));
    }

    let space = match dict.get(b"ColorSpace") {
        Ok(cs) => sample_space(doc, cs, 0)?,
        Err(_) => SampleSpace::Gray,
    };
    let bpc = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| number(resolve(doc, o)))
        .unwrap_or(8.0) as usize;

    let n = space.components();
    match bpc {
        8 => {
            let row_bytes = width as usize * n;
            require_samples(&data, row_bytes, height)?;
            let img = RgbaImage::from_fn(width, height, |x, y| {
                let start = y as usize * row_bytes + x as usize * n;
                let mut px = space.to_rgba(&data[start..start + n]);
                if inverted {
                    for c in px.0.iter_mut().take(3) {
                        *c = 255 - *c;
                    }
                }
                px
            });
            Ok(DecodedImage::Pixels(img))
        }
        1 | 2 | 4 if n == 1 => {
            let row_bytes = (width as usize * bpc).div_ceil(8);
            require_samples(&data, row_bytes, height)?;
            let max = (1u16 << bpc) - 1;
            let img = RgbaImage::from_fn(width, height, |x, y| {
                let bit_offset = x as usize * bpc;
                let byte = data
                    .get(y as usize * row_bytes + bit_offset / 8)
                    .copied()
                    .unwrap_or(0);
                let shift = 8 - bpc - (bit_offset % 8);
                let sample = ((byte >> shift) as u16) & max;
                let sample = if inverted { max - sample } else { sample };
                match &space {
                    SampleSpace::Indexed { .. } => space.to_rgba(&[sample as u8]),
                    _ => {
                        let v = (sample * 255 / max) as u8;
                        Rgba([v, v, v, 255])
                    }
                }
            });
            Ok(DecodedImage::Pixels(img))
        }
        _ => Err(Error::Render(format!(
            "unsupported image layout: {} bits x {} components",
            bpc, n
        ))),
    }
}
