//! Small PDF builders for unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Builds a Letter-sized document page by page.
pub(crate) struct TestPdf {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    page_ids: Vec<ObjectId>,
    catalog: Dictionary,
}

impl TestPdf {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_id,
            page_ids: Vec::new(),
            catalog: dictionary! { "Type" => "Catalog" },
        }
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Add a page drawing `ops`, with font `F1`.
    pub fn page(&mut self, ops: Vec<Operation>) -> ObjectId {
        self.page_with_xobjects(ops, &[])
    }

    /// Add a page drawing `ops`, with font `F1` and the named XObjects.
    pub fn page_with_xobjects(&mut self, ops: Vec<Operation>, xobjects: &[(&str, ObjectId)]) -> ObjectId {
        let content = Content { operations: ops };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let mut xobject_dict = Dictionary::new();
        for (name, id) in xobjects {
            xobject_dict.set(*name, *id);
        }

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => self.font_id },
                "XObject" => xobject_dict,
            },
        });
        self.page_ids.push(page_id);
        page_id
    }

    /// Add an 8-bit grayscale image XObject.
    pub fn gray_image(&mut self, width: u32, height: u32, samples: Vec<u8>) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            samples,
        ))
    }

    /// Set a catalog entry (e.g. `/AcroForm`).
    pub fn catalog_entry(&mut self, key: &str, value: impl Into<Object>) {
        self.catalog.set(key, value);
    }

    pub fn to_bytes(mut self) -> Vec<u8> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| (*id).into()).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        self.catalog.set("Pages", self.pages_id);
        let catalog_id = self.doc.add_object(self.catalog);
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).unwrap();
        bytes
    }
}

/// Show `text` with `F1` at `(x, y)` in PDF user space.
pub(crate) fn text_at(x: i64, y: i64, size: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Fill a black rectangle in PDF user space.
pub(crate) fn filled_rect(x: i64, y: i64, w: i64, h: i64) -> Vec<Operation> {
    vec![
        Operation::new("g", vec![0.into()]),
        Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
        Operation::new("f", vec![]),
    ]
}

/// Draw a named XObject scaled to `w x h` at `(x, y)`.
pub(crate) fn draw_xobject(name: &str, x: i64, y: i64, w: i64, h: i64) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![w.into(), 0.into(), 0.into(), h.into(), x.into(), y.into()],
        ),
        Operation::new("Do", vec![name.into()]),
        Operation::new("Q", vec![]),
    ]
}
