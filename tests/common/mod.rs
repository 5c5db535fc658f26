//! Shared helpers for integration tests: in-memory PDFs and mock OCR.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use image::GrayImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdfsig::{OcrEngine, Result};

/// Builds Letter-sized PDFs page by page.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    page_ids: Vec<ObjectId>,
    fields: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
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
            fields: Vec::new(),
        }
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Add a page drawing `ops`.
    pub fn page(&mut self, ops: Vec<Operation>) -> &mut Self {
        self.page_with_image(ops, None)
    }

    /// Add a page drawing `ops`, with `/Im1` bound to `image`.
    pub fn page_with_image(&mut self, ops: Vec<Operation>, image: Option<ObjectId>) -> &mut Self {
        let content = Content { operations: ops };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let mut xobjects = Dictionary::new();
        if let Some(id) = image {
            xobjects.set("Im1", id);
        }
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => self.font_id },
                "XObject" => xobjects,
            },
        });
        self.page_ids.push(page_id);
        self
    }

    /// Add an 8-bit grayscale image XObject.
    pub fn gray_image(&mut self, image: &GrayImage) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width() as i64,
                "Height" => image.height() as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            image.as_raw().clone(),
        ))
    }

    /// Register a top-level AcroForm field.
    pub fn field(&mut self, field: Dictionary) -> ObjectId {
        let id = self.doc.add_object(field);
        self.fields.push(id.into());
        id
    }

    pub fn build(mut self) -> Vec<u8> {
        self.finish();
        self.save()
    }

    /// Like [`build`](Self::build), but RC4-encrypted for the empty user
    /// password. Without `/U` the password is not checked.
    pub fn build_encrypted(self) -> Vec<u8> {
        self.encrypt_and_save(None)
    }

    /// Encrypted with a user password hash the empty password cannot match.
    pub fn build_password_protected(self) -> Vec<u8> {
        self.encrypt_and_save(Some(vec![0; 32]))
    }

    fn encrypt_and_save(mut self, user_hash: Option<Vec<u8>>) -> Vec<u8> {
        self.finish();
        let mut encrypt = dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "Length" => 40,
            "O" => Object::String(vec![0x5A; 32], StringFormat::Hexadecimal),
            "P" => -44,
        };
        if let Some(hash) = user_hash {
            encrypt.set("U", Object::String(hash, StringFormat::Hexadecimal));
        }
        let encrypt_id = self.doc.add_object(encrypt);
        let file_id = Object::String(b"pdfsig-test-0001".to_vec(), StringFormat::Hexadecimal);
        self.doc.trailer.set("ID", vec![file_id.clone(), file_id]);
        self.doc.trailer.set("Encrypt", encrypt_id);

        let key = lopdf::encryption::get_encryption_key(&self.doc, "", false).unwrap();
        for (&id, obj) in self.doc.objects.iter_mut() {
            if id != encrypt_id {
                encrypt_nested(&key, id, obj);
            }
        }
        self.save()
    }

    fn finish(&mut self) {
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

        let mut catalog = dictionary! { "Type" => "Catalog", "Pages" => self.pages_id };
        if !self.fields.is_empty() {
            catalog.set("AcroForm", dictionary! { "Fields" => self.fields.clone() });
        }
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", catalog_id);
    }

    fn save(mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).unwrap();
        bytes
    }
}

/// RC4 is symmetric, so the decryption routine encrypts too.
fn encrypt_nested(key: &[u8], id: ObjectId, obj: &mut Object) {
    if let Ok(cipher) = lopdf::encryption::decrypt_object(key, id, obj) {
        match obj {
            Object::String(bytes, format) => {
                *bytes = cipher;
                *format = StringFormat::Hexadecimal;
            }
            Object::Stream(stream) => stream.set_content(cipher),
            _ => {}
        }
    }
    match obj {
        Object::Array(items) => items.iter_mut().for_each(|o| encrypt_nested(key, id, o)),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, o)| encrypt_nested(key, id, o)),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .for_each(|(_, o)| encrypt_nested(key, id, o)),
        _ => {}
    }
}

/// A PDF text string.
pub fn text_string(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
}

/// Show `text` with `F1` at `(x, y)` in PDF user space.
pub fn text_ops(x: i64, y: i64, size: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Fill a black rectangle in PDF user space.
pub fn rect_ops(x: i64, y: i64, w: i64, h: i64) -> Vec<Operation> {
    vec![
        Operation::new("g", vec![0.into()]),
        Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
        Operation::new("f", vec![]),
    ]
}

/// Draw `/Im1` over the whole page.
pub fn full_page_image_ops() -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![612.into(), 0.into(), 0.into(), 792.into(), 0.into(), 0.into()],
        ),
        Operation::new("Do", vec!["Im1".into()]),
        Operation::new("Q", vec![]),
    ]
}

/// OCR stand-in that returns fixed text, counts calls and keeps the last image.
pub struct CountingOcr {
    text: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_image: Mutex<Option<GrayImage>>,
}

impl CountingOcr {
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delay: None,
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        }
    }

    /// Sleep for `delay` before answering.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The image of the most recent call.
    pub fn last_image(&self) -> Option<GrayImage> {
        self.last_image.lock().unwrap().clone()
    }
}

impl OcrEngine for CountingOcr {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() = Some(image.clone());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "counting"
    }
}
