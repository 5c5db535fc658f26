//! Digital signature fields from the AcroForm field tree.

use std::collections::HashSet;
use std::sync::OnceLock;

use lopdf::{Dictionary, Document, Object, ObjectId};
use regex::bytes::Regex;

use super::date::parse_pdf_date;
use crate::degrade::attempt;
use crate::error::{Error, Result};
use crate::model::{Diagnostic, SignatureField, SignedField, Stage};
use crate::parser::{decode_text_simple, resolve, resolve_dict};
use crate::text::collapse_whitespace;

/// Handler name that marks a signature even without a field.
const PPKLITE_MARKER: &[u8] = b"Adobe.PPKLite";

static SIG_TYPE_MARKER: OnceLock<Regex> = OnceLock::new();

fn sig_type_marker() -> &'static Regex {
    SIG_TYPE_MARKER.get_or_init(|| Regex::new(r"/Type\s*/Sig").expect("valid regex"))
}

/// A field waiting to be visited, with what it inherits from its parent.
struct PendingField<'a> {
    node: &'a Object,
    parent_name: Option<String>,
    field_type: Option<&'a [u8]>,
}

/// Walks `/Root /AcroForm /Fields` looking for `/FT /Sig` fields.
///
/// Field names are fully qualified (`parent.child`). `/FT` is inherited by
/// kid fields. Kids without `/T` are widget annotations of their parent and
/// are not fields of their own. Every indirect node is visited at most once.
pub struct SignatureWalker<'a> {
    doc: &'a Document,
}

impl<'a> SignatureWalker<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    /// All signature fields in field-tree order.
    ///
    /// A field that cannot be read is skipped and noted in `diagnostics`.
    pub fn walk(&self, diagnostics: &mut Vec<Diagnostic>) -> Result<Vec<SignatureField>> {
        let catalog = self
            .doc
            .trailer
            .get(b"Root")
            .ok()
            .and_then(|root| resolve_dict(self.doc, root))
            .ok_or_else(|| Error::MissingObject("document catalog".to_string()))?;

        let Some(acroform) = catalog
            .get(b"AcroForm")
            .ok()
            .and_then(|form| resolve_dict(self.doc, form))
        else {
            log::debug!("no AcroForm");
            return Ok(Vec::new());
        };

        let Some(fields) = acroform
            .get(b"Fields")
            .ok()
            .and_then(|fields| resolve(self.doc, fields).as_array().ok())
        else {
            log::debug!("AcroForm has no /Fields array");
            return Ok(Vec::new());
        };

        let mut visited: HashSet<ObjectId> = HashSet::new();
        let mut stack: Vec<PendingField<'a>> = fields
            .iter()
            .rev()
            .map(|node| PendingField {
                node,
                parent_name: None,
                field_type: None,
            })
            .collect();
        let mut found = Vec::new();

        while let Some(pending) = stack.pop() {
            if let Object::Reference(id) = pending.node {
                if !visited.insert(*id) {
                    log::debug!("field {:?} already visited", id);
                    continue;
                }
            }

            let Some(dict) = resolve_dict(self.doc, pending.node) else {
                log::warn!("form field is not a dictionary, skipping");
                diagnostics.push(Diagnostic::new(
                    Stage::Signatures,
                    None,
                    "form field is not a dictionary",
                ));
                continue;
            };

            let partial = self.text_entry(dict, b"T");
            let name = match (pending.parent_name, partial) {
                (Some(parent), Some(child)) => Some(format!("{}.{}", parent, child)),
                (parent, child) => child.or(parent),
            };
            let field_type = dict
                .get(b"FT")
                .ok()
                .and_then(|ft| resolve(self.doc, ft).as_name().ok())
                .or(pending.field_type);

            let kids: Vec<&'a Object> = dict
                .get(b"Kids")
                .ok()
                .and_then(|kids| resolve(self.doc, kids).as_array().ok())
                .map(|kids| kids.iter().filter(|kid| self.is_field(kid)).collect())
                .unwrap_or_default();

            if kids.is_empty() {
                if field_type == Some(b"Sig".as_slice()) {
                    if let Some(field) = attempt(Stage::Signatures, None, diagnostics, || {
                        self.read_field(dict, name)
                    }) {
                        found.push(field);
                    }
                }
                continue;
            }

            for kid in kids.into_iter().rev() {
                stack.push(PendingField {
                    node: kid,
                    parent_name: name.clone(),
                    field_type,
                });
            }
        }

        log::debug!("{} signature fields", found.len());
        Ok(found)
    }

    fn is_field(&self, node: &Object) -> bool {
        resolve_dict(self.doc, node)
            .map(|d| d.has(b"T"))
            .unwrap_or(false)
    }

    fn read_field(&self, field: &Dictionary, field_name: Option<String>) -> Result<SignatureField> {
        let Ok(value) = field.get(b"V") else {
            return Ok(SignatureField::Unsigned { field_name });
        };

        match resolve(self.doc, value) {
            Object::Null => Ok(SignatureField::Unsigned { field_name }),
            Object::Dictionary(sig) => Ok(SignatureField::Signed(self.signed_field(sig, field_name))),
            Object::Reference(id) => Err(Error::MissingObject(format!(
                "signature value {} {} R",
                id.0, id.1
            ))),
            _ => Err(Error::Corrupted(format!(
                "signature value of field {} is not a dictionary",
                field_name.as_deref().unwrap_or("<unnamed>")
            ))),
        }
    }

    fn signed_field(&self, sig: &Dictionary, field_name: Option<String>) -> SignedField {
        let raw_time = self.text_entry(sig, b"M");
        let signed_on = raw_time.as_deref().and_then(parse_pdf_date);
        if raw_time.is_some() && signed_on.is_none() {
            log::debug!("unparseable signing time {:?}", raw_time);
        }

        SignedField {
            field_name,
            signer_name: self.clean_entry(sig, b"Name"),
            location: self.clean_entry(sig, b"Location"),
            reason: self.clean_entry(sig, b"Reason"),
            contact_info: self.clean_entry(sig, b"ContactInfo"),
            signed_on,
            raw_time,
            filter: self.name_entry(sig, b"Filter"),
            sub_filter: self.name_entry(sig, b"SubFilter"),
        }
    }

    /// A text string entry, decoded but otherwise as written.
    fn text_entry(&self, dict: &Dictionary, key: &[u8]) -> Option<String> {
        match resolve(self.doc, dict.get(key).ok()?) {
            Object::String(bytes, _) => Some(decode_text_simple(bytes)),
            _ => None,
        }
    }

    /// A text string entry with whitespace collapsed; empty becomes `None`.
    fn clean_entry(&self, dict: &Dictionary, key: &[u8]) -> Option<String> {
        self.text_entry(dict, key)
            .map(|s| collapse_whitespace(&s))
            .filter(|s| !s.is_empty())
    }

    fn name_entry(&self, dict: &Dictionary, key: &[u8]) -> Option<String> {
        resolve(self.doc, dict.get(key).ok()?)
            .as_name()
            .ok()
            .map(|name| String::from_utf8_lossy(name).into_owned())
    }
}

/// Look for signature markers in the raw file bytes.
///
/// Returns the first marker found: a `/Type /Sig` entry, else the
/// `Adobe.PPKLite` handler name.
pub fn scan_raw_markers(data: &[u8]) -> Option<String> {
    if let Some(m) = sig_type_marker().find(data) {
        return Some(collapse_whitespace(&String::from_utf8_lossy(m.as_bytes())));
    }
    data.windows(PPKLITE_MARKER.len())
        .any(|w| w == PPKLITE_MARKER)
        .then(|| String::from_utf8_lossy(PPKLITE_MARKER).into_owned())
}

/// Digital signatures of a document.
///
/// `doc` is `None` when the object graph could not be opened; the raw scan
/// still runs in that case. The scan only runs when no field was found.
pub fn digital_signatures(
    doc: Option<&Document>,
    data: &[u8],
    raw_scan: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<SignatureField> {
    let mut fields = Vec::new();
    if let Some(doc) = doc {
        let mut field_diagnostics = Vec::new();
        if let Some(walked) = attempt(Stage::Signatures, None, diagnostics, || {
            SignatureWalker::new(doc).walk(&mut field_diagnostics)
        }) {
            fields = walked;
        }
        diagnostics.append(&mut field_diagnostics);
    }

    if fields.is_empty() && raw_scan {
        if let Some(marker) = scan_raw_markers(data) {
            log::debug!("no signature field, raw marker {:?} found", marker);
            fields.push(SignatureField::Marker { marker });
        }
    }
    fields
}
