//! Result records produced by one analysis.
//!
//! The records are plain in-memory values. Their serialized form is the
//! JSON shape callers hand back to clients:
//!
//! ```text
//! {
//!   pages: [ {page_no, text, source}, ... ],
//!   tables: [ {page_no, rows, cols, bbox}, ... ],
//!   digital_signatures: [ {field_name, signed, signer_name?, ...}, ... ],
//!   wet_signature: { wet_signatures_detected, details: [ ... ] }
//! }
//! ```

mod geometry;
mod page;
mod result;
mod signature;
mod table;

pub use geometry::{PageBox, Rect};
pub use page::{TextRecord, TextSource};
pub use result::{AnalysisResult, Diagnostic, Stage};
pub use signature::{
    InkRegion, PdfTimestamp, SignatureField, SignatureFieldRecord, SignedField,
    WetSignatureCandidate, WetSignatureRecord, WetSignatureSummary,
};
pub use table::TableRecord;
