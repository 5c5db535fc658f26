//! Digital and wet signature detection.
//!
//! Digital signatures come from the AcroForm field tree ([`SignatureWalker`]),
//! with a raw-byte marker scan when the tree yields nothing. Wet signatures
//! are scored by rasterizing the area next to anchor labels such as
//! "Signed by" and measuring how much of it is inked.

mod anchors;
mod date;
mod fields;
mod wet;

pub use anchors::{find_anchors, search_lines, LabelMatch};
pub use date::parse_pdf_date;
pub use fields::{digital_signatures, scan_raw_markers, SignatureWalker};
pub use wet::{candidate_region, ink_density, WetSignatureLocator};
