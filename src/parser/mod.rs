//! PDF parsing module.

mod backend;
mod glyphs;
mod layout;
mod raster;
mod table_detector;

pub(crate) use backend::{resolve, resolve_dict};
pub use backend::{
    decode_text_simple, ContentOp, DecodedImage, FontMetrics, FontProgram, FormXObject,
    GlyphMapping, LopdfBackend, PageId, PdfBackend, PdfValue, ResourceScope, XObjectKind,
};
pub use layout::{LayoutAnalyzer, Matrix, TextLine, TextSpan};
pub use raster::Rasterizer;
pub use table_detector::{detect_grids, TextGrid};
