//! Analysis options and configuration.

use std::time::Duration;

/// Default label vocabulary searched for wet-signature anchors.
pub const DEFAULT_LABELS: &[&str] = &[
    "signature",
    "signatory",
    "authorised signatory",
    "authorized signatory",
    "approved by",
    "signed by",
];

/// Default bound on one OCR call.
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(60);

/// Options for analyzing PDF documents.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Pages whose normalized native text is shorter than this are OCR'd
    pub ocr_threshold_chars: usize,

    /// Minimum ink density for a candidate region to count as signed
    pub density_threshold: f32,

    /// Rasterization scale used for OCR and ink scoring
    pub render_scale: f32,

    /// Luma values strictly below this are ink
    pub ink_intensity_threshold: u8,

    /// Anchor labels searched case-insensitively on every page
    pub labels: Vec<String>,

    /// Placement of the candidate region relative to its label
    pub region: RegionGeometry,

    /// Upper bound for one OCR call (None = unbounded)
    pub ocr_timeout: Option<Duration>,

    /// Upper bound for one rasterization call (None = unbounded)
    pub render_timeout: Option<Duration>,

    /// Whether to fan pages out over the rayon pool
    pub parallel: bool,

    /// Whether to scan raw bytes for signature markers when no field is found
    pub raw_signature_scan: bool,
}

impl AnalyzeOptions {
    /// Create new analysis options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the OCR fallback threshold (characters of normalized native text).
    pub fn with_ocr_threshold(mut self, chars: usize) -> Self {
        self.ocr_threshold_chars = chars;
        self
    }

    /// Set the ink density threshold, clamped to `[0, 1]`.
    pub fn with_density_threshold(mut self, threshold: f32) -> Self {
        self.density_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the rasterization scale.
    pub fn with_render_scale(mut self, scale: f32) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.render_scale = scale;
        }
        self
    }

    /// Set the ink intensity cut-off.
    pub fn with_ink_intensity_threshold(mut self, luma: u8) -> Self {
        self.ink_intensity_threshold = luma;
        self
    }

    /// Replace the anchor label vocabulary.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the candidate region geometry.
    pub fn with_region(mut self, region: RegionGeometry) -> Self {
        self.region = region;
        self
    }

    /// Set the OCR timeout.
    pub fn with_ocr_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ocr_timeout = timeout;
        self
    }

    /// Set the rasterization timeout.
    pub fn with_render_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Enable or disable the raw-byte signature marker scan.
    pub fn with_raw_signature_scan(mut self, enabled: bool) -> Self {
        self.raw_signature_scan = enabled;
        self
    }
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            ocr_threshold_chars: 1000,
            density_threshold: 0.02,
            render_scale: 2.0,
            ink_intensity_threshold: 200,
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            region: RegionGeometry::default(),
            ocr_timeout: Some(DEFAULT_OCR_TIMEOUT),
            render_timeout: Some(Duration::from_secs(30)),
            parallel: true,
            raw_signature_scan: true,
        }
    }
}

/// Where a signature is expected relative to its label, in points.
///
/// The region starts `offset_x` right of the label's right edge and
/// `offset_y` above the label's top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionGeometry {
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for RegionGeometry {
    fn default() -> Self {
        Self {
            offset_x: 10.0,
            offset_y: 10.0,
            width: 200.0,
            height: 60.0,
        }
    }
}
