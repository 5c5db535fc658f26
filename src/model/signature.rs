//! Digital and wet signature records.

use std::fmt;

use chrono::{FixedOffset, NaiveDateTime};
use serde::{Serialize, Serializer};

use super::Rect;

/// A signing time taken from a `/M` entry.
///
/// PDF dates carry an optional UTC offset. When the offset is missing the
/// time is kept as written and rendered without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfTimestamp {
    pub local: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl PdfTimestamp {
    pub fn new(local: NaiveDateTime, offset: Option<FixedOffset>) -> Self {
        Self { local, offset }
    }

    /// ISO-8601 rendering, e.g. `2025-01-01T12:00:00` or `2025-01-01T12:00:00+05:30`.
    pub fn to_iso8601(&self) -> String {
        let base = self.local.format("%Y-%m-%dT%H:%M:%S").to_string();
        match self.offset {
            Some(offset) => format!("{}{}", base, offset),
            None => base,
        }
    }
}

impl fmt::Display for PdfTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl Serialize for PdfTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

/// Details of a signature field whose value dictionary is present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignedField {
    pub field_name: Option<String>,
    pub signer_name: Option<String>,
    pub location: Option<String>,
    pub reason: Option<String>,
    pub contact_info: Option<String>,
    pub signed_on: Option<PdfTimestamp>,
    /// The `/M` string exactly as stored, kept even when it does not parse
    pub raw_time: Option<String>,
    pub filter: Option<String>,
    pub sub_filter: Option<String>,
}

/// One digital signature finding.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureField {
    /// A `/Sig` field with no value yet.
    Unsigned { field_name: Option<String> },
    /// A `/Sig` field carrying a signature dictionary.
    Signed(SignedField),
    /// No field was found, but the raw bytes carry a signature marker.
    Marker { marker: String },
}

impl SignatureField {
    pub fn is_signed(&self) -> bool {
        !matches!(self, SignatureField::Unsigned { .. })
    }

    pub fn field_name(&self) -> Option<&str> {
        match self {
            SignatureField::Unsigned { field_name } => field_name.as_deref(),
            SignatureField::Signed(f) => f.field_name.as_deref(),
            SignatureField::Marker { .. } => None,
        }
    }
}

/// Flat serialized form of a [`SignatureField`].
#[derive(Debug, Clone, Serialize)]
pub struct SignatureFieldRecord {
    pub field_name: Option<String>,
    pub signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_on: Option<PdfTimestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<&SignatureField> for SignatureFieldRecord {
    fn from(field: &SignatureField) -> Self {
        let empty = SignatureFieldRecord {
            field_name: None,
            signed: field.is_signed(),
            signer_name: None,
            location: None,
            reason: None,
            contact_info: None,
            signed_on: None,
            raw_time: None,
            filter: None,
            sub_filter: None,
            note: None,
        };

        match field {
            SignatureField::Unsigned { field_name } => SignatureFieldRecord {
                field_name: field_name.clone(),
                ..empty
            },
            SignatureField::Signed(f) => SignatureFieldRecord {
                field_name: f.field_name.clone(),
                signer_name: f.signer_name.clone(),
                location: f.location.clone(),
                reason: f.reason.clone(),
                contact_info: f.contact_info.clone(),
                signed_on: f.signed_on,
                raw_time: f.raw_time.clone(),
                filter: f.filter.clone(),
                sub_filter: f.sub_filter.clone(),
                ..empty
            },
            SignatureField::Marker { marker } => SignatureFieldRecord {
                note: Some(format!(
                    "signature markers found in raw PDF bytes ({})",
                    marker
                )),
                ..empty
            },
        }
    }
}

impl Serialize for SignatureField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SignatureFieldRecord::from(self).serialize(serializer)
    }
}

/// A scored candidate region next to an anchor label.
#[derive(Debug, Clone, PartialEq)]
pub struct InkRegion {
    /// Page number (1-indexed)
    pub page: u32,
    /// The vocabulary label that matched
    pub label: String,
    /// Candidate region in top-left page space, clipped to the page
    pub bbox: Rect,
    /// Fraction of dark pixels, in `[0, 1]`
    pub ink_density: f32,
}

/// Outcome of scoring one candidate region.
#[derive(Debug, Clone, PartialEq)]
pub enum WetSignatureCandidate {
    Present(InkRegion),
    Absent(InkRegion),
}

impl WetSignatureCandidate {
    /// Classify a scored region against a density threshold.
    pub fn classify(region: InkRegion, threshold: f32) -> Self {
        if region.ink_density >= threshold {
            WetSignatureCandidate::Present(region)
        } else {
            WetSignatureCandidate::Absent(region)
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, WetSignatureCandidate::Present(_))
    }

    pub fn region(&self) -> &InkRegion {
        match self {
            WetSignatureCandidate::Present(r) | WetSignatureCandidate::Absent(r) => r,
        }
    }
}

/// Flat serialized form of a [`WetSignatureCandidate`].
#[derive(Debug, Clone, Serialize)]
pub struct WetSignatureRecord<'a> {
    pub page: u32,
    pub label: &'a str,
    pub bbox: Rect,
    pub ink_density: f32,
    pub present: bool,
}

impl Serialize for WetSignatureCandidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let region = self.region();
        WetSignatureRecord {
            page: region.page,
            label: &region.label,
            bbox: region.bbox,
            ink_density: region.ink_density,
            present: self.is_present(),
        }
        .serialize(serializer)
    }
}

/// All wet signature candidates of a document.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WetSignatureSummary {
    /// Number of candidates classified as present
    pub wet_signatures_detected: usize,
    /// Every candidate, in page then discovery order
    pub details: Vec<WetSignatureCandidate>,
}

impl WetSignatureSummary {
    /// Build a summary whose count agrees with `details`.
    pub fn from_details(details: Vec<WetSignatureCandidate>) -> Self {
        let wet_signatures_detected = details.iter().filter(|c| c.is_present()).count();
        Self {
            wet_signatures_detected,
            details,
        }
    }
}
