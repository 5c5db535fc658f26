//! End-to-end analysis of in-memory PDFs.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{full_page_image_ops, rect_ops, text_ops, text_string, CountingOcr, PdfBuilder};
use image::{GrayImage, Luma};
use lopdf::content::Operation;
use lopdf::dictionary;
use pdfsig::{
    AnalyzeOptions, Analyzer, Error, OcrEngine, SignatureField, Stage, TextSource,
};

fn analyzer_with(ocr: &Arc<CountingOcr>) -> Analyzer {
    let engine: Arc<dyn OcrEngine> = ocr.clone();
    Analyzer::new().with_shared_ocr_engine(engine)
}

fn hello_line() -> String {
    "Hello World ".repeat(9).trim_end().to_string()
}

fn scanned_image() -> GrayImage {
    GrayImage::from_fn(64, 64, |x, _| if x % 8 == 0 { Luma([0]) } else { Luma([255]) })
}

#[test]
fn test_vector_page_and_scanned_page() {
    let mut pdf = PdfBuilder::new();
    let line = hello_line();
    let ops = (0..20)
        .flat_map(|i| text_ops(40, 750 - i * 14, 10, &line))
        .collect();
    pdf.page(ops);
    let image = pdf.gray_image(&scanned_image());
    pdf.page_with_image(full_page_image_ops(), Some(image));
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning("Scanned   invoice\r\nnumber 42 "));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();

    assert_eq!(result.page_count(), 2);
    assert_eq!(result.pages[0].page_no, 1);
    assert_eq!(result.pages[1].page_no, 2);

    let native = &result.pages[0];
    assert_eq!(native.source, TextSource::Native);
    assert_eq!(native.text.lines().count(), 20);
    assert!(native.text.lines().all(|l| l == line));
    assert!(native.char_count() >= 2000);

    let scanned = &result.pages[1];
    assert_eq!(scanned.source, TextSource::Ocr);
    assert_eq!(scanned.text, "Scanned invoice\n\nnumber 42");

    // Only the scanned page was sent to OCR
    assert_eq!(ocr.calls(), 1);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
}

#[test]
fn test_short_mixed_page_is_ocred_with_text_and_scan_visible() {
    let mut pdf = PdfBuilder::new();
    let mut ops = text_ops(72, 700, 48, "Hello World");
    // Scan drawn over x 100..300, y 100..300 in user space
    ops.extend([
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![200.into(), 0.into(), 0.into(), 200.into(), 100.into(), 100.into()],
        ),
        Operation::new("Do", vec!["Im1".into()]),
        Operation::new("Q", vec![]),
    ]);
    let image = pdf.gray_image(&scanned_image());
    pdf.page_with_image(ops, Some(image));
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning("Hello World and the scanned part"));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();

    assert_eq!(ocr.calls(), 1);
    assert_eq!(result.pages[0].source, TextSource::Ocr);

    // The page goes to OCR at 2x with both layers painted
    let seen = ocr.last_image().expect("OCR input");
    assert_eq!(seen.dimensions(), (1224, 1584));
    let darkest = |x0: u32, y0: u32, x1: u32, y1: u32| {
        (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .map(|(x, y)| seen.get_pixel(x, y).0[0])
            .min()
            .unwrap_or(255)
    };
    // Text: top-left y 58..92 pt
    assert!(darkest(144, 116, 700, 184) < 100);
    // Scan: top-left y 492..692 pt
    assert!(darkest(200, 984, 600, 1384) < 100);
    // Nothing drawn at the bottom right
    assert_eq!(darkest(900, 1300, 1200, 1560), 255);
}

#[test]
fn test_encrypted_document_opens_with_empty_password() {
    let mut pdf = PdfBuilder::new();
    pdf.page(text_ops(72, 700, 12, "Purchase agreement"));
    pdf.field(dictionary! {
        "FT" => "Sig",
        "T" => text_string("Signature1"),
    });
    let bytes = pdf.build_encrypted();
    // Strings are not readable without decryption
    assert!(!bytes.windows(10).any(|w| w == b"Signature1"));

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();

    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.pages[0].text, "Purchase agreement");
    assert_eq!(
        result.digital_signatures,
        vec![SignatureField::Unsigned {
            field_name: Some("Signature1".to_string())
        }]
    );
}

#[test]
fn test_password_protected_document_degrades() {
    let mut pdf = PdfBuilder::new();
    pdf.page(text_ops(72, 700, 12, "Purchase agreement"));
    let bytes = pdf.build_password_protected();

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();

    assert!(result.pages.is_empty());
    assert!(result.digital_signatures.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].stage, Stage::Document);
    assert_eq!(ocr.calls(), 0);
}

#[test]
fn test_unsigned_signature_field() {
    let mut pdf = PdfBuilder::new();
    pdf.page(text_ops(72, 700, 12, "Purchase agreement"));
    pdf.field(dictionary! {
        "FT" => "Sig",
        "T" => text_string("Signature1"),
    });
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();

    assert_eq!(
        result.digital_signatures,
        vec![SignatureField::Unsigned {
            field_name: Some("Signature1".to_string())
        }]
    );
    assert!(!result.has_digital_signature());
    assert_eq!(result.wet_signature.wet_signatures_detected, 0);
    assert!(result.wet_signature.details.is_empty());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json["digital_signatures"],
        serde_json::json!([{"field_name": "Signature1", "signed": false}])
    );
}

#[test]
fn test_signed_field_with_metadata() {
    let mut pdf = PdfBuilder::new();
    pdf.page(vec![]);
    let value = pdf.doc_mut().add_object(dictionary! {
        "Type" => "Sig",
        "Filter" => "Adobe.PPKLite",
        "SubFilter" => "adbe.pkcs7.detached",
        "Name" => text_string("Jane Doe"),
        "Reason" => text_string("I approve this document"),
        "Location" => text_string("Seoul"),
        "M" => text_string("D:20250101120000"),
    });
    pdf.field(dictionary! {
        "FT" => "Sig",
        "T" => text_string("Approver"),
        "V" => value,
    });
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();
    assert!(result.has_digital_signature());

    let json = serde_json::to_value(&result).unwrap();
    let sig = &json["digital_signatures"][0];
    assert_eq!(sig["field_name"], "Approver");
    assert_eq!(sig["signed"], true);
    assert_eq!(sig["signer_name"], "Jane Doe");
    assert_eq!(sig["location"], "Seoul");
    assert_eq!(sig["reason"], "I approve this document");
    assert_eq!(sig["signed_on"], "2025-01-01T12:00:00");
    assert_eq!(sig["raw_time"], "D:20250101120000");
    assert_eq!(sig["filter"], "Adobe.PPKLite");
}

#[test]
fn test_ink_next_to_label() {
    let mut pdf = PdfBuilder::new();
    let mut ops = text_ops(72, 700, 12, "Signed by");
    ops.extend(rect_ops(140, 670, 150, 40));
    pdf.page(ops);
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning(""));
    let options = AnalyzeOptions::new().with_density_threshold(0.02);
    let result = analyzer_with(&ocr).with_options(options).analyze(&bytes).unwrap();

    let wet = &result.wet_signature;
    assert!(wet.wet_signatures_detected >= 1);
    let candidate = wet
        .details
        .iter()
        .find(|c| c.region().label == "signed by")
        .expect("candidate for the label");
    assert!(candidate.is_present());
    assert!(candidate.region().ink_density > 0.02);
    assert_eq!(candidate.region().page, 1);

    let json = serde_json::to_value(&result).unwrap();
    let detail = &json["wet_signature"]["details"][0];
    assert_eq!(detail["present"], true);
    assert_eq!(detail["bbox"].as_array().unwrap().len(), 4);
}

#[test]
fn test_empty_region_next_to_label_is_absent() {
    let mut pdf = PdfBuilder::new();
    pdf.page(text_ops(72, 400, 12, "Authorized signatory:"));
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();

    let wet = &result.wet_signature;
    // "signatory" and "authorized signatory" both anchor here
    assert_eq!(wet.details.len(), 2);
    assert_eq!(wet.wet_signatures_detected, 0);
    assert!(wet.details.iter().all(|c| !c.is_present()));
}

#[test]
fn test_count_matches_present_details() {
    let mut pdf = PdfBuilder::new();
    let mut ops = text_ops(72, 700, 12, "Signature");
    ops.extend(rect_ops(150, 690, 120, 30));
    ops.extend(text_ops(72, 500, 12, "Signature"));
    pdf.page(ops);
    pdf.page(text_ops(72, 700, 12, "Approved by"));
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();

    let wet = &result.wet_signature;
    assert_eq!(wet.details.len(), 3);
    let present = wet.details.iter().filter(|c| c.is_present()).count();
    assert_eq!(wet.wet_signatures_detected, present);
    assert_eq!(present, 1);
    // Page order is kept
    assert_eq!(wet.details[2].region().page, 2);
}

#[test]
fn test_region_off_page_is_dropped() {
    let mut pdf = PdfBuilder::new();
    pdf.page(text_ops(560, 700, 12, "Signature"));
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();
    assert!(result.wet_signature.details.is_empty());
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_tables_keep_invariants() {
    let mut pdf = PdfBuilder::new();
    let mut ops = Vec::new();
    for (i, (item, qty)) in [("Item", "Qty"), ("Widget", "4"), ("Gadget", "12")]
        .iter()
        .enumerate()
    {
        let y = 700 - i as i64 * 15;
        ops.extend(text_ops(72, y, 12, item));
        ops.extend(text_ops(220, y, 12, qty));
    }
    pdf.page(ops);
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();

    assert_eq!(result.tables.len(), 1);
    for table in &result.tables {
        assert_eq!(table.cols, table.rows[0].len());
        for row in &table.rows {
            assert!(row.iter().any(|cell| !cell.trim().is_empty()));
        }
    }
    assert_eq!(result.tables[0].rows[1], vec!["Widget", "4"]);
}

#[test]
fn test_slow_ocr_times_out() {
    let mut pdf = PdfBuilder::new();
    pdf.page(text_ops(72, 700, 12, "Short page"));
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning("never used").slow(Duration::from_secs(2)));
    let options = AnalyzeOptions::new().with_ocr_timeout(Some(Duration::from_millis(50)));
    let result = analyzer_with(&ocr).with_options(options).analyze(&bytes).unwrap();

    assert_eq!(result.pages[0].text, "Short page");
    assert_eq!(result.pages[0].source, TextSource::Native);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].stage, Stage::Ocr);
    assert!(result.diagnostics[0].message.contains("timed out"));
}

#[test]
fn test_broken_acroform_falls_back_to_raw_markers() {
    let mut pdf = PdfBuilder::new();
    pdf.page(vec![]);
    // A signature dictionary nobody links to
    pdf.doc_mut().add_object(dictionary! {
        "Type" => "Sig",
        "Filter" => "Adobe.PPKLite",
    });
    let bytes = pdf.build();

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(&bytes).unwrap();

    assert_eq!(result.digital_signatures.len(), 1);
    assert!(matches!(
        result.digital_signatures[0],
        SignatureField::Marker { .. }
    ));
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["digital_signatures"][0]["signed"], true);
    assert!(json["digital_signatures"][0]["field_name"].is_null());
}

#[test]
fn test_fatal_errors() {
    assert!(matches!(pdfsig::analyze(b"", 1000, 0.02), Err(Error::EmptyInput)));
    assert!(matches!(
        pdfsig::analyze(b"GIF89a....", 1000, 0.02),
        Err(Error::UnknownFormat)
    ));
}

#[test]
fn test_truncated_pdf_degrades() {
    let mut pdf = PdfBuilder::new();
    pdf.page(text_ops(72, 700, 12, "Hello"));
    let bytes = pdf.build();
    let truncated = &bytes[..20];

    let ocr = Arc::new(CountingOcr::returning(""));
    let result = analyzer_with(&ocr).analyze(truncated).unwrap();
    assert!(result.pages.is_empty());
    assert!(result.is_degraded());
    assert_eq!(result.diagnostics[0].stage, Stage::Document);
}
