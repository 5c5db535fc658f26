//! Wet (ink) signature scoring next to anchor labels.

use image::GrayImage;

use super::anchors::{find_anchors, LabelMatch};
use crate::degrade::{attempt, with_timeout};
use crate::error::Result;
use crate::model::{Diagnostic, InkRegion, Rect, Stage, WetSignatureCandidate};
use crate::options::{AnalyzeOptions, RegionGeometry};
use crate::parser::{LopdfBackend, PdfBackend, Rasterizer};

/// Where a signature is expected for `label`, clipped to `page`.
///
/// `None` when nothing of the region is left on the page.
pub fn candidate_region(label: &Rect, geometry: &RegionGeometry, page: &Rect) -> Option<Rect> {
    let region = Rect::from_origin_size(
        label.x1 + geometry.offset_x,
        label.y0 - geometry.offset_y,
        geometry.width,
        geometry.height,
    );
    region.intersect(page)
}

/// Fraction of pixels strictly darker than `threshold`.
pub fn ink_density(image: &GrayImage, threshold: u8) -> f32 {
    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let ink = image.pixels().filter(|p| p.0[0] < threshold).count() as u64;
    (ink as f64 / total as f64) as f32
}

/// Scores candidate regions page by page.
pub struct WetSignatureLocator<'a> {
    backend: &'a LopdfBackend,
    options: &'a AnalyzeOptions,
}

impl<'a> WetSignatureLocator<'a> {
    pub fn new(backend: &'a LopdfBackend, options: &'a AnalyzeOptions) -> Self {
        Self { backend, options }
    }

    /// Every scored candidate on one page, in label then position order.
    ///
    /// Anchors whose region falls off the page are skipped. A region that
    /// fails to render is dropped and noted in `diagnostics`.
    pub fn locate_page(
        &self,
        page_no: u32,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<WetSignatureCandidate> {
        let Some((anchors, bounds)) = attempt(Stage::WetSignature, Some(page_no), diagnostics, || {
            let page_id = self.backend.page_id(page_no)?;
            let bounds = self.backend.page_box(page_id).bounds();
            let anchors = find_anchors(self.backend, page_no, &self.options.labels)?;
            Ok((anchors, bounds))
        }) else {
            return Vec::new();
        };

        let mut candidates = Vec::with_capacity(anchors.len());
        for LabelMatch { label, bbox } in anchors {
            let Some(region) = candidate_region(&bbox, &self.options.region, &bounds) else {
                log::debug!("page {}: region for {:?} is off the page", page_no, label);
                continue;
            };

            let Some(density) = attempt(Stage::WetSignature, Some(page_no), diagnostics, || {
                self.score(page_no, region)
            }) else {
                continue;
            };

            log::debug!(
                "page {}: {:?} region {:?} density {:.4}",
                page_no,
                label,
                region,
                density
            );
            candidates.push(WetSignatureCandidate::classify(
                InkRegion {
                    page: page_no,
                    label,
                    bbox: region,
                    ink_density: density,
                },
                self.options.density_threshold,
            ));
        }
        candidates
    }

    fn score(&self, page_no: u32, region: Rect) -> Result<f32> {
        let backend = self.backend.clone();
        let scale = self.options.render_scale;
        let image = with_timeout(self.options.render_timeout, move || {
            Rasterizer::new(&backend).render_region(page_no, region, scale)
        })?;
        let gray = image::imageops::grayscale(&image);
        Ok(ink_density(&gray, self.options.ink_intensity_threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{filled_rect, text_at, TestPdf};
    use image::Luma;

    fn letter() -> Rect {
        Rect::new(0.0, 0.0, 612.0, 792.0)
    }

    #[test]
    fn test_candidate_region_geometry() {
        let label = Rect::new(72.0, 82.0, 126.0, 94.0);
        let region = candidate_region(&label, &RegionGeometry::default(), &letter()).unwrap();
        assert_eq!(region, Rect::new(136.0, 72.0, 336.0, 132.0));
    }

    #[test]
    fn test_candidate_region_is_clipped() {
        let label = Rect::new(500.0, 5.0, 560.0, 15.0);
        let region = candidate_region(&label, &RegionGeometry::default(), &letter()).unwrap();
        assert_eq!(region, Rect::new(570.0, 0.0, 612.0, 55.0));
    }

    #[test]
    fn test_candidate_region_off_page_is_dropped() {
        let label = Rect::new(610.0, 100.0, 640.0, 110.0);
        assert!(candidate_region(&label, &RegionGeometry::default(), &letter()).is_none());
    }

    #[test]
    fn test_ink_density() {
        let mut image = GrayImage::from_pixel(10, 10, Luma([255]));
        for x in 0..10 {
            image.put_pixel(x, 0, Luma([0]));
            image.put_pixel(x, 1, Luma([199]));
            image.put_pixel(x, 2, Luma([200]));
        }
        assert!((ink_density(&image, 200) - 0.2).abs() < 1e-6);
        assert_eq!(ink_density(&GrayImage::new(0, 0), 200), 0.0);
    }

    #[test]
    fn test_locates_ink_next_to_label() {
        let mut pdf = TestPdf::new();
        let mut ops = text_at(72, 700, 12, "Signed by");
        ops.extend(filled_rect(140, 670, 150, 40));
        ops.extend(text_at(72, 300, 12, "Approved by"));
        pdf.page(ops);
        let backend = LopdfBackend::load_bytes(&pdf.to_bytes()).unwrap();
        let options = AnalyzeOptions::default();

        let mut diags = Vec::new();
        let found = WetSignatureLocator::new(&backend, &options).locate_page(1, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(found.len(), 2);

        let approved = &found[0];
        assert_eq!(approved.region().label, "approved by");
        assert!(!approved.is_present());
        assert_eq!(approved.region().ink_density, 0.0);

        let signed = &found[1];
        assert_eq!(signed.region().label, "signed by");
        assert!(signed.is_present());
        assert!(signed.region().ink_density > 0.4);
        assert!(signed.region().ink_density < 0.6);
    }

    #[test]
    fn test_typed_name_counts_as_ink() {
        let mut pdf = TestPdf::new();
        let mut ops = text_at(72, 700, 12, "Signed by");
        ops.extend(text_at(150, 665, 40, "JOHN SMITH"));
        pdf.page(ops);
        let backend = LopdfBackend::load_bytes(&pdf.to_bytes()).unwrap();
        let options = AnalyzeOptions::default();

        let mut diags = Vec::new();
        let found = WetSignatureLocator::new(&backend, &options).locate_page(1, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_present());
        assert!(found[0].region().ink_density > 0.05, "{}", found[0].region().ink_density);
    }

    #[test]
    fn test_unknown_page_degrades() {
        let mut pdf = TestPdf::new();
        pdf.page(vec![]);
        let backend = LopdfBackend::load_bytes(&pdf.to_bytes()).unwrap();
        let options = AnalyzeOptions::default();
        let mut diags = Vec::new();
        let found = WetSignatureLocator::new(&backend, &options).locate_page(5, &mut diags);
        assert!(found.is_empty());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].stage, Stage::WetSignature);
    }
}
