pub mod normalize;
pub mod poppler;
pub mod tesseract;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::error::PageboxError;
use crate::geometry::{to_native, BBox, PageSize, RelRect};
use crate::model::{PageRef, TextSource};
use normalize::normalize_text;

/// A rasterized page or page region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionImage {
    pub png: Vec<u8>,
    pub dpi: f32,
}

/// An opened page. Reused for every box on that page during a batch.
pub trait PageHandle: Send + Sync {
    /// Page size in points.
    fn page_size(&self) -> PageSize;

    /// Text from the page's own text objects inside `region` (points).
    fn extract_vector_text(&self, region: BBox) -> Result<String, PageboxError>;

    /// Rasterize `region` (points) at `dpi`.
    fn render_region(&self, region: BBox, dpi: f32) -> Result<RegionImage, PageboxError>;

    fn render_page(&self, dpi: f32) -> Result<RegionImage, PageboxError> {
        let size = self.page_size();
        let full = BBox {
            x_min: 0.0,
            y_min: 0.0,
            x_max: size.width,
            y_max: size.height,
        };
        self.render_region(full, dpi)
    }
}

/// Trait for PDF rendering / vector text backends.
pub trait RenderBackend: Send + Sync {
    fn page_count(&self, file: &Path) -> Result<usize, PageboxError>;

    fn open_page(&self, file: &Path, page: usize) -> Result<Arc<dyn PageHandle>, PageboxError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OcrError {
    #[error("OCR backend unavailable")]
    Unavailable,

    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    #[error("OCR failed: {0}")]
    Failed(String),
}

impl From<OcrError> for PageboxError {
    fn from(e: OcrError) -> Self {
        match e {
            OcrError::Unavailable => PageboxError::ExtractionUnavailable,
            OcrError::Timeout(d) => PageboxError::ExtractionTimeout { secs: d.as_secs() },
            OcrError::Failed(msg) => PageboxError::Backend(msg),
        }
    }
}

/// Trait for OCR backends.
pub trait OcrEngine: Send + Sync {
    fn is_available(&self) -> bool;

    /// Recognize text in `image`, giving up after `timeout`.
    fn recognize(&self, image: &RegionImage, timeout: Duration) -> Result<String, OcrError>;

    fn backend_name(&self) -> &str;
}

/// Result of one region extraction, ready to be written into a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub source: TextSource,
    /// Backend message for failed OCR attempts.
    pub detail: Option<String>,
}

impl Extraction {
    pub fn new(text: impl Into<String>, source: TextSource) -> Self {
        Extraction {
            text: text.into(),
            source,
            detail: None,
        }
    }

    pub fn empty(source: TextSource) -> Self {
        Extraction::new(String::new(), source)
    }

    /// The error to report for this result, if it counts as a failure.
    pub fn failure(&self, config: &ExtractionConfig) -> Option<PageboxError> {
        match self.source {
            TextSource::OcrTimeout => Some(PageboxError::ExtractionTimeout {
                secs: config.ocr_timeout_secs,
            }),
            TextSource::OcrUnavailable => Some(PageboxError::ExtractionUnavailable),
            TextSource::OcrFailed => Some(PageboxError::Backend(
                self.detail.clone().unwrap_or_else(|| "OCR failed".into()),
            )),
            TextSource::Vector | TextSource::Ocr | TextSource::None => None,
        }
    }
}

/// The OCR engine to fall back to, or `None` when OCR is switched off, not
/// configured, or not installed.
pub fn usable_ocr<'a>(
    ocr: Option<&'a dyn OcrEngine>,
    config: &ExtractionConfig,
) -> Option<&'a dyn OcrEngine> {
    if !config.ocr_enabled {
        return None;
    }
    let engine = ocr?;
    if engine.is_available() {
        Some(engine)
    } else {
        tracing::warn!(
            backend = engine.backend_name(),
            "OCR backend not available, extracting vector text only"
        );
        None
    }
}

/// Decide how to read the text inside one box.
///
/// Vector text wins whenever it is non-empty after normalization. Otherwise
/// the region is rasterized and handed to `ocr`. OCR problems never produce an
/// `Err`: they come back as an empty result tagged with the reason. Only a
/// failing vector text backend is an error.
pub fn extract_region(
    handle: &dyn PageHandle,
    rect: RelRect,
    ocr: Option<&dyn OcrEngine>,
    config: &ExtractionConfig,
) -> Result<Extraction, PageboxError> {
    let region = to_native(rect, handle.page_size());

    let vector = normalize_text(&handle.extract_vector_text(region)?, &config.normalize);
    if !vector.is_empty() {
        return Ok(Extraction::new(vector, TextSource::Vector));
    }

    let Some(ocr) = ocr else {
        return Ok(Extraction::empty(TextSource::OcrUnavailable));
    };

    let image = match handle.render_region(region, config.ocr_dpi) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!(error = %e, "could not render region for OCR");
            return Ok(Extraction {
                detail: Some(e.to_string()),
                ..Extraction::empty(TextSource::OcrFailed)
            });
        }
    };

    match ocr.recognize(&image, config.ocr_timeout()) {
        Ok(raw) => {
            let text = normalize_text(&raw, &config.normalize);
            if text.is_empty() {
                Ok(Extraction::empty(TextSource::None))
            } else {
                Ok(Extraction::new(text, TextSource::Ocr))
            }
        }
        Err(OcrError::Timeout(after)) => {
            tracing::warn!(?after, backend = ocr.backend_name(), "OCR timed out");
            Ok(Extraction::empty(TextSource::OcrTimeout))
        }
        Err(OcrError::Unavailable) => Ok(Extraction::empty(TextSource::OcrUnavailable)),
        Err(OcrError::Failed(msg)) => {
            tracing::warn!(error = %msg, backend = ocr.backend_name(), "OCR failed");
            Ok(Extraction {
                detail: Some(msg),
                ..Extraction::empty(TextSource::OcrFailed)
            })
        }
    }
}

/// Rasterize a whole page at the configured `render_dpi`.
pub fn render_full_page(
    backend: &dyn RenderBackend,
    page: &PageRef,
    config: &ExtractionConfig,
) -> Result<RegionImage, PageboxError> {
    let handle = backend.open_page(&page.file, page.page)?;
    let image = handle.render_page(config.render_dpi)?;
    tracing::debug!(%page, dpi = image.dpi, bytes = image.png.len(), "rendered page");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPage {
        vector: String,
    }

    impl PageHandle for FixedPage {
        fn page_size(&self) -> PageSize {
            PageSize::new(612.0, 792.0)
        }

        fn extract_vector_text(&self, _region: BBox) -> Result<String, PageboxError> {
            Ok(self.vector.clone())
        }

        fn render_region(&self, _region: BBox, dpi: f32) -> Result<RegionImage, PageboxError> {
            Ok(RegionImage {
                png: vec![0x89, b'P', b'N', b'G'],
                dpi,
            })
        }
    }

    struct CountingOcr {
        reply: Result<String, OcrError>,
        calls: AtomicUsize,
    }

    impl CountingOcr {
        fn new(reply: Result<String, OcrError>) -> Self {
            CountingOcr {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl OcrEngine for CountingOcr {
        fn is_available(&self) -> bool {
            true
        }

        fn recognize(&self, _image: &RegionImage, _timeout: Duration) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }

        fn backend_name(&self) -> &str {
            "counting"
        }
    }

    /// Remembers every region it is asked to rasterize.
    #[derive(Default)]
    struct RecordingPage {
        regions: parking_lot::Mutex<Vec<(BBox, f32)>>,
    }

    impl PageHandle for RecordingPage {
        fn page_size(&self) -> PageSize {
            PageSize::new(612.0, 792.0)
        }

        fn extract_vector_text(&self, _region: BBox) -> Result<String, PageboxError> {
            Ok(String::new())
        }

        fn render_region(&self, region: BBox, dpi: f32) -> Result<RegionImage, PageboxError> {
            self.regions.lock().push((region, dpi));
            Ok(RegionImage { png: Vec::new(), dpi })
        }
    }

    struct RecordingBackend {
        page: Arc<RecordingPage>,
    }

    impl RenderBackend for RecordingBackend {
        fn page_count(&self, _file: &Path) -> Result<usize, PageboxError> {
            Ok(1)
        }

        fn open_page(
            &self,
            _file: &Path,
            page: usize,
        ) -> Result<Arc<dyn PageHandle>, PageboxError> {
            if page == 0 {
                let handle: Arc<dyn PageHandle> = self.page.clone();
                Ok(handle)
            } else {
                Err(PageboxError::Backend(format!("no page {page}")))
            }
        }

        fn backend_name(&self) -> &str {
            "recording"
        }
    }

    const RECT: RelRect = RelRect::new(0.1, 0.1, 0.3, 0.05);

    #[test]
    fn test_render_full_page_uses_render_dpi() {
        let backend = RecordingBackend {
            page: Arc::new(RecordingPage::default()),
        };
        let config = ExtractionConfig {
            render_dpi: 96.0,
            ..ExtractionConfig::default()
        };

        let image = render_full_page(&backend, &PageRef::new("/x.pdf", 0), &config).unwrap();
        assert_eq!(image.dpi, 96.0);
        let full = BBox {
            x_min: 0.0,
            y_min: 0.0,
            x_max: 612.0,
            y_max: 792.0,
        };
        assert_eq!(*backend.page.regions.lock(), vec![(full, 96.0)]);

        assert!(render_full_page(&backend, &PageRef::new("/x.pdf", 3), &config).is_err());
    }

    #[test]
    fn test_vector_text_skips_ocr() {
        let page = FixedPage {
            vector: "  INV-042 \n".into(),
        };
        let ocr = CountingOcr::new(Ok("WRONG".into()));
        let result = extract_region(&page, RECT, Some(&ocr), &ExtractionConfig::default()).unwrap();
        assert_eq!(result, Extraction::new("INV-042", TextSource::Vector));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_vector_falls_back_to_ocr() {
        let page = FixedPage {
            vector: "   ".into(),
        };
        let ocr = CountingOcr::new(Ok("INV-042\n".into()));
        let result = extract_region(&page, RECT, Some(&ocr), &ExtractionConfig::default()).unwrap();
        assert_eq!(result, Extraction::new("INV-042", TextSource::Ocr));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_ocr_reports_unavailable() {
        let page = FixedPage { vector: "".into() };
        let result = extract_region(&page, RECT, None, &ExtractionConfig::default()).unwrap();
        assert_eq!(result.source, TextSource::OcrUnavailable);
        assert!(result.text.is_empty());
        assert!(matches!(
            result.failure(&ExtractionConfig::default()),
            Some(PageboxError::ExtractionUnavailable)
        ));
    }

    #[test]
    fn test_ocr_timeout_is_tagged() {
        let page = FixedPage { vector: "".into() };
        let ocr = CountingOcr::new(Err(OcrError::Timeout(Duration::from_secs(30))));
        let config = ExtractionConfig::default();
        let result = extract_region(&page, RECT, Some(&ocr), &config).unwrap();
        assert_eq!(result, Extraction::empty(TextSource::OcrTimeout));
        assert!(matches!(
            result.failure(&config),
            Some(PageboxError::ExtractionTimeout { secs: 30 })
        ));
    }

    #[test]
    fn test_ocr_nothing_found_is_not_a_failure() {
        let page = FixedPage { vector: "".into() };
        let ocr = CountingOcr::new(Ok(" \n".into()));
        let result = extract_region(&page, RECT, Some(&ocr), &ExtractionConfig::default()).unwrap();
        assert_eq!(result.source, TextSource::None);
        assert!(result.failure(&ExtractionConfig::default()).is_none());
    }

    #[test]
    fn test_usable_ocr_respects_config() {
        let ocr = CountingOcr::new(Ok(String::new()));
        let config = ExtractionConfig {
            ocr_enabled: false,
            ..ExtractionConfig::default()
        };
        assert!(usable_ocr(Some(&ocr), &config).is_none());
        assert!(usable_ocr(Some(&ocr), &ExtractionConfig::default()).is_some());
        assert!(usable_ocr(None, &ExtractionConfig::default()).is_none());
    }
}
