//! Batch re-extraction ("Recognize Text").
//!
//! Pages are processed one at a time. Each page's boxes are read under a
//! short read lock, extracted without holding any lock, and written back in
//! one mutation, so a cancelled or failing batch never leaves a torn page.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::error::PageboxError;
use crate::extraction::{
    extract_region, usable_ocr, Extraction, OcrEngine, PageHandle, RenderBackend,
};
use crate::model::{BoxInfo, PageRef};
use crate::store::{BoxReading, SharedProject};

/// Cooperative cancellation shared between a batch and whoever started it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Incremental progress of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// The item that just finished.
    pub current: Option<String>,
}

/// Opened pages, reused for every box on the same page during a batch.
pub struct PageCache<'a> {
    backend: &'a dyn RenderBackend,
    pages: HashMap<PageRef, Arc<dyn PageHandle>>,
}

impl<'a> PageCache<'a> {
    pub fn new(backend: &'a dyn RenderBackend) -> Self {
        PageCache {
            backend,
            pages: HashMap::new(),
        }
    }

    pub fn get(&mut self, page: &PageRef) -> Result<Arc<dyn PageHandle>, PageboxError> {
        if let Some(handle) = self.pages.get(page) {
            return Ok(Arc::clone(handle));
        }
        let handle = self.backend.open_page(&page.file, page.page)?;
        self.pages.insert(page.clone(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Drop every cached page of `file`.
    pub fn release_file(&mut self, file: &Path) {
        self.pages.retain(|p, _| p.file != file);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// One failed box (or a whole page when `column` is `None`).
#[derive(Debug)]
pub struct BoxFailure {
    pub page: PageRef,
    pub column: Option<String>,
    pub error: PageboxError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub pages_done: usize,
    pub cells_written: usize,
    pub failures: Vec<BoxFailure>,
    pub cancelled: bool,
}

/// Runs the extraction decision over stored boxes and writes the results.
pub struct Recognizer<'a> {
    backend: &'a dyn RenderBackend,
    ocr: Option<&'a dyn OcrEngine>,
    config: &'a ExtractionConfig,
}

impl<'a> Recognizer<'a> {
    pub fn new(
        backend: &'a dyn RenderBackend,
        ocr: Option<&'a dyn OcrEngine>,
        config: &'a ExtractionConfig,
    ) -> Self {
        Recognizer {
            backend,
            ocr,
            config,
        }
    }

    /// Re-extract every box on every page in `pages`, overwriting existing
    /// values including manual edits.
    ///
    /// `progress` is called after each page. Cancellation is checked before
    /// each page; pages already written stay written.
    pub fn recognize_pages(
        &self,
        project: &SharedProject,
        pages: &[PageRef],
        progress: &mut dyn FnMut(&Progress),
        cancel: &CancelFlag,
    ) -> BatchReport {
        let ocr = usable_ocr(self.ocr, self.config);
        let mut cache = PageCache::new(self.backend);
        let mut report = BatchReport::default();

        tracing::info!(
            pages = pages.len(),
            backend = self.backend.backend_name(),
            ocr = ocr.map(|o| o.backend_name()).unwrap_or("none"),
            "starting recognition"
        );

        for (i, page) in pages.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(completed = i, total = pages.len(), "recognition cancelled");
                report.cancelled = true;
                break;
            }

            self.recognize_page(project, page, ocr, &mut cache, &mut report);
            report.pages_done += 1;

            progress(&Progress {
                completed: i + 1,
                total: pages.len(),
                current: Some(page.to_string()),
            });
        }

        tracing::info!(
            pages = report.pages_done,
            cells = report.cells_written,
            failures = report.failures.len(),
            "recognition finished"
        );
        report
    }

    fn recognize_page(
        &self,
        project: &SharedProject,
        page: &PageRef,
        ocr: Option<&dyn OcrEngine>,
        cache: &mut PageCache<'_>,
        report: &mut BatchReport,
    ) {
        let boxes: Vec<BoxInfo> = match project.read(|store| {
            store
                .page(page)
                .map(|p| p.boxes.values().cloned().collect::<Vec<_>>())
        }) {
            Ok(boxes) => boxes,
            Err(error) => {
                report.failures.push(BoxFailure {
                    page: page.clone(),
                    column: None,
                    error,
                });
                return;
            }
        };
        if boxes.is_empty() {
            return;
        }

        let handle = match cache.get(page) {
            Ok(h) => h,
            Err(error) => {
                tracing::warn!(%page, %error, "could not open page");
                report.failures.push(BoxFailure {
                    page: page.clone(),
                    column: None,
                    error,
                });
                return;
            }
        };

        let mut readings = Vec::with_capacity(boxes.len());
        // Reported only if the reading is actually stored.
        let mut pending = Vec::new();
        for b in &boxes {
            match extract_region(handle.as_ref(), b.rect, ocr, self.config) {
                Ok(extraction) => {
                    if let Some(error) = extraction.failure(self.config) {
                        pending.push(BoxFailure {
                            page: page.clone(),
                            column: Some(b.column.clone()),
                            error,
                        });
                    }
                    readings.push(BoxReading::new(b, extraction));
                }
                // The vector backend failed: keep whatever the cell had.
                Err(error) => {
                    tracing::warn!(%page, column = %b.column, %error, "extraction failed");
                    report.failures.push(BoxFailure {
                        page: page.clone(),
                        column: Some(b.column.clone()),
                        error,
                    });
                }
            }
        }

        match project.write(|store| store.apply_page_extractions(page, readings)) {
            Ok(outcome) => {
                report.cells_written += outcome.written;
                pending.retain(|f| {
                    f.column
                        .as_ref()
                        .map_or(true, |c| !outcome.changed.contains(c))
                });
                report.failures.append(&mut pending);
                for column in outcome.changed {
                    tracing::info!(%page, column = %column, "box changed during recognition");
                    report.failures.push(BoxFailure {
                        page: page.clone(),
                        column: Some(column.clone()),
                        error: PageboxError::BoxChanged {
                            page: page.clone(),
                            column,
                        },
                    });
                }
            }
            Err(error) => {
                // The file was removed while we were extracting.
                cache.release_file(&page.file);
                report.failures.push(BoxFailure {
                    page: page.clone(),
                    column: None,
                    error,
                });
            }
        }
    }

    /// Extract and store the text of a single box.
    ///
    /// Fails with [`PageboxError::BoxChanged`], leaving the cell alone, when
    /// the box is moved or replaced while it is being read.
    pub fn recognize_box(
        &self,
        project: &SharedProject,
        page: &PageRef,
        column: &str,
    ) -> Result<Extraction, PageboxError> {
        let source = project.read(|store| {
            store
                .page(page)?
                .box_for(column)
                .cloned()
                .ok_or_else(|| PageboxError::BoxNotFound {
                    page: page.clone(),
                    column: column.to_string(),
                })
        })?;

        let ocr = usable_ocr(self.ocr, self.config);
        let handle = self.backend.open_page(&page.file, page.page)?;
        let extraction = extract_region(handle.as_ref(), source.rect, ocr, self.config)?;

        let reading = BoxReading::new(&source, extraction.clone());
        let outcome = project.write(|store| store.apply_page_extractions(page, vec![reading]))?;
        if !outcome.changed.is_empty() {
            return Err(PageboxError::BoxChanged {
                page: page.clone(),
                column: column.to_string(),
            });
        }
        tracing::debug!(%page, column, source = %extraction.source, "recognized box");
        Ok(extraction)
    }
}
