use pagebox_core::config::ExtractionConfig;
use pagebox_core::error::PageboxError;
use pagebox_core::extraction::poppler::PopplerBackend;
use pagebox_core::extraction::tesseract::TesseractOcr;
use pagebox_core::extraction::OcrEngine;
use pagebox_core::model::PageRef;
use pagebox_core::project::{load_from_path, save_to_path};
use pagebox_core::{CancelFlag, Progress, Recognizer, SharedProject};
use std::path::{Path, PathBuf};

use super::{absolute, progress_bar, tick};

pub fn run(
    project: &Path,
    file: Option<PathBuf>,
    page: Option<usize>,
    config: &ExtractionConfig,
) -> Result<(), PageboxError> {
    let shared = SharedProject::new(load_from_path(project)?);

    let pages: Vec<PageRef> = shared.read(|store| {
        let file = file.as_deref().map(absolute);
        store
            .data()
            .page_refs()
            .into_iter()
            .filter(|p| file.as_ref().map_or(true, |f| &p.file == f))
            .filter(|p| page.map_or(true, |n| p.page == n))
            .filter(|p| store.page(p).is_ok_and(|d| !d.boxes.is_empty()))
            .collect()
    });
    if pages.is_empty() {
        eprintln!("No boxes to recognize");
        return Ok(());
    }

    let backend = PopplerBackend::new();
    let ocr = TesseractOcr::new(&config.ocr_language);
    let recognizer = Recognizer::new(&backend, Some(&ocr), config);

    let pb = progress_bar(pages.len());
    let report = recognizer.recognize_pages(
        &shared,
        &pages,
        &mut |p: &Progress| tick(&pb, p),
        &CancelFlag::new(),
    );
    pb.finish_and_clear();

    for failure in &report.failures {
        match failure.column {
            Some(ref column) => eprintln!("  {} [{column}]: {}", failure.page, failure.error),
            None => eprintln!("  {}: {}", failure.page, failure.error),
        }
    }

    let mut store = shared.read(|s| s.clone());
    save_to_path(&mut store, project)?;
    eprintln!(
        "Recognized {} page(s), {} cell(s) written, {} failure(s)",
        report.pages_done,
        report.cells_written,
        report.failures.len()
    );
    Ok(())
}

pub fn ocr_status(config: &ExtractionConfig) -> Result<(), PageboxError> {
    let ocr = TesseractOcr::new(&config.ocr_language);
    let available = ocr.is_available();
    let poppler = PopplerBackend::is_available();
    println!(
        "OCR ({}): {}",
        ocr.backend_name(),
        match (available, config.ocr_enabled) {
            (true, true) => "available",
            (true, false) => "available, disabled by configuration",
            (false, _) => "not available",
        }
    );
    println!(
        "Vector text (poppler): {}",
        if poppler { "available" } else { "not available" }
    );
    Ok(())
}
