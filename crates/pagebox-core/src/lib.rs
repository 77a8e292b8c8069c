pub mod batch;
pub mod binding;
pub mod config;
pub mod error;
pub mod export;
pub mod extraction;
pub mod geometry;
pub mod import;
pub mod model;
pub mod project;
pub mod store;
pub mod template;

pub use batch::{BatchReport, CancelFlag, Progress, Recognizer};
pub use config::{ExtractionConfig, NormalizeOptions};
pub use error::PageboxError;
pub use extraction::{OcrEngine, RenderBackend};
pub use model::{PageRef, ProjectData};
pub use store::{ProjectStore, SharedProject};

/// Main API entry point: re-extract every box in the project.
///
/// Pages are processed in file then page order. Manual edits are
/// overwritten; see [`Recognizer::recognize_pages`] for the failure and
/// cancellation rules.
pub fn recognize_all(
    project: &SharedProject,
    backend: &dyn RenderBackend,
    ocr: Option<&dyn OcrEngine>,
    config: &ExtractionConfig,
    progress: &mut dyn FnMut(&Progress),
    cancel: &CancelFlag,
) -> BatchReport {
    let pages: Vec<PageRef> = project.read(|store| {
        store
            .data()
            .page_refs()
            .into_iter()
            .filter(|p| store.page(p).is_ok_and(|d| !d.boxes.is_empty()))
            .collect()
    });
    Recognizer::new(backend, ocr, config).recognize_pages(project, &pages, progress, cancel)
}
