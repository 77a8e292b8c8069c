use pagebox_core::config::ExtractionConfig;
use pagebox_core::error::PageboxError;
use pagebox_core::extraction::poppler::PopplerBackend;
use pagebox_core::extraction::render_full_page;
use pagebox_core::project::load_from_path;
use std::path::Path;

use super::page_ref;

/// Write one page of a project file as a PNG, for drawing boxes against.
pub fn run(
    project: &Path,
    file: &Path,
    page: usize,
    out: &Path,
    config: &ExtractionConfig,
) -> Result<(), PageboxError> {
    let page = page_ref(file, page);
    let store = load_from_path(project)?;
    let boxes = store.page(&page)?.boxes.len();

    let image = render_full_page(&PopplerBackend::new(), &page, config)?;
    std::fs::write(out, &image.png)?;
    eprintln!(
        "Rendered {page} at {} dpi to {} ({boxes} box(es) on this page)",
        image.dpi,
        out.display()
    );
    Ok(())
}
