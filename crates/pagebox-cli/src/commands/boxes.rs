use pagebox_core::binding::{BindingController, DragOutcome};
use pagebox_core::error::PageboxError;
use pagebox_core::geometry::{PageSize, PixelRect, RelRect};
use pagebox_core::project::{load_from_path, save_to_path};
use pagebox_core::SharedProject;
use std::path::Path;

use super::{mutate, page_ref};

pub fn set(
    project: &Path,
    file: &Path,
    page: usize,
    column: &str,
    rect: [f64; 4],
) -> Result<(), PageboxError> {
    let page = page_ref(file, page);
    let [x, y, w, h] = rect;
    let placed = mutate(project, |store| {
        store.set_box(&page, column, RelRect::new(x, y, w, h))
    })?;
    eprintln!("Box {} for '{column}' on {page}: {}", placed.id, placed.rect);
    Ok(())
}

/// Route a pixel drag through the binding controller, exactly as a viewer
/// would on mouse release.
pub fn draw(
    project: &Path,
    file: &Path,
    page: usize,
    column: &str,
    pixels: [f64; 4],
    page_size: (f64, f64),
) -> Result<(), PageboxError> {
    let page = page_ref(file, page);
    let shared = SharedProject::new(load_from_path(project)?);
    let mut controller = BindingController::new(shared.clone());

    let [x, y, w, h] = pixels;
    let outcome = controller.on_drag_released(
        &page,
        column,
        PixelRect::new(x, y, w, h),
        PageSize::new(page_size.0, page_size.1),
    )?;

    let mut store = shared.read(|s| s.clone());
    save_to_path(&mut store, project)?;

    match outcome {
        DragOutcome::Moved { bound, cell } => eprintln!(
            "Moved box {} of '{}' to {} (value '{}' now stale)",
            bound.id, bound.column, bound.rect, cell.value
        ),
        DragOutcome::Created { bound, .. } => eprintln!(
            "Drew box {} for '{}' at {}",
            bound.id, bound.column, bound.rect
        ),
    }
    Ok(())
}

pub fn remove(project: &Path, file: &Path, page: usize, column: &str) -> Result<(), PageboxError> {
    let page = page_ref(file, page);
    let removed = mutate(project, |store| store.remove_box(&page, column))?;
    eprintln!("Removed box {} of '{column}' on {page}", removed.id);
    Ok(())
}

pub fn set_cell(
    project: &Path,
    file: &Path,
    page: usize,
    column: &str,
    value: &str,
) -> Result<(), PageboxError> {
    let page = page_ref(file, page);
    mutate(project, |store| store.set_cell_value(&page, column, value))?;
    eprintln!("Set '{column}' on {page} to '{value}'");
    Ok(())
}
