//! Keeps a table cell, the box it came from and the viewer focus in step.
//!
//! Front ends report user actions here instead of editing the store
//! directly. The controller never starts extraction; edits only flag cells
//! as stale so re-extraction stays an explicit operation.

use crate::error::PageboxError;
use crate::geometry::{clamp_to_page, pick_drop_target, to_relative, PageSize, PixelRect, RelRect};
use crate::model::{BoxInfo, Cell, PageRef};
use crate::store::SharedProject;

/// What the front end currently has selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Focus {
    pub page: PageRef,
    pub column: Option<String>,
    pub box_id: Option<u64>,
}

/// Result of releasing a drag on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// The drag ended on an existing box, which now has the dragged geometry.
    Moved { bound: BoxInfo, cell: Cell },
    /// A new box was drawn for the active column.
    Created { bound: BoxInfo, cell: Cell },
}

impl DragOutcome {
    pub fn bound(&self) -> &BoxInfo {
        match self {
            DragOutcome::Moved { bound, .. } | DragOutcome::Created { bound, .. } => bound,
        }
    }
}

pub struct BindingController {
    project: SharedProject,
    focus: Option<Focus>,
}

impl BindingController {
    pub fn new(project: SharedProject) -> Self {
        BindingController {
            project,
            focus: None,
        }
    }

    pub fn project(&self) -> &SharedProject {
        &self.project
    }

    pub fn focus(&self) -> Option<&Focus> {
        self.focus.as_ref()
    }

    /// Focus a cell. Returns its bound box, if any, for the viewer to show.
    pub fn select_cell(
        &mut self,
        page: &PageRef,
        column: &str,
    ) -> Result<Option<BoxInfo>, PageboxError> {
        let bound = self.project.write(|store| {
            store.require_column(column)?;
            let bound = store.page(page)?.box_for(column).cloned();
            store.set_last_selected_page(Some(page.clone()))?;
            Ok::<_, PageboxError>(bound)
        })?;
        self.focus = Some(Focus {
            page: page.clone(),
            column: Some(column.to_string()),
            box_id: bound.as_ref().map(|b| b.id),
        });
        Ok(bound)
    }

    /// Focus a box. Returns the column whose cell the table should highlight.
    pub fn select_box(&mut self, page: &PageRef, box_id: u64) -> Result<String, PageboxError> {
        let column = self.project.write(|store| {
            let column = store
                .page(page)?
                .box_by_id(box_id)
                .map(|b| b.column.clone())
                .ok_or_else(|| PageboxError::BoxIdNotFound {
                    page: page.clone(),
                    id: box_id,
                })?;
            store.set_last_selected_page(Some(page.clone()))?;
            Ok::<_, PageboxError>(column)
        })?;
        self.focus = Some(Focus {
            page: page.clone(),
            column: Some(column.clone()),
            box_id: Some(box_id),
        });
        Ok(column)
    }

    /// Show a page without selecting a cell or box on it.
    pub fn select_page(&mut self, page: &PageRef) -> Result<(), PageboxError> {
        self.project
            .write(|store| store.set_last_selected_page(Some(page.clone())))?;
        self.focus = Some(Focus {
            page: page.clone(),
            column: None,
            box_id: None,
        });
        Ok(())
    }

    /// A box was moved or resized. The cell keeps its value and is flagged
    /// stale.
    pub fn on_box_edited(
        &mut self,
        page: &PageRef,
        column: &str,
        rect: RelRect,
    ) -> Result<Cell, PageboxError> {
        let cell = self.project.write(|store| {
            let cell = store.move_box(page, column, rect)?;
            store.set_last_selected_page(Some(page.clone()))?;
            Ok::<_, PageboxError>(cell)
        })?;
        self.refocus_box(page, column);
        Ok(cell)
    }

    /// The user typed into a cell.
    pub fn on_cell_edited(
        &mut self,
        page: &PageRef,
        column: &str,
        text: &str,
    ) -> Result<Cell, PageboxError> {
        let cell = self.project.write(|store| {
            let cell = store.set_cell_value(page, column, text)?;
            store.set_last_selected_page(Some(page.clone()))?;
            Ok::<_, PageboxError>(cell)
        })?;
        self.refocus_box(page, column);
        Ok(cell)
    }

    pub fn on_box_deleted(
        &mut self,
        page: &PageRef,
        column: &str,
    ) -> Result<BoxInfo, PageboxError> {
        let removed = self.project.write(|store| store.remove_box(page, column))?;
        if let Some(f) = self.focus.as_mut() {
            if f.box_id == Some(removed.id) {
                f.box_id = None;
            }
        }
        Ok(removed)
    }

    /// A drag ended on a page displayed at `page_px` pixels.
    ///
    /// If the rectangle overlaps existing boxes, the one with the largest
    /// overlap (newest on ties) takes the new geometry and keeps its own
    /// column. Otherwise a box is drawn for `active_column`, replacing that
    /// column's previous box on the page.
    pub fn on_drag_released(
        &mut self,
        page: &PageRef,
        active_column: &str,
        drag: PixelRect,
        page_px: PageSize,
    ) -> Result<DragOutcome, PageboxError> {
        let rect = clamp_to_page(to_relative(drag, page_px)).ok_or(PageboxError::DegenerateBox)?;

        let outcome = self.project.write(|store| {
            let page_data = store.page(page)?;
            let target = pick_drop_target(page_data.boxes.values().map(|b| (b.id, &b.rect)), &rect)
                .and_then(|id| page_data.box_by_id(id))
                .map(|b| b.column.clone());

            let outcome = match target {
                Some(column) => {
                    let cell = store.move_box(page, &column, rect)?;
                    let bound = store
                        .page(page)?
                        .box_for(&column)
                        .cloned()
                        .ok_or_else(|| PageboxError::BoxNotFound {
                            page: page.clone(),
                            column: column.clone(),
                        })?;
                    DragOutcome::Moved { bound, cell }
                }
                None => {
                    let bound = store.set_box(page, active_column, rect)?;
                    let cell = store
                        .page(page)?
                        .cell(active_column)
                        .cloned()
                        .unwrap_or_default();
                    DragOutcome::Created { bound, cell }
                }
            };
            store.set_last_selected_page(Some(page.clone()))?;
            Ok::<_, PageboxError>(outcome)
        })?;

        let bound = outcome.bound();
        tracing::debug!(
            %page,
            column = %bound.column,
            id = bound.id,
            moved = matches!(outcome, DragOutcome::Moved { .. }),
            "drag released"
        );
        self.focus = Some(Focus {
            page: page.clone(),
            column: Some(bound.column.clone()),
            box_id: Some(bound.id),
        });
        Ok(outcome)
    }

    fn refocus_box(&mut self, page: &PageRef, column: &str) {
        let box_id = self
            .project
            .read(|store| store.page(page).ok()?.box_for(column).map(|b| b.id));
        self.focus = Some(Focus {
            page: page.clone(),
            column: Some(column.to_string()),
            box_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileImport, ProjectStore};
    use std::path::PathBuf;

    const PAGE_PX: PageSize = PageSize::new(1000.0, 2000.0);

    fn controller() -> (BindingController, PageRef) {
        let mut store = ProjectStore::new();
        let path = PathBuf::from("/docs/form.pdf");
        store.add_file(FileImport {
            path: path.clone(),
            file_size: 1,
            page_count: 2,
        });
        store.add_column("Name").unwrap();
        store.add_column("Amount").unwrap();
        (
            BindingController::new(SharedProject::new(store)),
            PageRef::new(path, 0),
        )
    }

    #[test]
    fn test_drag_outside_creates_box_for_active_column() {
        let (mut ctl, page) = controller();
        let outcome = ctl
            .on_drag_released(&page, "Name", PixelRect::new(100.0, 200.0, 300.0, 100.0), PAGE_PX)
            .unwrap();
        let DragOutcome::Created { bound, cell } = outcome else {
            panic!("expected a new box");
        };
        assert_eq!(bound.column, "Name");
        assert!(bound.rect.max_abs_diff(&RelRect::new(0.1, 0.1, 0.3, 0.05)) < 1e-12);
        assert!(cell.stale);
        assert_eq!(ctl.focus().unwrap().box_id, Some(bound.id));
    }

    #[test]
    fn test_drag_inside_moves_existing_box() {
        let (mut ctl, page) = controller();
        let first = ctl
            .on_drag_released(&page, "Name", PixelRect::new(100.0, 200.0, 300.0, 100.0), PAGE_PX)
            .unwrap();
        ctl.on_cell_edited(&page, "Name", "ACME").unwrap();

        let outcome = ctl
            .on_drag_released(&page, "Amount", PixelRect::new(150.0, 220.0, 300.0, 100.0), PAGE_PX)
            .unwrap();
        let DragOutcome::Moved { bound, cell } = outcome else {
            panic!("expected a move");
        };
        assert_eq!(bound.id, first.bound().id);
        assert_eq!(bound.column, "Name");
        assert_eq!(cell.value, "ACME");
        assert!(cell.stale);
        let p = ctl.project().read(|s| s.page(&page).unwrap().clone());
        assert!(p.box_for("Amount").is_none());
    }

    #[test]
    fn test_selection_is_symmetric() {
        let (mut ctl, page) = controller();
        let created = ctl
            .on_drag_released(&page, "Amount", PixelRect::new(500.0, 1500.0, 200.0, 80.0), PAGE_PX)
            .unwrap();
        let id = created.bound().id;

        let bound = ctl.select_cell(&page, "Amount").unwrap().unwrap();
        assert_eq!(bound.id, id);
        assert_eq!(ctl.select_box(&page, id).unwrap(), "Amount");
        assert_eq!(ctl.select_cell(&page, "Name").unwrap(), None);
        assert!(matches!(
            ctl.select_box(&page, id + 100),
            Err(PageboxError::BoxIdNotFound { .. })
        ));
    }

    #[test]
    fn test_focus_updates_last_selected_page() {
        let (mut ctl, page) = controller();
        let other = PageRef::new(&page.file, 1);
        ctl.select_page(&other).unwrap();
        assert_eq!(
            ctl.project().read(|s| s.last_selected_page().cloned()),
            Some(other)
        );
        ctl.select_cell(&page, "Name").unwrap();
        assert_eq!(
            ctl.project().read(|s| s.last_selected_page().cloned()),
            Some(page)
        );
    }

    #[test]
    fn test_box_edit_flags_stale_and_keeps_value() {
        let (mut ctl, page) = controller();
        ctl.on_drag_released(&page, "Name", PixelRect::new(0.0, 0.0, 100.0, 100.0), PAGE_PX)
            .unwrap();
        ctl.on_cell_edited(&page, "Name", "typed").unwrap();
        let cell = ctl
            .on_box_edited(&page, "Name", RelRect::new(0.2, 0.2, 0.1, 0.1))
            .unwrap();
        assert_eq!(cell.value, "typed");
        assert!(cell.stale);
        assert!(ctl
            .on_box_edited(&page, "Amount", RelRect::new(0.2, 0.2, 0.1, 0.1))
            .is_err());
    }

    #[test]
    fn test_degenerate_drag_rejected() {
        let (mut ctl, page) = controller();
        assert!(matches!(
            ctl.on_drag_released(&page, "Name", PixelRect::new(10.0, 10.0, 0.0, 50.0), PAGE_PX),
            Err(PageboxError::DegenerateBox)
        ));
    }
}
