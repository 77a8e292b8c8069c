//! The single owner of a project's data and its mutation API.
//!
//! Every operation validates first and mutates second, so a rejected call
//! leaves the store exactly as it was. [`SharedProject`] serializes access
//! for callers that refresh displays from other threads.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::PageboxError;
use crate::extraction::Extraction;
use crate::geometry::{clamp_to_page, RelRect};
use crate::model::{BoxInfo, Cell, Column, PageData, PageRef, PdfFileInfo, ProjectData};

/// What the rendering side learned about a file being imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImport {
    pub path: PathBuf,
    pub file_size: u64,
    pub page_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddFileOutcome {
    Added,
    /// The path was already in the project; size and page count refreshed.
    Updated,
}

/// Text read from one box, tagged with the box it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxReading {
    pub column: String,
    pub box_id: u64,
    pub rect: RelRect,
    pub extraction: Extraction,
}

impl BoxReading {
    pub fn new(source: &BoxInfo, extraction: Extraction) -> Self {
        BoxReading {
            column: source.column.clone(),
            box_id: source.id,
            rect: source.rect,
            extraction,
        }
    }
}

/// Result of [`ProjectStore::apply_page_extractions`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PageWrite {
    pub written: usize,
    /// Columns whose reading was dropped because the box changed.
    pub changed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectStore {
    data: ProjectData,
    next_box_id: u64,
}

impl Default for ProjectStore {
    fn default() -> Self {
        Self::from_data(ProjectData::default())
    }
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: ProjectData) -> Self {
        let next_box_id = data.max_box_id() + 1;
        ProjectStore { data, next_box_id }
    }

    pub fn data(&self) -> &ProjectData {
        &self.data
    }

    pub fn into_data(self) -> ProjectData {
        self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut ProjectData {
        &mut self.data
    }

    pub fn columns(&self) -> &[Column] {
        &self.data.columns
    }

    pub fn page(&self, page: &PageRef) -> Result<&PageData, PageboxError> {
        self.data
            .page(page)
            .ok_or_else(|| PageboxError::PageNotFound(page.clone()))
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Add a file, or refresh it if the path is already imported.
    ///
    /// On refresh, pages still within the new page count keep their boxes
    /// and cells; pages past it are dropped and missing ones are created.
    pub fn add_file(&mut self, import: FileImport) -> AddFileOutcome {
        if let Some(existing) = self.data.file_mut(&import.path) {
            existing.file_size = import.file_size;
            existing.page_count = import.page_count;
            existing.pages.retain(|p| p.index < import.page_count);
            for index in 0..import.page_count {
                if existing.page(index).is_none() {
                    existing.pages.push(PageData::new(index));
                }
            }
            existing.pages.sort_by_key(|p| p.index);
            let path = existing.path.clone();
            self.clear_selection_if_gone();
            tracing::debug!(path = %path.display(), pages = import.page_count, "refreshed file");
            return AddFileOutcome::Updated;
        }

        tracing::debug!(path = %import.path.display(), pages = import.page_count, "added file");
        self.data.files.push(PdfFileInfo {
            path: import.path,
            file_size: import.file_size,
            page_count: import.page_count,
            pages: (0..import.page_count).map(PageData::new).collect(),
        });
        AddFileOutcome::Added
    }

    /// Remove a file together with its pages, boxes and cells.
    pub fn remove_file(&mut self, path: &Path) -> Result<PdfFileInfo, PageboxError> {
        let idx = self
            .data
            .files
            .iter()
            .position(|f| f.path == path)
            .ok_or_else(|| PageboxError::FileNotFound(path.to_path_buf()))?;
        let removed = self.data.files.remove(idx);
        self.clear_selection_if_gone();
        tracing::info!(path = %path.display(), "removed file");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Columns
    // -----------------------------------------------------------------------

    pub fn add_column(&mut self, name: &str) -> Result<(), PageboxError> {
        let name = validate_column_name(name)?;
        if self.data.has_column(&name) {
            return Err(PageboxError::DuplicateColumn(name));
        }
        self.data.columns.push(Column::new(name));
        Ok(())
    }

    /// Show or hide a column in the page table.
    pub fn set_column_visible(&mut self, name: &str, visible: bool) -> Result<(), PageboxError> {
        self.require_column(name)?;
        for c in self.data.columns.iter_mut().filter(|c| c.name == name) {
            c.visible = visible;
        }
        Ok(())
    }

    /// Remove a column and clear every cell and box bound to it.
    pub fn remove_column(&mut self, name: &str) -> Result<(), PageboxError> {
        self.require_column(name)?;
        self.data.columns.retain(|c| c.name != name);
        for page in self.data.files.iter_mut().flat_map(|f| f.pages.iter_mut()) {
            page.cells.remove(name);
            page.boxes.remove(name);
        }
        tracing::info!(column = name, "removed column");
        Ok(())
    }

    /// Rename a column everywhere it is referenced on pages.
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<(), PageboxError> {
        self.require_column(old)?;
        let new = validate_column_name(new)?;
        if new == old {
            return Ok(());
        }
        if self.data.has_column(&new) {
            return Err(PageboxError::DuplicateColumn(new));
        }
        for c in self.data.columns.iter_mut().filter(|c| c.name == old) {
            c.name = new.clone();
        }
        for page in self.data.files.iter_mut().flat_map(|f| f.pages.iter_mut()) {
            if let Some(cell) = page.cells.remove(old) {
                page.cells.insert(new.clone(), cell);
            }
            if let Some(mut b) = page.boxes.remove(old) {
                b.column = new.clone();
                page.boxes.insert(new.clone(), b);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cells and boxes
    // -----------------------------------------------------------------------

    /// Store a value typed by the user. Marks the cell as a manual override.
    pub fn set_cell_value(
        &mut self,
        page: &PageRef,
        column: &str,
        text: &str,
    ) -> Result<Cell, PageboxError> {
        self.require_column(column)?;
        let page_data = self.page_mut_or_err(page)?;
        let cell = page_data.cells.entry(column.to_string()).or_default();
        cell.value = text.to_string();
        cell.manual = true;
        cell.stale = false;
        cell.source = None;
        Ok(cell.clone())
    }

    /// Draw a box for `column`, replacing any box the column already has on
    /// this page.
    ///
    /// The cell loses its manual flag and is marked for re-extraction. When an
    /// older box was replaced its value is cleared as well; a value with no
    /// prior box (typed by hand) is kept until the next extraction.
    pub fn set_box(
        &mut self,
        page: &PageRef,
        column: &str,
        rect: RelRect,
    ) -> Result<BoxInfo, PageboxError> {
        self.require_column(column)?;
        let rect = clamp_to_page(rect).ok_or(PageboxError::DegenerateBox)?;
        let id = self.next_box_id;
        let page_data = self.page_mut_or_err(page)?;
        let placed = place_box(page_data, page, column, rect, id);
        self.next_box_id += 1;
        Ok(placed)
    }

    /// Move or resize the existing box of `column`. The box keeps its id and
    /// the cell keeps its value, flagged stale.
    pub fn move_box(
        &mut self,
        page: &PageRef,
        column: &str,
        rect: RelRect,
    ) -> Result<Cell, PageboxError> {
        self.require_column(column)?;
        let rect = clamp_to_page(rect).ok_or(PageboxError::DegenerateBox)?;
        let page_data = self.page_mut_or_err(page)?;
        let b = page_data
            .boxes
            .get_mut(column)
            .ok_or_else(|| PageboxError::BoxNotFound {
                page: page.clone(),
                column: column.to_string(),
            })?;
        b.rect = rect;
        let cell = page_data.cells.entry(column.to_string()).or_default();
        cell.stale = true;
        Ok(cell.clone())
    }

    /// Remove the box of `column`. The cell value stays; with no box left there
    /// is nothing to re-extract, so the stale flag is cleared.
    pub fn remove_box(&mut self, page: &PageRef, column: &str) -> Result<BoxInfo, PageboxError> {
        let page_data = self.page_mut_or_err(page)?;
        let removed = page_data
            .boxes
            .remove(column)
            .ok_or_else(|| PageboxError::BoxNotFound {
                page: page.clone(),
                column: column.to_string(),
            })?;
        if let Some(cell) = page_data.cells.get_mut(column) {
            cell.stale = false;
        }
        Ok(removed)
    }

    /// Write extraction results for one page as a single unit.
    ///
    /// A reading is only stored while its box is still the one it was taken
    /// from, with the same id and geometry. Readings for boxes that were
    /// moved, replaced or removed in the meantime are dropped and their
    /// columns listed in [`PageWrite::changed`]; those cells stay stale.
    pub fn apply_page_extractions(
        &mut self,
        page: &PageRef,
        readings: Vec<BoxReading>,
    ) -> Result<PageWrite, PageboxError> {
        let page_data = self.page_mut_or_err(page)?;
        let mut outcome = PageWrite::default();
        for reading in readings {
            let current = page_data.boxes.get(&reading.column);
            if !current.is_some_and(|b| b.id == reading.box_id && b.rect == reading.rect) {
                tracing::debug!(%page, column = %reading.column, "box changed, dropping reading");
                outcome.changed.push(reading.column);
                continue;
            }
            let cell = page_data.cells.entry(reading.column).or_default();
            cell.value = reading.extraction.text;
            cell.manual = false;
            cell.stale = false;
            cell.source = Some(reading.extraction.source);
            outcome.written += 1;
        }
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    pub fn set_last_selected_page(&mut self, page: Option<PageRef>) -> Result<(), PageboxError> {
        if let Some(ref p) = page {
            self.page(p)?;
        }
        self.data.last_selected_page = page;
        Ok(())
    }

    pub fn last_selected_page(&self) -> Option<&PageRef> {
        self.data.last_selected_page.as_ref()
    }

    // -----------------------------------------------------------------------
    // Internals shared with the template engine
    // -----------------------------------------------------------------------

    pub(crate) fn require_column(&self, column: &str) -> Result<(), PageboxError> {
        if self.data.has_column(column) {
            Ok(())
        } else {
            Err(PageboxError::ColumnNotFound(column.to_string()))
        }
    }

    pub(crate) fn page_mut_or_err(
        &mut self,
        page: &PageRef,
    ) -> Result<&mut PageData, PageboxError> {
        self.data
            .page_mut(page)
            .ok_or_else(|| PageboxError::PageNotFound(page.clone()))
    }

    /// Reserve `n` consecutive box ids.
    pub(crate) fn allocate_box_ids(&mut self, n: u64) -> u64 {
        let first = self.next_box_id;
        self.next_box_id += n;
        first
    }

    fn clear_selection_if_gone(&mut self) {
        let gone = match &self.data.last_selected_page {
            Some(p) => self.data.page(p).is_none(),
            None => false,
        };
        if gone {
            self.data.last_selected_page = None;
        }
    }
}

/// Put a box on a page, applying the replace rules of [`ProjectStore::set_box`].
pub(crate) fn place_box(
    page_data: &mut PageData,
    page: &PageRef,
    column: &str,
    rect: RelRect,
    id: u64,
) -> BoxInfo {
    let placed = BoxInfo {
        id,
        column: column.to_string(),
        rect,
        page: page.clone(),
    };
    let replaced = page_data.boxes.insert(column.to_string(), placed.clone());
    let cell = page_data.cells.entry(column.to_string()).or_default();
    if replaced.is_some() {
        cell.value.clear();
        cell.source = None;
    }
    cell.manual = false;
    cell.stale = true;
    tracing::debug!(%page, column, id, replaced = replaced.is_some(), "placed box");
    placed
}

fn validate_column_name(name: &str) -> Result<String, PageboxError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PageboxError::InvalidColumnName(
            "column name must not be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// A project store shared between an interactive front end and background
/// work. Each closure runs under one lock acquisition, so readers never see
/// half of a mutation.
#[derive(Debug, Clone, Default)]
pub struct SharedProject {
    inner: Arc<RwLock<ProjectStore>>,
}

impl SharedProject {
    pub fn new(store: ProjectStore) -> Self {
        SharedProject {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&ProjectStore) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut ProjectStore) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Clone of the current project data.
    pub fn snapshot(&self) -> ProjectData {
        self.inner.read().data().clone()
    }

    /// Replace the whole store, e.g. after a successful load.
    pub fn replace(&self, store: ProjectStore) {
        *self.inner.write() = store;
    }
}
