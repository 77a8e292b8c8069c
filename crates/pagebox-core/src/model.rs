use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::geometry::RelRect;

/// Identifies one page of one imported file. Page indices are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageRef {
    pub file: PathBuf,
    pub page: usize,
}

impl PageRef {
    pub fn new(file: impl Into<PathBuf>, page: usize) -> Self {
        PageRef {
            file: file.into(),
            page,
        }
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} page {}", self.file.display(), self.page + 1)
    }
}

/// Where a cell's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextSource {
    Vector,
    Ocr,
    OcrTimeout,
    OcrUnavailable,
    OcrFailed,
    /// Extraction ran and produced nothing.
    None,
}

impl fmt::Display for TextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TextSource::Vector => "vector",
            TextSource::Ocr => "ocr",
            TextSource::OcrTimeout => "ocr-timeout",
            TextSource::OcrUnavailable => "ocr-unavailable",
            TextSource::OcrFailed => "ocr-failed",
            TextSource::None => "none",
        };
        f.write_str(s)
    }
}

/// One data cell: the value shown in the table plus its bookkeeping flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub value: String,
    /// Set when the user typed the value. Cleared when a box is (re)drawn.
    #[serde(default)]
    pub manual: bool,
    /// The bound box changed since the value was produced.
    #[serde(default)]
    pub stale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TextSource>,
}

/// A user-placed extraction region bound to one column on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxInfo {
    /// Project-unique, monotonically assigned; a higher id means a more
    /// recently created box.
    pub id: u64,
    pub column: String,
    pub rect: RelRect,
    pub page: PageRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageData {
    pub index: usize,
    pub cells: BTreeMap<String, Cell>,
    /// Keyed by column name: at most one box per column.
    pub boxes: BTreeMap<String, BoxInfo>,
}

impl PageData {
    pub fn new(index: usize) -> Self {
        PageData {
            index,
            cells: BTreeMap::new(),
            boxes: BTreeMap::new(),
        }
    }

    pub fn box_for(&self, column: &str) -> Option<&BoxInfo> {
        self.boxes.get(column)
    }

    pub fn box_by_id(&self, id: u64) -> Option<&BoxInfo> {
        self.boxes.values().find(|b| b.id == id)
    }

    pub fn cell(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// The cell's value, or an empty string when the column has no cell.
    pub fn value(&self, column: &str) -> &str {
        self.cells.get(column).map(|c| c.value.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfFileInfo {
    /// Absolute path; the natural key of a file within a project.
    pub path: PathBuf,
    pub file_size: u64,
    pub page_count: usize,
    pub pages: Vec<PageData>,
}

impl PdfFileInfo {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn page(&self, index: usize) -> Option<&PageData> {
        self.pages.iter().find(|p| p.index == index)
    }

    pub(crate) fn page_mut(&mut self, index: usize) -> Option<&mut PageData> {
        self.pages.iter_mut().find(|p| p.index == index)
    }
}

/// A data column. Hidden columns keep their boxes and values; they are only
/// left out of the page table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub visible: bool,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            visible: true,
        }
    }
}

impl PartialEq<&str> for Column {
    fn eq(&self, other: &&str) -> bool {
        self.name == *other
    }
}

/// A page-independent snapshot of box layouts keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    /// Page the template was captured from (display only).
    pub ref_page: Option<PageRef>,
    pub remark: String,
    pub boxes: BTreeMap<String, RelRect>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectData {
    pub files: Vec<PdfFileInfo>,
    /// Ordered; defines table column order.
    pub columns: Vec<Column>,
    pub templates: Vec<Template>,
    pub last_saved: Option<DateTime<Utc>>,
    pub last_selected_page: Option<PageRef>,
}

impl ProjectData {
    pub fn file(&self, path: &Path) -> Option<&PdfFileInfo> {
        self.files.iter().find(|f| f.path == path)
    }

    pub(crate) fn file_mut(&mut self, path: &Path) -> Option<&mut PdfFileInfo> {
        self.files.iter_mut().find(|f| f.path == path)
    }

    pub fn page(&self, page: &PageRef) -> Option<&PageData> {
        self.file(&page.file)?.page(page.page)
    }

    pub(crate) fn page_mut(&mut self, page: &PageRef) -> Option<&mut PageData> {
        self.file_mut(&page.file)?.page_mut(page.page)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.visible)
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Every page in the project, in file then page order.
    pub fn page_refs(&self) -> Vec<PageRef> {
        self.files
            .iter()
            .flat_map(|f| f.pages.iter().map(|p| PageRef::new(&f.path, p.index)))
            .collect()
    }

    pub fn box_count(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| f.pages.iter())
            .map(|p| p.boxes.len())
            .sum()
    }

    /// Highest box id in use, 0 when there are no boxes.
    pub fn max_box_id(&self) -> u64 {
        self.files
            .iter()
            .flat_map(|f| f.pages.iter())
            .flat_map(|p| p.boxes.values())
            .map(|b| b.id)
            .max()
            .unwrap_or(0)
    }
}
