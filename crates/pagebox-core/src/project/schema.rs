//! On-disk shape of a project file.
//!
//! These records mirror the JSON keys one to one. Conversion to and from
//! [`ProjectData`] happens in [`to_record`] and [`from_record`]; the latter
//! is where every structural check lives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use crate::geometry::RelRect;
use crate::model::{
    BoxInfo, Cell, Column, PageData, PageRef, PdfFileInfo, ProjectData, Template,
};

pub const CURRENT_VERSION: u32 = 1;

/// Top-level keys a project file must carry.
pub const REQUIRED_KEYS: &[&str] = &[
    "files",
    "columns",
    "templates",
    "lastSaved",
    "lastSelectedPage",
];

fn version_one() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(default = "version_one")]
    pub version: u32,
    pub files: Vec<FileRecord>,
    pub columns: Vec<ColumnRecord>,
    pub templates: Vec<TemplateRecord>,
    pub last_saved: Option<DateTime<Utc>>,
    pub last_selected_page: Option<PageRefRecord>,
}

/// A visible column is written as its bare name.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRecord {
    Name(String),
    Full { name: String, visible: bool },
}

impl ColumnRecord {
    fn name(&self) -> &str {
        match self {
            ColumnRecord::Name(name) | ColumnRecord::Full { name, .. } => name,
        }
    }
}

impl From<&Column> for ColumnRecord {
    fn from(c: &Column) -> Self {
        if c.visible {
            ColumnRecord::Name(c.name.clone())
        } else {
            ColumnRecord::Full {
                name: c.name.clone(),
                visible: false,
            }
        }
    }
}

impl From<ColumnRecord> for Column {
    fn from(r: ColumnRecord) -> Self {
        match r {
            ColumnRecord::Name(name) => Column::new(name),
            ColumnRecord::Full { name, visible } => Column { name, visible },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub path: PathBuf,
    #[serde(default)]
    pub file_name: String,
    pub file_size: u64,
    pub page_count: usize,
    pub pages: Vec<PageRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub page_index: usize,
    #[serde(default)]
    pub cells: BTreeMap<String, Cell>,
    #[serde(default)]
    pub boxes: Vec<BoxRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoxRecord {
    pub id: u64,
    pub column: String,
    pub rect: RelRect,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub name: String,
    #[serde(default)]
    pub ref_page: Option<PageRefRecord>,
    #[serde(default)]
    pub remark: String,
    pub boxes: BTreeMap<String, RelRect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRefRecord {
    pub file: PathBuf,
    pub page_index: usize,
}

impl From<&PageRef> for PageRefRecord {
    fn from(p: &PageRef) -> Self {
        PageRefRecord {
            file: p.file.clone(),
            page_index: p.page,
        }
    }
}

impl From<PageRefRecord> for PageRef {
    fn from(r: PageRefRecord) -> Self {
        PageRef::new(r.file, r.page_index)
    }
}

pub fn to_record(data: &ProjectData) -> ProjectRecord {
    ProjectRecord {
        version: CURRENT_VERSION,
        files: data
            .files
            .iter()
            .map(|f| FileRecord {
                path: f.path.clone(),
                file_name: f.file_name(),
                file_size: f.file_size,
                page_count: f.page_count,
                pages: f
                    .pages
                    .iter()
                    .map(|p| PageRecord {
                        page_index: p.index,
                        cells: p.cells.clone(),
                        boxes: p
                            .boxes
                            .values()
                            .map(|b| BoxRecord {
                                id: b.id,
                                column: b.column.clone(),
                                rect: b.rect,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect(),
        columns: data.columns.iter().map(ColumnRecord::from).collect(),
        templates: data
            .templates
            .iter()
            .map(|t| TemplateRecord {
                name: t.name.clone(),
                ref_page: t.ref_page.as_ref().map(PageRefRecord::from),
                remark: t.remark.clone(),
                boxes: t.boxes.clone(),
            })
            .collect(),
        last_saved: data.last_saved,
        last_selected_page: data.last_selected_page.as_ref().map(PageRefRecord::from),
    }
}

/// Validate a parsed record and build the in-memory project from it.
pub fn from_record(record: ProjectRecord) -> Result<ProjectData, String> {
    if record.version > CURRENT_VERSION {
        return Err(format!(
            "project version {} is newer than supported version {CURRENT_VERSION}",
            record.version
        ));
    }

    let mut columns = HashSet::new();
    for c in record.columns.iter().map(ColumnRecord::name) {
        if c.trim().is_empty() {
            return Err("empty column name".into());
        }
        if !columns.insert(c.to_string()) {
            return Err(format!("duplicate column '{c}'"));
        }
    }

    let mut paths = HashSet::new();
    let mut box_ids = HashSet::new();
    let mut files = Vec::with_capacity(record.files.len());
    for f in record.files {
        if !paths.insert(f.path.clone()) {
            return Err(format!("duplicate file '{}'", f.path.display()));
        }

        let mut pages: BTreeMap<usize, PageData> = BTreeMap::new();
        for p in f.pages {
            if p.page_index >= f.page_count {
                return Err(format!(
                    "{}: page index {} out of range (page count {})",
                    f.path.display(),
                    p.page_index,
                    f.page_count
                ));
            }
            if pages.contains_key(&p.page_index) {
                return Err(format!("{}: duplicate page index {}", f.path.display(), p.page_index));
            }
            let page_ref = PageRef::new(&f.path, p.page_index);

            for column in p.cells.keys() {
                if !columns.contains(column.as_str()) {
                    return Err(format!("{page_ref}: cell for unknown column '{column}'"));
                }
            }

            let mut page = PageData::new(p.page_index);
            page.cells = p.cells;
            for b in p.boxes {
                if !columns.contains(b.column.as_str()) {
                    return Err(format!("{page_ref}: box for unknown column '{}'", b.column));
                }
                if !box_ids.insert(b.id) {
                    return Err(format!("duplicate box id {}", b.id));
                }
                let info = BoxInfo {
                    id: b.id,
                    column: b.column.clone(),
                    rect: b.rect,
                    page: page_ref.clone(),
                };
                if page.boxes.insert(b.column.clone(), info).is_some() {
                    return Err(format!("{page_ref}: more than one box for column '{}'", b.column));
                }
            }
            pages.insert(p.page_index, page);
        }

        // Pages a writer left out come back empty.
        for index in 0..f.page_count {
            pages.entry(index).or_insert_with(|| PageData::new(index));
        }

        files.push(PdfFileInfo {
            path: f.path,
            file_size: f.file_size,
            page_count: f.page_count,
            pages: pages.into_values().collect(),
        });
    }

    let mut names = HashSet::new();
    let mut templates = Vec::with_capacity(record.templates.len());
    for t in record.templates {
        if !names.insert(t.name.clone()) {
            return Err(format!("duplicate template '{}'", t.name));
        }
        templates.push(Template {
            name: t.name,
            ref_page: t.ref_page.map(PageRef::from),
            remark: t.remark,
            boxes: t.boxes,
        });
    }

    let data = ProjectData {
        files,
        columns: record.columns.into_iter().map(Column::from).collect(),
        templates,
        last_saved: record.last_saved,
        last_selected_page: record.last_selected_page.map(PageRef::from),
    };

    if let Some(ref sel) = data.last_selected_page {
        if data.page(sel).is_none() {
            return Err(format!("last selected page {sel} does not exist"));
        }
    }

    Ok(data)
}
