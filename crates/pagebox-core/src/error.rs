use std::path::PathBuf;

use crate::model::PageRef;

#[derive(Debug, thiserror::Error)]
pub enum PageboxError {
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("invalid column name: {0}")]
    InvalidColumnName(String),

    #[error("file not found in project: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("page not found: {0}")]
    PageNotFound(PageRef),

    #[error("no box for column '{column}' on {page}")]
    BoxNotFound { page: PageRef, column: String },

    #[error("box {id} not found on {page}")]
    BoxIdNotFound { page: PageRef, id: u64 },

    #[error("box for column '{column}' on {page} changed while it was being read")]
    BoxChanged { page: PageRef, column: String },

    #[error("box has zero area after clamping to the page")]
    DegenerateBox,

    #[error("template '{0}' not found")]
    TemplateNotFound(String),

    #[error("template '{0}' already exists")]
    DuplicateTemplate(String),

    #[error("invalid template name: {0}")]
    InvalidTemplateName(String),

    #[error("corrupt project file: {0}")]
    CorruptProjectFile(String),

    #[error("text extraction unavailable: no vector text and OCR could not be attempted")]
    ExtractionUnavailable,

    #[error("OCR timed out after {secs}s")]
    ExtractionTimeout { secs: u64 },

    #[error("{tool} not found. Install poppler-utils / tesseract-ocr and make sure it is on PATH")]
    ToolNotFound { tool: String },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
