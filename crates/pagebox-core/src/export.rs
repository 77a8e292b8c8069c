//! Flat report views of a project, one sheet per table.

use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;

use crate::error::PageboxError;
use crate::model::ProjectData;

pub const FILE_SHEET: &str = "PDF File List";
pub const PAGE_SHEET: &str = "PDF Page List";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub files: Sheet,
    pub pages: Sheet,
}

/// Build the file list and the per-page value table.
///
/// Page numbers are 1-based. Every project column gets a column in the page
/// sheet, in project order; pages without a value leave it empty.
pub fn build_report(data: &ProjectData) -> Report {
    let files = Sheet {
        name: FILE_SHEET.to_string(),
        headers: ["File Name", "File Path", "Number of Pages", "File Size (bytes)"]
            .map(String::from)
            .to_vec(),
        rows: data
            .files
            .iter()
            .map(|f| {
                vec![
                    f.file_name(),
                    f.path.display().to_string(),
                    f.page_count.to_string(),
                    f.file_size.to_string(),
                ]
            })
            .collect(),
    };

    let mut headers: Vec<String> = ["File Name", "File Path", "Page Number"]
        .map(String::from)
        .to_vec();
    headers.extend(data.columns.iter().map(|c| c.name.clone()));

    let mut rows = Vec::new();
    for file in &data.files {
        let name = file.file_name();
        let path = file.path.display().to_string();
        for page in &file.pages {
            let mut row = vec![name.clone(), path.clone(), (page.index + 1).to_string()];
            row.extend(data.columns.iter().map(|c| page.value(&c.name).to_string()));
            rows.push(row);
        }
    }

    Report {
        files,
        pages: Sheet {
            name: PAGE_SHEET.to_string(),
            headers,
            rows,
        },
    }
}

pub fn write_csv<W: Write>(sheet: &Sheet, writer: W) -> Result<(), PageboxError> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
