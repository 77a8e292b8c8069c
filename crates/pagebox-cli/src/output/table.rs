use pagebox_core::model::{Cell, ProjectData};
use std::fmt::Write;

/// Render the page table as plain text: one row per page, one column per
/// visible project column. Stale values are marked `*`, manual ones `!`.
pub fn format_project(data: &ProjectData) -> String {
    let mut out = String::new();

    let mut headers = vec!["File".to_string(), "Page".to_string()];
    headers.extend(data.visible_columns().map(|c| c.name.clone()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for file in &data.files {
        let name = file.file_name();
        for page in &file.pages {
            let mut row = vec![name.clone(), (page.index + 1).to_string()];
            for column in data.visible_columns() {
                let boxed = page.box_for(&column.name).is_some();
                row.push(render_cell(page.cell(&column.name), boxed));
            }
            rows.push(row);
        }
    }

    let widths: Vec<usize> = (0..headers.len())
        .map(|i| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(headers[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let _ = writeln!(out, "{}", join_padded(&headers, &widths));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", join_padded(&rule, &widths));
    for row in &rows {
        let _ = writeln!(out, "{}", join_padded(row, &widths));
    }

    let _ = writeln!(
        out,
        "\n{} file(s), {} page(s), {} box(es), {} template(s)",
        data.files.len(),
        rows.len(),
        data.box_count(),
        data.templates.len()
    );
    if let Some(saved) = data.last_saved {
        let _ = writeln!(out, "Last saved {}", saved.to_rfc3339());
    }
    out
}

fn render_cell(cell: Option<&Cell>, boxed: bool) -> String {
    let mut s = match cell {
        Some(c) => c.value.replace('\n', " / "),
        None => String::new(),
    };
    if cell.is_some_and(|c| c.manual) {
        s.push('!');
    } else if cell.is_some_and(|c| c.stale) {
        s.push('*');
    }
    if s.is_empty() && boxed {
        s.push('-');
    }
    s
}

fn join_padded(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(c, &w)| format!("{c:<w$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagebox_core::geometry::RelRect;
    use pagebox_core::model::PageRef;
    use pagebox_core::store::{AddFileOutcome, FileImport};
    use pagebox_core::ProjectStore;
    use std::path::PathBuf;

    #[test]
    fn test_format_project_marks_flags() {
        let mut store = ProjectStore::new();
        let path = PathBuf::from("/data/a.pdf");
        let outcome = store.add_file(FileImport {
            path: path.clone(),
            file_size: 10,
            page_count: 2,
        });
        assert_eq!(outcome, AddFileOutcome::Added);
        store.add_column("Invoice").unwrap();
        store.add_column("Date").unwrap();

        let p0 = PageRef::new(&path, 0);
        store.set_cell_value(&p0, "Invoice", "INV-1").unwrap();
        store
            .set_box(&p0, "Date", RelRect::new(0.1, 0.1, 0.2, 0.1))
            .unwrap();

        let text = format_project(store.data());
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("File"));
        assert!(lines[0].contains("Invoice"));
        assert!(lines[2].contains("INV-1!"));
        assert!(lines[2].ends_with('*') || lines[2].ends_with('-'));
        assert!(text.contains("1 file(s), 2 page(s), 1 box(es), 0 template(s)"));

        store.set_column_visible("Invoice", false).unwrap();
        let text = format_project(store.data());
        assert!(!text.contains("Invoice"));
        assert!(!text.contains("INV-1"));
        assert!(text.lines().next().unwrap().contains("Date"));
    }
}
