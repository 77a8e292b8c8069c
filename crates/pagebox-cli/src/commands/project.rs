use pagebox_core::error::PageboxError;
use pagebox_core::export::{build_report, write_csv};
use pagebox_core::project::{load_from_path, save_to_path};
use pagebox_core::ProjectStore;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::output;

pub fn init(project: &Path) -> Result<(), PageboxError> {
    if project.exists() {
        return Err(PageboxError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", project.display()),
        )));
    }
    let mut store = ProjectStore::new();
    save_to_path(&mut store, project)?;
    eprintln!("Created {}", project.display());
    Ok(())
}

pub fn show(project: &Path, output_format: &str) -> Result<(), PageboxError> {
    let store = load_from_path(project)?;
    match output_format {
        "json" => output::json::print(store.data())?,
        _ => print!("{}", output::table::format_project(store.data())),
    }
    Ok(())
}

pub fn export(project: &Path, out: &Path, format: &str) -> Result<(), PageboxError> {
    let store = load_from_path(project)?;
    let report = build_report(store.data());

    match format {
        "json" => {
            let path = with_suffix(out, ".json");
            let json = serde_json::to_string_pretty(&report)?;
            std::fs::write(&path, json)?;
            eprintln!("Wrote {}", path.display());
        }
        _ => {
            for (sheet, suffix) in [(&report.files, "-files.csv"), (&report.pages, "-pages.csv")] {
                let path = with_suffix(out, suffix);
                write_csv(sheet, BufWriter::new(File::create(&path)?))?;
                eprintln!("Wrote {} ({} rows)", path.display(), sheet.rows.len());
            }
        }
    }
    Ok(())
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}
