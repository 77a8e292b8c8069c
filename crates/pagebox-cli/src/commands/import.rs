use pagebox_core::error::PageboxError;
use pagebox_core::extraction::poppler::PopplerBackend;
use pagebox_core::import::import_files;
use pagebox_core::project::{load_from_path, save_to_path};
use pagebox_core::{CancelFlag, Progress, SharedProject};
use std::path::{Path, PathBuf};

use super::{progress_bar, tick};

pub fn run(
    project: &Path,
    mut paths: Vec<PathBuf>,
    dir: Option<PathBuf>,
) -> Result<(), PageboxError> {
    if let Some(dir) = dir {
        let mut found = Vec::new();
        find_pdfs(&dir, &mut found)?;
        found.sort();
        tracing::info!(dir = %dir.display(), files = found.len(), "scanned folder");
        paths.extend(found);
    }
    if paths.is_empty() {
        eprintln!("Nothing to import");
        return Ok(());
    }

    let shared = SharedProject::new(load_from_path(project)?);
    let backend = PopplerBackend::new();
    let pb = progress_bar(paths.len());
    let report = import_files(
        &shared,
        &backend,
        &paths,
        &mut |p: &Progress| tick(&pb, p),
        &CancelFlag::new(),
    );
    pb.finish_and_clear();

    for (path, error) in &report.failed {
        eprintln!("  skipped {}: {error}", path.display());
    }

    let mut store = shared.read(|s| s.clone());
    save_to_path(&mut store, project)?;
    eprintln!(
        "Imported {} new, {} refreshed, {} failed",
        report.added.len(),
        report.updated.len(),
        report.failed.len()
    );
    Ok(())
}

/// Every `*.pdf` (any case) below `dir`. Symlinked directories are not
/// descended into; symlinked files are kept.
fn find_pdfs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PageboxError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            find_pdfs(&path, out)?;
        } else if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
            && path.is_file()
        {
            out.push(path);
        }
    }
    Ok(())
}
