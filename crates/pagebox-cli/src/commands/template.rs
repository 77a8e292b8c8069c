use pagebox_core::error::PageboxError;
use pagebox_core::model::PageRef;
use pagebox_core::project::load_from_path;
use pagebox_core::template::{
    apply_template, capture_template, delete_template, rename_template, set_template_remark,
    templates, ConflictPolicy,
};
use std::path::{Path, PathBuf};

use super::{absolute, mutate, page_ref};

pub fn capture(
    project: &Path,
    name: &str,
    file: &Path,
    page: usize,
    remark: &str,
) -> Result<(), PageboxError> {
    let page = page_ref(file, page);
    let t = mutate(project, |store| capture_template(store, &page, name, remark))?;
    eprintln!("Captured template '{}' with {} box(es) from {page}", t.name, t.boxes.len());
    Ok(())
}

pub fn apply(
    project: &Path,
    name: &str,
    file: Option<PathBuf>,
    pages: Vec<usize>,
    clear_page: bool,
) -> Result<(), PageboxError> {
    let policy = if clear_page {
        ConflictPolicy::ClearPage
    } else {
        ConflictPolicy::ReplaceMatching
    };

    let report = mutate(project, |store| {
        let targets: Vec<PageRef> = match file {
            None => store.data().page_refs(),
            Some(ref f) if pages.is_empty() => {
                let path = absolute(f);
                let info = store
                    .data()
                    .file(&path)
                    .ok_or_else(|| PageboxError::FileNotFound(path.clone()))?;
                (0..info.page_count).map(|i| PageRef::new(&path, i)).collect()
            }
            Some(ref f) => pages.iter().map(|&p| page_ref(f, p)).collect(),
        };
        apply_template(store, name, &targets, policy)
    })?;

    for (page, error) in &report.skipped {
        eprintln!("  skipped {page}: {error}");
    }
    eprintln!(
        "Applied '{name}' to {} page(s), {} skipped",
        report.applied_count(),
        report.skipped.len()
    );
    Ok(())
}

pub fn delete(project: &Path, name: &str) -> Result<(), PageboxError> {
    mutate(project, |store| delete_template(store, name))?;
    eprintln!("Deleted template '{name}'");
    Ok(())
}

pub fn rename(project: &Path, old: &str, new: &str) -> Result<(), PageboxError> {
    mutate(project, |store| rename_template(store, old, new))?;
    eprintln!("Renamed template '{old}' to '{}'", new.trim());
    Ok(())
}

pub fn remark(project: &Path, name: &str, remark: &str) -> Result<(), PageboxError> {
    mutate(project, |store| set_template_remark(store, name, remark))
}

pub fn list(project: &Path) -> Result<(), PageboxError> {
    let store = load_from_path(project)?;
    for t in templates(&store) {
        let columns: Vec<&str> = t.boxes.keys().map(String::as_str).collect();
        print!("{}  [{}]", t.name, columns.join(", "));
        if let Some(ref page) = t.ref_page {
            print!("  from {page}");
        }
        if !t.remark.is_empty() {
            print!("  -- {}", t.remark);
        }
        println!();
    }
    Ok(())
}
